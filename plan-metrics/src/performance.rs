//! Performance scorer - fixed-weight blend of normalized components.

use crate::types::{PerformanceComponents, PerformanceScore, SectorMetrics};

// Weights in percentage points; they sum to 100.
const PROGRESS_WEIGHT: f64 = 20.0;
const INDICATOR_WEIGHT: f64 = 20.0;
const RISK_WEIGHT: f64 = 10.0;
const EFFICIENCY_WEIGHT: f64 = 10.0;
const TRANSPARENCY_WEIGHT: f64 = 15.0;
const GOVERNANCE_WEIGHT: f64 = 15.0;
const SOCIAL_WEIGHT: f64 = 10.0;

/// Turn risk exposure (0-100 scale) into a score component.
pub fn risk_factor(risk_exposure: f64) -> f64 {
    (100.0 - risk_exposure).max(0.0)
}

/// Weighted score of already-normalized components.
pub fn score_components(components: PerformanceComponents) -> PerformanceScore {
    let weighted = PROGRESS_WEIGHT * components.progress
        + INDICATOR_WEIGHT * components.indicator_progress
        + RISK_WEIGHT * components.risk_factor
        + EFFICIENCY_WEIGHT * components.efficiency
        + TRANSPARENCY_WEIGHT * components.transparency
        + GOVERNANCE_WEIGHT * components.governance
        + SOCIAL_WEIGHT * components.social_impact;

    PerformanceScore {
        score: weighted / 100.0,
        components,
    }
}

/// Composite performance score of an objective.
///
/// `risk_exposure` is on the 0-100 scale; inputs are not re-normalized.
pub fn calculate_performance_score(
    progress: f64,
    indicator_progress: f64,
    risk_exposure: f64,
    sector: &SectorMetrics,
) -> PerformanceScore {
    score_components(PerformanceComponents {
        progress,
        indicator_progress,
        risk_factor: risk_factor(risk_exposure),
        efficiency: sector.efficiency,
        transparency: sector.transparency,
        governance: sector.governance,
        social_impact: sector.social_impact,
    })
}
