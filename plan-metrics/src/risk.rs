//! Risk scorer - exposure of an objective to its active risks.
//!
//! Per active risk:
//!
//! ```text
//! mitigation_factor = 1 - avg(effectiveness) / 100      (1 without mitigations)
//! base_exposure     = severity × mitigation_factor
//! weighted_exposure = base_exposure × (1 + 0.3·compliance + 0.3·reputational + 0.4·social)
//! ```
//!
//! Severity is on the 0-1 scale (see [`RiskSeverity::normalized`]).

use tracing::debug;

use plan_hierarchy::{Risk, RiskSeverity};

use crate::types::{RiskExposure, RiskFactor};

/// Weight of compliance impact in the multiplier.
pub const COMPLIANCE_WEIGHT: f64 = 0.3;
/// Weight of reputational impact in the multiplier.
pub const REPUTATIONAL_WEIGHT: f64 = 0.3;
/// Weight of social impact in the multiplier.
pub const SOCIAL_WEIGHT: f64 = 0.4;

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// 1 minus the mean mitigation effectiveness, or 1 with no mitigations.
fn mitigation_factor(risk: &Risk) -> f64 {
    if risk.mitigations.is_empty() {
        return 1.0;
    }
    let total: f64 = risk
        .mitigations
        .iter()
        .map(|m| {
            if m.effectiveness_score.is_finite() {
                m.effectiveness_score.clamp(0.0, 100.0)
            } else {
                0.0
            }
        })
        .sum();
    1.0 - (total / risk.mitigations.len() as f64) / 100.0
}

/// Exposure breakdown of a single risk.
pub fn risk_factor(risk: &Risk) -> RiskFactor {
    let severity = RiskSeverity::normalized(&risk.severity);
    let mitigation_factor = mitigation_factor(risk);
    let base_exposure = severity * mitigation_factor;

    let compliance_impact = unit(risk.compliance_impact);
    let reputational_impact = unit(risk.reputational_impact);
    let social_impact = unit(risk.social_impact);
    let multiplier = 1.0
        + compliance_impact * COMPLIANCE_WEIGHT
        + reputational_impact * REPUTATIONAL_WEIGHT
        + social_impact * SOCIAL_WEIGHT;

    RiskFactor {
        risk_id: risk.id.clone(),
        severity,
        mitigation_factor,
        base_exposure,
        compliance_impact,
        reputational_impact,
        social_impact,
        weighted_exposure: base_exposure * multiplier,
    }
}

/// Total exposure of `objective_id` over its active risks.
///
/// Risks belonging to other objectives or not in the active state are
/// excluded from both the sum and the breakdown.
pub fn calculate_risk_exposure(objective_id: &str, risks: &[Risk]) -> RiskExposure {
    let factors: Vec<RiskFactor> = risks
        .iter()
        .filter(|r| r.objective_id == objective_id && r.status.contributes_exposure())
        .map(risk_factor)
        .collect();
    let exposure = factors.iter().map(|f| f.weighted_exposure).sum();

    debug!(
        objective_id = %objective_id,
        considered = risks.len(),
        active = factors.len(),
        exposure = exposure,
        "Risk exposure computed"
    );

    RiskExposure {
        objective_id: objective_id.to_string(),
        exposure,
        factors,
    }
}
