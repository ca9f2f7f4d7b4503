//! Core types for plan metrics.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use plan_hierarchy::{FormulaError, HierarchyError, ValidationResult};

use crate::progress::ProgressStatus;

/// Reporting window for sector metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsWindow {
    /// First day of the window
    pub start: NaiveDate,
    /// Last day of the window (inclusive)
    pub end: NaiveDate,
}

impl MetricsWindow {
    /// Create a new window.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether a date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Sector-level metrics reported for an objective (each 0-100).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorMetrics {
    pub efficiency: f64,
    pub transparency: f64,
    pub governance: f64,
    pub social_impact: f64,
}

/// Normalized inputs to the performance score (each 0-100).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceComponents {
    /// Rolled-up objective progress
    pub progress: f64,
    /// Indicator progress toward targets
    pub indicator_progress: f64,
    /// 100 minus risk exposure, floored at 0
    pub risk_factor: f64,
    pub efficiency: f64,
    pub transparency: f64,
    pub governance: f64,
    pub social_impact: f64,
}

impl PerformanceComponents {
    /// Every component at the same value.
    pub fn uniform(value: f64) -> Self {
        Self {
            progress: value,
            indicator_progress: value,
            risk_factor: value,
            efficiency: value,
            transparency: value,
            governance: value,
            social_impact: value,
        }
    }
}

/// Composite performance score for an objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    /// Weighted score (0-100)
    pub score: f64,
    /// Components the score was computed from
    pub components: PerformanceComponents,
}

/// Per-risk breakdown kept for explainability in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Risk this breakdown belongs to
    pub risk_id: String,
    /// Severity on the canonical 0-1 scale
    pub severity: f64,
    /// 1 minus average mitigation effectiveness
    pub mitigation_factor: f64,
    /// severity × mitigation_factor
    pub base_exposure: f64,
    pub compliance_impact: f64,
    pub reputational_impact: f64,
    pub social_impact: f64,
    /// Base exposure scaled by the impact multiplier
    pub weighted_exposure: f64,
}

/// Aggregate risk exposure of an objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskExposure {
    /// Objective the exposure was computed for
    pub objective_id: String,
    /// Sum of weighted exposure over active risks
    pub exposure: f64,
    /// One entry per active risk
    pub factors: Vec<RiskFactor>,
}

impl RiskExposure {
    /// Exposure on the 0-100 scale used by the performance score.
    pub fn as_percentage(&self) -> f64 {
        self.exposure * 100.0
    }

    /// Number of risks that contributed.
    pub fn active_risks(&self) -> usize {
        self.factors.len()
    }
}

/// Budget totals of a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub allocated: f64,
    pub spent: f64,
    /// spent / allocated × 100, 0 when nothing is allocated
    pub utilization: f64,
}

/// Outcome of evaluating one indicator.
///
/// A malformed formula is recorded here rather than failing the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorEvaluation {
    /// Indicator evaluated
    pub indicator_id: String,
    /// Normalized progress (0-100), absent when evaluation failed
    pub progress: Option<f64>,
    /// Failure message, absent on success
    pub error: Option<String>,
    /// Indicator rule results
    pub validation: ValidationResult,
}

impl IndicatorEvaluation {
    /// Build from the outcome of a single evaluation.
    pub fn from_outcome(indicator_id: impl Into<String>, outcome: Result<f64>, validation: ValidationResult) -> Self {
        let (progress, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            indicator_id: indicator_id.into(),
            progress,
            error,
            validation,
        }
    }

    /// Whether the indicator produced a value.
    pub fn is_ok(&self) -> bool {
        self.progress.is_some()
    }
}

/// Complete metric evaluation of one objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveEvaluation {
    /// Unique evaluation ID
    pub id: String,
    /// Objective evaluated
    pub objective_id: String,
    /// Rolled-up progress (0-100)
    pub progress: f64,
    /// Progress relative to the objective's own target
    pub status: ProgressStatus,
    /// Indicator progress reported by the data source
    pub indicator_progress: f64,
    /// Per-indicator results
    pub indicators: Vec<IndicatorEvaluation>,
    /// Risk exposure of the objective
    pub risk: RiskExposure,
    /// Budget totals of the subtree
    pub utilization: ResourceUtilization,
    /// Composite performance score
    pub performance: PerformanceScore,
    /// Window the sector metrics were taken over
    pub window: MetricsWindow,
    /// When the evaluation was computed
    pub computed_at: DateTime<Utc>,
    /// Wall time spent (ms)
    pub duration_ms: u64,
}

/// Error types for metric computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    /// The data source could not resolve a referenced id
    #[error("Data not found: {0}")]
    DataNotFound(String),

    /// Structural defect found mid-computation
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// An indicator formula failed to parse or evaluate
    #[error("Malformed formula in indicator {indicator_id}: {source}")]
    MalformedFormula {
        indicator_id: String,
        source: FormulaError,
    },

    /// Any other computation failure
    #[error("Computation error: {0}")]
    ComputationError(String),

    /// The operation did not finish within the configured deadline
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl From<HierarchyError> for MetricsError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::UnknownNode(id) => MetricsError::DataNotFound(id),
            other => MetricsError::InvalidHierarchy(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_error_mapping() {
        let err: MetricsError = HierarchyError::DuplicateId("obj-1".to_string()).into();
        assert!(matches!(err, MetricsError::InvalidHierarchy(_)));

        let err: MetricsError = HierarchyError::UnknownNode("obj-9".to_string()).into();
        assert_eq!(err, MetricsError::DataNotFound("obj-9".to_string()));
    }

    #[test]
    fn test_indicator_evaluation_from_failure() {
        let eval = IndicatorEvaluation::from_outcome(
            "ind-1",
            Err(MetricsError::MalformedFormula {
                indicator_id: "ind-1".to_string(),
                source: FormulaError::DivisionByZero,
            }),
            ValidationResult::valid(),
        );
        assert!(!eval.is_ok());
        assert!(eval.error.unwrap().contains("ind-1"));
    }

    #[test]
    fn test_window_contains() {
        let window = MetricsWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        );
        assert!(window.contains(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
    }
}
