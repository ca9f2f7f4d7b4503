//! Indicator validation and progress normalization.

use std::collections::HashMap;

use crate::formula::{Formula, FormulaError};
use crate::rules::{Rule, RuleSet};
use crate::types::{clamp_progress, Indicator};
use crate::validation::ValidationResult;

/// Rule codes reported by the indicator validator.
pub mod codes {
    pub const INDICATOR_NO_RESPONSIBLE: &str = "INDICATOR_NO_RESPONSIBLE";
    pub const INDICATOR_INVALID_FORMULA: &str = "INDICATOR_INVALID_FORMULA";
    pub const INDICATOR_TARGET_EQUALS_BASELINE: &str = "INDICATOR_TARGET_EQUALS_BASELINE";
}

/// Validator for indicators, built on the generic rule engine.
pub struct IndicatorValidator {
    rules: RuleSet<Indicator>,
}

impl IndicatorValidator {
    /// Create a validator with the standard indicator rules.
    pub fn new() -> Self {
        let rules = RuleSet::builder("indicator")
            .add_rule(
                Rule::error(
                    codes::INDICATOR_NO_RESPONSIBLE,
                    "Indicator must have at least one responsible person",
                    |indicator: &Indicator, _: &()| {
                        indicator.responsible.iter().any(|r| !r.trim().is_empty())
                    },
                )
                .on_field("responsible"),
            )
            .add_rule(
                Rule::error(
                    codes::INDICATOR_INVALID_FORMULA,
                    "Indicator formula is not a valid arithmetic expression",
                    |indicator: &Indicator, _: &()| Formula::parse(&indicator.formula).is_ok(),
                )
                .on_field("formula"),
            )
            .add_rule(
                Rule::warning(
                    codes::INDICATOR_TARGET_EQUALS_BASELINE,
                    "Target equals baseline; progress is reported as 100",
                    |indicator: &Indicator, _: &()| {
                        indicator.target_value != indicator.baseline_value
                    },
                )
                .on_field("targetValue"),
            )
            .build();

        Self { rules }
    }

    /// Validate one indicator.
    pub fn validate(&self, indicator: &Indicator) -> ValidationResult {
        self.rules.validate_entity(indicator, &(), Some(&indicator.id))
    }
}

impl Default for IndicatorValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Variables an indicator formula may reference.
pub fn formula_variables(indicator: &Indicator) -> HashMap<String, f64> {
    let mut vars = HashMap::new();
    for (names, value) in [
        (["current", "current_value", "currentValue"], indicator.current_value),
        (["baseline", "baseline_value", "baselineValue"], indicator.baseline_value),
        (["target", "target_value", "targetValue"], indicator.target_value),
    ] {
        for name in names {
            vars.insert(name.to_string(), value);
        }
    }
    vars
}

/// Progress of an indicator toward its target (0-100).
///
/// The formula yields the measured value, which is then placed on the
/// baseline→target scale. When target equals baseline the indicator is
/// reported as complete.
pub fn indicator_progress(indicator: &Indicator) -> Result<f64, FormulaError> {
    let formula = Formula::parse(&indicator.formula)?;
    let value = formula.evaluate(&formula_variables(indicator))?;

    let span = indicator.target_value - indicator.baseline_value;
    if span == 0.0 {
        return Ok(100.0);
    }
    Ok(clamp_progress((value - indicator.baseline_value) / span * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MeasurementFrequency;

    fn indicator(formula: &str, baseline: f64, target: f64, current: f64) -> Indicator {
        Indicator {
            id: "ind-1".to_string(),
            objective_id: "obj-1".to_string(),
            formula: formula.to_string(),
            baseline_value: baseline,
            target_value: target,
            current_value: current,
            measurement_frequency: MeasurementFrequency::Quarterly,
            responsible: vec!["planning-office".to_string()],
        }
    }

    #[test]
    fn test_valid_indicator() {
        let result = IndicatorValidator::new().validate(&indicator("current", 0.0, 100.0, 40.0));
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_responsible() {
        let mut ind = indicator("current", 0.0, 100.0, 40.0);
        ind.responsible = vec![" ".to_string()];
        let result = IndicatorValidator::new().validate(&ind);
        assert!(result.has_error(codes::INDICATOR_NO_RESPONSIBLE));
        assert_eq!(result.errors[0].entity_id.as_deref(), Some("ind-1"));
    }

    #[test]
    fn test_invalid_formula() {
        let result = IndicatorValidator::new().validate(&indicator("current;", 0.0, 100.0, 40.0));
        assert!(result.has_error(codes::INDICATOR_INVALID_FORMULA));
    }

    #[test]
    fn test_overlong_formula_rejected() {
        let long = vec!["current"; 5_000].join(" + ");
        let ind = indicator(&long, 0.0, 100.0, 40.0);
        let result = IndicatorValidator::new().validate(&ind);
        assert!(result.has_error(codes::INDICATOR_INVALID_FORMULA));
        assert!(matches!(indicator_progress(&ind), Err(FormulaError::TooLong { .. })));
    }

    #[test]
    fn test_equal_target_baseline_warns() {
        let result = IndicatorValidator::new().validate(&indicator("current", 50.0, 50.0, 50.0));
        assert!(result.is_valid);
        assert!(result.has_warning(codes::INDICATOR_TARGET_EQUALS_BASELINE));
    }

    #[test]
    fn test_progress_normalization() {
        assert_eq!(indicator_progress(&indicator("current", 20.0, 120.0, 70.0)).unwrap(), 50.0);
        // Decreasing target: baseline 80 → target 40, at 60 is halfway
        assert_eq!(indicator_progress(&indicator("current", 80.0, 40.0, 60.0)).unwrap(), 50.0);
        // Overshoot clamps
        assert_eq!(indicator_progress(&indicator("current", 0.0, 10.0, 30.0)).unwrap(), 100.0);
        assert_eq!(indicator_progress(&indicator("currentValue * 2", 0.0, 100.0, 20.0)).unwrap(), 40.0);
    }

    #[test]
    fn test_equal_target_baseline_is_complete() {
        assert_eq!(indicator_progress(&indicator("current", 50.0, 50.0, 10.0)).unwrap(), 100.0);
    }

    #[test]
    fn test_formula_errors_surface() {
        assert!(matches!(
            indicator_progress(&indicator("current / missing", 0.0, 100.0, 1.0)),
            Err(FormulaError::UnknownVariable(_))
        ));
    }
}
