//! Generic rule engine.
//!
//! A [`RuleSet`] holds named predicates over an entity, each tagged as an
//! error or a warning. Rule sets are assembled once through a
//! [`RuleSetBuilder`] and are immutable afterwards, so the same set can be
//! shared across validator instances and threads.
//!
//! Predicates must not panic. A panic is a programming defect and propagates
//! to the caller instead of being folded into the [`ValidationResult`].

use std::fmt;
use tracing::debug;

use crate::validation::{ValidationIssue, ValidationResult};

/// Whether a failing rule invalidates the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSeverity {
    /// Failure makes the result invalid
    Error,
    /// Failure is reported but keeps the result valid
    Warning,
}

type Predicate<E, O> = Box<dyn Fn(&E, &O) -> bool + Send + Sync>;
type Detail<E, O> = Box<dyn Fn(&E, &O) -> Option<String> + Send + Sync>;

/// A named predicate over an entity.
pub struct Rule<E: ?Sized, O: ?Sized = ()> {
    /// Stable rule code
    pub code: String,
    /// Message reported on failure
    pub message: String,
    /// Field the rule targets
    pub field: Option<String>,
    /// Error or warning
    pub severity: RuleSeverity,
    predicate: Predicate<E, O>,
    detail: Option<Detail<E, O>>,
}

impl<E: ?Sized, O: ?Sized> Rule<E, O> {
    /// Create an error rule.
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Fn(&E, &O) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            severity: RuleSeverity::Error,
            predicate: Box::new(predicate),
            detail: None,
        }
    }

    /// Create a warning rule.
    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Fn(&E, &O) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            severity: RuleSeverity::Warning,
            ..Self::error(code, message, predicate)
        }
    }

    /// Builder: set the targeted field.
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Builder: append context to the message of a failure, e.g. the ids
    /// involved.
    pub fn with_detail(
        mut self,
        detail: impl Fn(&E, &O) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.detail = Some(Box::new(detail));
        self
    }

    /// Run the predicate.
    pub fn check(&self, entity: &E, options: &O) -> bool {
        (self.predicate)(entity, options)
    }

    fn issue(&self, entity: &E, options: &O, entity_id: Option<&str>) -> ValidationIssue {
        let message = match self.detail.as_ref().and_then(|detail| detail(entity, options)) {
            Some(detail) => format!("{}: {}", self.message, detail),
            None => self.message.clone(),
        };
        ValidationIssue {
            code: self.code.clone(),
            message,
            field: self.field.clone(),
            entity_id: entity_id.map(str::to_string),
        }
    }
}

impl<E: ?Sized, O: ?Sized> fmt::Debug for Rule<E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .field("field", &self.field)
            .finish()
    }
}

/// Assembles a rule set before first use.
pub struct RuleSetBuilder<E: ?Sized, O: ?Sized = ()> {
    name: String,
    rules: Vec<Rule<E, O>>,
}

impl<E: ?Sized, O: ?Sized> RuleSetBuilder<E, O> {
    /// Create an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Add a rule. A rule with the same code replaces the earlier one.
    pub fn add_rule(mut self, rule: Rule<E, O>) -> Self {
        self.rules.retain(|r| r.code != rule.code);
        self.rules.push(rule);
        self
    }

    /// Remove a rule by code.
    pub fn remove_rule(mut self, code: &str) -> Self {
        self.rules.retain(|r| r.code != code);
        self
    }

    /// Freeze the rule set.
    pub fn build(self) -> RuleSet<E, O> {
        RuleSet {
            name: self.name,
            rules: self.rules,
        }
    }
}

/// Immutable, ordered set of rules for one entity type.
pub struct RuleSet<E: ?Sized, O: ?Sized = ()> {
    name: String,
    rules: Vec<Rule<E, O>>,
}

impl<E: ?Sized, O: ?Sized> RuleSet<E, O> {
    /// Start building a rule set.
    pub fn builder(name: impl Into<String>) -> RuleSetBuilder<E, O> {
        RuleSetBuilder::new(name)
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get rule count.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered rule codes, in evaluation order.
    pub fn codes(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.code.as_str()).collect()
    }

    /// Run every rule against the entity.
    pub fn validate(&self, entity: &E, options: &O) -> ValidationResult {
        self.validate_entity(entity, options, None)
    }

    /// Run every rule, tagging issues with the entity's id.
    pub fn validate_entity(
        &self,
        entity: &E,
        options: &O,
        entity_id: Option<&str>,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in &self.rules {
            if rule.check(entity, options) {
                continue;
            }
            match rule.severity {
                RuleSeverity::Error => errors.push(rule.issue(entity, options, entity_id)),
                RuleSeverity::Warning => warnings.push(rule.issue(entity, options, entity_id)),
            }
        }

        debug!(
            rule_set = %self.name,
            rules = self.rules.len(),
            errors = errors.len(),
            warnings = warnings.len(),
            "Rule set evaluated"
        );

        ValidationResult::from_issues(errors, warnings)
    }
}

impl<E: ?Sized, O: ?Sized> fmt::Debug for RuleSet<E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Draft {
        title: String,
        pages: u32,
    }

    fn draft_rules() -> RuleSet<Draft, u32> {
        RuleSet::builder("draft")
            .add_rule(
                Rule::error("TITLE_REQUIRED", "Title is required", |d: &Draft, _| {
                    !d.title.is_empty()
                })
                .on_field("title"),
            )
            .add_rule(Rule::warning(
                "TOO_LONG",
                "Draft exceeds page limit",
                |d: &Draft, limit: &u32| d.pages <= *limit,
            ))
            .build()
    }

    #[test]
    fn test_errors_and_warnings() {
        let rules = draft_rules();
        let result = rules.validate(
            &Draft {
                title: String::new(),
                pages: 20,
            },
            &10,
        );

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "TITLE_REQUIRED");
        assert_eq!(result.errors[0].field.as_deref(), Some("title"));
        assert!(result.has_warning("TOO_LONG"));
    }

    #[test]
    fn test_warnings_keep_validity() {
        let result = draft_rules().validate(
            &Draft {
                title: "Plan".to_string(),
                pages: 20,
            },
            &10,
        );
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_builder_remove_and_replace() {
        let rules = RuleSet::<Draft, u32>::builder("draft")
            .add_rule(Rule::error("A", "first", |_: &Draft, _| false))
            .add_rule(Rule::error("B", "second", |_: &Draft, _| false))
            .add_rule(Rule::error("A", "replaced", |_: &Draft, _| true))
            .remove_rule("B")
            .build();

        assert_eq!(rules.codes(), vec!["A"]);
        let result = rules.validate(
            &Draft {
                title: String::new(),
                pages: 0,
            },
            &0,
        );
        assert!(result.is_valid);
    }

    #[test]
    fn test_entity_tagging() {
        let rules = draft_rules();
        let result = rules.validate_entity(
            &Draft {
                title: String::new(),
                pages: 1,
            },
            &10,
            Some("draft-7"),
        );
        assert_eq!(result.errors[0].entity_id.as_deref(), Some("draft-7"));
    }

    #[test]
    fn test_detail_extends_message() {
        let rules = RuleSet::<Draft, u32>::builder("draft")
            .add_rule(
                Rule::error("TOO_LONG", "Draft exceeds page limit", |d: &Draft, limit: &u32| {
                    d.pages <= *limit
                })
                .with_detail(|d: &Draft, limit: &u32| Some(format!("{} > {}", d.pages, limit))),
            )
            .add_rule(
                Rule::warning("TITLE_REQUIRED", "Title is required", |d: &Draft, _| !d.title.is_empty())
                    .with_detail(|_: &Draft, _: &u32| None),
            )
            .build();

        let result = rules.validate(
            &Draft {
                title: String::new(),
                pages: 20,
            },
            &10,
        );
        assert_eq!(result.errors[0].message, "Draft exceeds page limit: 20 > 10");
        assert_eq!(result.warnings[0].message, "Title is required");
    }

    #[test]
    #[should_panic(expected = "broken predicate")]
    fn test_panicking_predicate_propagates() {
        let rules = RuleSet::<Draft, u32>::builder("broken")
            .add_rule(Rule::error("BROKEN", "never", |_: &Draft, _| {
                panic!("broken predicate")
            }))
            .build();
        rules.validate(
            &Draft {
                title: String::new(),
                pages: 0,
            },
            &0,
        );
    }
}
