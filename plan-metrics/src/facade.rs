//! Metric façade - the entry point the dashboard calls.
//!
//! Fetches through the [`PlanDataSource`], runs the calculators and returns
//! complete value objects. Every fetch-based call runs under a single
//! deadline; errors from the source are mapped onto [`MetricsError`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::TryFutureExt;
use tracing::{debug, error, info, warn};

use plan_hierarchy::{
    check_tree_integrity, clamp_progress, indicator_progress, structure_fingerprint, HierarchyValidator,
    Indicator, IndicatorValidator, NodeRecord, PlanNode, ValidationResult,
};

use crate::config::EngineConfig;
use crate::performance::calculate_performance_score;
use crate::progress::{aggregate_progress, combine, ProgressStatus};
use crate::risk::calculate_risk_exposure;
use crate::source::PlanDataSource;
use crate::types::{
    IndicatorEvaluation, MetricsError, MetricsWindow, ObjectiveEvaluation, PerformanceScore, Result, RiskExposure,
};
use crate::utilization::resource_utilization;

/// Result of checking a proposed structural change.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCheck {
    /// Validation outcome
    pub result: ValidationResult,
    /// Fingerprint of the validated structure, present only when valid
    pub fingerprint: Option<String>,
}

impl WriteCheck {
    /// Whether the change may be handed to the approval workflow.
    pub fn is_admissible(&self) -> bool {
        self.result.is_valid && self.fingerprint.is_some()
    }

    /// Whether `nodes` is still the structure that was validated.
    pub fn matches(&self, nodes: &[NodeRecord]) -> bool {
        self.fingerprint.as_deref() == Some(structure_fingerprint(nodes).as_str())
    }
}

/// Progress of one indicator, with formula failures typed per indicator.
pub fn indicator_outcome(indicator: &Indicator) -> Result<f64> {
    indicator_progress(indicator).map_err(|source| MetricsError::MalformedFormula {
        indicator_id: indicator.id.clone(),
        source,
    })
}

fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricsError::ComputationError(format!("{} is not a finite number", what)))
    }
}

/// Orchestrates fetching, validation and metric computation.
pub struct MetricFacade {
    source: Arc<dyn PlanDataSource>,
    config: EngineConfig,
    validator: HierarchyValidator,
    indicator_validator: IndicatorValidator,
}

impl MetricFacade {
    /// Create a façade over a data source.
    pub fn new(source: Arc<dyn PlanDataSource>, config: EngineConfig) -> Self {
        let validator = HierarchyValidator::new(config.hierarchy.clone());
        Self {
            source,
            config,
            validator,
            indicator_validator: IndicatorValidator::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a flat node set.
    pub fn validate_hierarchy(&self, nodes: &[NodeRecord]) -> ValidationResult {
        self.validator.validate_hierarchy(nodes)
    }

    /// Check a proposed structure before it is written.
    ///
    /// A valid structure comes back with its fingerprint so the approval
    /// workflow can detect edits made after validation.
    pub fn check_write(&self, nodes: &[NodeRecord]) -> WriteCheck {
        let result = if self.config.facade.validate_before_write {
            self.validator.validate_hierarchy(nodes)
        } else {
            ValidationResult::valid()
        };

        if !result.is_valid {
            warn!(
                nodes = nodes.len(),
                errors = result.errors.len(),
                "Structural change rejected"
            );
        }

        let fingerprint = result.is_valid.then(|| structure_fingerprint(nodes));
        WriteCheck { result, fingerprint }
    }

    /// Rolled-up progress of an objective.
    pub async fn objective_progress(&self, objective_id: &str) -> Result<f64> {
        let start = Instant::now();
        let progress = self
            .bounded("objective_progress", objective_id, async {
                let tree = self.load_tree(objective_id).await?;
                self.rollup_progress(&tree).await
            })
            .await?;

        info!(
            objective_id = %objective_id,
            progress = progress,
            duration_ms = start.elapsed().as_millis() as u64,
            "Objective progress computed"
        );
        Ok(progress)
    }

    /// Risk exposure of an objective.
    pub async fn risk_exposure(&self, objective_id: &str) -> Result<RiskExposure> {
        self.bounded("risk_exposure", objective_id, async {
            let risks = self.source.fetch_risks(objective_id).await?;
            let exposure = calculate_risk_exposure(objective_id, &risks);
            ensure_finite(exposure.exposure, "risk exposure")?;
            Ok(exposure)
        })
        .await
    }

    /// Composite performance score of an objective.
    pub async fn performance_score(&self, objective_id: &str, window: MetricsWindow) -> Result<PerformanceScore> {
        let start = Instant::now();
        let score = self
            .bounded("performance_score", objective_id, async {
                let (tree, risks, sector, indicator_pct) = futures::try_join!(
                    self.load_tree(objective_id),
                    self.source.fetch_risks(objective_id).map_err(MetricsError::from),
                    self.source
                        .fetch_sector_metrics(objective_id, window)
                        .map_err(MetricsError::from),
                    self.source
                        .fetch_indicator_progress(objective_id)
                        .map_err(MetricsError::from),
                )?;

                let progress = self.rollup_progress(&tree).await?;
                let exposure = calculate_risk_exposure(objective_id, &risks);
                let score =
                    calculate_performance_score(progress, indicator_pct, exposure.as_percentage(), &sector);
                ensure_finite(score.score, "performance score")?;
                Ok(score)
            })
            .await?;

        info!(
            objective_id = %objective_id,
            score = score.score,
            duration_ms = start.elapsed().as_millis() as u64,
            "Performance score computed"
        );
        Ok(score)
    }

    /// Evaluate every indicator of an objective.
    ///
    /// A malformed formula is reported on its own indicator; siblings are
    /// still evaluated.
    pub async fn evaluate_indicators(&self, objective_id: &str) -> Result<Vec<IndicatorEvaluation>> {
        self.bounded("evaluate_indicators", objective_id, async {
            let indicators = self.source.fetch_indicators(objective_id).await?;
            Ok(indicators.iter().map(|i| self.evaluate_indicator(i)).collect())
        })
        .await
    }

    /// Evaluate a single indicator.
    pub fn evaluate_indicator(&self, indicator: &Indicator) -> IndicatorEvaluation {
        let validation = self.indicator_validator.validate(indicator);
        let outcome = indicator_outcome(indicator);
        if let Err(e) = &outcome {
            warn!(
                indicator_id = %indicator.id,
                objective_id = %indicator.objective_id,
                error = %e,
                "Indicator formula could not be evaluated"
            );
        }
        IndicatorEvaluation::from_outcome(indicator.id.clone(), outcome, validation)
    }

    /// Full evaluation of an objective.
    ///
    /// Either every figure is computed or an error is returned.
    pub async fn evaluate_objective(&self, objective_id: &str, window: MetricsWindow) -> Result<ObjectiveEvaluation> {
        let start = Instant::now();
        let evaluation = self
            .bounded("evaluate_objective", objective_id, async {
                let (tree, risks, sector, indicator_pct, indicators) = futures::try_join!(
                    self.load_tree(objective_id),
                    self.source.fetch_risks(objective_id).map_err(MetricsError::from),
                    self.source
                        .fetch_sector_metrics(objective_id, window)
                        .map_err(MetricsError::from),
                    self.source
                        .fetch_indicator_progress(objective_id)
                        .map_err(MetricsError::from),
                    self.source.fetch_indicators(objective_id).map_err(MetricsError::from),
                )?;

                let progress = self.rollup_progress(&tree).await?;
                let risk = calculate_risk_exposure(objective_id, &risks);
                ensure_finite(risk.exposure, "risk exposure")?;
                let performance =
                    calculate_performance_score(progress, indicator_pct, risk.as_percentage(), &sector);
                ensure_finite(performance.score, "performance score")?;

                Ok(ObjectiveEvaluation {
                    id: uuid::Uuid::new_v4().to_string(),
                    objective_id: objective_id.to_string(),
                    progress,
                    status: ProgressStatus::classify(progress, clamp_progress(tree.target_progress)),
                    indicator_progress: indicator_pct,
                    indicators: indicators.iter().map(|i| self.evaluate_indicator(i)).collect(),
                    risk,
                    utilization: resource_utilization(&tree),
                    performance,
                    window,
                    computed_at: chrono::Utc::now(),
                    duration_ms: 0,
                })
            })
            .await;

        let mut evaluation = evaluation?;
        evaluation.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            objective_id = %objective_id,
            evaluation_id = %evaluation.id,
            progress = evaluation.progress,
            score = evaluation.performance.score,
            status = evaluation.status.as_str(),
            duration_ms = evaluation.duration_ms,
            "Objective evaluated"
        );
        Ok(evaluation)
    }

    /// Run `operation` under the configured deadline.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        objective_id: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout_ms = self.config.facade.timeout_ms;
        match tokio::time::timeout(self.config.facade.timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = operation,
                    objective_id = %objective_id,
                    timeout_ms = timeout_ms,
                    "Façade call timed out"
                );
                Err(MetricsError::Timeout { timeout_ms })
            }
        }
    }

    /// Fetch a subtree and check it before aggregation.
    async fn load_tree(&self, objective_id: &str) -> Result<PlanNode> {
        let tree = self.source.fetch_subtree(objective_id).await?;

        if tree.id != objective_id {
            error!(
                objective_id = %objective_id,
                returned = %tree.id,
                "Data source returned a different subtree"
            );
            return Err(MetricsError::InvalidHierarchy(format!(
                "requested {} but received {}",
                objective_id, tree.id
            )));
        }
        if let Err(e) = check_tree_integrity(&tree) {
            error!(objective_id = %objective_id, error = %e, "Subtree failed integrity check");
            return Err(e.into());
        }
        Ok(tree)
    }

    /// Rollup, split across blocking tasks for large subtrees.
    async fn rollup_progress(&self, tree: &PlanNode) -> Result<f64> {
        let nodes = tree.node_count();
        if nodes <= self.config.facade.parallel_threshold || tree.is_leaf() {
            return ensure_finite(aggregate_progress(tree), "progress");
        }

        debug!(
            root = %tree.id,
            nodes = nodes,
            tasks = tree.children.len(),
            "Splitting rollup across blocking tasks"
        );

        let handles: Vec<_> = tree
            .children
            .iter()
            .map(|child| {
                let child = child.clone();
                tokio::task::spawn_blocking(move || (aggregate_progress(&child), child.effective_weight()))
            })
            .collect();

        let mut parts = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            let part = joined.map_err(|e| MetricsError::ComputationError(format!("Rollup task failed: {}", e)))?;
            parts.push(part);
        }
        ensure_finite(combine(&parts), "progress")
    }
}
