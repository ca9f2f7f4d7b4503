//! Data access - the collaborator that owns the plan store.
//!
//! The engine never talks to storage directly. Callers hand the façade a
//! [`PlanDataSource`]; [`InMemoryDataSource`] serves fixtures and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use plan_hierarchy::{build_tree, HierarchyError, Indicator, NodeRecord, PlanNode, Risk};

use crate::types::{MetricsError, MetricsWindow, SectorMetrics};

/// Error types reported by a data source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The referenced id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not be reached
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The stored hierarchy is inconsistent
    #[error("Integrity error: {0}")]
    Integrity(HierarchyError),

    /// Any other failure
    #[error("Source error: {0}")]
    Other(String),
}

impl From<SourceError> for MetricsError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(id) => MetricsError::DataNotFound(id),
            SourceError::Integrity(e) => MetricsError::from(e),
            SourceError::Connectivity(msg) | SourceError::Other(msg) => MetricsError::ComputationError(msg),
        }
    }
}

/// Read access to the plan store.
///
/// Implementations own retry policy; the engine does not retry.
#[async_trait]
pub trait PlanDataSource: Send + Sync {
    /// The objective and everything below it.
    async fn fetch_subtree(&self, objective_id: &str) -> Result<PlanNode, SourceError>;

    /// Risks registered against the objective.
    async fn fetch_risks(&self, objective_id: &str) -> Result<Vec<Risk>, SourceError>;

    /// Sector metrics for the objective over a reporting window.
    async fn fetch_sector_metrics(&self, objective_id: &str, window: MetricsWindow) -> Result<SectorMetrics, SourceError>;

    /// Indicator progress (0-100) for the objective.
    async fn fetch_indicator_progress(&self, objective_id: &str) -> Result<f64, SourceError>;

    /// Indicators attached to the objective.
    async fn fetch_indicators(&self, _objective_id: &str) -> Result<Vec<Indicator>, SourceError> {
        Ok(Vec::new())
    }
}

/// In-memory data source for fixtures and tests.
pub struct InMemoryDataSource {
    nodes: RwLock<Vec<NodeRecord>>,
    risks: RwLock<Vec<Risk>>,
    indicators: RwLock<Vec<Indicator>>,
    sector_metrics: RwLock<HashMap<String, SectorMetrics>>,
    indicator_progress: RwLock<HashMap<String, f64>>,
    latency: Option<Duration>,
    call_count: AtomicU32,
}

impl InMemoryDataSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            risks: RwLock::new(Vec::new()),
            indicators: RwLock::new(Vec::new()),
            sector_metrics: RwLock::new(HashMap::new()),
            indicator_progress: RwLock::new(HashMap::new()),
            latency: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add plan nodes.
    pub async fn insert_nodes(&self, nodes: impl IntoIterator<Item = NodeRecord>) {
        self.nodes.write().await.extend(nodes);
    }

    /// Add a risk.
    pub async fn insert_risk(&self, risk: Risk) {
        self.risks.write().await.push(risk);
    }

    /// Add an indicator.
    pub async fn insert_indicator(&self, indicator: Indicator) {
        self.indicators.write().await.push(indicator);
    }

    /// Set sector metrics for an objective.
    pub async fn set_sector_metrics(&self, objective_id: impl Into<String>, metrics: SectorMetrics) {
        self.sector_metrics.write().await.insert(objective_id.into(), metrics);
    }

    /// Set indicator progress for an objective.
    pub async fn set_indicator_progress(&self, objective_id: impl Into<String>, progress: f64) {
        self.indicator_progress.write().await.insert(objective_id.into(), progress);
    }

    /// Number of fetches served.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn begin_fetch(&self, what: &str, objective_id: &str) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        debug!(objective_id = %objective_id, fetch = what, "In-memory fetch");
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanDataSource for InMemoryDataSource {
    async fn fetch_subtree(&self, objective_id: &str) -> Result<PlanNode, SourceError> {
        self.begin_fetch("subtree", objective_id).await;
        let nodes = self.nodes.read().await;
        build_tree(&nodes, objective_id).map_err(|e| match e {
            HierarchyError::UnknownNode(id) => SourceError::NotFound(id),
            other => SourceError::Integrity(other),
        })
    }

    async fn fetch_risks(&self, objective_id: &str) -> Result<Vec<Risk>, SourceError> {
        self.begin_fetch("risks", objective_id).await;
        let risks = self.risks.read().await;
        Ok(risks.iter().filter(|r| r.objective_id == objective_id).cloned().collect())
    }

    async fn fetch_sector_metrics(&self, objective_id: &str, _window: MetricsWindow) -> Result<SectorMetrics, SourceError> {
        self.begin_fetch("sector_metrics", objective_id).await;
        self.sector_metrics
            .read()
            .await
            .get(objective_id)
            .copied()
            .ok_or_else(|| SourceError::NotFound(objective_id.to_string()))
    }

    async fn fetch_indicator_progress(&self, objective_id: &str) -> Result<f64, SourceError> {
        self.begin_fetch("indicator_progress", objective_id).await;
        self.indicator_progress
            .read()
            .await
            .get(objective_id)
            .copied()
            .ok_or_else(|| SourceError::NotFound(objective_id.to_string()))
    }

    async fn fetch_indicators(&self, objective_id: &str) -> Result<Vec<Indicator>, SourceError> {
        self.begin_fetch("indicators", objective_id).await;
        let indicators = self.indicators.read().await;
        Ok(indicators
            .iter()
            .filter(|i| i.objective_id == objective_id)
            .cloned()
            .collect())
    }
}
