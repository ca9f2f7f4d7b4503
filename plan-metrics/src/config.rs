//! Configuration for the metric engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use plan_hierarchy::HierarchyConfig;

/// Configuration for the metric engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hierarchy validation settings
    pub hierarchy: HierarchyConfig,
    /// Façade settings
    pub facade: FacadeConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Façade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Deadline for a whole façade call (ms)
    pub timeout_ms: u64,
    /// Run the hierarchy validator in `check_write`
    pub validate_before_write: bool,
    /// Node count above which rollup is split across blocking tasks
    pub parallel_threshold: usize,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000, // 10 seconds
            validate_before_write: true,
            parallel_threshold: 2_000,
        }
    }
}

impl FacadeConfig {
    /// Deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
