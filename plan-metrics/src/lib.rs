//! Plan Metrics - bottom-up aggregation over the strategic plan tree
//!
//! Computes the derived figures the planning dashboard renders for an
//! objective:
//!
//! - **Progress**: weighted rollup from leaves to the objective
//! - **Risk exposure**: severity, mitigation and impact per active risk
//! - **Resource utilization**: spent against allocated budget
//! - **Performance score**: fixed-weight blend of progress, risk and sector metrics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MetricFacade                        │
//! │                                                          │
//! │  ┌──────────────┐   ┌──────────┐   ┌─────────────────┐  │
//! │  │PlanDataSource│──▶│ Progress │──▶│   Performance   │  │
//! │  └──────────────┘   │   Risk   │   │     Scorer      │  │
//! │         │           │Utilizat. │   └─────────────────┘  │
//! │         ▼           └──────────┘                         │
//! │  ┌──────────────┐                                        │
//! │  │  Hierarchy   │  (validate before write)               │
//! │  │  Validator   │                                        │
//! │  └──────────────┘                                        │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod facade;
pub mod performance;
pub mod progress;
pub mod risk;
pub mod source;
pub mod types;
pub mod utilization;

// Re-export main types
pub use config::{EngineConfig, FacadeConfig};
pub use facade::{indicator_outcome, MetricFacade, WriteCheck};
pub use performance::calculate_performance_score;
pub use progress::{aggregate_progress, combine, rollup, ProgressStatus};
pub use risk::calculate_risk_exposure;
pub use source::{InMemoryDataSource, PlanDataSource, SourceError};
pub use types::*;
pub use utilization::resource_utilization;
