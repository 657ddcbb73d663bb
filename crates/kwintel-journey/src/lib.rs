//! Customer-journey funnel pipeline.
//!
//! Classifies filtered keywords into awareness / consideration / conversion
//! stages through a batched oracle with deterministic fallback, groups the
//! top keywords into buyer personas, and aggregates the result into a funnel
//! report with a competitor exit-signal estimate.

pub mod classifier;
pub mod error;
pub mod exit_signals;
pub mod funnel;
pub mod matching;
pub mod persona;
pub mod pipeline;
pub mod prompts;
pub mod report;

#[cfg(test)]
mod test_support;

pub use classifier::{fallback_stage, BatchClassifier, ClassifierSettings};
pub use error::{ClassificationError, ReportError};
pub use exit_signals::{ExitSignal, ExitSignalAnalyzer, ExitSignals, OTHER_BUCKET};
pub use funnel::{
    ExitSignalReport, FunnelAggregator, FunnelReport, FunnelStage, FunnelStages, FunnelSummary,
};
pub use persona::{ClusterKeyword, PersonaCluster, PersonaClusterer, PALETTE};
pub use pipeline::{run_journey, JourneyOutcome, JourneySettings};
pub use report::{write_report, ClusterReport, JourneyReport};
