//! End-to-end journey run over an already filtered keyword pool.
//!
//! Classification and clustering run one after the other against the same
//! oracle; neither can fail the run. Writing the reports is left to the
//! caller so a run can be inspected before anything touches disk.

use chrono::NaiveDate;
use kwintel_core::{top_by_volume, ClassifiedKeyword, KeywordRecord, MarketConfig, Stage};
use kwintel_oracle::Oracle;

use crate::classifier::{BatchClassifier, ClassifierSettings};
use crate::funnel::FunnelAggregator;
use crate::persona::PersonaClusterer;
use crate::report::{ClusterReport, JourneyReport};

#[derive(Debug, Clone, Copy)]
pub struct JourneySettings {
    /// How many of the highest-volume relevant keywords get classified.
    pub classify_top_n: usize,
    /// How many of those are sent for persona clustering.
    pub cluster_top_n: usize,
    pub classifier: ClassifierSettings,
}

impl Default for JourneySettings {
    fn default() -> Self {
        Self {
            classify_top_n: 500,
            cluster_top_n: 300,
            classifier: ClassifierSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JourneyOutcome {
    pub classified: Vec<ClassifiedKeyword>,
    pub journey: JourneyReport,
    pub clusters: ClusterReport,
}

impl JourneyOutcome {
    /// Keywords whose stage came from the deterministic fallback.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.classified.iter().filter(|k| k.is_fallback()).count()
    }

    #[must_use]
    pub fn stage_count(&self, stage: Stage) -> usize {
        self.classified.iter().filter(|k| k.stage == stage).count()
    }
}

/// Classify, cluster, and aggregate `relevant`.
///
/// `relevant` is the filtered pool; its length is reported as the pool size.
pub async fn run_journey<O: Oracle>(
    oracle: &O,
    market: &MarketConfig,
    settings: &JourneySettings,
    relevant: &[KeywordRecord],
    collected_at: NaiveDate,
) -> JourneyOutcome {
    let targets = top_by_volume(relevant, settings.classify_top_n);
    tracing::info!(
        pool = relevant.len(),
        targets = targets.len(),
        model = oracle.model(),
        "starting journey run"
    );

    let classified = BatchClassifier::new(oracle, market, settings.classifier)
        .classify(&targets)
        .await;

    let clusters = PersonaClusterer::new(
        oracle,
        market,
        settings.cluster_top_n,
        settings.classifier.retry,
    )
    .cluster(&targets)
    .await;

    let funnel = FunnelAggregator::new(market).aggregate(&classified);

    let journey = JourneyReport::new(
        funnel,
        collected_at,
        classified.len(),
        relevant.len(),
        oracle.model(),
    );
    let clusters = ClusterReport::new(clusters, collected_at, relevant.len(), oracle.model());

    JourneyOutcome {
        classified,
        journey,
        clusters,
    }
}
