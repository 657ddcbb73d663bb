//! Funnel aggregation over classified keywords.

use kwintel_core::{ClassifiedKeyword, MarketConfig, Stage};
use serde::Serialize;

use crate::exit_signals::{ExitSignalAnalyzer, ExitSignals};

const SAMPLE_SIZE: usize = 10;
const UNKNOWN_DESTINATION: &str = "unknown";
const EXIT_SIGNAL_NOTE: &str = "비교 키워드에서 경쟁사 언급 빈도 = 추정 이탈 방향";

/// Round half away from zero to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / max(whole, 1)`, rounded to two decimals.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn guarded_ratio(part: u64, whole: u64) -> f64 {
    round2(part as f64 / whole.max(1) as f64)
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Awareness => "인지 (Awareness)",
        Stage::Consideration => "비교 (Consideration)",
        Stage::Conversion => "구매 (Conversion)",
    }
}

fn stage_description(stage: Stage) -> &'static str {
    match stage {
        Stage::Awareness => "카테고리/니즈 기반 검색",
        Stage::Consideration => "브랜드 비교/리뷰 검색",
        Stage::Conversion => "가격/구매처/매장 검색",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitSignalReport {
    pub note: String,
    pub competitors: ExitSignals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub label: String,
    pub description: String,
    pub keyword_count: usize,
    pub total_volume: u64,
    /// Share of classified keywords (by count) in this stage.
    pub share: f64,
    pub sample_keywords: Vec<ClassifiedKeyword>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_signals: Option<ExitSignalReport>,
}

/// The three stages, serialized in funnel order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStages {
    pub awareness: FunnelStage,
    pub consideration: FunnelStage,
    pub conversion: FunnelStage,
}

impl FunnelStages {
    #[must_use]
    pub fn get(&self, stage: Stage) -> &FunnelStage {
        match stage {
            Stage::Awareness => &self.awareness,
            Stage::Consideration => &self.consideration,
            Stage::Conversion => &self.conversion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelSummary {
    pub awareness_to_consideration: f64,
    pub consideration_to_conversion: f64,
    /// Can go negative when conversion volume exceeds awareness volume.
    pub estimated_leak_rate: f64,
    pub primary_leak_destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelReport {
    pub stages: FunnelStages,
    pub funnel_summary: FunnelSummary,
}

pub struct FunnelAggregator<'a> {
    market: &'a MarketConfig,
}

impl<'a> FunnelAggregator<'a> {
    #[must_use]
    pub fn new(market: &'a MarketConfig) -> Self {
        Self { market }
    }

    #[must_use]
    pub fn aggregate(&self, classified: &[ClassifiedKeyword]) -> FunnelReport {
        let total = classified.len() as u64;
        let signals = ExitSignalAnalyzer::new(self.market).analyze(classified);

        let build = |stage: Stage| build_stage(stage, classified, total);
        let mut consideration = build(Stage::Consideration);
        if consideration.keyword_count > 0 {
            consideration.exit_signals = Some(ExitSignalReport {
                note: EXIT_SIGNAL_NOTE.to_owned(),
                competitors: signals.clone(),
            });
        }
        let stages = FunnelStages {
            awareness: build(Stage::Awareness),
            consideration,
            conversion: build(Stage::Conversion),
        };

        let aw = stages.awareness.total_volume;
        let co = stages.consideration.total_volume;
        let cv = stages.conversion.total_volume;

        let funnel_summary = FunnelSummary {
            awareness_to_consideration: guarded_ratio(co, aw),
            consideration_to_conversion: guarded_ratio(cv, co),
            estimated_leak_rate: leak_rate(cv, aw),
            primary_leak_destination: signals
                .primary_destination()
                .unwrap_or(UNKNOWN_DESTINATION)
                .to_owned(),
        };

        tracing::debug!(
            awareness = stages.awareness.keyword_count,
            consideration = stages.consideration.keyword_count,
            conversion = stages.conversion.keyword_count,
            "funnel aggregated"
        );

        FunnelReport {
            stages,
            funnel_summary,
        }
    }
}

fn build_stage(stage: Stage, classified: &[ClassifiedKeyword], total: u64) -> FunnelStage {
    let mut members: Vec<&ClassifiedKeyword> =
        classified.iter().filter(|k| k.stage == stage).collect();
    let keyword_count = members.len();
    let total_volume = members.iter().map(|k| k.volume).sum();

    members.sort_by(|a, b| b.volume.cmp(&a.volume));
    let sample_keywords = members.into_iter().take(SAMPLE_SIZE).cloned().collect();

    FunnelStage {
        label: stage_label(stage).to_owned(),
        description: stage_description(stage).to_owned(),
        keyword_count,
        total_volume,
        share: guarded_ratio(keyword_count as u64, total),
        sample_keywords,
        exit_signals: None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn leak_rate(conversion_volume: u64, awareness_volume: u64) -> f64 {
    round2(1.0 - conversion_volume as f64 / awareness_volume.max(1) as f64)
}
