//! Output documents and the JSON file sink.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ReportError;
use crate::funnel::FunnelReport;
use crate::persona::PersonaCluster;

const JOURNEY_SOURCE: &str = "Gemini API 키워드 의도 분류";
const CLUSTER_SOURCE: &str = "Gemini API 키워드 클러스터링";
const JOURNEY_NOTE: &str =
    "GA 없이 실제 이탈률 측정 불가. 검색 키워드 기반 '추정 이탈 경향'으로 해석 필요.";

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyMeta {
    pub source: String,
    pub collected_at: String,
    pub total_keywords_analyzed: usize,
    pub total_keywords_pool: usize,
    pub classification_method: String,
    pub note: String,
}

/// `consumer-journey.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyReport {
    pub meta: JourneyMeta,
    #[serde(flatten)]
    pub funnel: FunnelReport,
}

impl JourneyReport {
    #[must_use]
    pub fn new(
        funnel: FunnelReport,
        collected_at: NaiveDate,
        total_keywords_analyzed: usize,
        total_keywords_pool: usize,
        model: &str,
    ) -> Self {
        Self {
            meta: JourneyMeta {
                source: JOURNEY_SOURCE.to_owned(),
                collected_at: date_string(collected_at),
                total_keywords_analyzed,
                total_keywords_pool,
                classification_method: format!("3-stage intent classification ({model})"),
                note: JOURNEY_NOTE.to_owned(),
            },
            funnel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMeta {
    pub source: String,
    pub collected_at: String,
    pub total_keywords_pool: usize,
    pub clustering_method: String,
}

/// `keyword-clusters.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub meta: ClusterMeta,
    pub clusters: Vec<PersonaCluster>,
}

impl ClusterReport {
    #[must_use]
    pub fn new(
        clusters: Vec<PersonaCluster>,
        collected_at: NaiveDate,
        total_keywords_pool: usize,
        model: &str,
    ) -> Self {
        Self {
            meta: ClusterMeta {
                source: CLUSTER_SOURCE.to_owned(),
                collected_at: date_string(collected_at),
                total_keywords_pool,
                clustering_method: format!("LLM-based persona clustering ({model})"),
            },
            clusters,
        }
    }
}

/// Write `report` as pretty-printed JSON, replacing any existing file.
///
/// The parent directory is created if needed. Content goes to a sibling
/// temporary file first and is renamed into place.
///
/// # Errors
///
/// Returns [`ReportError::Json`] if serialization fails and
/// [`ReportError::Io`] if the directory, temporary file, or rename fails.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut body = serde_json::to_string_pretty(report)?;
    body.push('\n');

    let tmp = temp_path(path);
    std::fs::write(&tmp, body).map_err(io_error(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_error(path))?;

    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError {
    let path = path.display().to_string();
    move |source| ReportError::Io { path, source }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
