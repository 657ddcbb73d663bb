//! Keyword pool records and intent-stage classification results.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Volume the search-ads API reports as `"< 10"`.
const BELOW_TEN_ESTIMATE: u64 = 5;

/// One row of the collected search-volume pool.
///
/// `total_volume` is `pc_volume + mobile_volume` whenever a device split is
/// known; rows that only carry a total keep it with a zero split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawKeywordRecord")]
pub struct KeywordRecord {
    pub keyword: String,
    #[serde(rename = "pc")]
    pub pc_volume: u64,
    #[serde(rename = "mobile")]
    pub mobile_volume: u64,
    #[serde(rename = "total")]
    pub total_volume: u64,
    pub competition: String,
    pub source_seed: String,
}

impl KeywordRecord {
    #[must_use]
    pub fn new(keyword: impl Into<String>, pc_volume: u64, mobile_volume: u64) -> Self {
        Self {
            keyword: keyword.into(),
            pc_volume,
            mobile_volume,
            total_volume: pc_volume.saturating_add(mobile_volume),
            competition: String::new(),
            source_seed: String::new(),
        }
    }

    /// A record whose device split is unknown.
    #[must_use]
    pub fn with_total(keyword: impl Into<String>, total_volume: u64) -> Self {
        Self {
            keyword: keyword.into(),
            pc_volume: 0,
            mobile_volume: 0,
            total_volume,
            competition: String::new(),
            source_seed: String::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VolumeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl VolumeValue {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn to_volume(&self) -> u64 {
        match self {
            VolumeValue::Int(n) => u64::try_from(*n).unwrap_or(0),
            VolumeValue::Float(f) if f.is_finite() && *f > 0.0 => f.round() as u64,
            VolumeValue::Float(_) => 0,
            VolumeValue::Text(s) => parse_volume_text(s),
        }
    }
}

/// Parse a textual volume as emitted by the search-ads API.
fn parse_volume_text(raw: &str) -> u64 {
    if raw.contains('<') {
        return BELOW_TEN_ESTIMATE;
    }
    raw.trim().replace(',', "").parse::<u64>().unwrap_or(0)
}

#[derive(Deserialize)]
struct RawKeywordRecord {
    keyword: String,
    #[serde(default, alias = "pc_volume")]
    pc: Option<VolumeValue>,
    #[serde(default, alias = "mobile_volume")]
    mobile: Option<VolumeValue>,
    #[serde(default, alias = "total_volume")]
    total: Option<VolumeValue>,
    #[serde(default)]
    competition: Option<String>,
    #[serde(default)]
    source_seed: Option<String>,
}

impl From<RawKeywordRecord> for KeywordRecord {
    fn from(raw: RawKeywordRecord) -> Self {
        let pc = raw.pc.as_ref().map_or(0, VolumeValue::to_volume);
        let mobile = raw.mobile.as_ref().map_or(0, VolumeValue::to_volume);
        let file_total = raw.total.as_ref().map(VolumeValue::to_volume);

        let total_volume = if pc == 0 && mobile == 0 {
            file_total.unwrap_or(0)
        } else {
            let split = pc.saturating_add(mobile);
            match file_total {
                Some(total) if total != split => {
                    tracing::warn!(
                        keyword = %raw.keyword,
                        file_total = total,
                        pc,
                        mobile,
                        "total volume disagrees with device split; using pc + mobile"
                    );
                }
                _ => {}
            }
            split
        };

        Self {
            keyword: raw.keyword,
            pc_volume: pc,
            mobile_volume: mobile,
            total_volume,
            competition: raw.competition.unwrap_or_default(),
            source_seed: raw.source_seed.unwrap_or_default(),
        }
    }
}

/// The collector's output document.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordPool {
    #[serde(default)]
    pub meta: serde_json::Value,
    pub keywords: Vec<KeywordRecord>,
}

/// Load the keyword pool and order it by descending total volume.
///
/// The sort is stable, so equal-volume keywords keep their file order.
///
/// # Errors
///
/// Returns [`ConfigError::FileIo`] if the file is missing or unreadable and
/// [`ConfigError::PoolParse`] if it is not a valid pool document.
pub fn load_keyword_pool(path: &Path) -> Result<KeywordPool, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut pool: KeywordPool =
        serde_json::from_str(&content).map_err(|e| ConfigError::PoolParse {
            path: path.display().to_string(),
            source: e,
        })?;

    pool.keywords.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));
    Ok(pool)
}

/// The `n` highest-volume records, ties kept in input order.
#[must_use]
pub fn top_by_volume(records: &[KeywordRecord], n: usize) -> Vec<KeywordRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));
    sorted.truncate(n);
    sorted
}

/// Purchase-intent funnel stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Awareness,
    Consideration,
    Conversion,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Awareness, Stage::Consideration, Stage::Conversion];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Awareness => "awareness",
            Stage::Consideration => "consideration",
            Stage::Conversion => "conversion",
        }
    }

    /// Parse an oracle label. Surrounding whitespace and case are ignored;
    /// anything else outside the three stages is `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Stage> {
        match label.trim().to_lowercase().as_str() {
            "awareness" => Some(Stage::Awareness),
            "consideration" => Some(Stage::Consideration),
            "conversion" => Some(Stage::Conversion),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a keyword's stage came from. Never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageSource {
    #[default]
    Oracle,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedKeyword {
    pub keyword: String,
    pub volume: u64,
    pub stage: Stage,
    #[serde(skip)]
    pub source: StageSource,
}

impl ClassifiedKeyword {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == StageSource::Fallback
    }
}

#[cfg(test)]
#[path = "keywords_test.rs"]
mod tests;
