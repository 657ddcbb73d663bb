//! Buyer-persona clustering of the highest-volume keywords.
//!
//! One oracle request groups the top-N keywords into personas. Members are
//! checked against the requested keywords, so a cluster can only contain
//! keywords that were actually sent, with their pool volumes. When the
//! oracle cannot produce a usable answer the result is an empty list.

use std::collections::{HashMap, HashSet};

use kwintel_core::{top_by_volume, KeywordRecord, MarketConfig};
use kwintel_oracle::{extract_json, Oracle, OracleError, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::funnel::guarded_ratio;
use crate::matching::{normalize_keyword, slugify};
use crate::prompts::persona_prompt;

const CONTEXT: &str = "persona clustering";
const TOP_KEYWORDS: usize = 7;

/// Display colors assigned to clusters in order, cycling.
pub const PALETTE: [&str; 6] = [
    "#8b5cf6", "#ec4899", "#06b6d4", "#f59e0b", "#22c55e", "#ef4444",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterKeyword {
    pub keyword: String,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaCluster {
    pub id: String,
    pub persona: String,
    pub description: String,
    pub color: String,
    pub keyword_count: usize,
    pub total_volume: u64,
    /// Share of the volume across all returned clusters.
    pub share: f64,
    pub top_keywords: Vec<ClusterKeyword>,
    pub needs: Vec<String>,
    pub pain_points: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<RawMember>,
    #[serde(default)]
    needs: Vec<String>,
    #[serde(default)]
    pain_points: Vec<String>,
}

/// Members come back either as `{keyword, volume}` objects or bare strings.
/// The echoed volume is ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMember {
    Text(String),
    Entry { keyword: String },
}

impl RawMember {
    fn keyword(&self) -> &str {
        match self {
            RawMember::Text(k) | RawMember::Entry { keyword: k } => k,
        }
    }
}

pub struct PersonaClusterer<'a, O> {
    oracle: &'a O,
    market: &'a MarketConfig,
    top_n: usize,
    retry: RetryPolicy,
}

impl<'a, O: Oracle> PersonaClusterer<'a, O> {
    #[must_use]
    pub fn new(oracle: &'a O, market: &'a MarketConfig, top_n: usize, retry: RetryPolicy) -> Self {
        Self {
            oracle,
            market,
            top_n,
            retry,
        }
    }

    /// Cluster the `top_n` highest-volume keywords. Never fails; an
    /// exhausted oracle yields an empty list.
    pub async fn cluster(&self, relevant: &[KeywordRecord]) -> Vec<PersonaCluster> {
        let top = top_by_volume(relevant, self.top_n);
        if top.is_empty() {
            tracing::info!("no keywords to cluster");
            return Vec::new();
        }

        tracing::info!(keywords = top.len(), "clustering keywords into personas");

        let prompt = persona_prompt(self.market, &top);
        let prompt = prompt.as_str();
        let oracle = self.oracle;
        let top = top.as_slice();

        let answer = self
            .retry
            .run("persona clustering", || async move {
                let raw = oracle.generate(prompt).await?;
                let value = extract_json(&raw).ok_or_else(|| OracleError::format(CONTEXT, &raw))?;
                parse_cluster_answer(&value, top)
            })
            .await;

        match answer {
            Ok(clusters) => {
                tracing::info!(clusters = clusters.len(), "persona clustering complete");
                clusters
            }
            Err(e) => {
                tracing::warn!(error = %e, "persona clustering failed; emitting no clusters");
                Vec::new()
            }
        }
    }
}

/// Validate a clustering answer against the keywords that were sent.
///
/// # Errors
///
/// Returns [`OracleError::Schema`] when the answer has no cluster list, a
/// cluster has the wrong shape, or no cluster keeps any member.
pub fn parse_cluster_answer(
    value: &Value,
    requested: &[KeywordRecord],
) -> Result<Vec<PersonaCluster>, OracleError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(map) => map
            .get("clusters")
            .ok_or_else(|| OracleError::schema(CONTEXT, "missing clusters field"))?,
        _ => return Err(OracleError::schema(CONTEXT, "answer is not an object")),
    };
    let raw: Vec<RawCluster> = serde_json::from_value(list.clone())
        .map_err(|e| OracleError::schema(CONTEXT, e.to_string()))?;

    let mut pool: HashMap<String, &KeywordRecord> = HashMap::new();
    for record in requested {
        pool.entry(normalize_keyword(&record.keyword)).or_insert(record);
    }

    let resolved: Vec<(RawCluster, Vec<ClusterKeyword>)> = raw
        .into_iter()
        .filter_map(|cluster| {
            let members = resolve_members(&cluster.keywords, &pool);
            if members.is_empty() {
                tracing::debug!(id = ?cluster.id, "dropping persona cluster without known keywords");
                None
            } else {
                Some((cluster, members))
            }
        })
        .collect();

    if resolved.is_empty() {
        return Err(OracleError::schema(CONTEXT, "no cluster contains a requested keyword"));
    }

    let grand_total: u64 = resolved
        .iter()
        .map(|(_, members)| members.iter().map(|m| m.volume).sum::<u64>())
        .sum();

    Ok(resolved
        .into_iter()
        .enumerate()
        .map(|(index, (raw, members))| finish_cluster(index, raw, members, grand_total))
        .collect())
}

fn resolve_members(
    raw: &[RawMember],
    pool: &HashMap<String, &KeywordRecord>,
) -> Vec<ClusterKeyword> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|member| {
            let key = normalize_keyword(member.keyword());
            let record = pool.get(&key)?;
            seen.insert(key).then(|| ClusterKeyword {
                keyword: record.keyword.clone(),
                volume: record.total_volume,
            })
        })
        .collect()
}

fn finish_cluster(
    index: usize,
    raw: RawCluster,
    mut members: Vec<ClusterKeyword>,
    grand_total: u64,
) -> PersonaCluster {
    let ordinal = index + 1;
    let id = raw
        .id
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("cluster-{ordinal}"));
    let persona = raw
        .persona
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| format!("Persona {ordinal}"));

    let keyword_count = members.len();
    let total_volume: u64 = members.iter().map(|m| m.volume).sum();
    members.sort_by(|a, b| b.volume.cmp(&a.volume));
    members.truncate(TOP_KEYWORDS);

    PersonaCluster {
        id,
        persona,
        description: raw.description.unwrap_or_default(),
        color: PALETTE[index % PALETTE.len()].to_owned(),
        keyword_count,
        total_volume,
        share: guarded_ratio(total_volume, grand_total),
        top_keywords: members,
        needs: raw.needs,
        pain_points: raw.pain_points,
    }
}
