//! Heuristic relevance filter for the raw keyword pool.
//!
//! Precedence per keyword, first match wins:
//!
//! 1. below `min_volume` → dropped (in neither output set)
//! 2. mentions the brand or a competitor → relevant
//! 3. contains a domain term → relevant
//! 4. contains an exclusion term → filtered out
//! 5. otherwise → filtered out
//!
//! Domain terms are checked before exclusion terms, so a keyword carrying
//! both is kept.

use crate::keywords::KeywordRecord;
use crate::market::MarketConfig;

/// Why a keyword landed where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    BrandMention,
    DomainTerm,
    Excluded,
    Ambiguous,
}

impl Relevance {
    #[must_use]
    pub fn is_relevant(self) -> bool {
        matches!(self, Relevance::BrandMention | Relevance::DomainTerm)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub relevant: Vec<KeywordRecord>,
    pub filtered_out: Vec<KeywordRecord>,
    /// Records dropped for falling under the volume floor.
    pub below_floor: usize,
}

/// Classify one keyword's text against the market configuration.
#[must_use]
pub fn assess_relevance(keyword: &str, market: &MarketConfig) -> Relevance {
    if market.mentions_tracked_brand(keyword) {
        Relevance::BrandMention
    } else if market.has_domain_term(keyword) {
        Relevance::DomainTerm
    } else if market.has_exclude_term(keyword) {
        Relevance::Excluded
    } else {
        Relevance::Ambiguous
    }
}

/// Partition `pool` into relevant and filtered-out keywords.
///
/// Input order is preserved within each output set.
#[must_use]
pub fn filter_keywords(
    pool: &[KeywordRecord],
    market: &MarketConfig,
    min_volume: u64,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for record in pool {
        if record.total_volume < min_volume {
            outcome.below_floor += 1;
            continue;
        }
        if assess_relevance(&record.keyword, market).is_relevant() {
            outcome.relevant.push(record.clone());
        } else {
            outcome.filtered_out.push(record.clone());
        }
    }

    tracing::debug!(
        relevant = outcome.relevant.len(),
        filtered_out = outcome.filtered_out.len(),
        below_floor = outcome.below_floor,
        min_volume,
        "heuristic filter complete"
    );

    outcome
}
