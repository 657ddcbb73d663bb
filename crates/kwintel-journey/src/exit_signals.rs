//! Competitor attribution for consideration-stage keywords.
//!
//! Each consideration keyword is attributed to exactly one bucket: the
//! competitor whose name (or alias) appears earliest in the keyword text,
//! or [`OTHER_BUCKET`] when none does. Mention counts therefore always sum
//! to the number of consideration keywords.

use kwintel_core::{ClassifiedKeyword, MarketConfig, Stage};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::funnel::guarded_ratio;

/// Bucket for consideration keywords naming no configured competitor.
pub const OTHER_BUCKET: &str = "other";

const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitSignal {
    /// Map key in the report, so not repeated in the value.
    #[serde(skip)]
    pub competitor: String,
    pub mention_count: usize,
    pub share: f64,
    /// Up to three member keywords, highest volume first.
    pub sample: Vec<String>,
}

impl ExitSignal {
    #[must_use]
    pub fn is_other(&self) -> bool {
        self.competitor == OTHER_BUCKET
    }
}

/// Signals in configured competitor order, `other` last. Buckets with no
/// mentions are omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitSignals(Vec<ExitSignal>);

impl ExitSignals {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExitSignal> {
        self.0.iter()
    }

    #[must_use]
    pub fn get(&self, competitor: &str) -> Option<&ExitSignal> {
        self.0.iter().find(|s| s.competitor == competitor)
    }

    #[must_use]
    pub fn total_mentions(&self) -> usize {
        self.0.iter().map(|s| s.mention_count).sum()
    }

    /// The bucket with the most mentions.
    ///
    /// Ties go to a named competitor over `other`, then to the
    /// lexicographically smallest name. `None` when there are no signals.
    #[must_use]
    pub fn primary_destination(&self) -> Option<&str> {
        self.0
            .iter()
            .max_by(|a, b| {
                a.mention_count
                    .cmp(&b.mention_count)
                    .then_with(|| b.is_other().cmp(&a.is_other()))
                    .then_with(|| b.competitor.cmp(&a.competitor))
            })
            .map(|s| s.competitor.as_str())
    }
}

impl Serialize for ExitSignals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for signal in &self.0 {
            map.serialize_entry(&signal.competitor, signal)?;
        }
        map.end()
    }
}

pub struct ExitSignalAnalyzer<'a> {
    market: &'a MarketConfig,
}

impl<'a> ExitSignalAnalyzer<'a> {
    #[must_use]
    pub fn new(market: &'a MarketConfig) -> Self {
        Self { market }
    }

    /// Attribute consideration keywords to competitors. Keywords in other
    /// stages are ignored.
    #[must_use]
    pub fn analyze(&self, keywords: &[ClassifiedKeyword]) -> ExitSignals {
        let consideration: Vec<&ClassifiedKeyword> = keywords
            .iter()
            .filter(|k| k.stage == Stage::Consideration)
            .collect();
        let total = consideration.len() as u64;

        let other_slot = self.market.competitors.len();
        let mut buckets: Vec<Vec<&ClassifiedKeyword>> = vec![Vec::new(); other_slot + 1];
        for keyword in consideration {
            let slot = self.attribute(&keyword.keyword).unwrap_or(other_slot);
            buckets[slot].push(keyword);
        }

        let names = self.market.competitor_names().chain(std::iter::once(OTHER_BUCKET));
        let signals = names
            .zip(buckets)
            .filter(|(_, members)| !members.is_empty())
            .map(|(name, members)| ExitSignal {
                competitor: name.to_owned(),
                mention_count: members.len(),
                share: guarded_ratio(members.len() as u64, total),
                sample: top_sample(members),
            })
            .collect();

        ExitSignals(signals)
    }

    /// Index of the competitor mentioned earliest in `keyword`; equal
    /// positions resolve to configured order.
    fn attribute(&self, keyword: &str) -> Option<usize> {
        self.market
            .competitors
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.first_mention(keyword).map(|pos| (pos, idx)))
            .min()
            .map(|(_, idx)| idx)
    }
}

fn top_sample(mut members: Vec<&ClassifiedKeyword>) -> Vec<String> {
    members.sort_by(|a, b| b.volume.cmp(&a.volume));
    members
        .into_iter()
        .take(SAMPLE_SIZE)
        .map(|k| k.keyword.clone())
        .collect()
}
