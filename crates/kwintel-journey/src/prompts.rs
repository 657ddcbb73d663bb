//! Oracle prompt construction.
//!
//! Keyword lines are rendered as `{idx}. {keyword} ({volume})` so answers can
//! refer back by either index or text.

use std::fmt::Write;

use kwintel_core::{KeywordRecord, MarketConfig};

fn keyword_lines(keywords: &[KeywordRecord]) -> String {
    let mut out = String::new();
    for (idx, record) in keywords.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{idx}. {} ({})", record.keyword, record.total_volume);
    }
    out
}

/// Prompt asking for a three-stage intent label per keyword.
#[must_use]
pub fn classification_prompt(market: &MarketConfig, batch: &[KeywordRecord]) -> String {
    let brand = &market.brand.name;
    let competitors = market.competitor_names().collect::<Vec<_>>().join(", ");
    let example_competitor = market.competitor_names().next().unwrap_or("a competitor");

    format!(
        "Classify each search keyword from the {category} market into one of three purchase-intent stages.\n\
         \n\
         Main brand: {brand}\n\
         Competitors: {competitors}\n\
         \n\
         Stages:\n\
         - awareness: category or need driven exploration without a specific brand.\n  \
           e.g. \"living room sofa recommendation\", \"kids room decorating\", \"furniture brand ranking\"\n\
         - consideration: brand comparison, reviews, or browsing a specific brand's products.\n  \
           e.g. \"{brand} vs {example_competitor}\", \"{brand} review\", \"{example_competitor} desk\", \"{brand} sofa\"\n\
         - conversion: price, store, discount, where to buy, after-sales, delivery, installation.\n  \
           e.g. \"{brand} price\", \"{brand} store\", \"{example_competitor} discount\", \"{brand} repair\"\n\
         \n\
         Keywords (index. keyword (monthly volume)):\n\
         {lines}\n\
         Answer with JSON only, one element per keyword, using exactly these stage values:\n\
         {{\"results\": [{{\"idx\": 0, \"keyword\": \"keyword\", \"volume\": 123, \"stage\": \"awareness|consideration|conversion\"}}]}}",
        category = market.category,
        lines = keyword_lines(batch),
    )
}

/// Prompt asking for 4 to 6 buyer personas over the given keywords.
#[must_use]
pub fn persona_prompt(market: &MarketConfig, keywords: &[KeywordRecord]) -> String {
    format!(
        "Group these {category} market search keywords into 4-6 buyer personas.\n\
         \n\
         Main brand: {brand}\n\
         \n\
         For each group give:\n\
         - id: English slug (e.g. \"kids-parent\")\n\
         - persona: persona name\n\
         - description: 1-2 sentences\n\
         - keywords: member keywords from the list, as [{{\"keyword\": \"...\", \"volume\": 123}}]\n\
         - needs: 3-5 main needs\n\
         - pain_points: 2-3 pain points\n\
         \n\
         Keywords (index. keyword (monthly volume)):\n\
         {lines}\n\
         Answer with JSON only:\n\
         {{\"clusters\": [{{\"id\": \"slug\", \"persona\": \"name\", \"description\": \"...\", \"keywords\": [{{\"keyword\": \"...\", \"volume\": 123}}], \"needs\": [\"...\"], \"pain_points\": [\"...\"]}}]}}",
        category = market.category,
        brand = market.brand.name,
        lines = keyword_lines(keywords),
    )
}
