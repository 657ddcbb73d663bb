//! The keyword classification command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use kwintel_core::{
    filter_keywords, load_keyword_pool, load_market_config, AppConfig, FilterOutcome,
    KeywordRecord, Stage,
};
use kwintel_journey::{
    run_journey, write_report, ClassifierSettings, JourneyOutcome, JourneySettings,
};
use kwintel_oracle::{GeminiClient, RetryPolicy};

const PREVIEW_RELEVANT: usize = 10;
const PREVIEW_FILTERED: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassifyOptions {
    pub dry_run: bool,
    pub top: usize,
    pub min_volume: Option<u64>,
    pub market_config_path: Option<PathBuf>,
}

/// Filter the keyword pool and, unless `dry_run`, classify, cluster and
/// write both reports.
///
/// # Errors
///
/// Returns an error if the API key is missing for a full run, `top` is zero,
/// the market config or keyword pool cannot be loaded, or a report cannot
/// be written. Oracle failures degrade to fallback results instead.
pub(crate) async fn run_classify(config: &AppConfig, opts: &ClassifyOptions) -> anyhow::Result<()> {
    if opts.top == 0 {
        anyhow::bail!("--top must be at least 1");
    }

    let api_key = if opts.dry_run {
        None
    } else {
        let key = config.gemini_api_key.as_deref().context(
            "GEMINI_API_KEY is not set; add GEMINI_API_KEY=... to .env or the environment",
        )?;
        Some(key)
    };

    let market_path = opts
        .market_config_path
        .clone()
        .unwrap_or_else(|| config.market_config_path.clone());
    let market = load_market_config(&market_path)
        .with_context(|| format!("failed to load market config {}", market_path.display()))?;

    let input_path = config.input_path();
    let pool = load_keyword_pool(&input_path)
        .with_context(|| format!("failed to load keyword pool {}", input_path.display()))?;
    println!("loaded {} keywords from {}", pool.keywords.len(), input_path.display());

    let min_volume = opts.min_volume.unwrap_or(config.min_volume);
    let filtered = filter_keywords(&pool.keywords, &market, min_volume);
    print_filter_summary(&filtered, min_volume, opts.top);

    let Some(api_key) = api_key else {
        println!("dry-run: no oracle calls made, no files written");
        println!("top {PREVIEW_FILTERED} filtered-out keywords:");
        print_keywords(&filtered.filtered_out, PREVIEW_FILTERED);
        return Ok(());
    };

    let client = GeminiClient::with_base_url(
        api_key,
        &config.oracle_model,
        config.oracle_temperature,
        config.oracle_timeout_secs,
        &config.oracle_base_url,
    )?;

    let settings = JourneySettings {
        classify_top_n: opts.top,
        cluster_top_n: config.cluster_top_n,
        classifier: ClassifierSettings {
            batch_size: config.classify_batch_size,
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            retry: RetryPolicy::new(config.oracle_max_attempts, config.oracle_backoff_base_secs),
        },
    };

    let collected_at = Utc::now().date_naive();
    let outcome = run_journey(&client, &market, &settings, &filtered.relevant, collected_at).await;

    let journey_path = config.journey_output_path();
    write_report(&journey_path, &outcome.journey)?;
    let clusters_path = config.clusters_output_path();
    write_report(&clusters_path, &outcome.clusters)?;

    print_outcome(&outcome);
    println!("wrote {}", journey_path.display());
    println!("wrote {}", clusters_path.display());

    Ok(())
}

fn print_filter_summary(filtered: &FilterOutcome, min_volume: u64, top: usize) {
    println!("relevant: {}", filtered.relevant.len());
    println!("filtered out: {}", filtered.filtered_out.len());
    println!("below volume {min_volume}: {}", filtered.below_floor);
    println!(
        "classification targets: top {} by volume",
        filtered.relevant.len().min(top)
    );
    println!("top {PREVIEW_RELEVANT} relevant keywords:");
    print_keywords(&filtered.relevant, PREVIEW_RELEVANT);
}

fn print_keywords(records: &[KeywordRecord], limit: usize) {
    for record in records.iter().take(limit) {
        println!("  {}: {}", record.keyword, group_thousands(record.total_volume));
    }
}

fn print_outcome(outcome: &JourneyOutcome) {
    println!(
        "classified {} keywords ({} by fallback)",
        outcome.classified.len(),
        outcome.fallback_count()
    );
    for stage in Stage::ALL {
        let s = outcome.journey.funnel.stages.get(stage);
        println!(
            "  {}: {} keywords ({})",
            s.label,
            s.keyword_count,
            group_thousands(s.total_volume)
        );
    }

    if outcome.clusters.clusters.is_empty() {
        println!("persona clustering produced no clusters");
    }
    for cluster in &outcome.clusters.clusters {
        println!(
            "  {}: {} keywords ({})",
            cluster.persona,
            cluster.keyword_count,
            group_thousands(cluster.total_volume)
        );
    }

    let summary = &outcome.journey.funnel.funnel_summary;
    println!("funnel summary:");
    println!(
        "  awareness -> consideration: {}",
        percent(summary.awareness_to_consideration)
    );
    println!(
        "  consideration -> conversion: {}",
        percent(summary.consideration_to_conversion)
    );
    println!("  estimated leak rate: {}", percent(summary.estimated_leak_rate));
    println!(
        "  primary leak destination: {}",
        summary.primary_leak_destination
    );
}

/// `1234567` -> `1,234,567`.
pub(crate) fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `0.254` -> `25%`.
pub(crate) fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}
