mod classify;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::classify::{run_classify, ClassifyOptions};

#[derive(Debug, Parser)]
#[command(name = "kwintel")]
#[command(about = "Classify search keywords into a customer-journey funnel")]
struct Cli {
    /// Run the relevance filter only; no oracle calls and no files written
    #[arg(long)]
    dry_run: bool,

    /// Number of highest-volume relevant keywords to classify
    #[arg(long, default_value_t = 500)]
    top: usize,

    /// Minimum monthly search volume (overrides KWINTEL_MIN_VOLUME)
    #[arg(long)]
    min_volume: Option<u64>,

    /// Market config YAML (overrides KWINTEL_KEYWORDS_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> ClassifyOptions {
        ClassifyOptions {
            dry_run: self.dry_run,
            top: self.top,
            min_volume: self.min_volume,
            market_config_path: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = kwintel_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    run_classify(&config, &cli.options()).await
}
