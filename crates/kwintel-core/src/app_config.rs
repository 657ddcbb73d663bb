use std::path::PathBuf;

/// Environment-derived settings for one pipeline run.
#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub oracle_base_url: String,
    pub oracle_model: String,
    pub oracle_temperature: f32,
    pub oracle_timeout_secs: u64,
    pub oracle_max_attempts: u32,
    pub oracle_backoff_base_secs: u64,
    pub classify_batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub min_volume: u64,
    pub cluster_top_n: usize,
    pub data_dir: PathBuf,
    pub market_config_path: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Path of the collector output this pipeline reads.
    #[must_use]
    pub fn input_path(&self) -> PathBuf {
        self.data_dir.join("related-keywords.json")
    }

    #[must_use]
    pub fn journey_output_path(&self) -> PathBuf {
        self.data_dir.join("consumer-journey.json")
    }

    #[must_use]
    pub fn clusters_output_path(&self) -> PathBuf {
        self.data_dir.join("keyword-clusters.json")
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("oracle_base_url", &self.oracle_base_url)
            .field("oracle_model", &self.oracle_model)
            .field("oracle_temperature", &self.oracle_temperature)
            .field("oracle_timeout_secs", &self.oracle_timeout_secs)
            .field("oracle_max_attempts", &self.oracle_max_attempts)
            .field("oracle_backoff_base_secs", &self.oracle_backoff_base_secs)
            .field("classify_batch_size", &self.classify_batch_size)
            .field("inter_batch_delay_ms", &self.inter_batch_delay_ms)
            .field("min_volume", &self.min_volume)
            .field("cluster_top_n", &self.cluster_top_n)
            .field("data_dir", &self.data_dir)
            .field("market_config_path", &self.market_config_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}
