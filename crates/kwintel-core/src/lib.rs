//! Shared data model and configuration for the keyword intelligence pipeline.
//!
//! Holds the keyword pool types, the market configuration (brand, competitors,
//! term lists), environment configuration, and the heuristic relevance filter.

pub mod app_config;
pub mod config;
pub mod filter;
pub mod keywords;
pub mod market;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use filter::{assess_relevance, filter_keywords, FilterOutcome, Relevance};
pub use keywords::{
    load_keyword_pool, top_by_volume, ClassifiedKeyword, KeywordPool, KeywordRecord, Stage,
    StageSource,
};
pub use market::{
    find_name, load_market_config, parse_market_config, BrandConfig, CompetitorConfig,
    FallbackTerms, MarketConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse market config: {0}")]
    FileParse(#[source] serde_yaml::Error),

    #[error("failed to parse keyword pool {path}: {source}")]
    PoolParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config validation error: {0}")]
    Validation(String),
}
