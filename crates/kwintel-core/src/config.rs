use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let gemini_api_key = lookup("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());

    let oracle_base_url = or_default(
        "KWINTEL_ORACLE_BASE_URL",
        "https://generativelanguage.googleapis.com",
    );
    let oracle_model = or_default("KWINTEL_ORACLE_MODEL", "gemini-2.0-flash");
    let oracle_temperature = parse_temperature(&or_default("KWINTEL_ORACLE_TEMPERATURE", "0.1"))?;
    let oracle_timeout_secs = parse_u64("KWINTEL_ORACLE_TIMEOUT_SECS", "120")?;
    let oracle_max_attempts = parse_u32("KWINTEL_ORACLE_MAX_ATTEMPTS", "3")?;
    let oracle_backoff_base_secs = parse_u64("KWINTEL_ORACLE_BACKOFF_BASE_SECS", "1")?;

    let classify_batch_size = parse_usize("KWINTEL_CLASSIFY_BATCH_SIZE", "150")?;
    if classify_batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KWINTEL_CLASSIFY_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if oracle_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KWINTEL_ORACLE_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let inter_batch_delay_ms = parse_u64("KWINTEL_INTER_BATCH_DELAY_MS", "500")?;
    let min_volume = parse_u64("KWINTEL_MIN_VOLUME", "50")?;
    let cluster_top_n = parse_usize("KWINTEL_CLUSTER_TOP_N", "300")?;

    let data_dir = PathBuf::from(or_default("KWINTEL_DATA_DIR", "./data"));
    let market_config_path = PathBuf::from(or_default(
        "KWINTEL_KEYWORDS_CONFIG_PATH",
        "./config/keywords.yaml",
    ));
    let log_level = or_default("KWINTEL_LOG_LEVEL", "info");

    Ok(AppConfig {
        gemini_api_key,
        oracle_base_url,
        oracle_model,
        oracle_temperature,
        oracle_timeout_secs,
        oracle_max_attempts,
        oracle_backoff_base_secs,
        classify_batch_size,
        inter_batch_delay_ms,
        min_volume,
        cluster_top_n,
        data_dir,
        market_config_path,
        log_level,
    })
}

/// Parse a sampling temperature; valid range is `[0.0, 2.0]`.
fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "KWINTEL_ORACLE_TEMPERATURE".to_string(),
        reason,
    };
    let value = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| invalid(e.to_string()))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid(format!("{value} is outside 0.0..=2.0")));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
