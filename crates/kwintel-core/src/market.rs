//! Market configuration: the tracked brand, its competitors, and the term
//! lists that drive relevance filtering and fallback stage assignment.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_CATEGORY: &str = "furniture/interior";

/// Reserved for the exit-signal catch-all bucket.
const RESERVED_COMPETITOR_NAME: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorConfig {
    pub name: String,
    /// Alternative spellings that count as a mention of this competitor.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CompetitorConfig {
    /// Byte offset of the earliest mention of this competitor in `keyword`.
    #[must_use]
    pub fn first_mention(&self, keyword: &str) -> Option<usize> {
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .filter_map(|name| find_name(keyword, name))
            .min()
    }
}

/// Optional term lists consulted when the oracle gives no usable answer for a
/// keyword. Both are empty by default, so such keywords fall back to awareness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTerms {
    #[serde(default)]
    pub consideration_terms: Vec<String>,
    #[serde(default)]
    pub conversion_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub brand: BrandConfig,
    /// Free-text market category embedded in oracle prompts.
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub competitors: Vec<CompetitorConfig>,
    #[serde(default)]
    pub domain_terms: Vec<String>,
    #[serde(default)]
    pub exclude_terms: Vec<String>,
    #[serde(default)]
    pub fallback: FallbackTerms,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl MarketConfig {
    /// Competitor names in configured order.
    pub fn competitor_names(&self) -> impl Iterator<Item = &str> {
        self.competitors.iter().map(|c| c.name.as_str())
    }

    /// `true` if `keyword` mentions the brand or any competitor (or alias).
    #[must_use]
    pub fn mentions_tracked_brand(&self, keyword: &str) -> bool {
        find_name(keyword, &self.brand.name).is_some()
            || self
                .competitors
                .iter()
                .any(|c| c.first_mention(keyword).is_some())
    }

    #[must_use]
    pub fn has_domain_term(&self, keyword: &str) -> bool {
        contains_any_term(keyword, &self.domain_terms)
    }

    #[must_use]
    pub fn has_exclude_term(&self, keyword: &str) -> bool {
        contains_any_term(keyword, &self.exclude_terms)
    }
}

/// Finds `name` in `keyword`, case-insensitively, also trying `name` with its
/// internal whitespace removed. Returns the earliest byte offset in the
/// lowercased keyword.
#[must_use]
pub fn find_name(keyword: &str, name: &str) -> Option<usize> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let haystack = keyword.to_lowercase();
    let compact: String = name.split_whitespace().collect();

    let spaced = haystack.find(&name);
    let joined = if compact == name {
        None
    } else {
        haystack.find(&compact)
    };

    match (spaced, joined) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Case-insensitive substring test against a term list.
#[must_use]
pub fn contains_any_term(keyword: &str, terms: &[String]) -> bool {
    let haystack = keyword.to_lowercase();
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .any(|t| !t.is_empty() && haystack.contains(&t))
}

/// Load and validate the market configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_market_config(path: &Path) -> Result<MarketConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_market_config(&content)
}

/// Parse and validate market configuration YAML.
///
/// # Errors
///
/// Returns [`ConfigError::FileParse`] on malformed YAML and
/// [`ConfigError::Validation`] when the content is inconsistent.
pub fn parse_market_config(content: &str) -> Result<MarketConfig, ConfigError> {
    let config: MarketConfig = serde_yaml::from_str(content).map_err(ConfigError::FileParse)?;
    validate_market_config(&config)?;
    Ok(config)
}

fn validate_market_config(config: &MarketConfig) -> Result<(), ConfigError> {
    if config.brand.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "brand name must be non-empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    seen.insert(config.brand.name.trim().to_lowercase());

    for competitor in &config.competitors {
        if competitor.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "competitor name must be non-empty".to_string(),
            ));
        }
        if competitor.name.trim().eq_ignore_ascii_case(RESERVED_COMPETITOR_NAME) {
            return Err(ConfigError::Validation(format!(
                "competitor name '{RESERVED_COMPETITOR_NAME}' is reserved"
            )));
        }
        if !seen.insert(competitor.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand or competitor name: '{}'",
                competitor.name
            )));
        }
        if competitor.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "competitor '{}' has a blank alias",
                competitor.name
            )));
        }
    }

    let lists = [
        ("domain_terms", &config.domain_terms),
        ("exclude_terms", &config.exclude_terms),
        (
            "fallback.consideration_terms",
            &config.fallback.consideration_terms,
        ),
        ("fallback.conversion_terms", &config.fallback.conversion_terms),
    ];
    for (label, terms) in lists {
        if terms.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{label} contains a blank term"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
brand:
  name: 일룸
competitors:
  - name: 한샘
  - name: 이케아
    aliases: [IKEA]
domain_terms: [소파, 책상]
exclude_terms: [세계지도]
fallback:
  conversion_terms: [가격]
";

    #[test]
    fn parses_sample_config() {
        let cfg = parse_market_config(SAMPLE).expect("sample should parse");
        assert_eq!(cfg.brand.name, "일룸");
        assert_eq!(cfg.category, "furniture/interior");
        assert_eq!(cfg.competitor_names().collect::<Vec<_>>(), ["한샘", "이케아"]);
        assert_eq!(cfg.competitors[1].aliases, ["IKEA"]);
        assert_eq!(cfg.fallback.conversion_terms, ["가격"]);
        assert!(cfg.fallback.consideration_terms.is_empty());
    }

    #[test]
    fn load_market_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("keywords.yaml");
        assert!(path.exists(), "keywords.yaml missing at {path:?}");
        let cfg = load_market_config(&path).expect("keywords.yaml should load");
        assert!(!cfg.competitors.is_empty());
        assert!(cfg.fallback.consideration_terms.is_empty());
        assert!(cfg.fallback.conversion_terms.is_empty());
        assert!(cfg.has_domain_term("거실 소파"));
        assert!(cfg.has_exclude_term("세계지도 포스터"));
    }

    #[test]
    fn rejects_empty_brand_name() {
        let err = parse_market_config("brand:\n  name: '  '\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("brand name")));
    }

    #[test]
    fn rejects_competitor_duplicating_brand() {
        let yaml = "brand:\n  name: Desker\ncompetitors:\n  - name: desker\n";
        let err = parse_market_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_reserved_competitor_name() {
        let yaml = "brand:\n  name: Desker\ncompetitors:\n  - name: Other\n";
        let err = parse_market_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("reserved")));
    }

    #[test]
    fn rejects_blank_terms() {
        let yaml = "brand:\n  name: Desker\ndomain_terms: [desk, '']\n";
        let err = parse_market_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("domain_terms")));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse_market_config("brand: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::FileParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_market_config(Path::new("/nonexistent/keywords.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileIo { .. }));
    }

    #[test]
    fn find_name_is_case_insensitive() {
        assert_eq!(find_name("ikea desk", "IKEA"), Some(0));
        assert_eq!(find_name("cheap IKEA desk", "ikea"), Some(6));
    }

    #[test]
    fn find_name_matches_name_without_internal_whitespace() {
        assert_eq!(find_name("무인양품수납", "무인 양품"), Some(0));
        assert_eq!(find_name("한샘 무인 양품", "무인 양품"), Some(7));
        assert_eq!(find_name("책상", "무인 양품"), None);
    }

    #[test]
    fn find_name_ignores_blank_names() {
        assert_eq!(find_name("anything", "  "), None);
    }

    #[test]
    fn competitor_alias_counts_as_mention() {
        let cfg = parse_market_config(SAMPLE).unwrap();
        assert!(cfg.mentions_tracked_brand("ikea 책장"));
        assert!(cfg.mentions_tracked_brand("일룸 의자"));
        assert!(!cfg.mentions_tracked_brand("세계지도"));
    }

    #[test]
    fn term_matching_lowercases_both_sides() {
        let terms = vec!["AS".to_string()];
        assert!(contains_any_term("일룸 as 접수", &terms));
        assert!(contains_any_term("일룸 AS 접수", &terms));
        assert!(!contains_any_term("일룸 매장", &terms));
    }
}
