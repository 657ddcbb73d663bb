//! Batched intent classification against an oracle.
//!
//! Keywords are sent in fixed-size batches, in input order. Each batch goes
//! through the shared [`RetryPolicy`]; if every attempt fails the batch is
//! classified by [`fallback_stage`] instead, so the output always has exactly
//! one entry per input keyword, in input order.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use kwintel_core::market::contains_any_term;
use kwintel_core::{ClassifiedKeyword, KeywordRecord, MarketConfig, Stage, StageSource};
use kwintel_oracle::{extract_json, Oracle, OracleError, RetryPolicy};
use serde_json::Value;

use crate::error::ClassificationError;
use crate::matching::normalize_keyword;
use crate::prompts::classification_prompt;

const CONTEXT: &str = "classification";

#[derive(Debug, Clone, Copy)]
pub struct ClassifierSettings {
    pub batch_size: usize,
    /// Pause between consecutive batches, for the oracle's rate limit.
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            batch_size: 150,
            inter_batch_delay: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct BatchClassifier<'a, O> {
    oracle: &'a O,
    market: &'a MarketConfig,
    settings: ClassifierSettings,
}

impl<'a, O: Oracle> BatchClassifier<'a, O> {
    #[must_use]
    pub fn new(oracle: &'a O, market: &'a MarketConfig, settings: ClassifierSettings) -> Self {
        Self {
            oracle,
            market,
            settings,
        }
    }

    /// Classify every keyword. Never fails and never drops a keyword.
    pub async fn classify(&self, keywords: &[KeywordRecord]) -> Vec<ClassifiedKeyword> {
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = keywords.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(keywords.len());

        for (index, batch) in keywords.chunks(batch_size).enumerate() {
            let batch_no = index + 1;
            tracing::info!(
                batch = batch_no,
                total_batches,
                size = batch.len(),
                "classifying keyword batch"
            );

            results.extend(self.classify_batch(batch, batch_no).await);

            if batch_no < total_batches && !self.settings.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }
        }

        let fallback_count = results.iter().filter(|k| k.is_fallback()).count();
        tracing::info!(
            classified = results.len(),
            fallback = fallback_count,
            "keyword classification complete"
        );

        results
    }

    async fn classify_batch(
        &self,
        batch: &[KeywordRecord],
        batch_no: usize,
    ) -> Vec<ClassifiedKeyword> {
        let prompt = classification_prompt(self.market, batch);
        let prompt = prompt.as_str();
        let oracle = self.oracle;
        let label = format!("classify batch {batch_no}");

        let answer = self
            .settings
            .retry
            .run(&label, || async move {
                let raw = oracle.generate(prompt).await?;
                let value = extract_json(&raw).ok_or_else(|| OracleError::format(CONTEXT, &raw))?;
                parse_batch_answer(&value, batch)
            })
            .await;

        match answer {
            Ok(stages) => {
                let missing = stages.iter().filter(|s| s.is_none()).count();
                if missing > 0 {
                    tracing::warn!(
                        batch = batch_no,
                        missing,
                        "oracle left keywords unclassified; applying fallback to those"
                    );
                }
                batch
                    .iter()
                    .zip(stages)
                    .map(|(record, stage)| match stage {
                        Some(stage) => classified(record, stage, StageSource::Oracle),
                        None => self.fallback(record),
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(
                    batch = batch_no,
                    error = %e,
                    "batch classification failed; applying fallback to whole batch"
                );
                batch.iter().map(|record| self.fallback(record)).collect()
            }
        }
    }

    fn fallback(&self, record: &KeywordRecord) -> ClassifiedKeyword {
        let stage = fallback_stage(&record.keyword, self.market);
        classified(record, stage, StageSource::Fallback)
    }
}

fn classified(record: &KeywordRecord, stage: Stage, source: StageSource) -> ClassifiedKeyword {
    ClassifiedKeyword {
        keyword: record.keyword.clone(),
        volume: record.total_volume,
        stage,
        source,
    }
}

/// Deterministic stage for a keyword the oracle could not classify.
///
/// Awareness unless the market opts into fallback term lists; when it does,
/// conversion terms win over consideration terms.
#[must_use]
pub fn fallback_stage(keyword: &str, market: &MarketConfig) -> Stage {
    if contains_any_term(keyword, &market.fallback.conversion_terms) {
        Stage::Conversion
    } else if contains_any_term(keyword, &market.fallback.consideration_terms) {
        Stage::Consideration
    } else {
        Stage::Awareness
    }
}

/// Validate an oracle answer and align it to `batch`.
///
/// Returns one slot per batch keyword; `None` marks a keyword the answer did
/// not (validly) cover. Elements are matched by keyword text first, then by
/// `idx`. The first valid answer for a keyword wins.
///
/// # Errors
///
/// Returns [`OracleError::Schema`] when the answer holds no element list or
/// no element survives validation.
pub fn parse_batch_answer(
    value: &Value,
    batch: &[KeywordRecord],
) -> Result<Vec<Option<Stage>>, OracleError> {
    let elements = answer_elements(value)
        .ok_or_else(|| OracleError::schema(CONTEXT, "no result array in answer"))?;

    let mut by_text: HashMap<String, VecDeque<usize>> = HashMap::new();
    for (idx, record) in batch.iter().enumerate() {
        by_text
            .entry(normalize_keyword(&record.keyword))
            .or_default()
            .push_back(idx);
    }

    let mut stages: Vec<Option<Stage>> = vec![None; batch.len()];
    let mut accepted = 0usize;

    for element in elements {
        match validate_element(element, batch.len(), &mut by_text, &stages) {
            Ok((idx, stage)) => {
                stages[idx] = Some(stage);
                accepted += 1;
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected classification element");
            }
        }
    }

    if accepted == 0 {
        return Err(OracleError::schema(
            CONTEXT,
            format!("none of {} elements were valid", elements.len()),
        ));
    }

    Ok(stages)
}

/// The element array: either a bare array or the `results` field.
fn answer_elements(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("results").and_then(Value::as_array),
        _ => None,
    }
}

fn validate_element(
    element: &Value,
    batch_len: usize,
    by_text: &mut HashMap<String, VecDeque<usize>>,
    stages: &[Option<Stage>],
) -> Result<(usize, Stage), ClassificationError> {
    let obj = element.as_object().ok_or(ClassificationError::NotAnObject)?;

    let label = obj
        .get("stage")
        .and_then(Value::as_str)
        .ok_or(ClassificationError::MissingStage)?;
    let stage = Stage::from_label(label).ok_or_else(|| ClassificationError::UnknownStage {
        label: label.to_owned(),
    })?;

    let keyword = obj.get("keyword").and_then(Value::as_str);
    let idx = obj.get("idx").and_then(Value::as_u64);

    let by_keyword = keyword.and_then(|text| {
        let slots = by_text.get_mut(&normalize_keyword(text))?;
        while let Some(candidate) = slots.pop_front() {
            if stages[candidate].is_none() {
                return Some(candidate);
            }
        }
        None
    });

    let target = by_keyword.or_else(|| {
        let candidate = usize::try_from(idx?).ok()?;
        (candidate < batch_len && stages[candidate].is_none()).then_some(candidate)
    });

    target
        .map(|t| (t, stage))
        .ok_or_else(|| ClassificationError::Unmatched {
            keyword: keyword.map(str::to_owned),
            idx,
        })
}

#[cfg(test)]
mod tests {
    use kwintel_core::parse_market_config;
    use serde_json::json;

    use super::*;
    use crate::test_support::ScriptedOracle;

    fn market() -> MarketConfig {
        parse_market_config(
            r"
brand:
  name: 일룸
competitors:
  - name: 한샘
fallback:
  consideration_terms: [후기, 비교]
  conversion_terms: [가격, 매장]
",
        )
        .unwrap()
    }

    fn bare_market() -> MarketConfig {
        parse_market_config("brand:\n  name: 일룸\n").unwrap()
    }

    fn settings(batch_size: usize) -> ClassifierSettings {
        ClassifierSettings {
            batch_size,
            inter_batch_delay: Duration::ZERO,
            retry: RetryPolicy::new(3, 0),
        }
    }

    fn batch(names: &[&str]) -> Vec<KeywordRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| KeywordRecord::with_total(*n, 1000 - i as u64 * 10))
            .collect()
    }

    fn stages(results: &[ClassifiedKeyword]) -> Vec<Stage> {
        results.iter().map(|k| k.stage).collect()
    }

    // -----------------------------------------------------------------------
    // parse_batch_answer
    // -----------------------------------------------------------------------

    #[test]
    fn parses_results_object_by_keyword() {
        let input = batch(&["일룸 소파", "일룸 가격"]);
        let answer = json!({"results": [
            {"keyword": "일룸 가격", "volume": 990, "stage": "conversion"},
            {"keyword": "일룸 소파", "volume": 1000, "stage": "consideration"}
        ]});
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(
            parsed,
            vec![Some(Stage::Consideration), Some(Stage::Conversion)]
        );
    }

    #[test]
    fn parses_bare_array_by_index() {
        let input = batch(&["a", "b"]);
        let answer = json!([{"idx": 1, "stage": "awareness"}, {"idx": 0, "stage": "conversion"}]);
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![Some(Stage::Conversion), Some(Stage::Awareness)]);
    }

    #[test]
    fn matches_keyword_despite_respacing() {
        let input = batch(&["일룸 책상"]);
        let answer = json!({"results": [{"keyword": "일룸책상", "stage": "Consideration"}]});
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![Some(Stage::Consideration)]);
    }

    #[test]
    fn unknown_stage_leaves_slot_empty() {
        let input = batch(&["a", "b"]);
        let answer = json!({"results": [
            {"keyword": "a", "stage": "neutral"},
            {"keyword": "b", "stage": "awareness"}
        ]});
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![None, Some(Stage::Awareness)]);
    }

    #[test]
    fn duplicate_keywords_fill_successive_slots() {
        let input = batch(&["dup", "dup"]);
        let answer = json!([
            {"keyword": "dup", "stage": "awareness"},
            {"keyword": "dup", "stage": "conversion"}
        ]);
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![Some(Stage::Awareness), Some(Stage::Conversion)]);
    }

    #[test]
    fn first_answer_for_a_keyword_wins() {
        let input = batch(&["a"]);
        let answer = json!([
            {"keyword": "a", "stage": "awareness"},
            {"idx": 0, "stage": "conversion"}
        ]);
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![Some(Stage::Awareness)]);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let input = batch(&["a"]);
        let answer = json!([{"idx": 7, "stage": "awareness"}, {"idx": 0, "stage": "conversion"}]);
        let parsed = parse_batch_answer(&answer, &input).unwrap();
        assert_eq!(parsed, vec![Some(Stage::Conversion)]);
    }

    #[test]
    fn answer_without_any_valid_element_is_schema_error() {
        let input = batch(&["a"]);
        let answer = json!({"results": [{"keyword": "a", "stage": "unknown"}]});
        let err = parse_batch_answer(&answer, &input).unwrap_err();
        assert!(matches!(err, OracleError::Schema { .. }));
    }

    #[test]
    fn answer_without_array_is_schema_error() {
        let input = batch(&["a"]);
        let err = parse_batch_answer(&json!({"keyword": "a"}), &input).unwrap_err();
        assert!(matches!(err, OracleError::Schema { .. }));
    }

    #[test]
    fn array_outside_results_is_schema_error() {
        let input = batch(&["a"]);
        let answer = json!({
            "examples": [{"keyword": "a", "stage": "conversion"}],
            "notes": [{"keyword": "a", "stage": "awareness"}]
        });
        let err = parse_batch_answer(&answer, &input).unwrap_err();
        assert!(matches!(err, OracleError::Schema { .. }));
    }

    #[test]
    fn validate_element_reports_typed_errors() {
        let mut index = HashMap::new();
        let empty: Vec<Option<Stage>> = vec![None];
        assert_eq!(
            validate_element(&json!("text"), 1, &mut index, &empty),
            Err(ClassificationError::NotAnObject)
        );
        assert_eq!(
            validate_element(&json!({"keyword": "a"}), 1, &mut index, &empty),
            Err(ClassificationError::MissingStage)
        );
        assert_eq!(
            validate_element(&json!({"stage": "buy"}), 1, &mut index, &empty),
            Err(ClassificationError::UnknownStage {
                label: "buy".to_owned()
            })
        );
        assert!(matches!(
            validate_element(&json!({"keyword": "zzz", "stage": "awareness"}), 1, &mut index, &empty),
            Err(ClassificationError::Unmatched { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // fallback_stage
    // -----------------------------------------------------------------------

    #[test]
    fn fallback_uses_configured_terms() {
        let m = market();
        assert_eq!(fallback_stage("일룸 책상 가격", &m), Stage::Conversion);
        assert_eq!(fallback_stage("일룸 책상 후기", &m), Stage::Consideration);
        assert_eq!(fallback_stage("후기 가격 비교", &m), Stage::Conversion);
        assert_eq!(fallback_stage("아이방 꾸미기", &m), Stage::Awareness);
    }

    #[test]
    fn fallback_without_terms_is_awareness() {
        assert_eq!(fallback_stage("일룸 가격", &bare_market()), Stage::Awareness);
    }

    #[tokio::test]
    async fn shipped_market_falls_back_to_awareness() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("keywords.yaml");
        let market = kwintel_core::load_market_config(&path).unwrap();
        let oracle = ScriptedOracle::always_failing();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));

        let results = classifier
            .classify(&batch(&["거실 소파 추천", "학생 책상", "책상 구매 후기"]))
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(ClassifiedKeyword::is_fallback));
        assert!(results.iter().all(|k| k.stage == Stage::Awareness));
    }

    // -----------------------------------------------------------------------
    // BatchClassifier::classify
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn classify_preserves_order_across_batches() {
        let oracle = ScriptedOracle::new(vec![
            Ok(r#"{"results": [{"idx": 0, "stage": "awareness"}, {"idx": 1, "stage": "conversion"}]}"#.into()),
            Ok(r#"[{"keyword": "c", "stage": "consideration"}]"#.into()),
        ]);
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(2));

        let results = classifier.classify(&batch(&["a", "b", "c"])).await;

        assert_eq!(oracle.call_count(), 2);
        let names: Vec<&str> = results.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(
            stages(&results),
            [Stage::Awareness, Stage::Conversion, Stage::Consideration]
        );
        assert!(results.iter().all(|k| !k.is_fallback()));
    }

    #[tokio::test]
    async fn classify_uses_input_volume_not_echoed_volume() {
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"[{"keyword": "a", "volume": 1, "stage": "awareness"}]"#.into(),
        )]);
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));
        let results = classifier
            .classify(&[KeywordRecord::new("a", 300, 700)])
            .await;
        assert_eq!(results[0].volume, 1000);
    }

    #[tokio::test]
    async fn classify_recovers_json_wrapped_in_prose() {
        let oracle = ScriptedOracle::new(vec![Ok(
            "Sure! ```json\n{\"results\": [{\"idx\": 0, \"stage\": \"conversion\"}]}\n```".into(),
        )]);
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));
        let results = classifier.classify(&batch(&["a"])).await;
        assert_eq!(stages(&results), [Stage::Conversion]);
        assert!(!results[0].is_fallback());
    }

    #[tokio::test]
    async fn classify_retries_malformed_answer_then_succeeds() {
        let oracle = ScriptedOracle::new(vec![
            Ok("I could not decide".into()),
            Ok(r#"[{"idx": 0, "stage": "consideration"}]"#.into()),
        ]);
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));
        let results = classifier.classify(&batch(&["a"])).await;
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(stages(&results), [Stage::Consideration]);
        assert!(!results[0].is_fallback());
    }

    #[tokio::test]
    async fn classify_falls_back_when_oracle_always_fails() {
        let oracle = ScriptedOracle::always_failing();
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(2));
        let input = batch(&["일룸 가격", "한샘 후기", "거실 인테리어", "일룸 매장", "책상"]);

        let results = classifier.classify(&input).await;

        assert_eq!(results.len(), input.len());
        assert_eq!(oracle.call_count(), 3 * 3, "3 batches x 3 attempts");
        assert!(results.iter().all(ClassifiedKeyword::is_fallback));
        assert_eq!(
            stages(&results),
            [
                Stage::Conversion,
                Stage::Consideration,
                Stage::Awareness,
                Stage::Conversion,
                Stage::Awareness
            ]
        );
    }

    #[tokio::test]
    async fn classify_fills_gaps_with_per_keyword_fallback() {
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"{"results": [{"keyword": "b", "stage": "awareness"}, {"keyword": "a", "stage": "neutral"}]}"#.into(),
        )]);
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));
        let results = classifier.classify(&batch(&["a 가격", "b", "c"])).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_fallback());
        assert_eq!(results[0].stage, Stage::Conversion);
        assert!(!results[1].is_fallback());
        assert!(results[2].is_fallback());
        assert_eq!(results[2].stage, Stage::Awareness);
    }

    #[tokio::test]
    async fn classify_empty_input_makes_no_calls() {
        let oracle = ScriptedOracle::always_failing();
        let market = market();
        let classifier = BatchClassifier::new(&oracle, &market, settings(10));
        assert!(classifier.classify(&[]).await.is_empty());
        assert_eq!(oracle.call_count(), 0);
    }
}
