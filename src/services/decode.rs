//! 严格解析模型返回内容
//!
//! 缺字段、多字段、类型不符都直接报错，不做任何兜底修正

use super::prompt::rubric_key;
use crate::error::InferenceError;
use crate::models::{Decision, EvaluationResult};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct GradeResponse {
    rubric_evaluations: Map<String, JsonValue>,
    overall_feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecision {
    applied: bool,
    reason: String,
}

/// 把模型返回的文本解析为批改结果
///
/// 判定按 `rubric_1..rubric_n` 的键取回，结果顺序与评分项顺序一致
pub fn decode_grade_response(
    content: &str,
    expected_items: usize,
) -> Result<EvaluationResult, InferenceError> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|source| InferenceError::MalformedPayload { source })?;

    let response: GradeResponse = serde_json::from_value(value)
        .map_err(|e| InferenceError::schema(e.to_string()))?;

    let mut evaluations = response.rubric_evaluations;
    if evaluations.len() != expected_items {
        return Err(InferenceError::DecisionCountMismatch {
            expected: expected_items,
            actual: evaluations.len(),
        });
    }

    let mut decisions = Vec::with_capacity(expected_items);
    for index in 0..expected_items {
        let key = rubric_key(index);
        let raw = evaluations
            .remove(&key)
            .ok_or_else(|| InferenceError::schema(format!("缺少评分项 {}", key)))?;
        let decision: RawDecision = serde_json::from_value(raw)
            .map_err(|e| InferenceError::schema(format!("{}: {}", key, e)))?;
        decisions.push(Decision::new(decision.applied, decision.reason));
    }

    Ok(EvaluationResult {
        decisions,
        overall_feedback: response.overall_feedback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with(n: usize, applied: impl Fn(usize) -> bool) -> String {
        let mut evaluations = Map::new();
        for i in 0..n {
            evaluations.insert(
                rubric_key(i),
                json!({ "applied": applied(i), "reason": format!("reason {}", i + 1) }),
            );
        }
        json!({ "rubricEvaluations": evaluations, "overallFeedback": "Good work" }).to_string()
    }

    #[test]
    fn test_decode_preserves_order() {
        for n in [1usize, 5, 20] {
            let content = response_with(n, |i| i % 3 == 0);
            let result = decode_grade_response(&content, n).unwrap();
            assert_eq!(result.decisions.len(), n);
            for (i, decision) in result.decisions.iter().enumerate() {
                assert_eq!(decision.applied, i % 3 == 0, "n={} i={}", n, i);
                assert_eq!(decision.reason, format!("reason {}", i + 1));
            }
            assert_eq!(result.overall_feedback, "Good work");
        }
    }

    #[test]
    fn test_decode_count_mismatch() {
        let content = response_with(2, |_| true);
        let err = decode_grade_response(&content, 3).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::DecisionCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_keys() {
        let content = json!({
            "rubricEvaluations": { "rubric_1": { "applied": true, "reason": "" }, "item_2": { "applied": false, "reason": "" } },
            "overallFeedback": ""
        })
        .to_string();
        let err = decode_grade_response(&content, 2).unwrap_err();
        assert!(matches!(err, InferenceError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_extra_fields() {
        let top_level = json!({
            "rubricEvaluations": { "rubric_1": { "applied": true, "reason": "" } },
            "overallFeedback": "",
            "score": 10
        })
        .to_string();
        assert!(matches!(
            decode_grade_response(&top_level, 1),
            Err(InferenceError::SchemaMismatch { .. })
        ));

        let nested = json!({
            "rubricEvaluations": { "rubric_1": { "applied": true, "reason": "", "confidence": 0.9 } },
            "overallFeedback": ""
        })
        .to_string();
        assert!(matches!(
            decode_grade_response(&nested, 1),
            Err(InferenceError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_missing_fields_and_wrong_types() {
        let missing_reason = json!({
            "rubricEvaluations": { "rubric_1": { "applied": true } },
            "overallFeedback": ""
        })
        .to_string();
        assert!(matches!(
            decode_grade_response(&missing_reason, 1),
            Err(InferenceError::SchemaMismatch { .. })
        ));

        let string_bool = json!({
            "rubricEvaluations": { "rubric_1": { "applied": "true", "reason": "" } },
            "overallFeedback": ""
        })
        .to_string();
        assert!(matches!(
            decode_grade_response(&string_bool, 1),
            Err(InferenceError::SchemaMismatch { .. })
        ));

        let no_feedback = json!({ "rubricEvaluations": {} }).to_string();
        assert!(matches!(
            decode_grade_response(&no_feedback, 0),
            Err(InferenceError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode_grade_response("not json {", 1).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedPayload { .. }));
    }
}
