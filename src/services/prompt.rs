//! 批改请求的提示词与返回结构约定

use crate::models::RubricItem;
use serde_json::{json, Map, Value as JsonValue};

/// 返回结构的名称
pub const SCHEMA_NAME: &str = "grade_response";

/// 返回结构中每个评分项的键，从 1 开始编号
pub fn rubric_key(index: usize) -> String {
    format!("rubric_{}", index + 1)
}

/// 找到“答错”兜底项的位置
pub fn fallback_item_index(items: &[RubricItem]) -> Option<usize> {
    items.iter().position(RubricItem::is_incorrect_fallback)
}

/// 构建系统提示词
pub fn build_system_prompt(items: &[RubricItem]) -> String {
    let mut prompt = String::from(
        "You are an expert teacher assistant that helps grade student homework submissions. \
         Be somewhat lenient in your grading - if the submission partially addresses or shows an attempt \
         at meeting a rubric item, consider giving credit for it. Give the student the benefit of the doubt \
         when their work demonstrates some understanding. You will be given the student's submission and \
         the rubric for grading.\n\n\
         For each rubric item, determine if it should be applied (true) or not (false).\n\
         Provide a brief reason for each decision that explains why you applied the rubric item.\n\
         Also include overall encouraging feedback on the submission.",
    );

    if let Some(index) = fallback_item_index(items) {
        prompt.push_str(&format!(
            "\nIf no other rubric item applies, apply rubric item {} (\"{}\").",
            index + 1,
            items[index].description
        ));
    }

    prompt
}

/// 构建用户消息文本（附加说明在前，评分项列表在后）
pub fn build_user_prompt(items: &[RubricItem], extra_context: Option<&str>) -> String {
    let mut prompt = String::new();

    if let Some(context) = extra_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("Here is some context about the homework:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        "Please grade this homework submission according to the following rubric items:\n",
    );
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {} ({} points)", i + 1, item.description, item.points))
        .collect();
    prompt.push_str(&lines.join("\n"));

    prompt
}

/// 构建严格的 JSON Schema：每个评分项一个键，所有层级都不允许多余字段
pub fn build_response_schema(items: &[RubricItem]) -> JsonValue {
    let mut properties = Map::new();
    let mut required = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let key = rubric_key(index);
        properties.insert(
            key.clone(),
            json!({
                "type": "object",
                "properties": {
                    "applied": {
                        "type": "boolean",
                        "description": format!(
                            "Whether the rubric item should be applied based on the submission ({})",
                            item.description
                        ),
                    },
                    "reason": {
                        "type": "string",
                        "description": "A brief explanation of why this decision was made",
                    },
                },
                "required": ["applied", "reason"],
                "additionalProperties": false,
            }),
        );
        required.push(JsonValue::String(key));
    }

    json!({
        "type": "object",
        "properties": {
            "rubricEvaluations": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
                "description": "Evaluation for each rubric item",
            },
            "overallFeedback": {
                "type": "string",
                "description": "Overall feedback on the submission",
            },
        },
        "required": ["rubricEvaluations", "overallFeedback"],
        "additionalProperties": false,
    })
}
