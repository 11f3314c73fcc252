use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 评分项
///
/// 在评分项列表中的位置就是它的身份：第 i 个评分项对应第 i 个判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricItem {
    pub description: String,
    pub points: u32,
}

impl RubricItem {
    pub fn new(description: impl Into<String>, points: u32) -> Self {
        Self {
            description: description.into(),
            points,
        }
    }

    /// 是否是“答错”兜底项
    pub fn is_incorrect_fallback(&self) -> bool {
        self.description.to_lowercase().contains("incorrect")
    }
}

/// 提交图片的引用（URL 或 data URL）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionImage {
    pub src: String,
}

impl SubmissionImage {
    pub fn new(src: impl Into<String>) -> Self {
        Self { src: src.into() }
    }

    pub fn is_inline(&self) -> bool {
        self.src.starts_with("data:")
    }
}

/// 从分值按钮的可见文本中解析分值
///
/// 取开头的整数部分，例如 `"+2.5 pts"` 解析为 2；负数或没有数字时返回 `None`
pub fn parse_points(label: &str) -> Option<u32> {
    static LEADING_INT: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_INT.get_or_init(|| Regex::new(r"^\s*\+?(\d+)").expect("valid regex"));
    re.captures(label)?.get(1)?.as_str().parse().ok()
}
