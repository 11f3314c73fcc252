//! 展示层
//!
//! 只消费会话的只读投影（[`PanelView`]），并把用户操作（[`UserIntent`]）交还给编排层。

pub mod log_presenter;
pub mod panel;

pub use log_presenter::LogPresenter;
pub use panel::{pump_intents, render_html, PagePanel};

use crate::models::{EvaluationResult, Phase, RubricItem};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::sync::Arc;

/// 用户操作
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserIntent {
    /// 提交密钥（和可选的批改说明）并开始
    SubmitCredential {
        credential: String,
        #[serde(default)]
        extra_context: Option<String>,
    },
    /// 停止并回到初始状态
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// 展示给用户的提示
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: DateTime<Local>,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
            at: Local::now(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
            at: Local::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// 会话的只读投影
#[derive(Debug, Clone, Copy)]
pub struct PanelView<'a> {
    pub phase: Phase,
    pub items: &'a [RubricItem],
    pub result: Option<&'a EvaluationResult>,
    /// 当前结果是否已经写入页面
    pub applied: bool,
    pub notice: Option<&'a Notice>,
    /// 是否保留了上一次输入的密钥
    pub has_saved_credential: bool,
    pub extra_context: Option<&'a str>,
    /// 本次运行已完成的提交数
    pub graded: usize,
}

/// 展示能力
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn render(&self, view: &PanelView<'_>) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Presenter + ?Sized> Presenter for Arc<T> {
    async fn render(&self, view: &PanelView<'_>) -> anyhow::Result<()> {
        (**self).render(view).await
    }
}

#[async_trait]
impl<T: Presenter + ?Sized> Presenter for Box<T> {
    async fn render(&self, view: &PanelView<'_>) -> anyhow::Result<()> {
        (**self).render(view).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_from_panel_json() {
        let intent: UserIntent = serde_json::from_value(json!({
            "kind": "submit_credential",
            "credential": "sk-1",
            "extra_context": "limits"
        }))
        .unwrap();
        assert_eq!(
            intent,
            UserIntent::SubmitCredential {
                credential: "sk-1".into(),
                extra_context: Some("limits".into())
            }
        );

        let reset: UserIntent = serde_json::from_value(json!({ "kind": "reset" })).unwrap();
        assert_eq!(reset, UserIntent::Reset);
    }

    #[test]
    fn test_intent_context_is_optional() {
        let intent: UserIntent =
            serde_json::from_value(json!({ "kind": "submit_credential", "credential": "" })).unwrap();
        assert!(matches!(
            intent,
            UserIntent::SubmitCredential { extra_context: None, .. }
        ));
    }
}
