//! 错误类型
//!
//! 每个错误都带有一个分类标签（[`ErrorKind`]），编排层据此向用户展示提示并强制重置。
//! 应用装配层（main / App / 配置加载）统一使用 `anyhow::Result`。

use std::fmt;
use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 页面元素数量不符合预期
    AmbiguousPage,
    /// 评分项分值无法解析
    MalformedRubric,
    /// 推理请求或提交图片下载的网络 / HTTP 失败
    InferenceTransport,
    /// 推理返回内容缺失或结构不符
    InferenceFormat,
    /// 评分按钮数量与评分项数量不一致
    ApplyMismatch,
    /// 没有可用的“下一份”按钮
    NavigationUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AmbiguousPage => "AmbiguousPage",
            ErrorKind::MalformedRubric => "MalformedRubric",
            ErrorKind::InferenceTransport => "InferenceTransportError",
            ErrorKind::InferenceFormat => "InferenceFormatError",
            ErrorKind::ApplyMismatch => "ApplyMismatch",
            ErrorKind::NavigationUnavailable => "NavigationUnavailable",
        };
        f.write_str(name)
    }
}

/// 页面访问错误
#[derive(Debug, Error)]
pub enum PageError {
    /// 期望恰好一个元素，实际数量不同
    #[error("页面结构不符合预期: 需要恰好 1 个{target}，实际找到 {found} 个")]
    Ambiguous { target: String, found: usize },

    /// 页面上没有任何评分项
    #[error("页面上没有找到任何评分项")]
    NoRubricItems,

    /// 第 `index` 个评分项的分值标签无法解析
    #[error("第 {} 个评分项的分值无法解析: {label:?}", .index + 1)]
    MalformedPoints { index: usize, label: String },

    /// 评分按钮数量与评分项数量不一致
    #[error("评分按钮数量 ({controls}) 与评分项数量 ({items}) 不一致")]
    ControlCountMismatch { controls: usize, items: usize },

    /// 写入时按钮已经不存在
    #[error("第 {} 个评分按钮不存在 (页面上只有 {found} 个)", .index + 1)]
    ControlMissing { index: usize, found: usize },

    /// “下一份”按钮不可用
    #[error("“下一份”按钮不可用")]
    NextDisabled,

    /// 在页面内下载或转换提交图片失败
    #[error("提交图片下载失败: {message}")]
    ImageFetch { message: String },

    /// 页面脚本执行失败或返回了无法识别的结果
    #[error("页面脚本执行失败: {message}")]
    Script { message: String },
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::Ambiguous { .. } | PageError::NoRubricItems | PageError::Script { .. } => {
                ErrorKind::AmbiguousPage
            }
            PageError::MalformedPoints { .. } => ErrorKind::MalformedRubric,
            PageError::ControlCountMismatch { .. } | PageError::ControlMissing { .. } => {
                ErrorKind::ApplyMismatch
            }
            PageError::NextDisabled => ErrorKind::NavigationUnavailable,
            PageError::ImageFetch { .. } => ErrorKind::InferenceTransport,
        }
    }

    /// 创建元素数量不符错误
    pub fn ambiguous(target: impl Into<String>, found: usize) -> Self {
        PageError::Ambiguous {
            target: target.into(),
            found,
        }
    }

    /// 创建脚本执行错误
    pub fn script(message: impl fmt::Display) -> Self {
        PageError::Script {
            message: message.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for PageError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PageError::script(err)
    }
}

impl From<serde_json::Error> for PageError {
    fn from(err: serde_json::Error) -> Self {
        PageError::script(format!("无法解析脚本返回值: {}", err))
    }
}

/// 推理服务错误
#[derive(Debug, Error)]
pub enum InferenceError {
    /// 网络或传输层失败
    #[error("推理请求失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },

    /// 服务端返回了错误响应
    #[error("推理服务拒绝了请求 (模型: {model}): {message}")]
    Rejected { model: String, message: String },

    /// 返回结果中没有内容
    #[error("推理服务返回内容为空 (模型: {model})")]
    EmptyPayload { model: String },

    /// 返回内容不是合法 JSON
    #[error("推理结果不是合法的 JSON: {source}")]
    MalformedPayload {
        #[source]
        source: serde_json::Error,
    },

    /// 返回内容结构不符合约定
    #[error("推理结果结构不符: {detail}")]
    SchemaMismatch { detail: String },

    /// 判定数量与评分项数量不一致
    #[error("推理结果包含 {actual} 个判定，但评分项有 {expected} 个")]
    DecisionCountMismatch { expected: usize, actual: usize },

    /// 请求构建失败
    #[error("无法构建推理请求: {message}")]
    InvalidRequest { message: String },
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::Transport { .. }
            | InferenceError::Rejected { .. }
            | InferenceError::InvalidRequest { .. } => ErrorKind::InferenceTransport,
            InferenceError::EmptyPayload { .. }
            | InferenceError::MalformedPayload { .. }
            | InferenceError::SchemaMismatch { .. }
            | InferenceError::DecisionCountMismatch { .. } => ErrorKind::InferenceFormat,
        }
    }

    /// 创建结构不符错误
    pub fn schema(detail: impl Into<String>) -> Self {
        InferenceError::SchemaMismatch {
            detail: detail.into(),
        }
    }
}

/// 一次评分循环中的错误
#[derive(Debug, Error)]
pub enum GradingError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl GradingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GradingError::Page(e) => e.kind(),
            GradingError::Inference(e) => e.kind(),
        }
    }

    /// 展示给用户的提示
    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.kind(), self)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },

    /// 配置项取值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// 评分结果类型
pub type GradingResult<T> = Result<T, GradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_kinds() {
        assert_eq!(
            PageError::ambiguous("viewport", 0).kind(),
            ErrorKind::AmbiguousPage
        );
        assert_eq!(
            PageError::MalformedPoints {
                index: 0,
                label: "abc".into()
            }
            .kind(),
            ErrorKind::MalformedRubric
        );
        assert_eq!(
            PageError::ControlCountMismatch {
                controls: 2,
                items: 3
            }
            .kind(),
            ErrorKind::ApplyMismatch
        );
        assert_eq!(PageError::NextDisabled.kind(), ErrorKind::NavigationUnavailable);
    }

    #[test]
    fn test_inference_error_kinds() {
        let transport = InferenceError::Transport {
            model: "m".into(),
            message: "timeout".into(),
        };
        assert_eq!(transport.kind(), ErrorKind::InferenceTransport);

        let mismatch = InferenceError::DecisionCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(mismatch.kind(), ErrorKind::InferenceFormat);
    }

    #[test]
    fn test_user_message_carries_kind_tag() {
        let err = GradingError::from(PageError::ambiguous("viewport", 0));
        let msg = err.user_message();
        assert!(msg.starts_with("[AmbiguousPage]"));
        assert!(msg.contains("viewport"));
    }

    #[test]
    fn test_image_fetch_is_reported_as_transport() {
        let err = GradingError::from(PageError::ImageFetch {
            message: "HTTP 403".into(),
        });
        assert_eq!(err.kind(), ErrorKind::InferenceTransport);
        assert_eq!(
            err.user_message(),
            "[InferenceTransportError] 提交图片下载失败: HTTP 403"
        );
    }

    #[test]
    fn test_index_is_one_based_in_messages() {
        let err = PageError::MalformedPoints {
            index: 1,
            label: "pts".into(),
        };
        assert!(err.to_string().contains("第 2 个"));
    }
}
