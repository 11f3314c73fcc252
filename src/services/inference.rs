//! 推理服务 - 业务能力层
//!
//! 只负责“把一份提交交给模型判定”这一能力，不关心流程，也不做重试
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI Chat Completions 的服务都可以使用

use super::decode::decode_grade_response;
use super::prompt::{build_response_schema, build_system_prompt, build_user_prompt, SCHEMA_NAME};
use crate::config::Config;
use crate::error::InferenceError;
use crate::models::{EvaluationResult, RubricItem, SubmissionImage};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// 用户提供的 API 密钥
///
/// Debug 输出不会泄露内容
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// 去掉首尾空白，空字符串返回 `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// 一次批改请求
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub image: &'a SubmissionImage,
    pub items: &'a [RubricItem],
    pub extra_context: Option<&'a str>,
}

/// 批改能力
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        credential: &Credential,
        request: EvaluationRequest<'_>,
    ) -> Result<EvaluationResult, InferenceError>;
}

/// 基于 OpenAI Chat Completions 的批改服务
pub struct OpenAiEvaluator {
    api_base_url: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiEvaluator {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base_url: config.llm_api_base_url.clone(),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 构建请求：系统消息 + （文本 + 图片）用户消息 + 严格 JSON Schema
    pub fn build_request(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(build_system_prompt(request.items))
            .build()?;

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: build_user_prompt(request.items, request.extra_context),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: request.image.src.clone(),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ),
        ];
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: SCHEMA_NAME.to_string(),
                schema: Some(build_response_schema(request.items)),
                strict: Some(true),
            },
        };

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .response_format(response_format)
            .build()
    }

    fn classify(&self, err: OpenAIError) -> InferenceError {
        let model = self.model_name.clone();
        match err {
            OpenAIError::ApiError(api) => InferenceError::Rejected {
                model,
                message: api.message,
            },
            OpenAIError::JSONDeserialize(..) => InferenceError::schema(err.to_string()),
            OpenAIError::InvalidArgument(message) => InferenceError::InvalidRequest { message },
            other => InferenceError::Transport {
                model,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    async fn evaluate(
        &self,
        credential: &Credential,
        request: EvaluationRequest<'_>,
    ) -> Result<EvaluationResult, InferenceError> {
        debug!(
            "调用 LLM API，模型: {}，评分项: {} 个，图片: {}",
            self.model_name,
            request.items.len(),
            if request.image.is_inline() { "data URL" } else { "URL" }
        );

        let chat_request = self
            .build_request(&request)
            .map_err(|e| InferenceError::InvalidRequest {
                message: e.to_string(),
            })?;

        // 密钥由用户在面板中输入，每次调用按当前密钥构建客户端
        let openai_config = OpenAIConfig::new()
            .with_api_key(credential.expose())
            .with_api_base(&self.api_base_url);
        let client = Client::with_config(openai_config);

        let response = client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            self.classify(e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| InferenceError::EmptyPayload {
                model: self.model_name.clone(),
            })?;

        decode_grade_response(&content, request.items.len())
    }
}
