//! 程序配置
//!
//! 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量覆盖

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "grader.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 找不到已打开的评分页面时导航到的 URL
    pub target_url: String,
    /// 用于挑选已打开标签页的 URL 片段
    pub target_url_pattern: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 是否在页面中注入控制面板（关闭时只输出日志）
    pub panel: bool,
    /// 是否在页面内把提交图片转成 data URL 再发送给模型
    pub inline_image: bool,
    /// 附加的批改说明
    pub extra_context: Option<String>,
    // --- LLM 配置 ---
    /// 配置后启动即自动开始批改
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 各阶段延时
    pub timings: Timings,
    /// 页面元素定位规则
    pub selectors: Selectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://www.gradescope.com".to_string(),
            target_url_pattern: "gradescope.com".to_string(),
            verbose_logging: false,
            panel: true,
            inline_image: false,
            extra_context: None,
            llm_api_key: None,
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4.1-2025-04-14".to_string(),
            llm_temperature: 0.2,
            llm_max_tokens: 4000,
            timings: Timings::default(),
            selectors: Selectors::default(),
        }
    }
}

/// 各阶段延时（毫秒）
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// 进入读取阶段后等待页面稳定的时间
    pub settle_delay_ms: u64,
    /// 展示结果后自动写入评分前的等待
    pub apply_delay_ms: u64,
    /// 写入评分后跳转下一份前的等待
    pub advance_delay_ms: u64,
    /// 页面地址轮询间隔
    pub watchdog_interval_ms: u64,
    /// 面板操作轮询间隔
    pub intent_poll_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            apply_delay_ms: 1000,
            advance_delay_ms: 5000,
            watchdog_interval_ms: 1000,
            intent_poll_ms: 250,
        }
    }
}

impl Timings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn apply_delay(&self) -> Duration {
        Duration::from_millis(self.apply_delay_ms)
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn intent_poll(&self) -> Duration {
        Duration::from_millis(self.intent_poll_ms)
    }
}

/// 页面元素定位规则
///
/// 宿主页面改版时只需要调整这里
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Selectors {
    /// 提交图片所在容器的 class
    pub viewport_class: String,
    /// 评分项（分值 + 描述）的 class
    pub rubric_item_class: String,
    /// 评分项内分值按钮的标签名
    pub point_control_tag: String,
    /// 评分项内描述文本的 class
    pub description_class: String,
    /// 评分项开关按钮的 class（状态在 aria-pressed 上）
    pub item_control_class: String,
    /// “下一份”按钮的 class
    pub next_control_class: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            viewport_class: "pv--viewport".to_string(),
            rubric_item_class: "rubricItem--pointsAndDescription".to_string(),
            point_control_tag: "button".to_string(),
            description_class: "markdownText".to_string(),
            item_control_class: "rubricItem--key".to_string(),
            next_control_class: "js-nextSubmissionButton".to_string(),
        }
    }
}

impl Config {
    /// 加载配置
    ///
    /// `GRADER_CONFIG` 指定的文件优先，否则尝试当前目录下的 `grader.toml`
    pub fn load() -> Result<Self> {
        let path = std::env::var("GRADER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let base = if Path::new(&path).exists() {
            Self::from_file(Path::new(&path))?
        } else {
            Self::default()
        };
        let config = base.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用环境变量覆盖配置项
    ///
    /// `lookup` 抽象了环境变量读取，测试时可以传入固定映射
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "BROWSER_DEBUG_PORT", "u16")? {
            self.browser_debug_port = v;
        }
        if let Some(v) = lookup("TARGET_URL") {
            self.target_url = v;
        }
        if let Some(v) = lookup("TARGET_URL_PATTERN") {
            self.target_url_pattern = v;
        }
        if let Some(v) = parse_var(&lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Some(v) = parse_var(&lookup, "GRADER_PANEL", "bool")? {
            self.panel = v;
        }
        if let Some(v) = parse_var(&lookup, "GRADER_INLINE_IMAGE", "bool")? {
            self.inline_image = v;
        }
        if let Some(v) = lookup("GRADER_EXTRA_CONTEXT") {
            self.extra_context = non_empty(v);
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm_api_key = non_empty(v);
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        Ok(self)
    }

    /// 校验配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm_temperature",
                reason: format!("{} 不在 [0, 2] 范围内", self.llm_temperature),
            });
        }
        if self.timings.watchdog_interval_ms == 0 || self.timings.intent_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timings",
                reason: "轮询间隔必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var_name: &str, expected_type: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type,
            }),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timings.settle_delay_ms, 2000);
        assert_eq!(config.timings.apply_delay_ms, 1000);
        assert_eq!(config.timings.advance_delay_ms, 5000);
        assert_eq!(config.timings.watchdog_interval_ms, 1000);
        assert_eq!(config.selectors.next_control_class, "js-nextSubmissionButton");
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            browser_debug_port = 9333
            llm_model_name = "gpt-4o"

            [timings]
            advance_delay_ms = 8000

            [selectors]
            viewport_class = "viewer"
            "#,
        )
        .unwrap();

        assert_eq!(config.browser_debug_port, 9333);
        assert_eq!(config.llm_model_name, "gpt-4o");
        assert_eq!(config.timings.advance_delay_ms, 8000);
        assert_eq!(config.timings.apply_delay_ms, 1000);
        assert_eq!(config.selectors.viewport_class, "viewer");
        assert_eq!(config.selectors.item_control_class, "rubricItem--key");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_overrides(env(&[
                ("BROWSER_DEBUG_PORT", "9000"),
                ("LLM_API_KEY", "  sk-test  "),
                ("GRADER_EXTRA_CONTEXT", "   "),
                ("GRADER_PANEL", "false"),
            ]))
            .unwrap();

        assert_eq!(config.browser_debug_port, 9000);
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.extra_context, None);
        assert!(!config.panel);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = Config::default()
            .with_overrides(env(&[("BROWSER_DEBUG_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvVarParseFailed { ref var_name, .. } if var_name == "BROWSER_DEBUG_PORT"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.timings.watchdog_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
