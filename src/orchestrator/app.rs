//! 应用入口 - 编排层
//!
//! 负责连接浏览器、组装各层依赖并运行批改状态机，是唯一持有 Browser 的模块。

use super::grading_loop::GradingOrchestrator;
use crate::browser;
use crate::config::Config;
use crate::infrastructure::JsExecutor;
use crate::page::CdpPageAccessor;
use crate::presentation::{pump_intents, LogPresenter, PagePanel, Presenter, UserIntent};
use crate::services::OpenAiEvaluator;
use crate::utils::logging::log_shutdown;
use anyhow::{bail, Result};
use chromiumoxide::Browser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 操作通道容量
const INTENT_BUFFER: usize = 16;

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    executor: JsExecutor,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        if !config.panel && config.llm_api_key.is_none() {
            bail!("未启用页面面板时必须通过 LLM_API_KEY 提供密钥");
        }

        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            &config.target_url,
            &config.target_url_pattern,
        )
        .await?;

        // 创建 JsExecutor（持有 page）
        let executor = JsExecutor::new(page);

        Ok(Self {
            config,
            _browser: browser,
            executor,
        })
    }

    /// 运行批改直到用户退出（无面板时批改结束即退出）
    pub async fn run(self) -> Result<()> {
        let page = CdpPageAccessor::new(self.executor.clone(), self.config.selectors.clone())
            .with_inline_image(self.config.inline_image);
        let evaluator = OpenAiEvaluator::new(&self.config);

        let (tx, rx) = mpsc::channel(INTENT_BUFFER);

        let presenter: Box<dyn Presenter> = if self.config.panel {
            let panel = Arc::new(PagePanel::new(self.executor.clone()));
            tokio::spawn(pump_intents(
                panel.clone(),
                tx.clone(),
                self.config.timings.intent_poll(),
            ));
            info!("🧩 控制面板已注入页面");
            Box::new(panel)
        } else {
            Box::new(LogPresenter::new())
        };

        if let Some(key) = &self.config.llm_api_key {
            info!("🔑 已配置 API 密钥，自动开始批改");
            let start = UserIntent::SubmitCredential {
                credential: key.clone(),
                extra_context: self.config.extra_context.clone(),
            };
            if tx.send(start).await.is_err() {
                warn!("操作通道已关闭，无法自动开始");
            }
        }
        // 面板持有自己的发送端，这里释放后无面板模式会在批改结束时退出
        drop(tx);

        let orchestrator =
            GradingOrchestrator::new(page, evaluator, presenter, self.config.timings.clone());
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("无法监听退出信号: {}", e);
                std::future::pending::<()>().await;
            }
        };

        let graded = orchestrator.run(rx, shutdown).await;
        log_shutdown(graded);

        Ok(())
    }
}
