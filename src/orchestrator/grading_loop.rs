//! 批改状态机 - 编排层核心
//!
//! ## 阶段流转
//!
//! ```text
//! Idle ──提交密钥──▶ Reading ──页面稳定──▶ Querying ──模型返回──▶ Displaying
//!   ▲                  ▲                                             │
//!   │                  └──────── 跳转下一份 / 页面地址变化 ◀──────────┘
//!   └──── 用户停止 / 任意错误 / 没有下一份
//! ```
//!
//! 事件（用户操作、延时任务到期、看门狗检查）逐个处理，一个事件处理完之前不会开始下一个。
//! 任何页面读取或推理错误都直接提示用户并回到 Idle，不重试。

use super::scheduler::{TimerFired, TimerKind};
use super::session::{LocationChange, ResetReason, Session};
use super::watchdog::Watchdog;
use crate::config::Timings;
use crate::error::{GradingError, GradingResult, InferenceError, PageError};
use crate::models::{EvaluationResult, Phase, RubricItem, SubmissionImage};
use crate::page::PageAccessor;
use crate::presentation::{Notice, Presenter, UserIntent};
use crate::services::{Credential, EvaluationRequest, Evaluator};
use crate::utils::logging::log_submission_result;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 一次事件循环处理的事件
enum Event {
    Intent(UserIntent),
    IntentsClosed,
    Timer(TimerFired),
    Watchdog,
    Shutdown,
}

/// 批改编排器
///
/// 持有会话状态，驱动页面访问、推理服务和展示层
pub struct GradingOrchestrator<P, E, R> {
    page: P,
    evaluator: E,
    presenter: R,
    timings: Timings,
    session: Session,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
}

impl<P, E, R> GradingOrchestrator<P, E, R>
where
    P: PageAccessor,
    E: Evaluator,
    R: Presenter,
{
    pub fn new(page: P, evaluator: E, presenter: R, timings: Timings) -> Self {
        let (session, timer_rx) = Session::new();
        Self {
            page,
            evaluator,
            presenter,
            timings,
            session,
            timer_rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn presenter(&self) -> &R {
        &self.presenter
    }

    /// 运行事件循环
    ///
    /// `shutdown` 完成时停止；操作通道关闭后，回到 Idle 即停止。返回本次批改的份数。
    pub async fn run<F>(mut self, mut intents: mpsc::Receiver<UserIntent>, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let (_watchdog, mut ticks) = Watchdog::start(self.timings.watchdog_interval());
        tokio::pin!(shutdown);
        let mut intents_open = true;

        self.render().await;

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => Event::Shutdown,
                intent = intents.recv(), if intents_open => match intent {
                    Some(intent) => Event::Intent(intent),
                    None => Event::IntentsClosed,
                },
                Some(fired) = self.timer_rx.recv() => Event::Timer(fired),
                Some(()) = ticks.recv() => Event::Watchdog,
            };

            match event {
                Event::Intent(intent) => self.handle_intent(intent).await,
                Event::IntentsClosed => {
                    debug!("操作通道已关闭，完成当前流程后退出");
                    intents_open = false;
                }
                Event::Timer(fired) => self.handle_timer(fired).await,
                Event::Watchdog => self.check_location().await,
                Event::Shutdown => {
                    info!("⏹️ 收到退出信号");
                    self.session.reset(ResetReason::UserRequested);
                    self.render().await;
                    break;
                }
            }

            if !intents_open && self.session.phase() == Phase::Idle {
                break;
            }
        }

        self.session.graded()
    }

    /// 处理用户操作
    pub async fn handle_intent(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::SubmitCredential {
                credential,
                extra_context,
            } => self.submit_credential(&credential, extra_context).await,
            UserIntent::Reset => {
                info!("⏹️ 用户停止批改");
                self.session.reset(ResetReason::UserRequested);
                self.render().await;
            }
        }
    }

    /// 处理延时任务到期
    pub async fn handle_timer(&mut self, fired: TimerFired) {
        if !self.session.claim_timer(fired) {
            debug!("忽略已被取代的延时任务 #{} {:?}", fired.id, fired.kind);
            return;
        }

        match (fired.kind, self.session.phase()) {
            (TimerKind::Settle, Phase::Reading) => self.read_and_query().await,
            (TimerKind::Apply, Phase::Displaying) => self.apply().await,
            (TimerKind::Advance, Phase::Displaying) => self.advance().await,
            (kind, phase) => warn!("延时任务 {:?} 与当前阶段 {} 不匹配，忽略", kind, phase),
        }
    }

    /// 看门狗检查：展示阶段中页面被跳转时取消待执行任务并重新读取
    pub async fn check_location(&mut self) {
        let location = match self.page.current_location().await {
            Ok(location) => location,
            Err(e) => {
                debug!("读取页面地址失败: {}", e);
                return;
            }
        };

        if self.session.observe_location(location) != LocationChange::Changed {
            return;
        }

        if self.session.phase() == Phase::Displaying {
            let cancelled = self.session.cancel_timer();
            info!("🔀 页面已跳转，取消待执行任务 {:?}，重新读取", cancelled);
            self.enter_reading().await;
        } else {
            debug!("页面地址变化 (当前阶段: {})", self.session.phase());
        }
    }

    /// 等待下一个延时任务到期事件
    pub async fn next_timer(&mut self) -> Option<TimerFired> {
        self.timer_rx.recv().await
    }

    async fn submit_credential(&mut self, raw: &str, extra_context: Option<String>) {
        if self.session.phase() != Phase::Idle {
            debug!("忽略开始操作: 当前阶段 {}", self.session.phase());
            return;
        }

        let credential = match Credential::parse(raw).or_else(|| self.session.credential().cloned()) {
            Some(credential) => credential,
            None => {
                warn!("⚠️ 未输入 API 密钥");
                self.session
                    .set_notice(Notice::error("请输入有效的 OpenAI API 密钥"));
                self.render().await;
                return;
            }
        };

        let extra_context = extra_context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        info!(
            "▶️ 开始批改{}",
            if extra_context.is_some() { " (附加说明)" } else { "" }
        );
        self.session.start(credential, extra_context);
        self.enter_reading().await;
    }

    async fn enter_reading(&mut self) {
        self.session.begin_reading();
        self.session
            .schedule(TimerKind::Settle, self.timings.settle_delay());
        self.render().await;
    }

    async fn read_and_query(&mut self) {
        let (image, rubric) = match self.read_page().await {
            Ok(read) => read,
            Err(e) => return self.fail(e).await,
        };

        info!("📖 读取到 {} 个评分项", rubric.len());
        self.session.begin_querying(image, rubric);
        self.render().await;

        match self.query().await {
            Ok(result) => self.enter_displaying(result).await,
            Err(e) => self.fail(e.into()).await,
        }
    }

    async fn read_page(&self) -> GradingResult<(SubmissionImage, Vec<RubricItem>)> {
        let image = self.page.locate_submission_image().await?;
        let rubric = self.page.locate_rubric_items().await?;
        let next = self.page.locate_next_control().await?;
        debug!(
            "“下一份”按钮{}",
            if next.enabled { "可用" } else { "不可用" }
        );
        Ok((image, rubric))
    }

    async fn query(&self) -> Result<EvaluationResult, InferenceError> {
        let credential = self
            .session
            .credential()
            .ok_or_else(|| InferenceError::InvalidRequest {
                message: "缺少 API 密钥".to_string(),
            })?;
        let image = self
            .session
            .image()
            .ok_or_else(|| InferenceError::InvalidRequest {
                message: "缺少提交图片".to_string(),
            })?;

        let request = EvaluationRequest {
            image,
            items: self.session.rubric(),
            extra_context: self.session.extra_context(),
        };

        info!("🤖 请求模型批改...");
        let result = self.evaluator.evaluate(credential, request).await?;

        if result.decisions.len() != request.items.len() {
            return Err(InferenceError::DecisionCountMismatch {
                expected: request.items.len(),
                actual: result.decisions.len(),
            });
        }

        Ok(result)
    }

    async fn enter_displaying(&mut self, result: EvaluationResult) {
        info!(
            "✓ 模型返回结果: 应用 {}/{} 个评分项",
            result.applied_count(),
            result.decisions.len()
        );
        self.session.begin_displaying(result);
        self.session
            .schedule(TimerKind::Apply, self.timings.apply_delay());
        self.render().await;
    }

    async fn apply(&mut self) {
        let clicks = match self.apply_decisions().await {
            Ok(clicks) => clicks,
            Err(e) => return self.fail(e).await,
        };

        debug!("评分写入完成，点击 {} 次", clicks);
        if let Some(result) = self.session.result() {
            log_submission_result(self.session.graded() + 1, self.session.rubric(), result);
        }
        self.session.mark_applied();
        self.session
            .schedule(TimerKind::Advance, self.timings.advance_delay());
        self.render().await;
    }

    /// 逐项写入判定，只有状态不一致的按钮才会被点击
    async fn apply_decisions(&self) -> GradingResult<usize> {
        let desired: Vec<bool> = self
            .session
            .result()
            .map(|r| r.decisions.iter().map(|d| d.applied).collect())
            .unwrap_or_default();
        let items = self.session.rubric().len();

        let controls = self.page.count_item_controls().await?;
        if controls != items || desired.len() != items {
            return Err(PageError::ControlCountMismatch { controls, items }.into());
        }

        let mut clicks = 0;
        for (index, applied) in desired.into_iter().enumerate() {
            if self.page.set_item_applied(index, applied).await? {
                clicks += 1;
            }
        }
        Ok(clicks)
    }

    async fn advance(&mut self) {
        let next = match self.page.locate_next_control().await {
            Ok(next) => next,
            Err(e) => return self.fail(e.into()).await,
        };

        if !next.enabled {
            info!("🏁 “下一份”按钮不可用，没有更多提交，停止批改");
            self.session.reset(ResetReason::Finished);
            self.session.set_notice(Notice::info(format!(
                "没有更多提交了，本次共批改 {} 份",
                self.session.graded()
            )));
            self.render().await;
            return;
        }

        if let Err(e) = self.page.activate_next_control().await {
            return self.fail(e.into()).await;
        }

        info!("➡️ 已跳转到下一份提交");
        self.enter_reading().await;
    }

    async fn fail(&mut self, err: GradingError) {
        error!("❌ [{}] {}", err.kind(), err);
        self.session.reset(ResetReason::Failed);
        self.session.set_notice(Notice::error(err.user_message()));
        self.render().await;
    }

    async fn render(&self) {
        if let Err(e) = self.presenter.render(&self.session.view()).await {
            warn!("面板渲染失败: {}", e);
        }
    }
}
