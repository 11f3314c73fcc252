//! 会话状态
//!
//! 唯一的可变状态，只由编排层修改，展示层通过 [`Session::view`] 只读访问。

use super::scheduler::{Scheduler, TimerFired, TimerKind};
use crate::models::{EvaluationResult, Phase, RubricItem, SubmissionImage};
use crate::presentation::{Notice, PanelView};
use crate::services::Credential;
use std::time::Duration;
use tokio::sync::mpsc;

/// 重置原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// 用户主动停止：清除密钥和批改说明
    UserRequested,
    /// 出错后重置：保留密钥和批改说明，方便直接重新开始
    Failed,
    /// 没有更多提交
    Finished,
}

/// 地址变化检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationChange {
    /// 第一次记录地址
    First,
    Unchanged,
    Changed,
}

pub struct Session {
    phase: Phase,
    credential: Option<Credential>,
    extra_context: Option<String>,
    rubric: Vec<RubricItem>,
    image: Option<SubmissionImage>,
    result: Option<EvaluationResult>,
    applied: bool,
    notice: Option<Notice>,
    last_location: Option<String>,
    graded: usize,
    timer: Scheduler,
}

impl Session {
    /// 创建会话，返回延时任务到期事件的接收端
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (timer, timer_rx) = Scheduler::new();
        let session = Self {
            phase: Phase::Idle,
            credential: None,
            extra_context: None,
            rubric: Vec::new(),
            image: None,
            result: None,
            applied: false,
            notice: None,
            last_location: None,
            graded: 0,
            timer,
        };
        (session, timer_rx)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn extra_context(&self) -> Option<&str> {
        self.extra_context.as_deref()
    }

    pub fn rubric(&self) -> &[RubricItem] {
        &self.rubric
    }

    pub fn image(&self) -> Option<&SubmissionImage> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        self.result.as_ref()
    }

    pub fn applied(&self) -> bool {
        self.applied
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn graded(&self) -> usize {
        self.graded
    }

    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.timer.pending()
    }

    /// 只读投影
    pub fn view(&self) -> PanelView<'_> {
        PanelView {
            phase: self.phase,
            items: &self.rubric,
            result: self.result.as_ref(),
            applied: self.applied,
            notice: self.notice.as_ref(),
            has_saved_credential: self.credential.is_some(),
            extra_context: self.extra_context.as_deref(),
            graded: self.graded,
        }
    }

    /// 保存密钥和批改说明
    pub fn start(&mut self, credential: Credential, extra_context: Option<String>) {
        self.credential = Some(credential);
        self.extra_context = extra_context;
        self.notice = None;
    }

    /// 进入读取阶段：丢弃上一轮的快照和结果
    pub fn begin_reading(&mut self) {
        self.discard_cycle();
        self.phase = Phase::Reading;
    }

    /// 保存读取结果并进入请求阶段
    pub fn begin_querying(&mut self, image: SubmissionImage, rubric: Vec<RubricItem>) {
        self.image = Some(image);
        self.rubric = rubric;
        self.phase = Phase::Querying;
    }

    /// 保存批改结果并进入展示阶段
    ///
    /// 调用方保证判定数量与评分项数量一致
    pub fn begin_displaying(&mut self, result: EvaluationResult) {
        debug_assert_eq!(result.decisions.len(), self.rubric.len());
        self.result = Some(result);
        self.applied = false;
        self.phase = Phase::Displaying;
    }

    /// 标记当前结果已写入页面
    pub fn mark_applied(&mut self) {
        self.applied = true;
        self.graded += 1;
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.timer.schedule(kind, delay);
    }

    pub fn cancel_timer(&mut self) -> Option<TimerKind> {
        self.timer.cancel()
    }

    pub fn claim_timer(&mut self, fired: TimerFired) -> bool {
        self.timer.claim(fired)
    }

    /// 记录页面地址并返回是否发生变化
    pub fn observe_location(&mut self, location: String) -> LocationChange {
        match &self.last_location {
            None => {
                self.last_location = Some(location);
                LocationChange::First
            }
            Some(last) if *last == location => LocationChange::Unchanged,
            Some(_) => {
                self.last_location = Some(location);
                LocationChange::Changed
            }
        }
    }

    /// 回到初始状态
    pub fn reset(&mut self, reason: ResetReason) {
        self.timer.cancel();
        self.discard_cycle();
        self.phase = Phase::Idle;
        if reason == ResetReason::UserRequested {
            self.credential = None;
            self.extra_context = None;
            self.notice = None;
        }
    }

    fn discard_cycle(&mut self) {
        self.rubric.clear();
        self.image = None;
        self.result = None;
        self.applied = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Decision;

    fn credential() -> Credential {
        Credential::parse("sk-test").unwrap()
    }

    fn displaying_session() -> (Session, mpsc::UnboundedReceiver<TimerFired>) {
        let (mut session, rx) = Session::new();
        session.start(credential(), Some("ctx".into()));
        session.begin_reading();
        session.begin_querying(
            SubmissionImage::new("https://x/img.png"),
            vec![RubricItem::new("a", 1)],
        );
        session.begin_displaying(EvaluationResult {
            decisions: vec![Decision::new(true, "")],
            overall_feedback: "ok".into(),
        });
        (session, rx)
    }

    #[tokio::test]
    async fn test_user_reset_clears_everything() {
        let (mut session, _rx) = displaying_session();
        session.schedule(TimerKind::Apply, Duration::from_secs(1));

        session.reset(ResetReason::UserRequested);

        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.rubric().is_empty());
        assert!(session.result().is_none());
        assert!(session.image().is_none());
        assert_eq!(session.pending_timer(), None);
        assert!(session.credential().is_none());
        assert!(session.extra_context().is_none());
    }

    #[tokio::test]
    async fn test_failure_reset_keeps_credential() {
        let (mut session, _rx) = displaying_session();
        session.reset(ResetReason::Failed);

        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.result().is_none());
        assert_eq!(session.credential(), Some(&credential()));
        assert_eq!(session.extra_context(), Some("ctx"));
        assert!(session.view().has_saved_credential);
    }

    #[tokio::test]
    async fn test_begin_reading_discards_previous_cycle() {
        let (mut session, _rx) = displaying_session();
        session.mark_applied();
        session.begin_reading();

        assert_eq!(session.phase(), Phase::Reading);
        assert!(session.rubric().is_empty());
        assert!(session.result().is_none());
        assert!(!session.applied());
        assert_eq!(session.graded(), 1);
    }

    #[test]
    fn test_observe_location() {
        let (mut session, _rx) = Session::new();
        assert_eq!(session.observe_location("a".into()), LocationChange::First);
        assert_eq!(session.observe_location("a".into()), LocationChange::Unchanged);
        assert_eq!(session.observe_location("b".into()), LocationChange::Changed);
        assert_eq!(session.observe_location("b".into()), LocationChange::Unchanged);
    }
}
