//! 延时任务
//!
//! 会话同一时间最多只有一个待执行的延时任务；安排新任务会先取消旧任务。

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// 延时任务的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// 等待页面稳定后读取
    Settle,
    /// 展示结果后写入评分
    Apply,
    /// 写入评分后跳转下一份
    Advance,
}

/// 到期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: u64,
    pub kind: TimerKind,
}

struct PendingTimer {
    id: u64,
    kind: TimerKind,
    handle: JoinHandle<()>,
}

/// 单槽延时任务调度器
pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_id: u64,
    pending: Option<PendingTimer>,
}

impl Scheduler {
    /// 创建调度器，返回到期事件的接收端
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            next_id: 0,
            pending: None,
        };
        (scheduler, rx)
    }

    /// 安排一个延时任务，替换掉当前待执行的任务
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        self.cancel();

        self.next_id += 1;
        let id = self.next_id;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { id, kind });
        });

        trace!("安排延时任务 #{} {:?} ({:?})", id, kind, delay);
        self.pending = Some(PendingTimer { id, kind, handle });
        id
    }

    /// 取消当前待执行的任务
    pub fn cancel(&mut self) -> Option<TimerKind> {
        let pending = self.pending.take()?;
        pending.handle.abort();
        trace!("取消延时任务 #{} {:?}", pending.id, pending.kind);
        Some(pending.kind)
    }

    /// 当前待执行任务的种类
    pub fn pending(&self) -> Option<TimerKind> {
        self.pending.as_ref().map(|p| p.kind)
    }

    /// 认领一个到期事件
    ///
    /// 取消和到期可能同时发生，已被取代的事件返回 `false`
    pub fn claim(&mut self, fired: TimerFired) -> bool {
        match &self.pending {
            Some(p) if p.id == fired.id => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
