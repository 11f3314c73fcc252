//! 页面地址看门狗
//!
//! 在会话整个生命周期内按固定间隔发出检查信号，与当前阶段无关。
//! 实际的地址读取和比较由编排层在收到信号后完成。

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 看门狗，丢弃时停止
pub struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// 启动看门狗，返回检查信号的接收端
    pub fn start(every: Duration) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // 上一次检查还没处理完时直接跳过本次
                match tx.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        });
        (Self { handle }, rx)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
