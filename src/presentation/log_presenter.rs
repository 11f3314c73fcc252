//! 只输出日志的展示实现（无人值守运行时使用）

use super::{PanelView, Presenter};
use crate::models::Phase;
use crate::utils::truncate_text;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

#[derive(Debug, Default)]
pub struct LogPresenter;

impl LogPresenter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Presenter for LogPresenter {
    async fn render(&self, view: &PanelView<'_>) -> Result<()> {
        match view.phase {
            Phase::Idle => {
                if let Some(notice) = view.notice {
                    if notice.is_error() {
                        error!("❌ {}", notice.text);
                    } else {
                        info!("ℹ️ {}", notice.text);
                    }
                }
                info!("⏸️ 等待开始 (已批改 {} 份)", view.graded);
            }
            Phase::Reading => info!("📖 正在读取页面内容..."),
            Phase::Querying => info!("🤖 正在请求模型批改 ({} 个评分项)...", view.items.len()),
            Phase::Displaying => {
                let Some(result) = view.result else {
                    return Ok(());
                };
                if view.applied {
                    info!("✓ 评分已写入，等待跳转下一份");
                    return Ok(());
                }
                for (i, (item, decision)) in view.items.iter().zip(&result.decisions).enumerate() {
                    info!(
                        "  {} {}. {} ({} 分) - {}",
                        if decision.applied { "✅" } else { "⬜" },
                        i + 1,
                        truncate_text(&item.description, 40),
                        item.points,
                        truncate_text(&decision.reason, 80)
                    );
                }
                if let Some(score) = result.score(view.items) {
                    info!("📊 总分: {} / {}", score.awarded, score.possible);
                }
                info!("💬 {}", truncate_text(&result.overall_feedback, 200));
            }
        }
        Ok(())
    }
}
