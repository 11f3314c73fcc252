/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use crate::config::Config;
use crate::models::{EvaluationResult, RubricItem};
use tracing::info;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 作业批改助手启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🌐 浏览器调试端口: {}", config.browser_debug_port);
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!(
        "⏱️ 等待页面 {}ms / 写入评分 {}ms / 跳转 {}ms",
        config.timings.settle_delay_ms, config.timings.apply_delay_ms, config.timings.advance_delay_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录一份提交的批改结果
pub fn log_submission_result(number: usize, items: &[RubricItem], result: &EvaluationResult) {
    match result.score(items) {
        Some(score) => info!(
            "📝 第 {} 份: {} / {} 分，应用 {}/{} 个评分项",
            number,
            score.awarded,
            score.possible,
            result.applied_count(),
            items.len()
        ),
        None => info!("📝 第 {} 份: 评分项数量不一致，未计算得分", number),
    }
}

/// 打印结束统计
pub fn log_shutdown(graded: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行结束");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 本次共批改: {} 份", graded);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("作业批改助手", 2), "作业...");
    }
}
