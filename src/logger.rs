//! 日志初始化

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则默认 info；`verbose` 时本 crate 输出 debug
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "info,homework_grader=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
