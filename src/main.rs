use anyhow::Result;
use homework_grader::config::Config;
use homework_grader::logger;
use homework_grader::orchestrator::App;
use homework_grader::utils::logging::log_startup;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init(config.verbose_logging);
    log_startup(&config);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
