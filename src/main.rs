use anyhow::{Context, Result};
use tor_fetch::utils::logging;
use tor_fetch::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init_tracing();
    logging::log_startup();

    // 加载配置：tor-fetch [目标文件] [代理地址] [控制地址]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load(&args).context("配置加载失败")?;

    // 初始化并运行应用
    let app = App::initialize(config).await.context("初始化失败")?;
    app.run().await;
    app.shutdown();

    Ok(())
}
