use anyhow::Result;
use sentinel::app::AppMode;
use sentinel::common::{base_command, start_application, StartupConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = base_command("sentinel-agent", "Sentinel Agent")
        .long_about("向协调服务注册并保持心跳，执行收到的作业并回报结果")
        .get_matches();

    start_application(StartupConfig::from_matches(&matches), AppMode::Agent).await
}
