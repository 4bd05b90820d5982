use anyhow::Result;
use sentinel::app::AppMode;
use sentinel::common::{base_command, start_application, StartupConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = base_command("sentinel-scan-worker", "Sentinel 扫描Worker")
        .long_about("从任务队列消费扫描任务，限制并发执行，关闭时等待所有进行中的任务完成")
        .get_matches();

    start_application(StartupConfig::from_matches(&matches), AppMode::Worker).await
}
