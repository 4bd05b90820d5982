use anyhow::Result;
use sentinel::app::AppMode;
use sentinel::common::{base_command, start_application, StartupConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = base_command("sentinel-coordinator", "Sentinel 协调服务")
        .long_about("提供Agent注册、心跳作业投递、作业结果回报以及扫描任务提交接口")
        .get_matches();

    start_application(StartupConfig::from_matches(&matches), AppMode::Coordinator).await
}
