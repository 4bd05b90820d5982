use anyhow::Result;
use clap::Arg;
use sentinel::app::AppMode;
use sentinel::common::{base_command, start_application, StartupConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = base_command("sentinel", "Agent集群协调与扫描任务分发")
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["coordinator", "agent", "worker"])
                .default_value("coordinator"),
        )
        .get_matches();

    let mode: AppMode = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("coordinator")
        .parse()?;

    start_application(StartupConfig::from_matches(&matches), mode).await
}
