use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use sentinel_core::{config::ObservabilityConfig, AppConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{AppMode, Application};
use crate::shutdown::ShutdownManager;

/// 通用的应用启动配置
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Falls back to the default search paths when unset.
    pub config_path: Option<String>,
    /// Overrides `observability.log_level` when given.
    pub log_level: Option<String>,
    pub log_format: String,
}

impl StartupConfig {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches.get_one::<String>("config").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            log_format: matches
                .get_one::<String>("log-format")
                .cloned()
                .unwrap_or_else(|| "pretty".to_string()),
        }
    }
}

/// Arguments shared by every binary.
pub fn base_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径（默认依次查找 config/sentinel.toml、sentinel.toml）"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
}

/// 初始化日志系统
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// Install the Prometheus exporter when enabled. Counters are no-ops otherwise.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.metrics_enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .metrics_bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", config.metrics_bind_address))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("启动Prometheus指标导出失败")?;

    info!("Prometheus指标监听地址: {}", addr);
    Ok(())
}

/// 加载应用配置
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let path = startup_config.config_path.as_deref();
    AppConfig::load(path).with_context(|| match path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })
}

/// 启动应用程序的通用函数
///
/// Waits for the component to finish after the stop signal without a
/// deadline, so a scan worker can drain everything it accepted.
pub async fn start_application(startup_config: StartupConfig, app_mode: AppMode) -> Result<()> {
    let config = load_config(&startup_config)?;
    let log_level = startup_config
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_logging(&log_level, &startup_config.log_format)?;
    init_metrics(&config.observability)?;

    info!(mode = app_mode.as_str(), "启动 Sentinel");
    if let Some(path) = &startup_config.config_path {
        info!("配置文件: {}", path);
    }

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let app = Application::new(config, app_mode);
    let mut app_handle = tokio::spawn(app.run(shutdown_rx));

    let finished_early = tokio::select! {
        result = &mut app_handle => Some(result),
        _ = wait_for_shutdown_signal() => None,
    };

    let result = match finished_early {
        Some(result) => result,
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
            app_handle.await
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("Sentinel 已退出");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("应用运行失败: {e:#}");
            Err(e)
        }
        Err(e) => Err(anyhow::anyhow!("应用任务异常结束: {e}")),
    }
}

/// 等待关闭信号
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
