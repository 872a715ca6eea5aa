//! 日志初始化
//!
//! `RUST_LOG` 优先于配置中的级别；`log` crate 的记录通过 `tracing-log` 转发。

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{FlareError, Result};

/// 构建日志过滤器
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// 安装全局 tracing 订阅者
///
/// 只能成功调用一次，重复调用返回配置错误。
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(|| fmt::layer()));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| FlareError::configuration_error(format!("tracing already initialized: {}", e)))?;
    tracing_log::LogTracer::init()
        .map_err(|e| FlareError::configuration_error(format!("log bridge already installed: {}", e)))?;
    Ok(())
}
