//! 桥接器运行时
//!
//! 管理桥接器的生命周期：等待总线就绪、安装订阅、启动对账、
//! 接收停机信号后取消订阅并排空工作池。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flare_discovery_bridge::bus::LocalBus;
//! use flare_discovery_bridge::config::Config;
//! use flare_discovery_bridge::registry::InMemoryRegistry;
//! use flare_discovery_bridge::runtime::BridgeRuntime;
//!
//! # async fn demo() -> flare_discovery_bridge::error::Result<()> {
//! let config = Config::default();
//! let bus = Arc::new(LocalBus::new(config.bus.clone()));
//! let runtime = BridgeRuntime::new(config.bridge, bus, Arc::new(InMemoryRegistry::new()));
//! runtime.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pool;
pub mod runtime;

pub use config::RuntimeConfig;
pub use pool::WorkerPool;
pub use runtime::{BridgeRuntime, RunningBridge};
