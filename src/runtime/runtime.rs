//! 桥接器运行时实现
//!
//! 负责：
//! - 按配置组装桥接器（注册中心、回退解析器、工作池）
//! - 启动桥接器并等待停机信号
//! - 优雅停机：取消订阅、在超时内排空工作池

use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::BusChannel;
use crate::config::BridgeConfig;
use crate::discovery::{DiscoveryBridge, FallbackResolver, RegistryResolver};
use crate::error::Result;
use crate::registry::RegistryClient;
use crate::runtime::config::RuntimeConfig;

/// 桥接器运行时
pub struct BridgeRuntime {
    bridge_config: BridgeConfig,
    bus: Arc<dyn BusChannel>,
    registry: Arc<dyn RegistryClient>,
    resolver: Option<Arc<dyn FallbackResolver>>,
    config: RuntimeConfig,
}

impl BridgeRuntime {
    /// 创建运行时
    ///
    /// 未调用 [`with_resolver`](Self::with_resolver) 时，回退解析器直接查询同一个注册中心。
    pub fn new(
        bridge_config: BridgeConfig,
        bus: Arc<dyn BusChannel>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        Self {
            bridge_config,
            bus,
            registry,
            resolver: None,
            config: RuntimeConfig::default(),
        }
    }

    /// 设置回退解析器
    pub fn with_resolver(mut self, resolver: Arc<dyn FallbackResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 设置运行时配置
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// 启动桥接器，返回运行中的句柄
    pub async fn start(self) -> Result<RunningBridge> {
        let resolver: Arc<dyn FallbackResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(RegistryResolver::new(
                self.registry.clone(),
                self.bridge_config.record_defaults(),
            )),
        };

        info!(
            environment = %self.bridge_config.environment(),
            worker_pool_size = self.bridge_config.worker_pool_size,
            "Starting discovery bridge"
        );
        let bridge = DiscoveryBridge::new(self.bridge_config, self.registry, resolver);
        bridge.start(&self.bus).await?;

        Ok(RunningBridge {
            bridge,
            bus: self.bus,
            config: self.config,
        })
    }

    /// 运行直到收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            info!("Shutdown signal received (Ctrl+C)");
        })
        .await
    }

    /// 运行直到 `signal` 完成
    pub async fn run_until<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let running = self.start().await?;
        signal.await;
        running.shutdown().await
    }
}

/// 运行中的桥接器
pub struct RunningBridge {
    bridge: DiscoveryBridge,
    bus: Arc<dyn BusChannel>,
    config: RuntimeConfig,
}

impl RunningBridge {
    pub fn bridge(&self) -> &DiscoveryBridge {
        &self.bridge
    }

    pub fn bus(&self) -> &Arc<dyn BusChannel> {
        &self.bus
    }

    /// 优雅停机
    ///
    /// 先取消订阅，不再接收新事件，再等待在途任务结束。
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down discovery bridge");
        self.bridge.stop(self.bus.as_ref()).await?;

        if self.bridge.pool().shutdown(self.config.shutdown_timeout).await {
            info!("All bridge tasks completed");
        } else {
            warn!(
                timeout = ?self.config.shutdown_timeout,
                "Bridge tasks still running after shutdown timeout"
            );
        }

        let stats = self.bridge.stats();
        info!(
            imported = stats.imported,
            removed = stats.removed,
            lookups_local = stats.lookups_local,
            lookups_fallback = stats.lookups_fallback,
            lookups_missed = stats.lookups_missed,
            dropped_events = stats.dropped_events,
            "Discovery bridge stopped"
        );
        Ok(())
    }
}
