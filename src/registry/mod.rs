//! 注册中心模块
//!
//! 定义桥接器依赖的注册中心契约，并提供进程内与 etcd 两种实现。

#[cfg(feature = "etcd")]
pub mod etcd;
pub mod memory;
pub mod trait_def;
pub mod types;

use std::sync::Arc;

use crate::config::{RegistryBackend, RegistryConfig};
use crate::error::{FlareError, Result};

#[cfg(feature = "etcd")]
pub use etcd::EtcdRegistry;
pub use memory::InMemoryRegistry;
pub use trait_def::RegistryClient;
pub use types::{Location, RecordFilter, RecordStatus, Registration, RegistryRecord};

/// 根据配置创建注册中心客户端
pub async fn create_registry(config: &RegistryConfig) -> Result<Arc<dyn RegistryClient>> {
    match config.backend {
        RegistryBackend::Memory => Ok(Arc::new(InMemoryRegistry::new())),
        #[cfg(feature = "etcd")]
        RegistryBackend::Etcd => {
            if config.endpoints.is_empty() {
                return Err(FlareError::configuration_error("etcd endpoints not configured"));
            }
            let registry =
                EtcdRegistry::connect(config.endpoints.clone(), config.namespace.clone()).await?;
            Ok(Arc::new(registry))
        }
        #[cfg(not(feature = "etcd"))]
        RegistryBackend::Etcd => Err(FlareError::configuration_error(
            "etcd registry backend requires the `etcd` feature",
        )),
    }
}
