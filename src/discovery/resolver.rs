//! 回退解析器
//!
//! 本地缓存没有匹配实例时，由解析器直接按逻辑键解析实例地址。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::record::{RecordDefaults, ServiceRecord};
use super::selector::InstanceSelector;
use crate::error::{FlareError, Result};
use crate::registry::{RecordFilter, RegistryClient};

/// 回退解析器
#[async_trait]
pub trait FallbackResolver: Send + Sync {
    /// 按 `(name, version, env)` 解析一个实例地址
    async fn resolve(&self, name: &str, version: &str, env: &str) -> Result<Option<String>>;
}

/// 从不解析出地址的解析器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

#[async_trait]
impl FallbackResolver for NoopResolver {
    async fn resolve(&self, _name: &str, _version: &str, _env: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// 直接查询注册中心的解析器
///
/// 用与导入相同的缺省值解释记录元数据，在匹配的实例中随机选择一个。
pub struct RegistryResolver {
    registry: Arc<dyn RegistryClient>,
    defaults: RecordDefaults,
    selector: InstanceSelector,
}

impl RegistryResolver {
    pub fn new(registry: Arc<dyn RegistryClient>, defaults: RecordDefaults) -> Self {
        Self {
            registry,
            defaults,
            selector: InstanceSelector::default(),
        }
    }
}

#[async_trait]
impl FallbackResolver for RegistryResolver {
    async fn resolve(&self, name: &str, version: &str, env: &str) -> Result<Option<String>> {
        let records = self
            .registry
            .query_matching(&RecordFilter::all().name(name))
            .await
            .map_err(|e| FlareError::resolver_failed(format!("{}: {}", name, e)))?;

        let candidates: Vec<ServiceRecord> = records
            .iter()
            .filter_map(|record| ServiceRecord::from_registry(record, &self.defaults).ok())
            .filter(|record| record.matches_key(name, version, env))
            .collect();

        debug!(
            name = %name,
            version = %version,
            env = %env,
            candidates = candidates.len(),
            "Resolved instances from registry"
        );
        Ok(self
            .selector
            .select(&candidates)
            .map(|record| record.base_url().to_string()))
    }
}
