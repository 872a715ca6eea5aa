//! 本地缓存中的服务实例记录

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::error::{FlareError, Result};
use crate::registry::{Registration, RegistryRecord};

/// 元数据中缺少 `version` 时使用的版本
pub const DEFAULT_VERSION: &str = "1.0.0";

pub const META_VERSION: &str = "version";
pub const META_ENV: &str = "env";
pub const META_TTL: &str = "ttl";
pub const META_PING_INTERVAL: &str = "ping-interval";

/// 导入记录时的缺省值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefaults {
    pub environment: String,
    pub ttl: u64,
    pub ping_interval: u64,
}

impl RecordDefaults {
    pub fn new(environment: impl Into<String>, ttl: u64, ping_interval: u64) -> Self {
        Self {
            environment: environment.into(),
            ttl,
            ping_interval,
        }
    }
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self::new("dev", 30, 20)
    }
}

/// 一个远程服务实例
///
/// 不可变；变更通过“先删除再创建”表达。缓存成员判等只看 `registration_id`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    name: String,
    version: String,
    environment: String,
    registration_id: String,
    base_url: String,
    ttl: u64,
    ping_interval: u64,
}

impl ServiceRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        environment: impl Into<String>,
        registration_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let defaults = RecordDefaults::default();
        Self {
            name: name.into(),
            version: version.into(),
            environment: environment.into(),
            registration_id: registration_id.into(),
            base_url: base_url.into(),
            ttl: defaults.ttl,
            ping_interval: defaults.ping_interval,
        }
    }

    pub fn with_liveness(mut self, ttl: u64, ping_interval: u64) -> Self {
        self.ttl = ttl;
        self.ping_interval = ping_interval;
        self
    }

    /// 从注册中心记录构建，缺失的元数据由 `defaults` 补齐
    pub fn from_registry(record: &RegistryRecord, defaults: &RecordDefaults) -> Result<Self> {
        if record.name.is_empty() {
            return Err(FlareError::missing_field("name"));
        }
        if record.registration.is_empty() {
            return Err(FlareError::missing_field("registration"));
        }
        if record.endpoint().is_empty() {
            return Err(FlareError::missing_field("location.endpoint"));
        }

        Ok(Self {
            name: record.name.clone(),
            version: record
                .metadata_str(META_VERSION)
                .unwrap_or(DEFAULT_VERSION)
                .to_string(),
            environment: record
                .metadata_str(META_ENV)
                .unwrap_or(&defaults.environment)
                .to_string(),
            registration_id: record.registration.clone(),
            base_url: record.endpoint().to_string(),
            ttl: record.metadata_u64(META_TTL).unwrap_or(defaults.ttl),
            ping_interval: record
                .metadata_u64(META_PING_INTERVAL)
                .unwrap_or(defaults.ping_interval),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn ping_interval(&self) -> u64 {
        self.ping_interval
    }

    /// 是否匹配逻辑键 `(name, version, environment)`
    pub fn matches_key(&self, name: &str, version: &str, environment: &str) -> bool {
        self.name == name && self.version == version && self.environment == environment
    }

    /// 镜像到注册中心的注册（不启用健康检查）
    pub fn to_registration(&self) -> Registration {
        Registration {
            name: self.name.clone(),
            version: self.version.clone(),
            environment: self.environment.clone(),
            ttl: self.ttl,
            ping_interval: self.ping_interval,
            health_check_enabled: false,
            base_url: self.base_url.clone(),
            registration_id: self.registration_id.clone(),
        }
    }
}

impl PartialEq for ServiceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.registration_id == other.registration_id
    }
}

impl Eq for ServiceRecord {}

impl Hash for ServiceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.registration_id.hash(state);
    }
}
