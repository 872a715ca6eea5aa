use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::discovery::record::RecordDefaults;
use crate::discovery::selector::LoadBalanceStrategy;
use crate::error::Result;

/// 公告地址
pub const DEFAULT_ANNOUNCE_ADDRESS: &str = "flare.discovery.announce";
/// 查询地址
pub const DEFAULT_REQUEST_ADDRESS: &str = "flare.discovery.request";

/// 服务发现环境名（最高优先级）
pub const ENV_DISCOVERY_ENV: &str = "FLARE_DISCOVERY_ENV";
/// 全局环境名（配置中未给出环境名时使用）
pub const ENV_ENV_NAME: &str = "FLARE_ENV_NAME";
pub const ENV_DISCOVERY_TTL: &str = "FLARE_DISCOVERY_TTL";
pub const ENV_DISCOVERY_PING_INTERVAL: &str = "FLARE_DISCOVERY_PING_INTERVAL";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub bus: BusConfig,
    pub registry: RegistryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 环境名，未设置时回退到 `FLARE_ENV_NAME`，最终为 "dev"
    pub env: Option<String>,
    /// 默认 TTL（秒）
    pub ttl: u64,
    /// 默认心跳间隔（秒）
    pub ping_interval: u64,
    pub announce_address: String,
    pub request_address: String,
    /// 共享工作池的并发上限
    pub worker_pool_size: usize,
    pub registry_timeout_ms: u64,
    pub resolve_timeout_ms: u64,
    /// 等待消息总线就绪的上限
    pub ready_timeout_ms: u64,
    pub load_balance: LoadBalanceStrategy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            env: None,
            ttl: 30,
            ping_interval: 20,
            announce_address: DEFAULT_ANNOUNCE_ADDRESS.to_string(),
            request_address: DEFAULT_REQUEST_ADDRESS.to_string(),
            worker_pool_size: default_worker_pool_size(),
            registry_timeout_ms: 5_000,
            resolve_timeout_ms: 5_000,
            ready_timeout_ms: 30_000,
            load_balance: LoadBalanceStrategy::Random,
        }
    }
}

fn default_worker_pool_size() -> usize {
    (num_cpus::get() * 2).clamp(4, 64)
}

impl BridgeConfig {
    pub fn environment(&self) -> &str {
        self.env.as_deref().unwrap_or("dev")
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// 导入记录时使用的缺省值
    pub fn record_defaults(&self) -> RecordDefaults {
        RecordDefaults::new(self.environment(), self.ttl, self.ping_interval)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// 请求/响应的等待上限
    pub request_timeout_ms: u64,
    /// 每个订阅的投递队列长度
    pub delivery_buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            delivery_buffer: 256,
        }
    }
}

impl BusConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    #[default]
    Memory,
    Etcd,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    pub endpoints: Vec<String>,
    pub namespace: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Memory,
            endpoints: Vec::new(),
            namespace: "flare".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// `RUST_LOG` 未设置时使用的过滤规则
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用进程环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 用给定的查找函数覆盖配置
    ///
    /// 环境名优先级：`FLARE_DISCOVERY_ENV` > 配置文件 > `FLARE_ENV_NAME` > "dev"。
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup(ENV_DISCOVERY_ENV).filter(|v| !v.is_empty()) {
            self.bridge.env = Some(env);
        }
        if self.bridge.env.is_none() {
            self.bridge.env = lookup(ENV_ENV_NAME).filter(|v| !v.is_empty());
        }
        if let Some(ttl) = lookup(ENV_DISCOVERY_TTL).and_then(|v| v.parse().ok()) {
            self.bridge.ttl = ttl;
        }
        if let Some(ping) = lookup(ENV_DISCOVERY_PING_INTERVAL).and_then(|v| v.parse().ok()) {
            self.bridge.ping_interval = ping;
        }
    }
}
