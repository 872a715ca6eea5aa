//! 注册中心数据类型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 服务实例的网络位置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// 实例可达的基础地址，如 `http://10.0.0.5:8080`
    pub endpoint: String,
}

impl Location {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

/// 注册中心中记录的状态
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Up,
    Down,
    OutOfService,
    #[serde(other)]
    Unknown,
}

/// 注册中心中的一条服务记录
///
/// `metadata` 中可携带 `version`、`env`、`ttl`、`ping-interval` 等键，
/// 导入本地缓存时缺省值由配置补齐。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryRecord {
    pub name: String,
    /// 注册中心在注册时分配的 ID，每次物理注册唯一
    pub registration: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RegistryRecord {
    pub fn new(
        name: impl Into<String>,
        registration: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registration: registration.into(),
            location: Location::new(endpoint),
            status: RecordStatus::Up,
            metadata: Map::new(),
        }
    }

    /// 设置元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.location.endpoint
    }

    /// 读取字符串元数据
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// 读取数值元数据，兼容以字符串保存的数字
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// 向注册中心登记的一次注册
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub version: String,
    pub environment: String,
    /// 秒
    pub ttl: u64,
    /// 秒
    pub ping_interval: u64,
    pub health_check_enabled: bool,
    pub base_url: String,
    pub registration_id: String,
}

impl Registration {
    /// 转换为注册中心记录
    pub fn to_record(&self) -> RegistryRecord {
        RegistryRecord::new(&self.name, &self.registration_id, &self.base_url)
            .with_metadata("version", self.version.clone())
            .with_metadata("env", self.environment.clone())
            .with_metadata("ttl", self.ttl)
            .with_metadata("ping-interval", self.ping_interval)
    }

    /// 把注册字段合并进已有记录
    ///
    /// 保留原记录的状态和其他元数据，只覆盖注册写入的键。
    pub fn merge_into(&self, mut existing: RegistryRecord) -> RegistryRecord {
        for (key, value) in self.to_record().metadata {
            existing.metadata.insert(key, value);
        }
        existing
    }
}

/// 注册中心查询过滤器
///
/// 所有设置的条件都必须满足；未设置任何条件时匹配全部记录。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    name: Option<String>,
    endpoint: Option<String>,
    metadata: Vec<(String, String)>,
}

impl RecordFilter {
    /// 匹配全部记录
    pub fn all() -> Self {
        Self::default()
    }

    /// 按服务名和地址过滤（公告对账使用）
    pub fn by_name_and_endpoint(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::all().name(name).endpoint(endpoint)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// 要求字符串元数据精确匹配
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn matches(&self, record: &RegistryRecord) -> bool {
        if let Some(name) = &self.name {
            if &record.name != name {
                return false;
            }
        }
        if let Some(endpoint) = &self.endpoint {
            if record.endpoint() != endpoint {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(key, value)| record.metadata_str(key) == Some(value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_decodes_with_missing_optional_sections() {
        let record: RegistryRecord = serde_json::from_value(json!({
            "name": "orders",
            "registration": "r1",
            "location": { "endpoint": "http://10.0.0.5:8080" },
            "status": "SOMETHING_NEW"
        }))
        .unwrap();

        assert_eq!(record.status, RecordStatus::Unknown);
        assert!(record.metadata.is_empty());
        assert_eq!(record.endpoint(), "http://10.0.0.5:8080");
    }

    #[test]
    fn numeric_metadata_accepts_strings() {
        let record = RegistryRecord::new("orders", "r1", "http://a")
            .with_metadata("ttl", "45")
            .with_metadata("ping-interval", 15);

        assert_eq!(record.metadata_u64("ttl"), Some(45));
        assert_eq!(record.metadata_u64("ping-interval"), Some(15));
        assert_eq!(record.metadata_u64("missing"), None);
    }

    #[test]
    fn merge_keeps_status_and_foreign_metadata() {
        let registration = Registration {
            name: "orders".to_string(),
            version: "2.0.0".to_string(),
            environment: "dev".to_string(),
            ttl: 30,
            ping_interval: 20,
            health_check_enabled: true,
            base_url: "http://10.0.0.5:8080".to_string(),
            registration_id: "r1".to_string(),
        };
        let mut existing = RegistryRecord::new("orders", "r1", "http://10.0.0.5:8080")
            .with_metadata("version", "1.0.0")
            .with_metadata("zone", "eu-west-1")
            .with_metadata("ttl", 90);
        existing.status = RecordStatus::OutOfService;

        let merged = registration.merge_into(existing);
        assert_eq!(merged.status, RecordStatus::OutOfService);
        assert_eq!(merged.metadata_str("zone"), Some("eu-west-1"));
        assert_eq!(merged.metadata_str("version"), Some("2.0.0"));
        assert_eq!(merged.metadata_str("env"), Some("dev"));
        assert_eq!(merged.metadata_u64("ttl"), Some(30));
    }

    #[test]
    fn filter_requires_every_condition() {
        let record = RegistryRecord::new("orders", "r1", "http://a").with_metadata("env", "prod");

        assert!(RecordFilter::all().matches(&record));
        assert!(RecordFilter::by_name_and_endpoint("orders", "http://a").matches(&record));
        assert!(!RecordFilter::by_name_and_endpoint("orders", "http://b").matches(&record));
        assert!(RecordFilter::all().name("orders").metadata("env", "prod").matches(&record));
        assert!(!RecordFilter::all().metadata("env", "dev").matches(&record));
    }

    #[test]
    fn registration_round_trips_into_record_metadata() {
        let registration = Registration {
            name: "orders".into(),
            version: "2.0.0".into(),
            environment: "dev".into(),
            ttl: 30,
            ping_interval: 20,
            health_check_enabled: false,
            base_url: "http://10.0.0.5:8080".into(),
            registration_id: "r1".into(),
        };
        let record = registration.to_record();

        assert_eq!(record.registration, "r1");
        assert_eq!(record.metadata_str("version"), Some("2.0.0"));
        assert_eq!(record.metadata_u64("ping-interval"), Some(20));
    }
}
