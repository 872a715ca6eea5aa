//! 消息总线上的载荷格式

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::DEFAULT_VERSION;
use crate::error::{FlareError, Result};
use crate::registry::Location;

/// 请求中缺少 `env` 时使用的环境
pub const DEFAULT_LOOKUP_ENV: &str = "dev";

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;

/// 实例可用性状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Up,
    Down,
    #[serde(other)]
    Unknown,
}

/// 服务状态公告 `{ name, location: { endpoint }, status }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    pub name: String,
    pub location: Location,
    pub status: ServiceStatus,
}

impl Announcement {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            name: name.into(),
            location: Location::new(endpoint),
            status,
        }
    }

    pub fn up(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(name, endpoint, ServiceStatus::Up)
    }

    pub fn down(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(name, endpoint, ServiceStatus::Down)
    }

    pub fn endpoint(&self) -> &str {
        &self.location.endpoint
    }

    /// 从总线消息体解码；缺少字段或字段为空时返回错误
    pub fn from_value(body: &Value) -> Result<Self> {
        let announcement = Self::deserialize(body)?;
        if announcement.name.is_empty() {
            return Err(FlareError::missing_field("name"));
        }
        if announcement.location.endpoint.is_empty() {
            return Err(FlareError::missing_field("location.endpoint"));
        }
        Ok(announcement)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_env() -> String {
    DEFAULT_LOOKUP_ENV.to_string()
}

/// 实例查询请求 `{ name, version?, env? }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupRequest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_env")]
    pub env: String,
}

impl LookupRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            env: default_env(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn from_value(body: &Value) -> Result<Self> {
        let request = Self::deserialize(body)?;
        if request.name.is_empty() {
            return Err(FlareError::missing_field("name"));
        }
        Ok(request)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 查询应答 `{ status: 200, baseUrl }` 或 `{ status: 404 }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupReply {
    pub status: u16,
    #[serde(rename = "baseUrl", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl LookupReply {
    pub fn found(base_url: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            base_url: Some(base_url.into()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            base_url: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == STATUS_OK && self.base_url.is_some()
    }

    pub fn from_value(body: &Value) -> Result<Self> {
        Ok(Self::deserialize(body)?)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
