//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 连接相关错误
/// - 2000-2999: 注册中心相关错误
/// - 3000-3999: 消息总线相关错误
/// - 4000-4999: 消息载荷相关错误
/// - 5000-5999: 服务发现相关错误
/// - 6000-6999: 系统相关错误
/// - 8000-8999: 序列化相关错误
/// - 9000-9999: 通用错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 连接相关错误 (1000-1999)
    // ============================================================
    ConnectionFailed = 1000,

    // ============================================================
    // 注册中心相关错误 (2000-2999)
    // ============================================================
    RegistryUnavailable = 2000,
    RegistryQueryFailed = 2001,
    RegistrationFailed = 2002,
    DeregistrationFailed = 2003,

    // ============================================================
    // 消息总线相关错误 (3000-3999)
    // ============================================================
    BusNotReady = 3000,
    NoSubscriber = 3001,
    ReplyTimeout = 3002,
    ReplyDropped = 3003,
    BusClosed = 3004,

    // ============================================================
    // 消息载荷相关错误 (4000-4999)
    // ============================================================
    MessageFormatError = 4000,
    MessageDecodeFailed = 4001,
    MissingField = 4002,

    // ============================================================
    // 服务发现相关错误 (5000-5999)
    // ============================================================
    ResolverFailed = 5001,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    InternalError = 6000,
    ServiceUnavailable = 6001,
    ConfigurationError = 6003,

    // ============================================================
    // 序列化相关错误 (8000-8999)
    // ============================================================
    SerializationError = 8000,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    OperationTimeout = 9004,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::ConnectionFailed),
            2000 => Some(ErrorCode::RegistryUnavailable),
            2001 => Some(ErrorCode::RegistryQueryFailed),
            2002 => Some(ErrorCode::RegistrationFailed),
            2003 => Some(ErrorCode::DeregistrationFailed),
            3000 => Some(ErrorCode::BusNotReady),
            3001 => Some(ErrorCode::NoSubscriber),
            3002 => Some(ErrorCode::ReplyTimeout),
            3003 => Some(ErrorCode::ReplyDropped),
            3004 => Some(ErrorCode::BusClosed),
            4000 => Some(ErrorCode::MessageFormatError),
            4001 => Some(ErrorCode::MessageDecodeFailed),
            4002 => Some(ErrorCode::MissingField),
            5001 => Some(ErrorCode::ResolverFailed),
            6000 => Some(ErrorCode::InternalError),
            6001 => Some(ErrorCode::ServiceUnavailable),
            6003 => Some(ErrorCode::ConfigurationError),
            8000 => Some(ErrorCode::SerializationError),
            9004 => Some(ErrorCode::OperationTimeout),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::RegistryQueryFailed => "REGISTRY_QUERY_FAILED",
            ErrorCode::RegistrationFailed => "REGISTRATION_FAILED",
            ErrorCode::DeregistrationFailed => "DEREGISTRATION_FAILED",
            ErrorCode::BusNotReady => "BUS_NOT_READY",
            ErrorCode::NoSubscriber => "NO_SUBSCRIBER",
            ErrorCode::ReplyTimeout => "REPLY_TIMEOUT",
            ErrorCode::ReplyDropped => "REPLY_DROPPED",
            ErrorCode::BusClosed => "BUS_CLOSED",
            ErrorCode::MessageFormatError => "MESSAGE_FORMAT_ERROR",
            ErrorCode::MessageDecodeFailed => "MESSAGE_DECODE_FAILED",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::ResolverFailed => "RESOLVER_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Registry,
            3000..=3999 => ErrorCategory::Bus,
            4000..=4999 => ErrorCategory::Message,
            5000..=5999 => ErrorCategory::Discovery,
            6000..=6999 => ErrorCategory::System,
            8000..=8999 => ErrorCategory::Serialization,
            _ => ErrorCategory::General,
        }
    }

    /// 判断是否为瞬时错误（下一次事件触发时可能自愈）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::RegistryUnavailable
                | ErrorCode::RegistryQueryFailed
                | ErrorCode::ReplyTimeout
                | ErrorCode::ServiceUnavailable
                | ErrorCode::OperationTimeout
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Connection,
    Registry,
    Bus,
    Message,
    Discovery,
    System,
    Serialization,
    General,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Connection => write!(f, "CONNECTION"),
            ErrorCategory::Registry => write!(f, "REGISTRY"),
            ErrorCategory::Bus => write!(f, "BUS"),
            ErrorCategory::Message => write!(f, "MESSAGE"),
            ErrorCategory::Discovery => write!(f, "DISCOVERY"),
            ErrorCategory::System => write!(f, "SYSTEM"),
            ErrorCategory::Serialization => write!(f, "SERIALIZATION"),
            ErrorCategory::General => write!(f, "GENERAL"),
        }
    }
}
