//! 统一错误类型

use super::code::ErrorCode;
use super::localized::LocalizedError;
use std::collections::HashMap;
use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug, Clone)]
pub enum FlareError {
    /// 带错误代码的错误
    #[error("错误 [{code}] {reason}", code = .code.as_str())]
    Localized {
        code: ErrorCode,
        reason: String,
        details: Option<String>,
        params: Option<HashMap<String, String>>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// 系统错误（内部错误）
    #[error("系统错误: {0}")]
    System(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl FlareError {
    pub fn localized(code: ErrorCode, reason: impl Into<String>) -> Self {
        FlareError::Localized {
            code,
            reason: reason.into(),
            details: None,
            params: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn system(msg: impl Into<String>) -> Self {
        FlareError::System(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        FlareError::Io(msg.into())
    }

    // ============================================================
    // 便捷方法：注册中心相关错误
    // ============================================================

    /// 注册中心不可达
    pub fn registry_unavailable(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::RegistryUnavailable, reason)
    }

    pub fn registration_failed(registration_id: &str, reason: impl Into<String>) -> Self {
        Self::with_registration(ErrorCode::RegistrationFailed, registration_id, reason)
    }

    pub fn deregistration_failed(registration_id: &str, reason: impl Into<String>) -> Self {
        Self::with_registration(ErrorCode::DeregistrationFailed, registration_id, reason)
    }

    fn with_registration(code: ErrorCode, registration_id: &str, reason: impl Into<String>) -> Self {
        let mut params = HashMap::new();
        params.insert("registration_id".to_string(), registration_id.to_string());
        FlareError::Localized {
            code,
            reason: reason.into(),
            details: None,
            params: Some(params),
            timestamp: chrono::Utc::now(),
        }
    }

    // ============================================================
    // 便捷方法：消息总线相关错误
    // ============================================================

    /// 地址上没有订阅者
    pub fn no_subscriber(address: impl Into<String>) -> Self {
        let address = address.into();
        let mut params = HashMap::new();
        params.insert("address".to_string(), address.clone());
        FlareError::Localized {
            code: ErrorCode::NoSubscriber,
            reason: format!("no subscriber registered on {}", address),
            details: None,
            params: Some(params),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn bus_not_ready(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::BusNotReady, reason)
    }

    pub fn bus_closed(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::BusClosed, reason)
    }

    pub fn reply_timeout(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::ReplyTimeout, reason)
    }

    pub fn reply_dropped(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::ReplyDropped, reason)
    }

    // ============================================================
    // 便捷方法：消息载荷相关错误
    // ============================================================

    pub fn message_format_error(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::MessageFormatError, reason)
    }

    /// 缺少必填字段
    pub fn missing_field(field: &str) -> Self {
        let mut params = HashMap::new();
        params.insert("field".to_string(), field.to_string());
        FlareError::Localized {
            code: ErrorCode::MissingField,
            reason: format!("missing required field `{}`", field),
            details: None,
            params: Some(params),
            timestamp: chrono::Utc::now(),
        }
    }

    // ============================================================
    // 便捷方法：通用错误
    // ============================================================

    pub fn resolver_failed(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::ResolverFailed, reason)
    }

    pub fn configuration_error(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::ConfigurationError, reason)
    }

    pub fn serialization_error(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::SerializationError, reason)
    }

    /// 操作超时
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::OperationTimeout, reason)
    }

    // ============================================================
    // 信息获取方法
    // ============================================================

    /// 获取错误代码
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            FlareError::Localized { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 获取错误原因
    pub fn reason(&self) -> &str {
        match self {
            FlareError::Localized { reason, .. } => reason,
            FlareError::System(msg) => msg,
            FlareError::Io(msg) => msg,
        }
    }

    /// 转换为可序列化的错误信息
    pub fn to_localized(self) -> LocalizedError {
        match self {
            FlareError::Localized {
                code,
                reason,
                details,
                params,
                timestamp,
            } => LocalizedError {
                code,
                reason,
                details,
                params,
                timestamp,
            },
            FlareError::System(msg) => LocalizedError::new(ErrorCode::InternalError, msg),
            FlareError::Io(msg) => LocalizedError::new(ErrorCode::ConnectionFailed, msg),
        }
    }

    /// 判断是否为瞬时错误
    pub fn is_transient(&self) -> bool {
        match self {
            FlareError::Io(_) => true,
            _ => self.code().map(|code| code.is_transient()).unwrap_or(false),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, FlareError>;
