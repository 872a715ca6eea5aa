//! 错误类型转换实现

use super::{ErrorCode, FlareError, LocalizedError};
use std::io;

impl From<io::Error> for FlareError {
    fn from(err: io::Error) -> Self {
        FlareError::io(err.to_string())
    }
}

impl From<serde_json::Error> for FlareError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            FlareError::localized(ErrorCode::MessageDecodeFailed, format!("JSON 解码错误: {}", err))
        } else {
            FlareError::serialization_error(format!("JSON 序列化错误: {}", err))
        }
    }
}

impl From<toml::de::Error> for FlareError {
    fn from(err: toml::de::Error) -> Self {
        FlareError::configuration_error(format!("TOML 解析错误: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for FlareError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        FlareError::timeout(err.to_string())
    }
}

impl From<LocalizedError> for FlareError {
    fn from(err: LocalizedError) -> Self {
        FlareError::Localized {
            code: err.code,
            reason: err.reason,
            details: err.details,
            params: err.params,
            timestamp: err.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_maps_to_decode_failure() {
        let err: FlareError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), Some(ErrorCode::MessageDecodeFailed));
    }

    #[tokio::test]
    async fn elapsed_maps_to_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        let err: FlareError = elapsed.into();
        assert_eq!(err.code(), Some(ErrorCode::OperationTimeout));
    }
}
