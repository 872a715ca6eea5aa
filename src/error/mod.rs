//! 错误处理模块
//!
//! 提供统一的错误处理机制，支持错误代码分类和错误转换。
//! 协作方（注册中心、消息总线）的适配层使用 `anyhow` 返回基础设施错误，
//! 再通过 [`InfraResultExt::into_flare`] 转换为 [`FlareError`]。

pub mod builder;
pub mod code;
pub mod conversions;
pub mod flare_error;
pub mod localized;

pub use builder::ErrorBuilder;
pub use code::{ErrorCategory, ErrorCode};
pub use flare_error::{FlareError, Result};
pub use localized::LocalizedError;

/// 基础设施层默认使用的结果类型
pub type InfraResult<T> = anyhow::Result<T>;

/// 将基础设施错误转换为 `FlareError`
pub fn map_infra_error<E, S>(error: E, code: ErrorCode, message: S) -> FlareError
where
    E: std::fmt::Display,
    S: Into<String>,
{
    ErrorBuilder::new(code, message.into())
        .details(error.to_string())
        .build_error()
}

/// `InfraResult` 的辅助扩展，用于快速转换为统一的错误类型
pub trait InfraResultExt<T> {
    fn into_flare<S>(self, code: ErrorCode, message: S) -> Result<T>
    where
        S: Into<String>;
}

impl<T> InfraResultExt<T> for InfraResult<T> {
    fn into_flare<S>(self, code: ErrorCode, message: S) -> Result<T>
    where
        S: Into<String>,
    {
        self.map_err(|err| map_infra_error(err, code, message))
    }
}
