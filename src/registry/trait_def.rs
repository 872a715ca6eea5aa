//! 注册中心客户端 Trait 定义

use super::types::{RecordFilter, Registration, RegistryRecord};
use crate::error::Result;
use async_trait::async_trait;

/// 注册中心客户端
///
/// 注册中心由多个进程共享，最终一致；实现方必须保证
/// `register` 与 `deregister` 幂等，跨进程竞争依赖这一点保持安全。
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 获取注册中心当前全部记录的快照
    async fn query_all(&self) -> Result<Vec<RegistryRecord>>;

    /// 获取满足过滤条件的记录快照
    async fn query_matching(&self, filter: &RecordFilter) -> Result<Vec<RegistryRecord>>;

    /// 以 `registration_id` 为键插入一条注册；已存在时合并注册字段，保留其状态与其他元数据
    async fn register(&self, registration: &Registration) -> Result<()>;

    /// 移除一条注册；不存在时什么也不做
    async fn deregister(&self, registration_id: &str) -> Result<()>;
}
