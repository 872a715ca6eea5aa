//! 进程内注册中心
//!
//! 用于单进程部署、本地开发和测试。

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::trait_def::RegistryClient;
use super::types::{RecordFilter, Registration, RegistryRecord};
use crate::error::Result;

/// 进程内注册中心
#[derive(Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<String, RegistryRecord>>,
    // 通过 register 登记、尚未 deregister 的 ID
    registered: RwLock<HashSet<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布一条记录（模拟其他进程写入注册中心）
    ///
    /// `registration` 为空时分配新的 ID，返回最终使用的 ID。
    pub async fn publish(&self, mut record: RegistryRecord) -> String {
        if record.registration.is_empty() {
            record.registration = uuid::Uuid::new_v4().to_string();
        }
        let id = record.registration.clone();
        debug!(registration_id = %id, name = %record.name, "Record published to in-memory registry");
        self.records.write().await.insert(id.clone(), record);
        id
    }

    /// 删除一条记录（模拟其他进程注销实例）
    pub async fn remove(&self, registration_id: &str) -> Option<RegistryRecord> {
        self.records.write().await.remove(registration_id)
    }

    /// 通过 `register` 登记且仍然有效的 ID
    pub async fn registered_ids(&self) -> HashSet<String> {
        self.registered.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn query_all(&self) -> Result<Vec<RegistryRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn query_matching(&self, filter: &RecordFilter) -> Result<Vec<RegistryRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        let id = registration.registration_id.clone();
        {
            let mut records = self.records.write().await;
            let merged = match records.remove(&id) {
                Some(existing) => registration.merge_into(existing),
                None => registration.to_record(),
            };
            records.insert(id.clone(), merged);
        }
        self.registered.write().await.insert(id);
        Ok(())
    }

    async fn deregister(&self, registration_id: &str) -> Result<()> {
        self.records.write().await.remove(registration_id);
        self.registered.write().await.remove(registration_id);
        Ok(())
    }
}
