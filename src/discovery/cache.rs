//! 本地实例缓存
//!
//! 以 `registration_id` 为键保存已导入的 [`ServiceRecord`]。写操作互斥，
//! 读操作在读锁下复制出一致的快照，不会观察到执行到一半的增删。

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::record::ServiceRecord;

/// 本地实例缓存
#[derive(Default)]
pub struct LocalInstanceCache {
    records: RwLock<HashMap<String, ServiceRecord>>,
}

impl LocalInstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入记录
    ///
    /// 同一 `registration_id` 已存在时不做任何修改并返回 `false`，
    /// 并发导入同一记录时只有一个调用者会得到 `true`。
    pub async fn add(&self, record: ServiceRecord) -> bool {
        let mut records = self.records.write().await;
        if records.contains_key(record.registration_id()) {
            return false;
        }
        records.insert(record.registration_id().to_string(), record);
        true
    }

    /// 删除所有满足条件的记录，返回被删除的记录
    pub async fn remove_where<F>(&self, predicate: F) -> Vec<ServiceRecord>
    where
        F: Fn(&ServiceRecord) -> bool,
    {
        let mut records = self.records.write().await;
        let ids: Vec<String> = records
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.registration_id().to_string())
            .collect();

        ids.iter().filter_map(|id| records.remove(id)).collect()
    }

    /// 按逻辑键精确查找
    pub async fn find(&self, name: &str, version: &str, environment: &str) -> Vec<ServiceRecord> {
        let records = self.records.read().await;
        records
            .values()
            .filter(|record| record.matches_key(name, version, environment))
            .cloned()
            .collect()
    }

    pub async fn contains_registration(&self, registration_id: &str) -> bool {
        self.records.read().await.contains_key(registration_id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// 当前全部记录的快照（无顺序保证）
    pub async fn snapshot(&self) -> Vec<ServiceRecord> {
        self.records.read().await.values().cloned().collect()
    }
}
