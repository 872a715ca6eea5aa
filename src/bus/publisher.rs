//! 地址绑定的发布器与发布器缓存

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::BusChannel;
use crate::error::Result;

/// 绑定到固定地址的发布器
#[derive(Clone)]
pub struct EventPublisher {
    address: String,
    bus: Arc<dyn BusChannel>,
}

impl EventPublisher {
    pub fn new(address: impl Into<String>, bus: Arc<dyn BusChannel>) -> Self {
        Self {
            address: address.into(),
            bus,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// 发布事件，返回投递数量
    pub async fn publish(&self, body: Value) -> Result<usize> {
        self.bus.publish(&self.address, body).await
    }

    /// 发送请求并等待应答
    pub async fn request(&self, body: Value) -> Result<Value> {
        self.bus.request(&self.address, body).await
    }
}

/// 按地址缓存的发布器
///
/// 同一地址的发布器只创建一次，之后复用。
pub struct PublisherCache {
    bus: Arc<dyn BusChannel>,
    publishers: RwLock<HashMap<String, EventPublisher>>,
}

impl PublisherCache {
    pub fn new(bus: Arc<dyn BusChannel>) -> Self {
        Self {
            bus,
            publishers: RwLock::new(HashMap::new()),
        }
    }

    /// 获取地址对应的发布器，首次访问时创建
    pub async fn get(&self, address: &str) -> EventPublisher {
        if let Some(publisher) = self.publishers.read().await.get(address) {
            return publisher.clone();
        }

        let mut publishers = self.publishers.write().await;
        publishers
            .entry(address.to_string())
            .or_insert_with(|| {
                debug!(address = %address, "Creating publisher");
                EventPublisher::new(address, self.bus.clone())
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.publishers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.publishers.read().await.is_empty()
    }
}
