//! 进程内消息总线
//!
//! 每个订阅拥有一个有界投递队列和一个投递任务，处理回调在投递任务上依次调用。
//! 请求在同一地址的订阅者之间轮询分发，由其中一个订阅者应答。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::ready::{readiness, ReadySignal, ReadyWaiter};
use super::{BusChannel, BusMessage, MessageHandler, SubscriptionId};
use crate::config::BusConfig;
use crate::error::{FlareError, Result};

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<BusMessage>,
}

struct LocalBusInner {
    config: BusConfig,
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    cursor: AtomicUsize,
    ready: ReadySignal,
}

/// 进程内消息总线
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<LocalBusInner>,
}

impl LocalBus {
    /// 创建总线并立即标记就绪
    pub fn new(config: BusConfig) -> Self {
        let (bus, signal) = Self::pending(config);
        signal.mark_ready();
        bus
    }

    /// 创建尚未就绪的总线，由调用方在启动完成后标记就绪
    pub fn pending(config: BusConfig) -> (Self, ReadySignalHandle) {
        let (ready, _) = readiness();
        let inner = Arc::new(LocalBusInner {
            config,
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cursor: AtomicUsize::new(0),
            ready,
        });
        (
            Self {
                inner: inner.clone(),
            },
            ReadySignalHandle { inner },
        )
    }

    /// 地址上的订阅者数量
    pub async fn subscriber_count(&self, address: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .await
            .get(address)
            .map(Vec::len)
            .unwrap_or(0)
    }

    async fn senders(&self, address: &str) -> Vec<mpsc::Sender<BusMessage>> {
        self.inner
            .subscribers
            .read()
            .await
            .get(address)
            .map(|subs| subs.iter().map(|s| s.tx.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// 标记 [`LocalBus`] 就绪的句柄
pub struct ReadySignalHandle {
    inner: Arc<LocalBusInner>,
}

impl ReadySignalHandle {
    pub fn mark_ready(&self) {
        info!("Local bus ready");
        self.inner.ready.mark_ready();
    }
}

fn spawn_delivery(
    address: String,
    id: SubscriptionId,
    handler: MessageHandler,
    mut rx: mpsc::Receiver<BusMessage>,
) {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let handler = handler.clone();
            if catch_unwind(AssertUnwindSafe(move || handler(message))).is_err() {
                error!(address = %address, subscription = %id, "Message handler panicked");
            }
        }
        debug!(address = %address, subscription = %id, "Delivery task stopped");
    });
}

#[async_trait]
impl BusChannel for LocalBus {
    async fn subscribe(&self, address: &str, handler: MessageHandler) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.config.delivery_buffer.max(1));
        spawn_delivery(address.to_string(), id, handler, rx);

        self.inner
            .subscribers
            .write()
            .await
            .entry(address.to_string())
            .or_default()
            .push(Subscriber { id, tx });

        info!(address = %address, subscription = %id, "Consumer registered");
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut subscribers = self.inner.subscribers.write().await;
        for subs in subscribers.values_mut() {
            subs.retain(|s| s.id != id);
        }
        subscribers.retain(|_, subs| !subs.is_empty());
        debug!(subscription = %id, "Consumer unregistered");
        Ok(())
    }

    async fn publish(&self, address: &str, body: Value) -> Result<usize> {
        let senders = self.senders(address).await;
        let mut delivered = 0;
        for tx in senders {
            if tx.send(BusMessage::new(address, body.clone())).await.is_ok() {
                delivered += 1;
            }
        }
        if delivered == 0 {
            debug!(address = %address, "Published message had no subscribers");
        }
        Ok(delivered)
    }

    async fn request(&self, address: &str, body: Value) -> Result<Value> {
        let senders = self.senders(address).await;
        if senders.is_empty() {
            return Err(FlareError::no_subscriber(address));
        }

        let index = self.inner.cursor.fetch_add(1, Ordering::Relaxed) % senders.len();
        let (message, reply_rx) = BusMessage::request(address, body);
        senders[index]
            .send(message)
            .await
            .map_err(|_| FlareError::bus_closed(format!("subscriber on {} is gone", address)))?;

        let timeout = self.inner.config.request_timeout();
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(FlareError::reply_dropped(format!(
                "subscriber on {} dropped the request without replying",
                address
            ))),
            Err(_) => {
                warn!(address = %address, timeout = ?timeout, "Request timed out waiting for a reply");
                Err(FlareError::reply_timeout(format!(
                    "no reply on {} within {:?}",
                    address, timeout
                )))
            }
        }
    }

    fn ready(&self) -> ReadyWaiter {
        self.inner.ready.waiter()
    }
}
