//! 消息总线抽象
//!
//! 桥接器只依赖 [`BusChannel`] 契约：按地址订阅、发布和请求/响应。
//! [`LocalBus`] 是该契约的进程内实现。

pub mod listener;
pub mod local;
pub mod publisher;
pub mod ready;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::{FlareError, Result};

pub use listener::ListenerTable;
pub use local::LocalBus;
pub use publisher::{EventPublisher, PublisherCache};
pub use ready::{readiness, ReadySignal, ReadyWaiter};

/// 消息处理回调
///
/// 在总线的投递任务上同步调用，不能阻塞；耗时工作应交给工作池。
pub type MessageHandler = Arc<dyn Fn(BusMessage) + Send + Sync>;

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 投递给订阅者的一条消息
#[derive(Debug)]
pub struct BusMessage {
    address: String,
    body: Value,
    reply_to: Option<oneshot::Sender<Value>>,
}

impl BusMessage {
    /// 发布/订阅消息
    pub fn new(address: impl Into<String>, body: Value) -> Self {
        Self {
            address: address.into(),
            body,
            reply_to: None,
        }
    }

    /// 请求消息，应答经由返回的接收端送回
    pub fn request(address: impl Into<String>, body: Value) -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                address: address.into(),
                body,
                reply_to: Some(tx),
            },
            rx,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// 发送应答
    pub fn reply(self, body: Value) -> Result<()> {
        let reply_to = self.reply_to.ok_or_else(|| {
            FlareError::message_format_error(format!("message on {} does not expect a reply", self.address))
        })?;
        reply_to
            .send(body)
            .map_err(|_| FlareError::reply_dropped(format!("requester on {} went away", self.address)))
    }
}

/// 消息总线契约
#[async_trait]
pub trait BusChannel: Send + Sync {
    /// 订阅地址；每条投递到该地址的消息调用一次 `handler`
    async fn subscribe(&self, address: &str, handler: MessageHandler) -> Result<SubscriptionId>;

    /// 取消订阅；未知句柄直接忽略
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// 发布到地址上的全部订阅者，返回投递数量
    async fn publish(&self, address: &str, body: Value) -> Result<usize>;

    /// 发送请求并等待恰好一个订阅者应答
    ///
    /// 没有订阅者或传输层超时时返回错误。
    async fn request(&self, address: &str, body: Value) -> Result<Value>;

    /// 总线就绪信号
    fn ready(&self) -> ReadyWaiter;
}
