//! 就绪信号
//!
//! 消息总线启动完成后发出一次性就绪通知，等待方只需等待一次。

use std::time::Duration;
use tokio::sync::watch;

use crate::error::{FlareError, Result};

/// 创建一对就绪信号发送端与等待端
pub fn readiness() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, ReadyWaiter { rx })
}

/// 就绪信号发送端
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    /// 标记为就绪；重复调用无副作用
    pub fn mark_ready(&self) {
        self.tx.send_replace(true);
    }

    /// 获取新的等待端
    pub fn waiter(&self) -> ReadyWaiter {
        ReadyWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

/// 就绪信号等待端
#[derive(Debug, Clone)]
pub struct ReadyWaiter {
    rx: watch::Receiver<bool>,
}

impl ReadyWaiter {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待就绪；发送端在就绪前被丢弃时返回错误
    pub async fn wait(mut self) -> Result<()> {
        self.rx
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| FlareError::bus_not_ready("bus was dropped before becoming ready"))
    }

    /// 在给定时间内等待就绪
    pub async fn wait_timeout(self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| FlareError::bus_not_ready(format!("bus not ready after {:?}", timeout)))?
    }
}
