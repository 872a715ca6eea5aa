//! 有界工作池
//!
//! 可能阻塞的工作（注册中心访问、回退解析）在这里执行，不占用总线的投递任务。
//! 并发度由信号量限制，超出的任务排队等待许可。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::{FlareError, Result};

/// 有界工作池
#[derive(Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    size: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    closed: Arc<AtomicBool>,
}

impl WorkerPool {
    /// 创建工作池，`size` 至少为 1
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        let name: String = name.into();
        debug!(pool = %name, size, "Worker pool created");
        Self {
            name: Arc::from(name),
            size,
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 已提交但尚未结束的任务数
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 提交任务；工作池关闭后拒绝新任务
    pub fn spawn<F>(&self, work: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(FlareError::localized(
                crate::error::ErrorCode::ServiceUnavailable,
                format!("worker pool {} is shut down", self.name),
            ));
        }

        let permits = self.permits.clone();
        let name = self.name.clone();
        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(pool = %name, "Worker pool semaphore closed, dropping task");
                return;
            };
            work.await;
        });
        Ok(())
    }

    /// 停止接收新任务并等待在途任务结束
    ///
    /// 在 `timeout` 内全部结束时返回 `true`。
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.closed.store(true, Ordering::Release);
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                debug!(pool = %self.name, "Worker pool drained");
                true
            }
            Err(_) => {
                warn!(
                    pool = %self.name,
                    in_flight = self.tracker.len(),
                    timeout = ?timeout,
                    "Worker pool shutdown timed out"
                );
                false
            }
        }
    }
}
