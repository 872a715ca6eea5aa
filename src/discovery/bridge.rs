//! 服务发现桥接器
//!
//! 把注册中心的记录导入本地实例缓存，并在消息总线上回答实例查询。
//!
//! - 启动时全量对账：导入所有本地未知的注册记录。
//! - 公告地址：收到 UP/DOWN 公告后按 `(name, endpoint)` 重新查询注册中心，
//!   以查询结果为准导入新记录或删除已消失的记录。
//! - 请求地址：按 `(name, version, env)` 查本地缓存，未命中时交给回退解析器，
//!   始终回复 200 或 404。
//!
//! 总线投递任务只负责解码，注册中心与解析器访问都在共享工作池上执行。

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::cache::LocalInstanceCache;
use super::messages::{Announcement, LookupReply, LookupRequest, ServiceStatus};
use super::record::{RecordDefaults, ServiceRecord};
use super::resolver::FallbackResolver;
use super::selector::InstanceSelector;
use super::stats::{BridgeStats, StatsSnapshot};
use crate::bus::{BusChannel, BusMessage, ListenerTable, MessageHandler, SubscriptionId};
use crate::config::BridgeConfig;
use crate::error::{FlareError, Result};
use crate::registry::{RecordFilter, RegistryClient, RegistryRecord};
use crate::runtime::WorkerPool;

/// 一次公告对账的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 新导入的记录数
    Imported(usize),
    /// 被删除并注销的 registration ID
    Removed(Vec<String>),
    /// 状态未知，未做处理
    Ignored,
}

struct BridgeInner {
    config: BridgeConfig,
    defaults: RecordDefaults,
    cache: LocalInstanceCache,
    registry: Arc<dyn RegistryClient>,
    resolver: Arc<dyn FallbackResolver>,
    selector: InstanceSelector,
    pool: WorkerPool,
    stats: BridgeStats,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    /// 串行化缓存写入与对应的注册/注销调用
    reconcile_lock: Mutex<()>,
}

/// 服务发现桥接器
///
/// 克隆开销很小，所有克隆共享同一份缓存与工作池。
#[derive(Clone)]
pub struct DiscoveryBridge {
    inner: Arc<BridgeInner>,
}

impl DiscoveryBridge {
    pub fn new(
        config: BridgeConfig,
        registry: Arc<dyn RegistryClient>,
        resolver: Arc<dyn FallbackResolver>,
    ) -> Self {
        let pool = WorkerPool::new("discovery-bridge", config.worker_pool_size);
        Self::with_pool(config, registry, resolver, pool)
    }

    /// 使用外部提供的工作池
    pub fn with_pool(
        config: BridgeConfig,
        registry: Arc<dyn RegistryClient>,
        resolver: Arc<dyn FallbackResolver>,
        pool: WorkerPool,
    ) -> Self {
        let defaults = config.record_defaults();
        let selector = InstanceSelector::new(config.load_balance);
        Self {
            inner: Arc::new(BridgeInner {
                config,
                defaults,
                cache: LocalInstanceCache::new(),
                registry,
                resolver,
                selector,
                pool,
                stats: BridgeStats::default(),
                subscriptions: Mutex::new(Vec::new()),
                reconcile_lock: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &LocalInstanceCache {
        &self.inner.cache
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// 启动桥接器
    ///
    /// 等待总线就绪后安装监听表，再把启动对账提交到工作池。
    /// 对账失败只记录日志，不影响已安装的订阅。
    pub async fn start(&self, bus: &Arc<dyn BusChannel>) -> Result<()> {
        let ready_timeout = self.inner.config.ready_timeout();
        debug!(timeout = ?ready_timeout, "Waiting for message bus readiness");
        bus.ready().wait_timeout(ready_timeout).await?;

        let installed = self.listener_table()?.install(bus.as_ref()).await?;
        self.inner
            .subscriptions
            .lock()
            .await
            .extend(installed.into_values());

        info!(
            announce_address = %self.inner.config.announce_address,
            request_address = %self.inner.config.request_address,
            environment = %self.inner.defaults.environment,
            "Discovery bridge listening"
        );

        let bridge = self.clone();
        let spawned = self.inner.pool.spawn(async move {
            match bridge.reconcile_all().await {
                Ok(imported) => {
                    info!(imported, "Startup reconciliation completed");
                }
                Err(e) => {
                    bridge.inner.stats.record_failed_reconciliation();
                    error!(error = %e, "Startup reconciliation failed");
                }
            }
        });
        if let Err(e) = spawned {
            self.inner.stats.record_failed_reconciliation();
            warn!(error = %e, "Startup reconciliation not scheduled");
        }
        Ok(())
    }

    /// 取消桥接器安装的全部订阅
    pub async fn stop(&self, bus: &dyn BusChannel) -> Result<()> {
        let subscriptions: Vec<SubscriptionId> =
            self.inner.subscriptions.lock().await.drain(..).collect();
        for id in subscriptions {
            if let Err(e) = bus.unsubscribe(id).await {
                warn!(subscription = %id, error = %e, "Failed to unsubscribe");
            }
        }
        info!("Discovery bridge stopped listening");
        Ok(())
    }

    /// 构建公告地址与请求地址的监听表
    pub fn listener_table(&self) -> Result<ListenerTable> {
        ListenerTable::new()
            .on(
                self.inner.config.announce_address.clone(),
                self.announcement_handler(),
            )?
            .on(self.inner.config.request_address.clone(), self.request_handler())
    }

    fn announcement_handler(&self) -> MessageHandler {
        let bridge = self.clone();
        Arc::new(move |message: BusMessage| {
            let announcement = match Announcement::from_value(message.body()) {
                Ok(announcement) => announcement,
                Err(e) => {
                    bridge.inner.stats.record_dropped();
                    warn!(address = %message.address(), error = %e, "Dropping malformed announcement");
                    return;
                }
            };

            let worker = bridge.clone();
            let spawned = bridge.inner.pool.spawn(async move {
                if let Err(e) = worker.handle_announcement(&announcement).await {
                    warn!(
                        name = %announcement.name,
                        endpoint = %announcement.endpoint(),
                        transient = e.is_transient(),
                        error = %e,
                        "Announcement reconciliation abandoned"
                    );
                }
            });
            if spawned.is_err() {
                bridge.inner.stats.record_dropped();
                warn!("Worker pool closed, announcement dropped");
            }
        })
    }

    fn request_handler(&self) -> MessageHandler {
        let bridge = self.clone();
        Arc::new(move |message: BusMessage| {
            let request = match LookupRequest::from_value(message.body()) {
                Ok(request) => request,
                Err(e) => {
                    bridge.inner.stats.record_dropped();
                    warn!(address = %message.address(), error = %e, "Malformed lookup request, replying 404");
                    if let Err(e) = message.reply(LookupReply::not_found().to_value()) {
                        debug!(error = %e, "Lookup reply not delivered");
                    }
                    return;
                }
            };

            let worker = bridge.clone();
            let spawned = bridge.inner.pool.spawn(async move {
                let reply = worker.lookup(&request).await;
                if let Err(e) = message.reply(reply.to_value()) {
                    debug!(name = %request.name, error = %e, "Lookup reply not delivered");
                }
            });
            if spawned.is_err() {
                bridge.inner.stats.record_dropped();
                warn!("Worker pool closed, lookup request dropped");
            }
        })
    }

    /// 全量对账：导入注册中心中本地尚未缓存的全部记录
    pub async fn reconcile_all(&self) -> Result<usize> {
        let records = self
            .registry_call("query_all", self.inner.registry.query_all())
            .await?;
        debug!(records = records.len(), "Registry snapshot fetched");
        self.import(records).await
    }

    /// 处理一条公告
    pub async fn handle_announcement(&self, announcement: &Announcement) -> Result<ReconcileOutcome> {
        if announcement.status == ServiceStatus::Unknown {
            debug!(name = %announcement.name, "Ignoring announcement with unknown status");
            return Ok(ReconcileOutcome::Ignored);
        }

        let filter = RecordFilter::by_name_and_endpoint(&announcement.name, announcement.endpoint());
        let snapshot = self
            .registry_call("query_matching", self.inner.registry.query_matching(&filter))
            .await?;

        match announcement.status {
            ServiceStatus::Up => {
                let imported = self.import(snapshot).await?;
                info!(
                    name = %announcement.name,
                    endpoint = %announcement.endpoint(),
                    imported,
                    "Service UP reconciled"
                );
                Ok(ReconcileOutcome::Imported(imported))
            }
            ServiceStatus::Down => {
                let removed = self.remove_missing(announcement, &snapshot).await;
                info!(
                    name = %announcement.name,
                    endpoint = %announcement.endpoint(),
                    removed = removed.len(),
                    "Service DOWN reconciled"
                );
                Ok(ReconcileOutcome::Removed(removed))
            }
            ServiceStatus::Unknown => Ok(ReconcileOutcome::Ignored),
        }
    }

    /// 回答一次实例查询；总是返回 200 或 404
    pub async fn lookup(&self, request: &LookupRequest) -> LookupReply {
        let candidates = self
            .inner
            .cache
            .find(&request.name, &request.version, &request.env)
            .await;

        if let Some(record) = self.inner.selector.select(&candidates) {
            self.inner.stats.record_local_hit();
            debug!(
                name = %request.name,
                version = %request.version,
                env = %request.env,
                base_url = %record.base_url(),
                candidates = candidates.len(),
                "Lookup served from local cache"
            );
            return LookupReply::found(record.base_url());
        }

        let timeout = self.inner.config.resolve_timeout();
        let resolved = tokio::time::timeout(
            timeout,
            self.inner
                .resolver
                .resolve(&request.name, &request.version, &request.env),
        )
        .await;

        match resolved {
            Ok(Ok(Some(base_url))) => {
                self.inner.stats.record_fallback_hit();
                debug!(name = %request.name, base_url = %base_url, "Lookup served by fallback resolver");
                LookupReply::found(base_url)
            }
            Ok(Ok(None)) => {
                self.inner.stats.record_miss();
                debug!(
                    name = %request.name,
                    version = %request.version,
                    env = %request.env,
                    "No instance found"
                );
                LookupReply::not_found()
            }
            Ok(Err(e)) => {
                self.inner.stats.record_miss();
                warn!(name = %request.name, error = %e, "Fallback resolver failed");
                LookupReply::not_found()
            }
            Err(_) => {
                self.inner.stats.record_miss();
                warn!(name = %request.name, timeout = ?timeout, "Fallback resolver timed out");
                LookupReply::not_found()
            }
        }
    }

    /// 导入本地尚未缓存的记录，返回新导入的数量
    ///
    /// 无法解析的记录跳过；注册失败时撤销该记录的缓存并中止剩余导入。
    /// 整个导入持有对账锁，删除必须等在途注册完成后才能执行。
    async fn import(&self, records: Vec<RegistryRecord>) -> Result<usize> {
        let _guard = self.inner.reconcile_lock.lock().await;
        let mut imported = 0;
        for raw in &records {
            let record = match ServiceRecord::from_registry(raw, &self.inner.defaults) {
                Ok(record) => record,
                Err(e) => {
                    warn!(registration_id = %raw.registration, error = %e, "Skipping unusable registry record");
                    continue;
                }
            };

            if self.inner.cache.contains_registration(record.registration_id()).await {
                continue;
            }
            if !self.inner.cache.add(record.clone()).await {
                continue;
            }

            let registration = record.to_registration();
            if let Err(e) = self
                .registry_call("register", self.inner.registry.register(&registration))
                .await
            {
                let id = record.registration_id().to_string();
                self.inner
                    .cache
                    .remove_where(|cached| cached.registration_id() == id)
                    .await;
                error!(registration_id = %id, name = %record.name(), error = %e, "Registration failed, import rolled back");
                return Err(e);
            }

            self.inner.stats.record_imported();
            imported += 1;
            info!(
                registration_id = %record.registration_id(),
                name = %record.name(),
                version = %record.version(),
                environment = %record.environment(),
                base_url = %record.base_url(),
                "Service instance imported"
            );
        }
        Ok(imported)
    }

    /// 删除快照中已不存在的 `(name, endpoint)` 记录并注销
    async fn remove_missing(&self, announcement: &Announcement, snapshot: &[RegistryRecord]) -> Vec<String> {
        let live: HashSet<&str> = snapshot
            .iter()
            .map(|record| record.registration.as_str())
            .collect();
        let name = announcement.name.as_str();
        let endpoint = announcement.endpoint();

        let _guard = self.inner.reconcile_lock.lock().await;
        let removed = self
            .inner
            .cache
            .remove_where(|record| {
                record.name() == name
                    && record.base_url() == endpoint
                    && !live.contains(record.registration_id())
            })
            .await;

        let mut ids = Vec::with_capacity(removed.len());
        for record in removed {
            let id = record.registration_id().to_string();
            match self
                .registry_call("deregister", self.inner.registry.deregister(&id))
                .await
            {
                Ok(()) => {
                    info!(registration_id = %id, name = %name, "Service instance removed");
                }
                Err(e) => {
                    warn!(registration_id = %id, name = %name, error = %e, "Deregistration failed");
                }
            }
            ids.push(id);
        }
        self.inner.stats.record_removed(ids.len());
        ids
    }

    async fn registry_call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(operation, self.inner.config.registry_timeout(), call).await
    }
}

async fn with_timeout<T, F>(operation: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(FlareError::timeout(format!(
            "registry {} timed out after {:?}",
            operation, timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::discovery::resolver::{NoopResolver, RegistryResolver};
    use crate::error::ErrorCode;
    use crate::registry::{InMemoryRegistry, Registration};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    /// 记录调用次数的注册中心，可注入失败与延迟
    #[derive(Default)]
    struct RecordingRegistry {
        inner: InMemoryRegistry,
        registers: Mutex<HashMap<String, usize>>,
        deregisters: Mutex<HashMap<String, usize>>,
        fail_register: AtomicBool,
        fail_query_all: AtomicBool,
        register_delay_ms: AtomicU64,
        query_delay_ms: AtomicU64,
    }

    async fn delay(millis: &AtomicU64) {
        let millis = millis.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    impl RecordingRegistry {
        async fn register_count(&self, id: &str) -> usize {
            self.registers.lock().await.get(id).copied().unwrap_or(0)
        }

        async fn deregister_count(&self, id: &str) -> usize {
            self.deregisters.lock().await.get(id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl RegistryClient for RecordingRegistry {
        async fn query_all(&self) -> Result<Vec<RegistryRecord>> {
            if self.fail_query_all.load(Ordering::SeqCst) {
                return Err(FlareError::registry_unavailable("injected failure"));
            }
            self.inner.query_all().await
        }

        async fn query_matching(&self, filter: &RecordFilter) -> Result<Vec<RegistryRecord>> {
            delay(&self.query_delay_ms).await;
            self.inner.query_matching(filter).await
        }

        async fn register(&self, registration: &Registration) -> Result<()> {
            delay(&self.register_delay_ms).await;
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(FlareError::registration_failed(
                    &registration.registration_id,
                    "injected failure",
                ));
            }
            *self
                .registers
                .lock()
                .await
                .entry(registration.registration_id.clone())
                .or_default() += 1;
            self.inner.register(registration).await
        }

        async fn deregister(&self, registration_id: &str) -> Result<()> {
            *self
                .deregisters
                .lock()
                .await
                .entry(registration_id.to_string())
                .or_default() += 1;
            self.inner.deregister(registration_id).await
        }
    }

    struct CountingResolver {
        calls: AtomicUsize,
        answer: Option<String>,
    }

    impl CountingResolver {
        fn new(answer: Option<&str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer: answer.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl FallbackResolver for CountingResolver {
        async fn resolve(&self, _name: &str, _version: &str, _env: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    fn config() -> BridgeConfig {
        BridgeConfig {
            worker_pool_size: 4,
            ..BridgeConfig::default()
        }
    }

    fn bridge_over(registry: Arc<RecordingRegistry>) -> DiscoveryBridge {
        DiscoveryBridge::new(config(), registry, Arc::new(NoopResolver))
    }

    fn orders_record(id: &str, endpoint: &str) -> RegistryRecord {
        RegistryRecord::new("orders", id, endpoint)
            .with_metadata("version", "2.0.0")
            .with_metadata("env", "dev")
    }

    #[tokio::test]
    async fn importing_the_same_record_twice_keeps_one_entry() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        let bridge = bridge_over(registry.clone());

        assert_eq!(bridge.reconcile_all().await.unwrap(), 1);
        assert_eq!(bridge.reconcile_all().await.unwrap(), 0);

        assert_eq!(bridge.cache().len().await, 1);
        assert_eq!(registry.register_count("r1").await, 1);
    }

    #[tokio::test]
    async fn concurrent_imports_register_once() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        let bridge = bridge_over(registry.clone());

        let (a, b) = tokio::join!(bridge.reconcile_all(), bridge.reconcile_all());
        assert_eq!(a.unwrap() + b.unwrap(), 1);
        assert_eq!(bridge.cache().len().await, 1);
        assert_eq!(registry.register_count("r1").await, 1);
    }

    #[tokio::test]
    async fn up_announcement_imports_only_the_matching_record() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        registry.inner.publish(orders_record("r2", "http://10.0.0.6:8080")).await;
        let bridge = bridge_over(registry);

        let outcome = bridge
            .handle_announcement(&Announcement::up("orders", "http://10.0.0.5:8080"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Imported(1));
        let cached = bridge.cache().find("orders", "2.0.0", "dev").await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].registration_id(), "r1");
        assert_eq!(cached[0].base_url(), "http://10.0.0.5:8080");
    }

    #[tokio::test]
    async fn down_announcement_removes_and_deregisters_once() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        let bridge = bridge_over(registry.clone());
        bridge.reconcile_all().await.unwrap();

        registry.inner.remove("r1").await;
        let down = Announcement::down("orders", "http://10.0.0.5:8080");
        let outcome = bridge.handle_announcement(&down).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Removed(vec!["r1".to_string()]));

        // 重复的 DOWN 不会再次注销
        let outcome = bridge.handle_announcement(&down).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Removed(vec![]));

        assert!(!bridge.cache().contains_registration("r1").await);
        assert_eq!(registry.deregister_count("r1").await, 1);
        assert_eq!(bridge.stats().removed, 1);
    }

    #[tokio::test]
    async fn stale_down_keeps_the_record() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        let bridge = bridge_over(registry.clone());
        bridge.reconcile_all().await.unwrap();

        let outcome = bridge
            .handle_announcement(&Announcement::down("orders", "http://10.0.0.5:8080"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Removed(vec![]));
        assert!(bridge.cache().contains_registration("r1").await);
        assert_eq!(registry.deregister_count("r1").await, 0);
    }

    #[tokio::test]
    async fn down_waits_for_an_in_flight_registration() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        registry.register_delay_ms.store(200, Ordering::SeqCst);
        let bridge = bridge_over(registry.clone());

        let up = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge
                    .handle_announcement(&Announcement::up("orders", "http://10.0.0.5:8080"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // UP 已写入缓存、注册仍在进行时，实例下线
        registry.inner.remove("r1").await;
        let outcome = bridge
            .handle_announcement(&Announcement::down("orders", "http://10.0.0.5:8080"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Removed(vec!["r1".to_string()]));
        assert_eq!(up.await.unwrap().unwrap(), ReconcileOutcome::Imported(1));

        assert!(!bridge.cache().contains_registration("r1").await);
        assert!(registry.query_all().await.unwrap().is_empty());
        let resolver = RegistryResolver::new(registry.clone(), RecordDefaults::default());
        assert_eq!(resolver.resolve("orders", "2.0.0", "dev").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hung_registry_query_times_out_without_touching_the_cache() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        registry.inner.publish(orders_record("r2", "http://10.0.0.6:8080")).await;
        let bridge = DiscoveryBridge::new(
            BridgeConfig {
                registry_timeout_ms: 50,
                ..config()
            },
            registry.clone(),
            Arc::new(NoopResolver),
        );
        bridge
            .handle_announcement(&Announcement::up("orders", "http://10.0.0.6:8080"))
            .await
            .unwrap();

        registry.query_delay_ms.store(500, Ordering::SeqCst);
        let err = bridge
            .handle_announcement(&Announcement::up("orders", "http://10.0.0.5:8080"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::OperationTimeout));
        assert!(!bridge.cache().contains_registration("r1").await);
        assert_eq!(registry.register_count("r1").await, 0);

        registry.inner.remove("r2").await;
        let err = bridge
            .handle_announcement(&Announcement::down("orders", "http://10.0.0.6:8080"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::OperationTimeout));
        assert!(bridge.cache().contains_registration("r2").await);
        assert_eq!(registry.deregister_count("r2").await, 0);
    }

    #[tokio::test]
    async fn unknown_status_is_ignored() {
        let bridge = bridge_over(Arc::new(RecordingRegistry::default()));
        let announcement = Announcement::new("orders", "http://a", ServiceStatus::Unknown);
        assert_eq!(
            bridge.handle_announcement(&announcement).await.unwrap(),
            ReconcileOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn failed_registration_rolls_back_the_cache() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        registry.fail_register.store(true, Ordering::SeqCst);
        let bridge = bridge_over(registry.clone());

        assert!(bridge.reconcile_all().await.is_err());
        assert!(bridge.cache().is_empty().await);

        // 下一次对账自愈
        registry.fail_register.store(false, Ordering::SeqCst);
        assert_eq!(bridge.reconcile_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lookups_reach_every_cached_instance() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://a")).await;
        registry.inner.publish(orders_record("r2", "http://b")).await;
        let bridge = bridge_over(registry);
        bridge.reconcile_all().await.unwrap();

        let request = LookupRequest::new("orders").with_version("2.0.0");
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let reply = bridge.lookup(&request).await;
            assert!(reply.is_found());
            seen.extend(reply.base_url);
        }
        assert!(seen.contains("http://a"));
        assert!(seen.contains("http://b"));
    }

    #[tokio::test]
    async fn cache_miss_consults_the_resolver_exactly_once() {
        let resolver = Arc::new(CountingResolver::new(Some("http://fallback")));
        let bridge = DiscoveryBridge::new(
            config(),
            Arc::new(RecordingRegistry::default()),
            resolver.clone(),
        );

        let reply = bridge.lookup(&LookupRequest::new("billing")).await;
        assert_eq!(reply, LookupReply::found("http://fallback"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.stats().lookups_fallback, 1);
    }

    #[tokio::test]
    async fn cache_miss_without_fallback_is_not_found() {
        let resolver = Arc::new(CountingResolver::new(None));
        let bridge = DiscoveryBridge::new(
            config(),
            Arc::new(RecordingRegistry::default()),
            resolver.clone(),
        );

        let reply = bridge.lookup(&LookupRequest::new("unknown")).await;
        assert_eq!(reply, LookupReply::not_found());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_resolver() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.inner.publish(orders_record("r1", "http://a")).await;
        let resolver = Arc::new(CountingResolver::new(Some("http://fallback")));
        let bridge = DiscoveryBridge::new(config(), registry, resolver.clone());
        bridge.reconcile_all().await.unwrap();

        let reply = bridge
            .lookup(&LookupRequest::new("orders").with_version("2.0.0"))
            .await;
        assert_eq!(reply, LookupReply::found("http://a"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bus_round_trip_announce_then_lookup() {
        let registry = Arc::new(RecordingRegistry::default());
        let bridge = bridge_over(registry.clone());
        let bus: Arc<dyn BusChannel> = Arc::new(LocalBus::default());
        bridge.start(&bus).await.unwrap();

        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        bus.publish(
            &bridge.config().announce_address,
            Announcement::up("orders", "http://10.0.0.5:8080").to_value(),
        )
        .await
        .unwrap();

        let mut reply = LookupReply::not_found();
        for _ in 0..50 {
            let body = bus
                .request(
                    &bridge.config().request_address,
                    json!({ "name": "orders", "version": "2.0.0", "env": "dev" }),
                )
                .await
                .unwrap();
            reply = LookupReply::from_value(&body).unwrap();
            if reply.is_found() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reply, LookupReply::found("http://10.0.0.5:8080"));

        bridge.stop(bus.as_ref()).await.unwrap();
    }

    #[tokio::test]
    async fn failed_startup_reconciliation_keeps_serving() {
        let registry = Arc::new(RecordingRegistry::default());
        registry.fail_query_all.store(true, Ordering::SeqCst);
        let bridge = bridge_over(registry.clone());
        let bus: Arc<dyn BusChannel> = Arc::new(LocalBus::default());
        bridge.start(&bus).await.unwrap();

        for _ in 0..50 {
            if bridge.stats().failed_reconciliations > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(bridge.stats().failed_reconciliations, 1);

        registry.inner.publish(orders_record("r1", "http://10.0.0.5:8080")).await;
        bus.publish(
            &bridge.config().announce_address,
            Announcement::up("orders", "http://10.0.0.5:8080").to_value(),
        )
        .await
        .unwrap();

        let request = json!({ "name": "orders", "version": "2.0.0", "env": "dev" });
        let mut reply = LookupReply::not_found();
        for _ in 0..50 {
            let body = bus
                .request(&bridge.config().request_address, request.clone())
                .await
                .unwrap();
            reply = LookupReply::from_value(&body).unwrap();
            if reply.is_found() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reply, LookupReply::found("http://10.0.0.5:8080"));

        bridge.stop(bus.as_ref()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_lookup_gets_not_found() {
        let bridge = bridge_over(Arc::new(RecordingRegistry::default()));
        let bus: Arc<dyn BusChannel> = Arc::new(LocalBus::default());
        bridge.start(&bus).await.unwrap();

        let body = bus
            .request(&bridge.config().request_address, json!({ "version": "1.0.0" }))
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": 404 }));
        assert_eq!(bridge.stats().dropped_events, 1);
    }
}
