//! etcd 注册中心实现
//!
//! 记录以 JSON 形式保存在 `/{namespace}/records/{registration_id}` 下。
//! `register` 新建的记录绑定一个 TTL 租约，并按 `ping_interval` 续约，
//! `deregister` 时停止续约并撤销租约。
//! 键已存在时只合并注册字段并沿用原租约，记录的生命周期仍归写入它的进程。

use async_trait::async_trait;
use etcd_client::{Client, GetOptions, PutOptions};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::trait_def::RegistryClient;
use super::types::{RecordFilter, Registration, RegistryRecord};
use crate::error::{ErrorCode, InfraResult, InfraResultExt, Result};

struct Lease {
    id: i64,
    keep_alive: JoinHandle<()>,
}

/// etcd 注册中心
pub struct EtcdRegistry {
    client: Client,
    namespace: String,
    leases: Mutex<HashMap<String, Lease>>,
}

impl EtcdRegistry {
    /// 连接 etcd
    pub async fn connect(endpoints: Vec<String>, namespace: impl Into<String>) -> Result<Self> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(anyhow::Error::from)
            .into_flare(ErrorCode::RegistryUnavailable, "Failed to connect to etcd")?;

        Ok(Self {
            client,
            namespace: namespace.into(),
            leases: Mutex::new(HashMap::new()),
        })
    }

    fn records_prefix(&self) -> String {
        format!("/{}/records/", self.namespace)
    }

    fn record_key(&self, registration_id: &str) -> String {
        format!("{}{}", self.records_prefix(), registration_id)
    }

    async fn load_records(&self) -> InfraResult<Vec<RegistryRecord>> {
        let mut client = self.client.clone();
        let resp = client
            .get(self.records_prefix(), Some(GetOptions::new().with_prefix()))
            .await?;

        let mut records = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            match serde_json::from_slice::<RegistryRecord>(kv.value()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        key = %String::from_utf8_lossy(kv.key()),
                        error = %e,
                        "Skipping undecodable registry record"
                    );
                }
            }
        }
        Ok(records)
    }

    async fn existing_record(&self, registration: &Registration) -> InfraResult<Option<RegistryRecord>> {
        let registration_id = &registration.registration_id;
        let mut client = self.client.clone();
        let resp = client.get(self.record_key(registration_id), None).await?;
        let Some(kv) = resp.kvs().first() else {
            return Ok(None);
        };
        match serde_json::from_slice::<RegistryRecord>(kv.value()) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(registration_id = %registration_id, error = %e, "Existing record undecodable, rewriting it");
                Ok(Some(registration.to_record()))
            }
        }
    }

    /// 合并写入已有记录，保留其租约
    async fn put_merged(&self, registration: &Registration, existing: RegistryRecord) -> InfraResult<()> {
        let mut client = self.client.clone();
        let value = serde_json::to_vec(&registration.merge_into(existing))?;
        client
            .put(
                self.record_key(&registration.registration_id),
                value,
                Some(PutOptions::new().with_ignore_lease()),
            )
            .await?;
        Ok(())
    }

    async fn put_with_lease(&self, registration: &Registration) -> InfraResult<i64> {
        let mut client = self.client.clone();
        let lease = client.lease_grant(registration.ttl.max(1) as i64, None).await?;
        let value = serde_json::to_vec(&registration.to_record())?;
        client
            .put(
                self.record_key(&registration.registration_id),
                value,
                Some(PutOptions::new().with_lease(lease.id())),
            )
            .await?;
        Ok(lease.id())
    }

    fn start_keep_alive(&self, registration_id: String, lease_id: i64, ping_interval: u64) -> JoinHandle<()> {
        let mut client = self.client.clone();
        let interval = Duration::from_secs(ping_interval.max(1));

        tokio::spawn(async move {
            let (mut keeper, mut stream) = match client.lease_keep_alive(lease_id).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(registration_id = %registration_id, error = %e, "Lease keep-alive failed to start");
                    return;
                }
            };

            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = keeper.keep_alive().await {
                    warn!(registration_id = %registration_id, error = %e, "Lease keep-alive failed");
                    break;
                }
                match stream.message().await {
                    Ok(Some(resp)) => {
                        debug!(registration_id = %registration_id, ttl = resp.ttl(), "Lease renewed");
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(registration_id = %registration_id, error = %e, "Lease keep-alive stream error");
                        break;
                    }
                }
            }
        })
    }

    async fn revoke(&self, lease: Lease) {
        lease.keep_alive.abort();
        let mut client = self.client.clone();
        if let Err(e) = client.lease_revoke(lease.id).await {
            debug!(lease_id = lease.id, error = %e, "Lease revoke failed, it will expire on its own");
        }
    }
}

#[async_trait]
impl RegistryClient for EtcdRegistry {
    async fn query_all(&self) -> Result<Vec<RegistryRecord>> {
        self.load_records()
            .await
            .into_flare(ErrorCode::RegistryQueryFailed, "Failed to query etcd registry")
    }

    async fn query_matching(&self, filter: &RecordFilter) -> Result<Vec<RegistryRecord>> {
        let records = self.query_all().await?;
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        let existing = self
            .existing_record(registration)
            .await
            .into_flare(ErrorCode::RegistrationFailed, "Failed to read record from etcd")?;
        if let Some(existing) = existing {
            self.put_merged(registration, existing)
                .await
                .into_flare(ErrorCode::RegistrationFailed, "Failed to update record in etcd")?;
            debug!(
                registration_id = %registration.registration_id,
                name = %registration.name,
                "Existing etcd record updated, lease left with its owner"
            );
            return Ok(());
        }

        let lease_id = self
            .put_with_lease(registration)
            .await
            .into_flare(ErrorCode::RegistrationFailed, "Failed to register record in etcd")?;

        let keep_alive = self.start_keep_alive(
            registration.registration_id.clone(),
            lease_id,
            registration.ping_interval,
        );

        let previous = self.leases.lock().await.insert(
            registration.registration_id.clone(),
            Lease {
                id: lease_id,
                keep_alive,
            },
        );
        if let Some(previous) = previous {
            self.revoke(previous).await;
        }

        info!(
            registration_id = %registration.registration_id,
            name = %registration.name,
            ttl = registration.ttl,
            "Record registered in etcd"
        );
        Ok(())
    }

    async fn deregister(&self, registration_id: &str) -> Result<()> {
        if let Some(lease) = self.leases.lock().await.remove(registration_id) {
            self.revoke(lease).await;
        }

        let mut client = self.client.clone();
        client
            .delete(self.record_key(registration_id), None)
            .await
            .map_err(anyhow::Error::from)
            .into_flare(ErrorCode::DeregistrationFailed, "Failed to delete record from etcd")?;

        info!(registration_id = %registration_id, "Record deregistered from etcd");
        Ok(())
    }
}
