//! etcd 注册中心集成测试
//!
//! 这些测试需要运行中的 etcd 服务器实例。
//! 默认情况下，测试会被忽略，需要使用
//! `cargo test --features etcd --test etcd_backend_test -- --ignored` 运行。
//!
//! 启动 etcd 服务器：
//! ```bash
//! docker run -d --name etcd-test -p 2379:2379 -p 2380:2380 \
//!   quay.io/coreos/etcd:v3.5.9 \
//!   etcd --advertise-client-urls=http://127.0.0.1:2379 \
//!        --listen-client-urls=http://0.0.0.0:2379
//! ```

#![cfg(feature = "etcd")]

use etcd_client::Client;
use flare_discovery_bridge::registry::{
    EtcdRegistry, RecordFilter, RecordStatus, Registration, RegistryClient, RegistryRecord,
};
use tokio::time::{sleep, Duration};

/// etcd 服务器地址
/// 可以通过环境变量 ETCD_ENDPOINTS 覆盖，默认为 http://127.0.0.1:2379
fn etcd_endpoints() -> Vec<String> {
    std::env::var("ETCD_ENDPOINTS")
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["http://127.0.0.1:2379".to_string()])
}

/// 测试命名空间
const TEST_NAMESPACE: &str = "flare-bridge-test";

fn registration(id: &str, endpoint: &str) -> Registration {
    Registration {
        name: "orders".to_string(),
        version: "2.0.0".to_string(),
        environment: "dev".to_string(),
        ttl: 10,
        ping_interval: 3,
        health_check_enabled: false,
        base_url: endpoint.to_string(),
        registration_id: id.to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn test_etcd_register_query_deregister() {
    let registry = EtcdRegistry::connect(etcd_endpoints(), TEST_NAMESPACE)
        .await
        .expect("Failed to connect to etcd");

    registry
        .register(&registration("etcd-r1", "http://10.0.0.5:8080"))
        .await
        .expect("Failed to register");
    // 重复注册是幂等的
    registry
        .register(&registration("etcd-r1", "http://10.0.0.5:8080"))
        .await
        .expect("Failed to re-register");

    sleep(Duration::from_millis(200)).await;

    let records = registry
        .query_matching(&RecordFilter::by_name_and_endpoint("orders", "http://10.0.0.5:8080"))
        .await
        .expect("Failed to query");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].registration, "etcd-r1");
    assert_eq!(records[0].metadata_str("version"), Some("2.0.0"));

    registry.deregister("etcd-r1").await.expect("Failed to deregister");
    registry.deregister("etcd-r1").await.expect("Deregister should be a no-op");

    let records = registry
        .query_matching(&RecordFilter::all().name("orders"))
        .await
        .expect("Failed to query");
    assert!(records.iter().all(|r| r.registration != "etcd-r1"));
}

#[tokio::test]
#[ignore]
async fn test_etcd_lease_keeps_record_alive() {
    let registry = EtcdRegistry::connect(etcd_endpoints(), TEST_NAMESPACE)
        .await
        .expect("Failed to connect to etcd");

    registry
        .register(&registration("etcd-r2", "http://10.0.0.6:8080"))
        .await
        .expect("Failed to register");

    // 超过一个 TTL 后记录仍然存在
    sleep(Duration::from_secs(12)).await;
    let records = registry.query_all().await.expect("Failed to query");
    assert!(records.iter().any(|r| r.registration == "etcd-r2"));

    registry.deregister("etcd-r2").await.expect("Failed to deregister");
}

#[tokio::test]
#[ignore]
async fn test_etcd_register_keeps_foreign_record_and_lease() {
    let registry = EtcdRegistry::connect(etcd_endpoints(), TEST_NAMESPACE)
        .await
        .expect("Failed to connect to etcd");
    let mut client = Client::connect(etcd_endpoints(), None)
        .await
        .expect("Failed to connect to etcd");
    let key = format!("/{}/records/etcd-r3", TEST_NAMESPACE);

    // 其他进程写入的记录，不带租约
    let mut foreign = RegistryRecord::new("orders", "etcd-r3", "http://10.0.0.7:8080")
        .with_metadata("zone", "eu-west-1");
    foreign.status = RecordStatus::OutOfService;
    client
        .put(key.clone(), serde_json::to_vec(&foreign).unwrap(), None)
        .await
        .expect("Failed to seed record");

    registry
        .register(&registration("etcd-r3", "http://10.0.0.7:8080"))
        .await
        .expect("Failed to register");

    let records = registry
        .query_matching(&RecordFilter::by_name_and_endpoint("orders", "http://10.0.0.7:8080"))
        .await
        .expect("Failed to query");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RecordStatus::OutOfService);
    assert_eq!(records[0].metadata_str("zone"), Some("eu-west-1"));
    assert_eq!(records[0].metadata_str("version"), Some("2.0.0"));

    let resp = client.get(key.clone(), None).await.expect("Failed to read key");
    assert_eq!(resp.kvs()[0].lease(), 0);

    client.delete(key, None).await.expect("Failed to clean up");
}
