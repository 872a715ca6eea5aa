//! 服务发现桥接
//!
//! 把共享注册中心的实例记录同步到进程内缓存，并通过消息总线回答实例查询。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flare_discovery_bridge::bus::{BusChannel, LocalBus};
//! use flare_discovery_bridge::config::BridgeConfig;
//! use flare_discovery_bridge::discovery::{DiscoveryBridge, NoopResolver};
//! use flare_discovery_bridge::registry::InMemoryRegistry;
//!
//! # async fn demo() -> flare_discovery_bridge::error::Result<()> {
//! let bus: Arc<dyn BusChannel> = Arc::new(LocalBus::default());
//! let bridge = DiscoveryBridge::new(
//!     BridgeConfig::default(),
//!     Arc::new(InMemoryRegistry::new()),
//!     Arc::new(NoopResolver),
//! );
//! bridge.start(&bus).await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod cache;
pub mod messages;
pub mod record;
pub mod resolver;
pub mod selector;
pub mod stats;

pub use bridge::{DiscoveryBridge, ReconcileOutcome};
pub use cache::LocalInstanceCache;
pub use messages::{Announcement, LookupReply, LookupRequest, ServiceStatus};
pub use record::{RecordDefaults, ServiceRecord};
pub use resolver::{FallbackResolver, NoopResolver, RegistryResolver};
pub use selector::{InstanceSelector, LoadBalanceStrategy};
pub use stats::{BridgeStats, StatsSnapshot};
