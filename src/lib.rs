//! Flare Discovery Bridge
//!
//! Bridges a message bus with a shared service registry: keeps an in-process view of
//! reachable service instances in sync with the registry, and answers instance lookups
//! arriving on the bus with load-balanced selection and a registry fallback.

pub mod bus;
pub mod config;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod telemetry;

// Re-exports
pub use bus::{BusChannel, BusMessage, EventPublisher, ListenerTable, LocalBus, PublisherCache};
pub use config::{BridgeConfig, BusConfig, Config, LogConfig, RegistryBackend, RegistryConfig};
pub use discovery::{
    Announcement, DiscoveryBridge, FallbackResolver, LoadBalanceStrategy, LookupReply,
    LookupRequest, NoopResolver, ReconcileOutcome, RegistryResolver, ServiceRecord,
    ServiceStatus,
};
pub use error::{ErrorBuilder, ErrorCategory, ErrorCode, FlareError, LocalizedError, Result};
pub use registry::{create_registry, InMemoryRegistry, RegistryClient, RegistryRecord};
#[cfg(feature = "etcd")]
pub use registry::EtcdRegistry;

// 运行时 re-exports
pub use runtime::{BridgeRuntime, RunningBridge, RuntimeConfig, WorkerPool};
pub use telemetry::init_tracing;
