//! # ferrous-lifecycle
//!
//! Dependency tracking and dynamic service lifecycles on top of a shared
//! service registry.
//!
//! A service declares typed, named dependencies with a cardinality and an
//! update strategy. A [`ServiceManager`] watches the registry for each of
//! them, builds the service once every required dependency is present,
//! keeps it correct as dependencies come and go, and publishes or withdraws
//! it in the registry accordingly.
//!
//! ## Features
//!
//! - **Cardinality**: optional or mandatory, unary or multiple dependencies
//! - **Update strategies**: static (rebuild) or dynamic (incremental update)
//! - **Lazy retrieval**: instances are only pulled from the registry when needed
//! - **Idempotent registration**: no double registration, no registry gap on replacement
//! - **Serialized transitions**: one consistent state machine per managed service
//! - **Typed observation**: [`ManagerEvent`]s for every transition, logged through `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_lifecycle::{
//!     Dependencies, InMemoryRegistry, Instance, LifecycleResult, Properties, Registry,
//!     ServiceDependency, ServiceLifecycle, ServiceManager, TypeTag,
//! };
//! use std::sync::Arc;
//!
//! struct Connection(String);
//!
//! struct UserStore;
//!
//! impl ServiceLifecycle for UserStore {
//!     fn dependency_specs(&self) -> Vec<ServiceDependency> {
//!         vec![ServiceDependency::new("db", "Connection")]
//!     }
//!
//!     fn create_service(&self, deps: &Dependencies) -> LifecycleResult<Option<Instance>> {
//!         let db = deps.get_required::<Connection>("db")?;
//!         Ok(Some(Arc::new(format!("users@{}", db.0))))
//!     }
//!
//!     fn service_class_names(&self) -> Vec<TypeTag> {
//!         vec![TypeTag::new("UserStore")]
//!     }
//! }
//!
//! let registry = Arc::new(InMemoryRegistry::new());
//! let manager = ServiceManager::new(Arc::new(UserStore));
//! manager.start(registry.clone()).unwrap();
//! assert!(!manager.is_available());
//!
//! // The dependency shows up: the service is built and published.
//! let conn = registry
//!     .register(Arc::new(Connection("primary".into())), &[TypeTag::new("Connection")], &Properties::new())
//!     .unwrap();
//! assert!(manager.is_available());
//! assert_eq!(registry.references_of(&TypeTag::new("UserStore")).len(), 1);
//!
//! // It goes away again: the service is withdrawn.
//! registry.unregister(&conn).unwrap();
//! assert!(!manager.is_available());
//! assert!(registry.references_of(&TypeTag::new("UserStore")).is_empty());
//!
//! manager.stop();
//! ```

// Module declarations
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod manager;
pub mod metrics;
pub mod observer;
pub mod registration;
pub mod registry;
pub mod tracker;

#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "async")]
pub mod channel;

// Re-export core types
pub use dependency::{
    BindingStrategy, Cardinality, ChangeType, Dependencies, Dependency, ServiceBinding, ServiceDependency,
    UpdateStrategy,
};
pub use descriptor::{Descriptor, Properties, TypeTag};
pub use error::{LifecycleError, LifecycleResult};
pub use factory::{LifecycleConstructor, LifecycleFactory};
pub use lifecycle::ServiceLifecycle;
pub use manager::{ManagerBuilder, ServiceManager};
pub use metrics::{ManagerMetrics, MetricsSnapshot};
pub use observer::{LoggingObserver, ManagerEvent, ManagerObserver};
pub use registration::{RegistrationStrategy, RegistryRegistration};
pub use registry::{
    Certificate, InMemoryRegistry, Instance, ListenerId, Reference, Registry, RegistryEvent, RegistryEventKind,
    RegistryListener,
};
pub use tracker::{
    DependencyEvent, DependencyListener, DependencyTracker, MultiDependencyTracker, SingleDependencyTracker,
};

#[cfg(feature = "config")]
pub use config::{BindingConfig, ManagerConfig};

#[cfg(feature = "async")]
pub use channel::ChannelObserver;
