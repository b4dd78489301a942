//! Registry capability consumed by trackers and registration strategies.
//!
//! The engine never owns a registry. Every component that needs one is
//! handed an `Arc<dyn Registry>` explicitly, either at construction or when
//! the manager starts.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{Descriptor, Properties, TypeTag};
use crate::error::LifecycleResult;

pub mod memory;

pub use memory::InMemoryRegistry;

/// Type-erased, shared service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Opaque handle to a registered service, valid until it is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(u64);

impl Reference {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Proof of one successful registration, used to unregister it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    reference: Reference,
}

impl Certificate {
    pub fn new(reference: Reference) -> Self {
        Self { reference }
    }

    /// The reference consumers see for this registration.
    pub fn reference(&self) -> Reference {
        self.reference
    }
}

/// Handle for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// What happened to a reference, from one listener's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEventKind {
    /// A service now matches the listener's descriptor
    Registered,
    /// Properties changed and the service still matches
    Modified,
    /// Properties changed and the service no longer matches
    ModifiedEndMatch,
    /// The service is about to be removed; it can still be retrieved
    Unregistering,
}

/// A reference lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEvent {
    pub kind: RegistryEventKind,
    pub reference: Reference,
}

impl RegistryEvent {
    pub fn new(kind: RegistryEventKind, reference: Reference) -> Self {
        Self { kind, reference }
    }
}

/// Receives reference lifecycle notifications for one descriptor.
///
/// Registries must preserve per-reference ordering (`Registered` before any
/// `Modified` or `Unregistering` for the same reference) and must not hold
/// internal locks while calling listeners.
pub trait RegistryListener: Send + Sync {
    fn registry_changed(&self, event: RegistryEvent);
}

/// The shared service registry.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{Descriptor, InMemoryRegistry, Properties, Registry, TypeTag};
/// use std::sync::Arc;
///
/// let registry = InMemoryRegistry::new();
/// let cert = registry
///     .register(Arc::new("conn-A".to_string()), &[TypeTag::new("Connection")], &Properties::new())
///     .unwrap();
///
/// let found = registry.find_all(&Descriptor::new("Connection")).unwrap();
/// assert_eq!(found, vec![cert.reference()]);
///
/// let instance = registry.retrieve(cert.reference()).unwrap();
/// assert_eq!(instance.downcast_ref::<String>().unwrap(), "conn-A");
/// registry.release(cert.reference());
/// ```
pub trait Registry: Send + Sync {
    /// Snapshot of all references currently matching `descriptor`.
    fn find_all(&self, descriptor: &Descriptor) -> LifecycleResult<Vec<Reference>>;

    /// Subscribes `listener` to events for references matching `descriptor`.
    fn add_listener(
        &self,
        descriptor: &Descriptor,
        listener: Arc<dyn RegistryListener>,
    ) -> LifecycleResult<ListenerId>;

    fn remove_listener(&self, id: ListenerId);

    /// Resolves a reference to its live instance, counting one use.
    fn retrieve(&self, reference: Reference) -> Option<Instance>;

    /// Gives back one use obtained from [`Registry::retrieve`].
    fn release(&self, reference: Reference);

    fn register(
        &self,
        instance: Instance,
        class_names: &[TypeTag],
        properties: &Properties,
    ) -> LifecycleResult<Certificate>;

    /// Replaces the properties of an existing registration.
    fn set_properties(&self, certificate: &Certificate, properties: &Properties) -> LifecycleResult<()>;

    fn unregister(&self, certificate: &Certificate) -> LifecycleResult<()>;
}
