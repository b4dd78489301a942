//! Tracker for unary dependencies.

use std::sync::{Arc, Weak};

use super::{delegate_tracker, DependencyListener, TrackerCore, TrackerMode};
use crate::dependency::BindingStrategy;

/// Resolves a unary dependency to one instance.
///
/// The resolved instance is the first tracked reference. When it goes
/// away, the next tracked reference takes over, then the oldest available
/// reference not yet retrieved.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{
///     BindingStrategy, DependencyTracker, Descriptor, InMemoryRegistry, Properties, Registry,
///     SingleDependencyTracker, TypeTag,
/// };
/// use std::sync::Arc;
///
/// let registry = Arc::new(InMemoryRegistry::new());
/// registry
///     .register(Arc::new("conn-A".to_string()), &[TypeTag::new("Connection")], &Properties::new())
///     .unwrap();
///
/// let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
/// tracker.start(registry.clone(), &Descriptor::new("Connection"));
/// assert!(tracker.tracked_references().is_empty());
///
/// let conn = tracker.get_service().unwrap();
/// assert_eq!(conn.downcast_ref::<String>().unwrap(), "conn-A");
/// tracker.stop();
/// ```
pub struct SingleDependencyTracker {
    core: Arc<TrackerCore>,
}

impl SingleDependencyTracker {
    /// A tracker nobody listens to, mostly useful on its own.
    pub fn new(name: impl Into<String>, strategy: BindingStrategy) -> Self {
        Self {
            core: TrackerCore::new(name.into(), TrackerMode::Single, strategy, None),
        }
    }

    /// A tracker reporting value changes to `listener`.
    pub fn with_listener(
        name: impl Into<String>,
        strategy: BindingStrategy,
        listener: Weak<dyn DependencyListener>,
    ) -> Self {
        Self {
            core: TrackerCore::new(name.into(), TrackerMode::Single, strategy, Some(listener)),
        }
    }
}

delegate_tracker!(SingleDependencyTracker);
