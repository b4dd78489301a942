//! Dependency trackers: per-binding views of the registry.
//!
//! A tracker keeps two ordered collections for its descriptor:
//!
//! - **available** references, in arrival order, not necessarily retrieved
//! - **tracked** references, each paired with the instance retrieved for it
//!
//! Every tracked reference is also available. When the registry reports a
//! reference gone, it leaves both collections at once and its instance is
//! released. Retrieval is lazy per reference, so the "current" value of a
//! unary dependency is the first tracked reference, falling back to the
//! oldest available one that has not been retrieved yet.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dependency::{BindingStrategy, ChangeType, Dependency};
use crate::descriptor::Descriptor;
use crate::registry::{Instance, ListenerId, Reference, Registry, RegistryEvent, RegistryEventKind, RegistryListener};

mod multi;
mod single;

pub use multi::MultiDependencyTracker;
pub use single::SingleDependencyTracker;

/// Change in a tracker's resolved value.
#[derive(Debug, Clone)]
pub enum DependencyEvent {
    /// The dependency went from unresolved to resolved
    Available { name: String, value: Dependency },
    /// The resolved value was replaced, or a resolved registration was modified
    Changed { name: String, value: Dependency },
    /// The dependency no longer resolves
    Unavailable { name: String },
}

impl DependencyEvent {
    pub fn name(&self) -> &str {
        match self {
            DependencyEvent::Available { name, .. }
            | DependencyEvent::Changed { name, .. }
            | DependencyEvent::Unavailable { name } => name,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            DependencyEvent::Available { .. } => ChangeType::Available,
            DependencyEvent::Changed { .. } => ChangeType::Changed,
            DependencyEvent::Unavailable { .. } => ChangeType::Unavailable,
        }
    }

    pub fn value(&self) -> Option<&Dependency> {
        match self {
            DependencyEvent::Available { value, .. } | DependencyEvent::Changed { value, .. } => Some(value),
            DependencyEvent::Unavailable { .. } => None,
        }
    }
}

/// Receives [`DependencyEvent`]s from trackers.
///
/// Called without any tracker lock held.
pub trait DependencyListener: Send + Sync {
    fn dependency_changed(&self, event: DependencyEvent);
}

/// Watches the registry for one binding.
///
/// Implementations serialize registry callbacks against direct calls, so
/// every method may be called from any thread.
pub trait DependencyTracker: Send + Sync {
    /// Name of the dependency this tracker resolves.
    fn name(&self) -> &str;

    /// Seeds the available references and subscribes to registry changes.
    ///
    /// Nothing is retrieved unless the binding is eager. Registry failures
    /// are logged and leave the tracker started with nothing available.
    fn start(&self, registry: Arc<dyn Registry>, descriptor: &Descriptor);

    /// Unsubscribes, releases anything still tracked, and forgets every reference.
    fn stop(&self);

    fn is_started(&self) -> bool;

    /// Current resolved value, retrieving instances as needed.
    fn dependency(&self) -> Option<Dependency>;

    /// First tracked instance, else the oldest untracked available one.
    fn get_service(&self) -> Option<Instance>;

    /// Instance for `reference`, retrieved on first call; `None` if not available.
    fn get_service_for(&self, reference: Reference) -> Option<Instance>;

    /// Stops tracking `reference`; it stays available for later retrieval.
    fn release_reference(&self, reference: Reference);

    /// Releases every tracked instance.
    fn release_all(&self);

    /// Adds `reference` to the available set without a registry event.
    fn add_reference(&self, reference: Reference);

    /// Removes `reference` from both sets without a registry event.
    fn remove_reference(&self, reference: Reference);

    fn available_references(&self) -> Vec<Reference>;

    fn tracked_references(&self) -> Vec<Reference>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerMode {
    Single,
    Multiple,
}

#[derive(Default)]
struct TrackerState {
    registry: Option<Arc<dyn Registry>>,
    listener_id: Option<ListenerId>,
    available: Vec<Reference>,
    tracked: Vec<(Reference, Instance)>,
}

impl TrackerState {
    fn tracked_instance(&self, reference: Reference) -> Option<Instance> {
        self.tracked
            .iter()
            .find(|(tracked, _)| *tracked == reference)
            .map(|(_, instance)| instance.clone())
    }

    fn is_tracked(&self, reference: Reference) -> bool {
        self.tracked.iter().any(|(tracked, _)| *tracked == reference)
    }

    fn untrack(&mut self, reference: Reference) -> bool {
        match self.tracked.iter().position(|(tracked, _)| *tracked == reference) {
            Some(index) => {
                self.tracked.remove(index);
                if let Some(registry) = &self.registry {
                    registry.release(reference);
                }
                true
            }
            None => false,
        }
    }
}

/// State and registry plumbing shared by both tracker kinds.
struct TrackerCore {
    name: String,
    mode: TrackerMode,
    strategy: BindingStrategy,
    listener: Option<Weak<dyn DependencyListener>>,
    state: Mutex<TrackerState>,
}

/// Registry-side adapter; holds the tracker weakly so an abandoned
/// subscription never keeps a tracker alive.
struct TrackerSubscription {
    core: Weak<TrackerCore>,
}

impl RegistryListener for TrackerSubscription {
    fn registry_changed(&self, event: RegistryEvent) {
        if let Some(core) = self.core.upgrade() {
            core.handle_registry_event(event);
        }
    }
}

impl TrackerCore {
    fn new(
        name: String,
        mode: TrackerMode,
        strategy: BindingStrategy,
        listener: Option<Weak<dyn DependencyListener>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            mode,
            strategy,
            listener,
            state: Mutex::new(TrackerState::default()),
        })
    }

    fn start(self: &Arc<Self>, registry: Arc<dyn Registry>, descriptor: &Descriptor) {
        let mut state = self.state.lock();
        if state.registry.is_some() {
            warn!(dependency = %self.name, "tracker already started");
            return;
        }

        // Subscribe before the snapshot so nothing registered in between is missed;
        // duplicate arrivals are absorbed by the idempotent add.
        let subscription = Arc::new(TrackerSubscription {
            core: Arc::downgrade(self),
        });
        match registry.add_listener(descriptor, subscription) {
            Ok(id) => state.listener_id = Some(id),
            Err(err) => warn!(dependency = %self.name, %descriptor, error = %err, "could not subscribe to registry"),
        }

        match registry.find_all(descriptor) {
            Ok(references) => {
                for reference in references {
                    if !state.available.contains(&reference) {
                        state.available.push(reference);
                    }
                }
            }
            Err(err) => warn!(dependency = %self.name, %descriptor, error = %err, "registry lookup failed"),
        }
        state.registry = Some(registry);

        debug!(
            dependency = %self.name,
            %descriptor,
            available = state.available.len(),
            "tracker started"
        );

        if self.strategy == BindingStrategy::Eager {
            self.resolve(&mut state);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        let Some(registry) = state.registry.clone() else {
            return;
        };
        if let Some(id) = state.listener_id.take() {
            registry.remove_listener(id);
        }
        if !state.tracked.is_empty() {
            debug!(dependency = %self.name, tracked = state.tracked.len(), "releasing instances on stop");
        }
        for (reference, _) in state.tracked.drain(..) {
            registry.release(reference);
        }
        state.available.clear();
        state.registry = None;
    }

    fn is_started(&self) -> bool {
        self.state.lock().registry.is_some()
    }

    fn retrieve(&self, state: &mut TrackerState, reference: Reference) -> Option<Instance> {
        if let Some(instance) = state.tracked_instance(reference) {
            return Some(instance);
        }
        if !state.available.contains(&reference) {
            return None;
        }
        let registry = state.registry.clone()?;
        match registry.retrieve(reference) {
            Some(instance) => {
                state.tracked.push((reference, instance.clone()));
                Some(instance)
            }
            None => {
                debug!(dependency = %self.name, %reference, "reference could not be retrieved");
                None
            }
        }
    }

    fn first_service(&self, state: &mut TrackerState) -> Option<Instance> {
        if let Some((_, instance)) = state.tracked.first() {
            return Some(instance.clone());
        }
        let candidates: Vec<Reference> = state.available.clone();
        candidates
            .into_iter()
            .find_map(|reference| self.retrieve(state, reference))
    }

    fn resolve(&self, state: &mut TrackerState) -> Option<Dependency> {
        match self.mode {
            TrackerMode::Single => self.first_service(state).map(Dependency::Single),
            TrackerMode::Multiple => {
                let references: Vec<Reference> = state.available.clone();
                let instances: Vec<Instance> = references
                    .into_iter()
                    .filter_map(|reference| self.retrieve(state, reference))
                    .collect();
                if instances.is_empty() {
                    None
                } else {
                    Some(Dependency::Multiple(instances))
                }
            }
        }
    }

    /// Resolved value without retrieving anything new.
    fn peek(&self, state: &TrackerState) -> Option<Dependency> {
        match self.mode {
            TrackerMode::Single => state
                .tracked
                .first()
                .map(|(_, instance)| Dependency::Single(instance.clone())),
            TrackerMode::Multiple => {
                let instances: Vec<Instance> = state
                    .available
                    .iter()
                    .filter_map(|reference| state.tracked_instance(*reference))
                    .collect();
                if instances.is_empty() {
                    None
                } else {
                    Some(Dependency::Multiple(instances))
                }
            }
        }
    }

    fn is_resolved_reference(&self, state: &TrackerState, reference: Reference) -> bool {
        match self.mode {
            TrackerMode::Single => state
                .tracked
                .first()
                .map(|(tracked, _)| *tracked == reference)
                .unwrap_or(false),
            TrackerMode::Multiple => state.is_tracked(reference),
        }
    }

    fn handle_registry_event(&self, event: RegistryEvent) {
        let notification = {
            let mut state = self.state.lock();
            if state.registry.is_none() {
                return;
            }
            let before = self.peek(&state);
            let reference = event.reference;
            let mut modified = false;

            match event.kind {
                RegistryEventKind::Registered => {
                    if !state.available.contains(&reference) {
                        state.available.push(reference);
                    }
                }
                RegistryEventKind::Unregistering | RegistryEventKind::ModifiedEndMatch => {
                    state.available.retain(|available| *available != reference);
                    state.untrack(reference);
                }
                RegistryEventKind::Modified => {
                    modified = self.is_resolved_reference(&state, reference);
                }
            }

            let after = self.resolve(&mut state);
            self.classify(before, after, modified)
        };

        if let Some(event) = notification {
            debug!(dependency = %self.name, change = ?event.change_type(), "dependency changed");
            if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
                listener.dependency_changed(event);
            }
        }
    }

    fn classify(
        &self,
        before: Option<Dependency>,
        after: Option<Dependency>,
        modified: bool,
    ) -> Option<DependencyEvent> {
        let name = self.name.clone();
        match (before, after) {
            (None, Some(value)) => Some(DependencyEvent::Available { name, value }),
            (Some(_), None) => Some(DependencyEvent::Unavailable { name }),
            (Some(old), Some(value)) if modified || !old.same_as(&value) => {
                Some(DependencyEvent::Changed { name, value })
            }
            _ => None,
        }
    }

    fn get_service(&self) -> Option<Instance> {
        let mut state = self.state.lock();
        self.first_service(&mut state)
    }

    fn get_service_for(&self, reference: Reference) -> Option<Instance> {
        let mut state = self.state.lock();
        self.retrieve(&mut state, reference)
    }

    fn dependency(&self) -> Option<Dependency> {
        let mut state = self.state.lock();
        self.resolve(&mut state)
    }

    fn release_reference(&self, reference: Reference) {
        self.state.lock().untrack(reference);
    }

    fn release_all(&self) {
        let mut state = self.state.lock();
        let tracked: Vec<Reference> = state.tracked.iter().map(|(reference, _)| *reference).collect();
        for reference in tracked {
            state.untrack(reference);
        }
    }

    fn add_reference(&self, reference: Reference) {
        let mut state = self.state.lock();
        if !state.available.contains(&reference) {
            state.available.push(reference);
        }
    }

    fn remove_reference(&self, reference: Reference) {
        let mut state = self.state.lock();
        state.available.retain(|available| *available != reference);
        state.untrack(reference);
    }

    fn available_references(&self) -> Vec<Reference> {
        self.state.lock().available.clone()
    }

    fn tracked_references(&self) -> Vec<Reference> {
        self.state
            .lock()
            .tracked
            .iter()
            .map(|(reference, _)| *reference)
            .collect()
    }
}

/// Implements [`DependencyTracker`] for a wrapper holding `core: Arc<TrackerCore>`.
macro_rules! delegate_tracker {
    ($tracker:ty) => {
        impl $crate::tracker::DependencyTracker for $tracker {
            fn name(&self) -> &str {
                &self.core.name
            }

            fn start(
                &self,
                registry: std::sync::Arc<dyn $crate::registry::Registry>,
                descriptor: &$crate::descriptor::Descriptor,
            ) {
                self.core.start(registry, descriptor)
            }

            fn stop(&self) {
                self.core.stop()
            }

            fn is_started(&self) -> bool {
                self.core.is_started()
            }

            fn dependency(&self) -> Option<$crate::dependency::Dependency> {
                self.core.dependency()
            }

            fn get_service(&self) -> Option<$crate::registry::Instance> {
                self.core.get_service()
            }

            fn get_service_for(&self, reference: $crate::registry::Reference) -> Option<$crate::registry::Instance> {
                self.core.get_service_for(reference)
            }

            fn release_reference(&self, reference: $crate::registry::Reference) {
                self.core.release_reference(reference)
            }

            fn release_all(&self) {
                self.core.release_all()
            }

            fn add_reference(&self, reference: $crate::registry::Reference) {
                self.core.add_reference(reference)
            }

            fn remove_reference(&self, reference: $crate::registry::Reference) {
                self.core.remove_reference(reference)
            }

            fn available_references(&self) -> Vec<$crate::registry::Reference> {
                self.core.available_references()
            }

            fn tracked_references(&self) -> Vec<$crate::registry::Reference> {
                self.core.tracked_references()
            }
        }
    };
}

pub(crate) use delegate_tracker;

/// Builds the tracker matching a binding's cardinality.
pub(crate) fn tracker_for(
    binding: &crate::dependency::ServiceBinding,
    listener: Weak<dyn DependencyListener>,
) -> Arc<dyn DependencyTracker> {
    let name = binding.name().to_string();
    if binding.dependency.cardinality.is_multiple() {
        Arc::new(MultiDependencyTracker::with_listener(name, binding.strategy, listener))
    } else {
        Arc::new(SingleDependencyTracker::with_listener(name, binding.strategy, listener))
    }
}
