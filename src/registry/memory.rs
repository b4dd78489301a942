//! In-process registry implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    Certificate, Instance, ListenerId, Reference, Registry, RegistryEvent, RegistryEventKind,
    RegistryListener,
};
use crate::descriptor::{Descriptor, Properties, TypeTag};
use crate::error::{LifecycleError, LifecycleResult};

struct Entry {
    instance: Instance,
    class_names: Vec<TypeTag>,
    properties: Properties,
    uses: usize,
}

struct ListenerEntry {
    descriptor: Descriptor,
    listener: Arc<dyn RegistryListener>,
}

#[derive(Default)]
struct RegistryState {
    next_reference: u64,
    next_listener: u64,
    entries: BTreeMap<Reference, Entry>,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
    closed: bool,
    removed_listeners: usize,
}

impl RegistryState {
    fn ensure_open(&self) -> LifecycleResult<()> {
        if self.closed {
            Err(LifecycleError::RegistryUnavailable("registry closed".to_string()))
        } else {
            Ok(())
        }
    }
}

type Dispatch = Vec<(Arc<dyn RegistryListener>, RegistryEvent)>;

/// Thread-safe registry living in the current process.
///
/// Listeners are always invoked after the internal lock is released, so a
/// listener may call back into the registry (retrieve, release, even
/// register) without deadlocking.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{InMemoryRegistry, Properties, Registry, TypeTag};
/// use std::sync::Arc;
///
/// let registry = InMemoryRegistry::new();
/// let mut props = Properties::new();
/// props.insert("pool".to_string(), "primary".to_string());
///
/// let cert = registry
///     .register(Arc::new(7u32), &[TypeTag::new("Counter")], &props)
///     .unwrap();
/// assert_eq!(registry.len(), 1);
///
/// registry.unregister(&cert).unwrap();
/// assert!(registry.is_empty());
/// ```
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of currently subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Number of successful `remove_listener` calls so far.
    pub fn removed_listener_count(&self) -> usize {
        self.state.lock().removed_listeners
    }

    /// Outstanding retrievals of `reference` not yet released.
    pub fn use_count(&self, reference: Reference) -> usize {
        self.state
            .lock()
            .entries
            .get(&reference)
            .map(|entry| entry.uses)
            .unwrap_or(0)
    }

    /// Outstanding retrievals across all registrations.
    pub fn total_uses(&self) -> usize {
        self.state.lock().entries.values().map(|entry| entry.uses).sum()
    }

    /// Current registration properties of `reference`.
    pub fn properties(&self, reference: Reference) -> Option<Properties> {
        self.state
            .lock()
            .entries
            .get(&reference)
            .map(|entry| entry.properties.clone())
    }

    /// References registered under `type_tag`, in registration order.
    pub fn references_of(&self, type_tag: &TypeTag) -> Vec<Reference> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.class_names.contains(type_tag))
            .map(|(reference, _)| *reference)
            .collect()
    }

    /// Makes every further operation fail with `RegistryUnavailable`.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    fn dispatch(events: Dispatch) {
        for (listener, event) in events {
            listener.registry_changed(event);
        }
    }

    fn matching_listeners(
        state: &RegistryState,
        class_names: &[TypeTag],
        properties: &Properties,
        kind: RegistryEventKind,
        reference: Reference,
    ) -> Dispatch {
        state
            .listeners
            .values()
            .filter(|entry| entry.descriptor.matches(class_names, properties))
            .map(|entry| (entry.listener.clone(), RegistryEvent::new(kind, reference)))
            .collect()
    }
}

impl Registry for InMemoryRegistry {
    fn find_all(&self, descriptor: &Descriptor) -> LifecycleResult<Vec<Reference>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .entries
            .iter()
            .filter(|(_, entry)| descriptor.matches(&entry.class_names, &entry.properties))
            .map(|(reference, _)| *reference)
            .collect())
    }

    fn add_listener(
        &self,
        descriptor: &Descriptor,
        listener: Arc<dyn RegistryListener>,
    ) -> LifecycleResult<ListenerId> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.insert(
            id,
            ListenerEntry {
                descriptor: descriptor.clone(),
                listener,
            },
        );
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut state = self.state.lock();
        if state.listeners.remove(&id).is_some() {
            state.removed_listeners += 1;
        }
    }

    fn retrieve(&self, reference: Reference) -> Option<Instance> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let entry = state.entries.get_mut(&reference)?;
        entry.uses += 1;
        Some(entry.instance.clone())
    }

    fn release(&self, reference: Reference) {
        if let Some(entry) = self.state.lock().entries.get_mut(&reference) {
            entry.uses = entry.uses.saturating_sub(1);
        }
    }

    fn register(
        &self,
        instance: Instance,
        class_names: &[TypeTag],
        properties: &Properties,
    ) -> LifecycleResult<Certificate> {
        let (reference, events) = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            state.next_reference += 1;
            let reference = Reference::new(state.next_reference);
            state.entries.insert(
                reference,
                Entry {
                    instance,
                    class_names: class_names.to_vec(),
                    properties: properties.clone(),
                    uses: 0,
                },
            );
            let events = Self::matching_listeners(
                &state,
                class_names,
                properties,
                RegistryEventKind::Registered,
                reference,
            );
            (reference, events)
        };
        Self::dispatch(events);
        Ok(Certificate::new(reference))
    }

    fn set_properties(&self, certificate: &Certificate, properties: &Properties) -> LifecycleResult<()> {
        let reference = certificate.reference();
        let events = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            let entry = state
                .entries
                .get_mut(&reference)
                .ok_or(LifecycleError::UnknownReference(reference))?;
            let old = std::mem::replace(&mut entry.properties, properties.clone());
            let class_names = entry.class_names.clone();

            state
                .listeners
                .values()
                .filter_map(|listener| {
                    let before = listener.descriptor.matches(&class_names, &old);
                    let after = listener.descriptor.matches(&class_names, properties);
                    let kind = match (before, after) {
                        (true, true) => RegistryEventKind::Modified,
                        (true, false) => RegistryEventKind::ModifiedEndMatch,
                        (false, true) => RegistryEventKind::Registered,
                        (false, false) => return None,
                    };
                    Some((listener.listener.clone(), RegistryEvent::new(kind, reference)))
                })
                .collect()
        };
        Self::dispatch(events);
        Ok(())
    }

    fn unregister(&self, certificate: &Certificate) -> LifecycleResult<()> {
        let reference = certificate.reference();
        let events = {
            let state = self.state.lock();
            let entry = state
                .entries
                .get(&reference)
                .ok_or(LifecycleError::UnknownReference(reference))?;
            Self::matching_listeners(
                &state,
                &entry.class_names,
                &entry.properties,
                RegistryEventKind::Unregistering,
                reference,
            )
        };
        // Listeners may still retrieve the service while it is unregistering.
        Self::dispatch(events);
        self.state.lock().entries.remove(&reference);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryRegistry")
            .field("entries", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .field("closed", &state.closed)
            .finish()
    }
}
