/// Integration tests for dependency trackers
///
/// These tests check the available/tracked bookkeeping of single and multi
/// trackers against a live in-memory registry, and the value-change
/// notifications they report to their listener.

mod common;

use common::*;
use ferrous_lifecycle::{
    BindingStrategy, ChangeType, DependencyEvent, DependencyListener, DependencyTracker, Descriptor,
    InMemoryRegistry, Instance, MultiDependencyTracker, Registry, SingleDependencyTracker,
};
use std::sync::{Arc, Mutex, Weak};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(ChangeType, String)>>,
}

impl Recorder {
    fn events(&self) -> Vec<(ChangeType, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl DependencyListener for Recorder {
    fn dependency_changed(&self, event: DependencyEvent) {
        let value = event.value().map(describe).unwrap_or_default();
        self.events.lock().unwrap().push((event.change_type(), value));
    }
}

fn text(instance: Option<Instance>) -> Option<String> {
    instance.and_then(|instance| instance.downcast_ref::<String>().cloned())
}

fn single_with(recorder: &Arc<Recorder>, strategy: BindingStrategy) -> SingleDependencyTracker {
    let listener: Weak<dyn DependencyListener> = Arc::downgrade(recorder) as Weak<dyn DependencyListener>;
    SingleDependencyTracker::with_listener("db", strategy, listener)
}

#[test]
fn test_lazy_start_retrieves_nothing() {
    let registry = Arc::new(InMemoryRegistry::new());
    let a = register(&registry, "Connection", "conn-A");
    let b = register(&registry, "Connection", "conn-B");
    register(&registry, "Logger", "log-1");

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    assert!(tracker.is_started());
    assert_eq!(tracker.available_references(), vec![a.reference(), b.reference()]);
    assert!(tracker.tracked_references().is_empty());
    assert_eq!(registry.total_uses(), 0);
    assert_eq!(registry.listener_count(), 1);
}

#[test]
fn test_eager_start_retrieves_current_value() {
    let registry = Arc::new(InMemoryRegistry::new());
    let a = register(&registry, "Connection", "conn-A");

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Eager);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    assert_eq!(tracker.tracked_references(), vec![a.reference()]);
    assert_eq!(registry.use_count(a.reference()), 1);
}

#[test]
fn test_get_service_retrieves_oldest_available() {
    let registry = Arc::new(InMemoryRegistry::new());
    let a = register(&registry, "Connection", "conn-A");
    register(&registry, "Connection", "conn-B");

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    assert_eq!(text(tracker.get_service()).as_deref(), Some("conn-A"));
    assert_eq!(tracker.tracked_references(), vec![a.reference()]);
    // A second call reuses the tracked instance.
    assert_eq!(text(tracker.get_service()).as_deref(), Some("conn-A"));
    assert_eq!(registry.use_count(a.reference()), 1);
}

#[test]
fn test_release_promotes_next_tracked_reference_in_order() {
    let registry = Arc::new(InMemoryRegistry::new());
    let refs: Vec<_> = ["r0", "r1", "r2"]
        .iter()
        .map(|value| register(&registry, "Connection", value).reference())
        .collect();

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));
    for reference in &refs {
        assert!(tracker.get_service_for(*reference).is_some());
    }
    assert_eq!(tracker.tracked_references(), refs);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("r0"));

    tracker.release_reference(refs[0]);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("r1"));

    tracker.release_reference(refs[1]);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("r2"));

    // Released references stay available.
    assert_eq!(tracker.available_references(), refs);
    assert_eq!(tracker.tracked_references(), vec![refs[2]]);
    assert_eq!(registry.use_count(refs[0]), 0);
    assert_eq!(registry.use_count(refs[2]), 1);
}

#[test]
fn test_multi_release_out_of_order_skips_released_reference() {
    let registry = Arc::new(InMemoryRegistry::new());
    let refs: Vec<_> = ["p0", "p1", "p2"]
        .iter()
        .map(|value| register(&registry, "Plugin", value).reference())
        .collect();

    let tracker = MultiDependencyTracker::new("plugins", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Plugin"));
    for reference in &refs {
        assert!(tracker.get_service_for(*reference).is_some());
    }

    tracker.release_reference(refs[1]);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("p0"));

    tracker.release_reference(refs[0]);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("p2"));
    assert_eq!(tracker.tracked_references(), vec![refs[2]]);
    assert_eq!(registry.use_count(refs[1]), 0);
    assert_eq!(registry.use_count(refs[0]), 0);
}

#[test]
fn test_released_reference_can_be_retrieved_again() {
    let registry = Arc::new(InMemoryRegistry::new());
    let a = register(&registry, "Connection", "conn-A");

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));
    tracker.get_service();
    tracker.release_reference(a.reference());
    assert_eq!(registry.use_count(a.reference()), 0);

    assert_eq!(text(tracker.get_service()).as_deref(), Some("conn-A"));
    assert_eq!(registry.use_count(a.reference()), 1);
}

#[test]
fn test_get_service_for_unavailable_reference() {
    let registry = Arc::new(InMemoryRegistry::new());
    let logger = register(&registry, "Logger", "log-1");

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    assert!(tracker.get_service_for(logger.reference()).is_none());
    assert!(tracker.get_service().is_none());
    assert!(tracker.dependency().is_none());
}

#[test]
fn test_manual_reference_maintenance() {
    let registry = Arc::new(InMemoryRegistry::new());
    let refs: Vec<_> = ["r0", "r1", "r2"]
        .iter()
        .map(|value| register(&registry, "Connection", value).reference())
        .collect();

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));
    tracker.get_service();

    tracker.remove_reference(refs[0]);
    assert_eq!(tracker.available_references(), vec![refs[1], refs[2]]);
    assert!(tracker.tracked_references().is_empty());
    assert_eq!(registry.use_count(refs[0]), 0);
    assert_eq!(text(tracker.get_service()).as_deref(), Some("r1"));

    tracker.add_reference(refs[0]);
    tracker.add_reference(refs[0]);
    assert_eq!(tracker.available_references(), vec![refs[1], refs[2], refs[0]]);
}

#[test]
fn test_single_tracker_notifications() {
    let registry = Arc::new(InMemoryRegistry::new());
    let recorder = Arc::new(Recorder::default());
    let tracker = single_with(&recorder, BindingStrategy::Lazy);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    let a = register(&registry, "Connection", "conn-A");
    let b = register(&registry, "Connection", "conn-B");
    // Modifying a reference nobody resolves to is silent.
    registry.set_properties(&b, &properties(&[("tier", "gold")])).unwrap();
    registry.set_properties(&a, &properties(&[("tier", "gold")])).unwrap();
    registry.unregister(&a).unwrap();
    registry.unregister(&b).unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            (ChangeType::Available, "conn-A".to_string()),
            (ChangeType::Changed, "conn-A".to_string()),
            (ChangeType::Changed, "conn-B".to_string()),
            (ChangeType::Unavailable, String::new()),
        ]
    );
    assert!(tracker.available_references().is_empty());
    assert!(tracker.tracked_references().is_empty());
}

#[test]
fn test_registration_leaving_the_filter_is_removed() {
    let registry = Arc::new(InMemoryRegistry::new());
    let recorder = Arc::new(Recorder::default());
    let tracker = single_with(&recorder, BindingStrategy::Lazy);
    tracker.start(
        registry.clone(),
        &Descriptor::new("Connection").with_property("pool", "primary"),
    );

    let a = register_with(&registry, "Connection", "conn-A", &[("pool", "primary")]);
    assert_eq!(tracker.tracked_references(), vec![a.reference()]);

    registry.set_properties(&a, &properties(&[("pool", "replica")])).unwrap();
    assert!(tracker.available_references().is_empty());
    assert_eq!(registry.use_count(a.reference()), 0);

    registry.set_properties(&a, &properties(&[("pool", "primary")])).unwrap();
    assert_eq!(tracker.available_references(), vec![a.reference()]);

    let kinds: Vec<ChangeType> = recorder.events().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeType::Available, ChangeType::Unavailable, ChangeType::Available]
    );
}

#[test]
fn test_multi_tracker_resolves_every_available_reference() {
    let registry = Arc::new(InMemoryRegistry::new());
    let recorder = Arc::new(Recorder::default());
    let listener: Weak<dyn DependencyListener> = Arc::downgrade(&recorder) as Weak<dyn DependencyListener>;
    let tracker = MultiDependencyTracker::with_listener("plugins", BindingStrategy::Lazy, listener);
    tracker.start(registry.clone(), &Descriptor::new("Plugin"));

    let p1 = register(&registry, "Plugin", "p1");
    let p2 = register(&registry, "Plugin", "p2");
    assert_eq!(tracker.services().len(), 2);
    assert_eq!(tracker.tracked_references(), vec![p1.reference(), p2.reference()]);

    registry.unregister(&p1).unwrap();
    registry.unregister(&p2).unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            (ChangeType::Available, "p1".to_string()),
            (ChangeType::Changed, "p1+p2".to_string()),
            (ChangeType::Changed, "p2".to_string()),
            (ChangeType::Unavailable, String::new()),
        ]
    );
    assert!(tracker.services().is_empty());
    assert!(tracker.dependency().is_none());
}

#[test]
fn test_stop_unsubscribes_and_releases() {
    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, "Connection", "conn-A");
    let recorder = Arc::new(Recorder::default());
    let tracker = single_with(&recorder, BindingStrategy::Eager);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));
    assert_eq!(registry.total_uses(), 1);

    tracker.stop();

    assert!(!tracker.is_started());
    assert_eq!(registry.total_uses(), 0);
    assert_eq!(registry.listener_count(), 0);
    assert_eq!(registry.removed_listener_count(), 1);
    assert!(tracker.available_references().is_empty());

    register(&registry, "Connection", "conn-B");
    assert!(tracker.available_references().is_empty());
    assert!(recorder.events().is_empty());

    // Stopping twice is harmless.
    tracker.stop();
    assert_eq!(registry.removed_listener_count(), 1);
}

#[test]
fn test_closed_registry_starts_empty() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.close();

    let tracker = SingleDependencyTracker::new("db", BindingStrategy::Eager);
    tracker.start(registry.clone(), &Descriptor::new("Connection"));

    assert!(tracker.is_started());
    assert!(tracker.available_references().is_empty());
    assert!(tracker.get_service().is_none());
    tracker.stop();
}
