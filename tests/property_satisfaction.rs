/// Property-based tests for manager satisfaction
///
/// For any sequence of dependency arrivals and departures, the manager is
/// satisfied exactly when every mandatory dependency has a registration, and
/// a service exists exactly when it is satisfied.

mod common;

use common::*;
use ferrous_lifecycle::{
    Cardinality, Certificate, InMemoryRegistry, Registry, ServiceDependency, ServiceManager,
};
use proptest::prelude::*;
use std::sync::Arc;

fn tag(index: usize) -> String {
    format!("T{}", index)
}

proptest! {
    #[test]
    fn satisfaction_tracks_mandatory_presence(
        count in 1usize..5,
        operations in prop::collection::vec((0usize..5, any::<bool>()), 0..30),
    ) {
        let registry = Arc::new(InMemoryRegistry::new());
        let specs = (0..count)
            .map(|index| ServiceDependency::new(format!("d{}", index), tag(index)))
            .collect();
        let lifecycle = RecordingLifecycle::new(specs);
        let manager = ServiceManager::new(lifecycle.clone());
        manager.start(registry.clone()).unwrap();

        let mut present: Vec<Vec<Certificate>> = vec![Vec::new(); count];
        for (index, add) in operations {
            let index = index % count;
            if add {
                present[index].push(register(&registry, &tag(index), "v"));
            } else if let Some(cert) = present[index].pop() {
                registry.unregister(&cert).unwrap();
            }

            let all_present = present.iter().all(|certs| !certs.is_empty());
            prop_assert_eq!(manager.is_satisfied(), all_present);
            prop_assert_eq!(manager.is_available(), all_present);
            prop_assert_eq!(svc_registrations(&registry), usize::from(all_present));
        }

        manager.stop();
        prop_assert_eq!(lifecycle.creates(), lifecycle.disposed().len());
    }
}

proptest! {
    #[test]
    fn optional_dependencies_never_affect_satisfaction(
        operations in prop::collection::vec(any::<bool>(), 0..20),
    ) {
        let registry = Arc::new(InMemoryRegistry::new());
        let lifecycle = RecordingLifecycle::new(vec![
            ServiceDependency::new("cache", "Cache").cardinality(Cardinality::OptionalUnary),
            ServiceDependency::new("plugins", "Plugin").cardinality(Cardinality::OptionalMultiple),
        ]);
        let manager = ServiceManager::new(lifecycle.clone());
        manager.start(registry.clone()).unwrap();

        let mut certs = Vec::new();
        for add in operations {
            if add {
                certs.push(register(&registry, "Cache", "c"));
                certs.push(register(&registry, "Plugin", "p"));
            } else if let Some(cert) = certs.pop() {
                registry.unregister(&cert).unwrap();
            }
            prop_assert!(manager.is_satisfied());
            prop_assert!(manager.is_available());
        }
    }
}
