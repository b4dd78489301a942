//! Typed observation of manager transitions.
//!
//! Every dependency notification a manager acts on, and every service it
//! creates or disposes, is reported to the registered observers as a
//! [`ManagerEvent`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dependency::{Dependencies, Dependency};
use crate::registry::Instance;

/// One observable transition of a [`ServiceManager`](crate::ServiceManager).
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A dependency started resolving
    DependencyAvailable { name: String, value: Dependency },
    /// A resolved dependency was replaced or modified
    DependencyChanged { name: String, value: Dependency },
    /// A dependency stopped resolving
    DependencyUnavailable { name: String },
    /// Every required dependency resolves and creation is about to be attempted
    AllDependenciesAvailable { dependencies: Dependencies },
    /// A new service instance was built and handed to the registration strategy
    ServiceCreated { service: Instance },
    /// A service instance was disposed
    ServiceDisposed { service: Instance },
    /// The lifecycle reported an error; the manager treats it as "not ready"
    LifecycleFailed { message: String },
}

impl ManagerEvent {
    /// Short, stable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ManagerEvent::DependencyAvailable { .. } => "dependency_available",
            ManagerEvent::DependencyChanged { .. } => "dependency_changed",
            ManagerEvent::DependencyUnavailable { .. } => "dependency_unavailable",
            ManagerEvent::AllDependenciesAvailable { .. } => "all_dependencies_available",
            ManagerEvent::ServiceCreated { .. } => "service_created",
            ManagerEvent::ServiceDisposed { .. } => "service_disposed",
            ManagerEvent::LifecycleFailed { .. } => "lifecycle_failed",
        }
    }
}

/// Observer of manager transitions.
///
/// Called synchronously with the manager's lock held, in transition order.
/// Keep implementations cheap and never call back into the same manager;
/// forward to a channel when more work is needed.
///
/// # Examples
///
/// ```
/// use ferrous_lifecycle::{ManagerEvent, ManagerObserver};
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct KindRecorder {
///     kinds: Mutex<Vec<&'static str>>,
/// }
///
/// impl ManagerObserver for KindRecorder {
///     fn on_event(&self, _manager: &str, event: &ManagerEvent) {
///         self.kinds.lock().unwrap().push(event.kind());
///     }
/// }
/// ```
pub trait ManagerObserver: Send + Sync {
    fn on_event(&self, manager: &str, event: &ManagerEvent);
}

/// Observers attached to one manager.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ManagerObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ManagerObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn notify(&self, manager: &str, event: ManagerEvent) {
        for observer in &self.observers {
            observer.on_event(manager, &event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Built-in observer that forwards every event to `tracing`.
///
/// Service creation and disposal are logged at `info`, dependency traffic
/// at `debug`, lifecycle failures at `warn`.
///
/// # Examples
///
/// ```
/// use ferrous_lifecycle::LoggingObserver;
///
/// let observer = LoggingObserver::with_prefix("[billing]");
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-lifecycle]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerObserver for LoggingObserver {
    fn on_event(&self, manager: &str, event: &ManagerEvent) {
        let prefix = self.prefix.as_str();
        match event {
            ManagerEvent::DependencyAvailable { name, value } => {
                debug!(prefix, manager, dependency = %name, instances = value.instances().len(), "dependency available")
            }
            ManagerEvent::DependencyChanged { name, value } => {
                debug!(prefix, manager, dependency = %name, instances = value.instances().len(), "dependency changed")
            }
            ManagerEvent::DependencyUnavailable { name } => {
                debug!(prefix, manager, dependency = %name, "dependency unavailable")
            }
            ManagerEvent::AllDependenciesAvailable { dependencies } => {
                debug!(prefix, manager, resolved = dependencies.len(), "all dependencies available")
            }
            ManagerEvent::ServiceCreated { .. } => info!(prefix, manager, "service created"),
            ManagerEvent::ServiceDisposed { .. } => info!(prefix, manager, "service disposed"),
            ManagerEvent::LifecycleFailed { message } => {
                warn!(prefix, manager, error = %message, "lifecycle failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, &'static str)>>,
    }

    impl ManagerObserver for Recorder {
        fn on_event(&self, manager: &str, event: &ManagerEvent) {
            self.seen.lock().unwrap().push((manager.to_string(), event.kind()));
        }
    }

    #[test]
    fn test_observers_notified_in_registration_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let mut observers = Observers::default();
        observers.add(first.clone());
        observers.add(second.clone());
        observers.add(Arc::new(LoggingObserver::new()));

        observers.notify("svc", ManagerEvent::DependencyUnavailable { name: "db".to_string() });

        assert_eq!(observers.len(), 3);
        assert_eq!(*first.seen.lock().unwrap(), vec![("svc".to_string(), "dependency_unavailable")]);
        assert_eq!(*second.seen.lock().unwrap(), vec![("svc".to_string(), "dependency_unavailable")]);
    }
}
