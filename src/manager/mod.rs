//! The service manager: per-service dependency reconciliation.
//!
//! A [`ServiceManager`] owns one tracker per declared dependency, decides
//! when its service can be created, rebuilt, updated, or withdrawn, and
//! keeps the service's registry registration in step with that decision.
//!
//! All transitions of one manager are serialized by its transition lock.
//! Tracker notifications are queued and drained by whichever thread holds
//! that lock, so a lifecycle that registers services from inside
//! `create_service` sees its own notifications processed after the current
//! transition instead of deadlocking. Read accessors only take the state
//! lock and never hold up draining.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dependency::{ChangeType, Dependencies, Dependency, ServiceBinding, UpdateStrategy};
use crate::descriptor::Properties;
use crate::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::ServiceLifecycle;
use crate::metrics::{ManagerMetrics, MetricsSnapshot};
use crate::observer::{ManagerEvent, Observers};
use crate::registration::{RegistrationStrategy, RegistryRegistration};
use crate::registry::{Certificate, Instance, Registry};
use crate::tracker::{tracker_for, DependencyEvent, DependencyListener, DependencyTracker};

mod builder;

pub use builder::ManagerBuilder;

/// Manages one service's lifecycle against its dependencies.
///
/// Cloning is cheap and yields another handle to the same manager.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{
///     Dependencies, InMemoryRegistry, Instance, LifecycleResult, Properties, Registry,
///     ServiceDependency, ServiceLifecycle, ServiceManager, TypeTag,
/// };
/// use std::sync::Arc;
///
/// struct Report;
///
/// impl ServiceLifecycle for Report {
///     fn dependency_specs(&self) -> Vec<ServiceDependency> {
///         vec![ServiceDependency::new("db", "Connection")]
///     }
///
///     fn create_service(&self, deps: &Dependencies) -> LifecycleResult<Option<Instance>> {
///         let db = deps.get_required::<String>("db")?;
///         Ok(Some(Arc::new(format!("SVC({})", db))))
///     }
///
///     fn service_class_names(&self) -> Vec<TypeTag> {
///         vec![TypeTag::new("Report")]
///     }
/// }
///
/// let registry = Arc::new(InMemoryRegistry::new());
/// let manager = ServiceManager::new(Arc::new(Report));
/// manager.start(registry.clone()).unwrap();
/// assert!(!manager.is_satisfied());
///
/// registry
///     .register(Arc::new("conn-A".to_string()), &[TypeTag::new("Connection")], &Properties::new())
///     .unwrap();
/// assert!(manager.is_available());
/// let service = manager.service_as::<String>().unwrap();
/// assert_eq!(service.as_str(), "SVC(conn-A)");
///
/// manager.stop();
/// assert!(!manager.is_available());
/// ```
#[derive(Clone)]
pub struct ServiceManager {
    inner: Arc<ManagerInner>,
}

struct ActiveBinding {
    binding: ServiceBinding,
    tracker: Arc<dyn DependencyTracker>,
}

struct ManagerState {
    bindings: BTreeMap<String, ServiceBinding>,
    active: BTreeMap<String, ActiveBinding>,
    cached: Dependencies,
    service: Option<Instance>,
    started: bool,
    registration: Option<Box<dyn RegistrationStrategy>>,
    // A default strategy is bound to the registry it was built for.
    default_registration: bool,
}

pub(crate) struct ManagerInner {
    name: String,
    lifecycle: Arc<dyn ServiceLifecycle>,
    self_ref: Weak<ManagerInner>,
    listening: AtomicBool,
    transition: Mutex<()>,
    state: Mutex<ManagerState>,
    pending: Mutex<VecDeque<DependencyEvent>>,
    properties: Properties,
    observers: Observers,
    metrics: ManagerMetrics,
}

impl ServiceManager {
    /// Starts building a manager for `lifecycle`.
    pub fn builder(lifecycle: Arc<dyn ServiceLifecycle>) -> ManagerBuilder {
        ManagerBuilder::new(lifecycle)
    }

    /// A manager with default lazy bindings and registry registration.
    pub fn new(lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        ManagerBuilder::new(lifecycle).build()
    }

    pub(crate) fn from_parts(
        name: String,
        lifecycle: Arc<dyn ServiceLifecycle>,
        bindings: BTreeMap<String, ServiceBinding>,
        registration: Option<Box<dyn RegistrationStrategy>>,
        properties: Properties,
        observers: Observers,
    ) -> Self {
        let inner = Arc::new_cyclic(|self_ref| ManagerInner {
            name,
            lifecycle,
            self_ref: self_ref.clone(),
            listening: AtomicBool::new(false),
            transition: Mutex::new(()),
            state: Mutex::new(ManagerState {
                bindings,
                active: BTreeMap::new(),
                cached: Dependencies::new(),
                service: None,
                started: false,
                registration,
                default_registration: false,
            }),
            pending: Mutex::new(VecDeque::new()),
            properties,
            observers,
            metrics: ManagerMetrics::new(),
        });
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Binds and starts one tracker per dependency, then tries to create the service.
    ///
    /// Dependencies without an explicit binding get a lazy, type-only one.
    /// Starting a started manager does nothing. Fails only when the
    /// lifecycle declares duplicate dependency names or a binding names a
    /// dependency the lifecycle does not declare.
    pub fn start(&self, registry: Arc<dyn Registry>) -> LifecycleResult<()> {
        let inner = &self.inner;
        {
            let _transition = inner.transition.lock();
            let mut state = inner.state.lock();
            if state.started {
                debug!(manager = %inner.name, "already started");
                return Ok(());
            }
            let bindings = inner.effective_bindings(&state.bindings)?;

            if state.registration.is_none() {
                let lifecycle = inner.lifecycle.clone();
                let strategy = RegistryRegistration::new(
                    registry.clone(),
                    inner.lifecycle.service_class_names(),
                    inner.properties.clone(),
                )
                .with_properties_fn(move |service| lifecycle.service_properties(service));
                state.registration = Some(Box::new(strategy));
                state.default_registration = true;
            }

            inner.listening.store(true, Ordering::SeqCst);
            let listener: Weak<dyn DependencyListener> = inner.self_ref.clone();
            for binding in bindings {
                let tracker = tracker_for(&binding, listener.clone());
                tracker.start(registry.clone(), &binding.descriptor);
                state
                    .active
                    .insert(binding.name().to_string(), ActiveBinding { binding, tracker });
            }
            state.started = true;
            debug!(manager = %inner.name, bindings = state.active.len(), "manager started");

            inner.try_create(&mut state);
        }
        inner.drain();
        Ok(())
    }

    /// Withdraws and disposes the service, then stops every tracker.
    ///
    /// Notifications still in flight are dropped. Stopping a stopped
    /// manager does nothing. A stopped manager can be started again.
    pub fn stop(&self) {
        let inner = &self.inner;
        inner.listening.store(false, Ordering::SeqCst);
        let _transition = inner.transition.lock();
        let mut state = inner.state.lock();
        inner.pending.lock().clear();
        if !state.started {
            return;
        }
        inner.shutdown(&mut state);
        debug!(manager = %inner.name, "manager stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.state.lock().started
    }

    /// True when every required dependency currently resolves.
    pub fn is_satisfied(&self) -> bool {
        let state = self.inner.state.lock();
        state.started && ManagerInner::is_satisfied(&state)
    }

    /// True while a service instance exists.
    pub fn is_available(&self) -> bool {
        self.inner.state.lock().service.is_some()
    }

    /// The current service instance.
    pub fn service(&self) -> Option<Instance> {
        self.inner.state.lock().service.clone()
    }

    /// The current service instance downcast to `T`.
    pub fn service_as<T: std::any::Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.service().and_then(|service| service.downcast::<T>().ok())
    }

    /// Snapshot the current service was last built or updated from.
    pub fn dependencies(&self) -> Dependencies {
        self.inner.state.lock().cached.clone()
    }

    pub fn is_registered(&self) -> bool {
        self.inner
            .state
            .lock()
            .registration
            .as_ref()
            .map(|registration| registration.is_registered())
            .unwrap_or(false)
    }

    pub fn certificate(&self) -> Option<Certificate> {
        self.inner
            .state
            .lock()
            .registration
            .as_ref()
            .and_then(|registration| registration.certificate())
    }

    /// Names of the dependencies currently tracked.
    pub fn tracked_dependencies(&self) -> Vec<String> {
        self.inner.state.lock().active.keys().cloned().collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ServiceManager")
            .field("name", &self.inner.name)
            .field("started", &state.started)
            .field("bindings", &state.active.keys().collect::<Vec<_>>())
            .field("available", &state.service.is_some())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

impl ManagerInner {
    /// Explicit bindings plus default lazy ones for every other declared dependency.
    fn effective_bindings(
        &self,
        explicit: &BTreeMap<String, ServiceBinding>,
    ) -> LifecycleResult<Vec<ServiceBinding>> {
        let specs = self.lifecycle.dependency_specs();
        let mut names = BTreeSet::new();
        for spec in &specs {
            if !names.insert(spec.name.clone()) {
                return Err(LifecycleError::DuplicateDependency(spec.name.clone()));
            }
        }
        if let Some(unknown) = explicit.keys().find(|name| !names.contains(*name)) {
            return Err(LifecycleError::UnknownDependency(unknown.clone()));
        }

        Ok(specs
            .into_iter()
            .map(|spec| match explicit.get(&spec.name) {
                Some(binding) => binding.clone(),
                None => ServiceBinding::lazy(spec),
            })
            .collect())
    }

    fn is_satisfied(state: &ManagerState) -> bool {
        state
            .active
            .values()
            .filter(|active| active.binding.dependency.cardinality.is_required())
            .all(|active| active.tracker.dependency().is_some())
    }

    /// Fresh snapshot of every resolving dependency; unresolved ones are absent.
    fn snapshot(state: &ManagerState) -> Dependencies {
        let mut dependencies = Dependencies::new();
        for (name, active) in &state.active {
            if let Some(value) = active.tracker.dependency() {
                dependencies.insert(name.clone(), value);
            }
        }
        dependencies
    }

    fn notify(&self, event: ManagerEvent) {
        self.observers.notify(&self.name, event);
    }

    fn lifecycle_failed(&self, operation: &str, err: LifecycleError) {
        warn!(manager = %self.name, operation, error = %err, "lifecycle failed");
        self.metrics.record_lifecycle_failure();
        self.notify(ManagerEvent::LifecycleFailed {
            message: err.to_string(),
        });
    }

    fn create(&self, dependencies: &Dependencies) -> Option<Instance> {
        match self.lifecycle.create_service(dependencies) {
            Ok(service) => service,
            Err(err) => {
                self.lifecycle_failed("create_service", err);
                None
            }
        }
    }

    fn dispose(&self, service: Instance, dependencies: &Dependencies) {
        self.lifecycle.dispose_service(&service, dependencies);
        self.metrics.record_disposal();
        self.notify(ManagerEvent::ServiceDisposed { service });
    }

    fn registration(state: &mut ManagerState) -> Option<&mut Box<dyn RegistrationStrategy>> {
        state.registration.as_mut()
    }

    fn try_create(&self, state: &mut ManagerState) {
        if state.service.is_some() || !Self::is_satisfied(state) {
            return;
        }
        state.cached = Self::snapshot(state);
        self.notify(ManagerEvent::AllDependenciesAvailable {
            dependencies: state.cached.clone(),
        });

        match self.create(&state.cached) {
            Some(service) => {
                if let Some(registration) = Self::registration(state) {
                    registration.register(&service);
                }
                debug!(manager = %self.name, "service created");
                self.metrics.record_creation();
                self.notify(ManagerEvent::ServiceCreated {
                    service: service.clone(),
                });
                state.service = Some(service);
            }
            None => debug!(manager = %self.name, "lifecycle not ready, waiting for next change"),
        }
    }

    fn handle_event(&self, state: &mut ManagerState, event: DependencyEvent) {
        if !state.started {
            self.metrics.record_ignored();
            return;
        }
        let Some(active) = state.active.get(event.name()) else {
            warn!(manager = %self.name, dependency = %event.name(), "notification for unknown dependency ignored");
            self.metrics.record_ignored();
            return;
        };
        let update_strategy = active.binding.dependency.update_strategy;

        self.notify(match &event {
            DependencyEvent::Available { name, value } => ManagerEvent::DependencyAvailable {
                name: name.clone(),
                value: value.clone(),
            },
            DependencyEvent::Changed { name, value } => ManagerEvent::DependencyChanged {
                name: name.clone(),
                value: value.clone(),
            },
            DependencyEvent::Unavailable { name } => ManagerEvent::DependencyUnavailable { name: name.clone() },
        });

        if state.service.is_none() {
            self.try_create(state);
            return;
        }
        if !Self::is_satisfied(state) {
            self.withdraw(state);
            return;
        }
        match update_strategy {
            UpdateStrategy::Static => self.static_update(state),
            UpdateStrategy::Dynamic => self.dynamic_update(state, &event),
        }
    }

    /// Required dependency lost: unregister and dispose with the snapshot the service was built from.
    fn withdraw(&self, state: &mut ManagerState) {
        debug!(manager = %self.name, "required dependency lost, withdrawing service");
        if let Some(registration) = Self::registration(state) {
            registration.unregister();
        }
        let previous = std::mem::take(&mut state.cached);
        if let Some(service) = state.service.take() {
            self.metrics.record_teardown();
            self.dispose(service, &previous);
        }
        state.cached = Self::snapshot(state);
    }

    fn static_update(&self, state: &mut ManagerState) {
        let fresh = Self::snapshot(state);
        if fresh.same_as(&state.cached) {
            debug!(manager = %self.name, "dependency snapshot unchanged, no rebuild");
            return;
        }
        let previous = std::mem::replace(&mut state.cached, fresh);
        let Some(old_service) = state.service.take() else {
            return;
        };

        match self.create(&state.cached) {
            Some(service) if Arc::ptr_eq(&service, &old_service) => {
                if let Some(registration) = Self::registration(state) {
                    registration.update_registration(Some(&service));
                }
                debug!(manager = %self.name, "rebuild returned the live instance, kept");
                state.service = Some(service);
            }
            Some(service) => {
                if let Some(registration) = Self::registration(state) {
                    registration.update_registration(Some(&service));
                }
                self.dispose(old_service, &previous);
                debug!(manager = %self.name, "service rebuilt");
                self.metrics.record_rebuild();
                self.notify(ManagerEvent::ServiceCreated {
                    service: service.clone(),
                });
                state.service = Some(service);
            }
            None => {
                // The old instance was built from a snapshot that no longer holds.
                warn!(manager = %self.name, "rebuild produced no service, withdrawing the old one");
                if let Some(registration) = Self::registration(state) {
                    registration.unregister();
                }
                self.dispose(old_service, &previous);
            }
        }
    }

    fn dynamic_update(&self, state: &mut ManagerState, event: &DependencyEvent) {
        let fresh = Self::snapshot(state);
        let previous = std::mem::replace(&mut state.cached, fresh);
        let Some(current) = state.service.clone() else {
            return;
        };
        let name = event.name();
        let Some(change) = Self::observed_change(event, previous.value(name), state.cached.value(name)) else {
            debug!(manager = %self.name, dependency = %name, "notification overtaken by a later change, skipped");
            return;
        };
        self.metrics.record_dynamic_update();

        let updated = match self.lifecycle.handle_dependency_change(
            &current,
            change,
            name,
            state.cached.value(name),
            &state.cached,
        ) {
            Ok(updated) => updated,
            Err(err) => {
                self.lifecycle_failed("handle_dependency_change", err);
                None
            }
        };

        match updated {
            Some(service) if Arc::ptr_eq(&service, &current) => {
                if let Some(registration) = Self::registration(state) {
                    registration.update_registration(Some(&service));
                }
            }
            Some(service) => {
                if let Some(registration) = Self::registration(state) {
                    registration.update_registration(Some(&service));
                }
                self.dispose(current, &previous);
                self.notify(ManagerEvent::ServiceCreated {
                    service: service.clone(),
                });
                state.service = Some(service);
            }
            None => {
                debug!(manager = %self.name, "lifecycle withdrew the service");
                if let Some(registration) = Self::registration(state) {
                    registration.update_registration(None);
                }
                state.service = None;
                self.dispose(current, &previous);
            }
        }
    }

    /// Change of one dependency between two snapshots.
    ///
    /// Trackers notify after releasing their lock, so queued events for one
    /// binding may arrive out of order. The snapshots are authoritative; the
    /// event only tells a modification of the same instance apart from a
    /// stale notification.
    fn observed_change(
        event: &DependencyEvent,
        previous: Option<&Dependency>,
        fresh: Option<&Dependency>,
    ) -> Option<ChangeType> {
        match (previous, fresh) {
            (None, Some(_)) => Some(ChangeType::Available),
            (Some(_), None) => Some(ChangeType::Unavailable),
            (Some(old), Some(new)) if !old.same_as(new) => Some(ChangeType::Changed),
            (Some(_), Some(_)) if event.change_type() == ChangeType::Changed => Some(ChangeType::Changed),
            _ => None,
        }
    }

    /// Teardown shared by `stop` and drop.
    fn shutdown(&self, state: &mut ManagerState) {
        if let Some(registration) = Self::registration(state) {
            registration.unregister();
        }
        let cached = std::mem::take(&mut state.cached);
        if let Some(service) = state.service.take() {
            self.dispose(service, &cached);
        }
        for active in state.active.values() {
            active.tracker.release_all();
            active.tracker.stop();
        }
        state.active.clear();
        if state.default_registration {
            state.registration = None;
            state.default_registration = false;
        }
        state.started = false;
    }

    /// Applies queued notifications unless another transition is in progress.
    fn drain(&self) {
        loop {
            {
                let Some(_transition) = self.transition.try_lock() else {
                    return;
                };
                let mut state = self.state.lock();
                loop {
                    let next = self.pending.lock().pop_front();
                    let Some(event) = next else {
                        break;
                    };
                    if !self.listening.load(Ordering::SeqCst) {
                        self.metrics.record_ignored();
                        continue;
                    }
                    self.handle_event(&mut state, event);
                }
            }
            // Another thread may have queued work after our last pop and lost the try_lock race.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }
}

impl DependencyListener for ManagerInner {
    fn dependency_changed(&self, event: DependencyEvent) {
        if !self.listening.load(Ordering::SeqCst) {
            self.metrics.record_ignored();
            return;
        }
        self.pending.lock().push_back(event);
        self.drain();
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.started {
            debug!(manager = %self.name, "manager dropped while started, shutting down");
            self.shutdown(&mut state);
        }
    }
}
