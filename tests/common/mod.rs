//! Shared fixtures for integration tests.
#![allow(dead_code)]

use ferrous_lifecycle::{
    Certificate, ChangeType, Dependencies, Dependency, InMemoryRegistry, Instance, LifecycleError,
    LifecycleResult, ManagerEvent, ManagerObserver, Properties, Registry, ServiceDependency, ServiceLifecycle,
    TypeTag,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Service built by [`RecordingLifecycle`].
#[derive(Debug)]
pub struct Svc {
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Build,
    NotReady,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    Keep,
    Replace,
    Withdraw,
}

/// Lifecycle that records every call the manager makes into it.
pub struct RecordingLifecycle {
    specs: Vec<ServiceDependency>,
    pub creates: AtomicUsize,
    pub disposed: Mutex<Vec<String>>,
    pub disposed_with: Mutex<Vec<Vec<String>>>,
    pub changes: Mutex<Vec<(ChangeType, String)>>,
    pub create_mode: Mutex<CreateMode>,
    pub change_mode: Mutex<ChangeMode>,
}

impl RecordingLifecycle {
    pub fn new(specs: Vec<ServiceDependency>) -> Arc<Self> {
        Arc::new(Self {
            specs,
            creates: AtomicUsize::new(0),
            disposed: Mutex::new(Vec::new()),
            disposed_with: Mutex::new(Vec::new()),
            changes: Mutex::new(Vec::new()),
            create_mode: Mutex::new(CreateMode::Build),
            change_mode: Mutex::new(ChangeMode::Keep),
        })
    }

    pub fn set_create_mode(&self, mode: CreateMode) {
        *self.create_mode.lock().unwrap() = mode;
    }

    pub fn set_change_mode(&self, mode: ChangeMode) {
        *self.change_mode.lock().unwrap() = mode;
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> Vec<String> {
        self.disposed.lock().unwrap().clone()
    }

    pub fn changes(&self) -> Vec<(ChangeType, String)> {
        self.changes.lock().unwrap().clone()
    }
}

/// "a+b" for multiple values, the string itself for single ones.
pub fn describe(value: &Dependency) -> String {
    value
        .instances()
        .iter()
        .map(|instance| {
            instance
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "?".to_string())
        })
        .collect::<Vec<_>>()
        .join("+")
}

pub fn label_for(dependencies: &Dependencies) -> String {
    let parts: Vec<String> = dependencies.iter().map(|(_, value)| describe(value)).collect();
    format!("SVC({})", parts.join(","))
}

impl ServiceLifecycle for RecordingLifecycle {
    fn dependency_specs(&self) -> Vec<ServiceDependency> {
        self.specs.clone()
    }

    fn create_service(&self, dependencies: &Dependencies) -> LifecycleResult<Option<Instance>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        match *self.create_mode.lock().unwrap() {
            CreateMode::Build => Ok(Some(Arc::new(Svc {
                label: label_for(dependencies),
            }))),
            CreateMode::NotReady => Ok(None),
            CreateMode::Fail => Err(LifecycleError::LifecycleFailed("boom".to_string())),
        }
    }

    fn handle_dependency_change(
        &self,
        service: &Instance,
        change: ChangeType,
        name: &str,
        _value: Option<&Dependency>,
        dependencies: &Dependencies,
    ) -> LifecycleResult<Option<Instance>> {
        self.changes.lock().unwrap().push((change, name.to_string()));
        match *self.change_mode.lock().unwrap() {
            ChangeMode::Keep => Ok(Some(service.clone())),
            ChangeMode::Replace => Ok(Some(Arc::new(Svc {
                label: label_for(dependencies),
            }))),
            ChangeMode::Withdraw => Ok(None),
        }
    }

    fn dispose_service(&self, service: &Instance, dependencies: &Dependencies) {
        let label = service
            .downcast_ref::<Svc>()
            .map(|svc| svc.label.clone())
            .unwrap_or_default();
        self.disposed.lock().unwrap().push(label);
        self.disposed_with
            .lock()
            .unwrap()
            .push(dependencies.names().map(str::to_string).collect());
    }

    fn service_class_names(&self) -> Vec<TypeTag> {
        vec![TypeTag::new("Svc")]
    }

    fn service_properties(&self, service: &Instance) -> Properties {
        let mut props = Properties::new();
        if let Some(svc) = service.downcast_ref::<Svc>() {
            props.insert("label".to_string(), svc.label.clone());
        }
        props
    }
}

/// Observer keeping the kinds of every event seen.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<ManagerEvent>>,
}

impl EventLog {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ManagerEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ManagerObserver for EventLog {
    fn on_event(&self, _manager: &str, event: &ManagerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn register(registry: &InMemoryRegistry, tag: &str, value: &str) -> Certificate {
    registry
        .register(Arc::new(value.to_string()), &[TypeTag::new(tag)], &Properties::new())
        .unwrap()
}

pub fn register_with(registry: &InMemoryRegistry, tag: &str, value: &str, props: &[(&str, &str)]) -> Certificate {
    registry
        .register(Arc::new(value.to_string()), &[TypeTag::new(tag)], &properties(props))
        .unwrap()
}

pub fn properties(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn label(service: Option<Instance>) -> Option<String> {
    service.and_then(|service| service.downcast_ref::<Svc>().map(|svc| svc.label.clone()))
}

pub fn svc_registrations(registry: &InMemoryRegistry) -> usize {
    registry.references_of(&TypeTag::new("Svc")).len()
}
