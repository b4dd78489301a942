//! Fluent construction of service managers.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ServiceManager;
use crate::dependency::ServiceBinding;
use crate::descriptor::Properties;
use crate::lifecycle::ServiceLifecycle;
use crate::observer::{ManagerObserver, Observers};
use crate::registration::RegistrationStrategy;

/// Builder for [`ServiceManager`].
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{
///     BindingStrategy, Dependencies, Descriptor, Instance, LifecycleResult, LoggingObserver,
///     ServiceBinding, ServiceDependency, ServiceLifecycle, ServiceManager, TypeTag,
/// };
/// use std::sync::Arc;
///
/// struct Cache;
///
/// impl ServiceLifecycle for Cache {
///     fn dependency_specs(&self) -> Vec<ServiceDependency> {
///         vec![ServiceDependency::new("store", "Store")]
///     }
///
///     fn create_service(&self, _deps: &Dependencies) -> LifecycleResult<Option<Instance>> {
///         Ok(Some(Arc::new(())))
///     }
///
///     fn service_class_names(&self) -> Vec<TypeTag> {
///         vec![TypeTag::new("Cache")]
///     }
/// }
///
/// let manager = ServiceManager::builder(Arc::new(Cache))
///     .name("cache")
///     .binding(ServiceBinding::new(
///         ServiceDependency::new("store", "Store"),
///         Descriptor::new("Store").with_property("tier", "fast"),
///         BindingStrategy::Eager,
///     ))
///     .property("owner", "billing")
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
///
/// assert_eq!(manager.name(), "cache");
/// ```
pub struct ManagerBuilder {
    lifecycle: Arc<dyn ServiceLifecycle>,
    name: Option<String>,
    bindings: BTreeMap<String, ServiceBinding>,
    registration: Option<Box<dyn RegistrationStrategy>>,
    properties: Properties,
    observers: Observers,
}

impl ManagerBuilder {
    pub fn new(lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        Self {
            lifecycle,
            name: None,
            bindings: BTreeMap::new(),
            registration: None,
            properties: Properties::new(),
            observers: Observers::default(),
        }
    }

    /// Name used in logs and observer callbacks; defaults to the first service type tag.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit binding for one dependency, replacing its default lazy binding.
    pub fn binding(mut self, binding: ServiceBinding) -> Self {
        self.bindings.insert(binding.name().to_string(), binding);
        self
    }

    pub fn bindings(mut self, bindings: impl IntoIterator<Item = ServiceBinding>) -> Self {
        for binding in bindings {
            self.bindings.insert(binding.name().to_string(), binding);
        }
        self
    }

    /// Custom registration strategy. Without one, the manager registers the
    /// service in the registry it is started with.
    pub fn registration(mut self, strategy: impl RegistrationStrategy + 'static) -> Self {
        self.registration = Some(Box::new(strategy));
        self
    }

    /// Base registration property for the default strategy.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ManagerObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> ServiceManager {
        let name = self.name.unwrap_or_else(|| {
            self.lifecycle
                .service_class_names()
                .first()
                .map(|tag| tag.to_string())
                .unwrap_or_else(|| "service".to_string())
        });
        ServiceManager::from_parts(
            name,
            self.lifecycle,
            self.bindings,
            self.registration,
            self.properties,
            self.observers,
        )
    }
}
