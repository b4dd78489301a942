//! Publishing built services to the registry.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::descriptor::{Properties, TypeTag};
use crate::registry::{Certificate, Instance, Registry};

/// Owns the registration of one managed service.
///
/// Implementations are idempotent: registering twice or unregistering an
/// unregistered service does nothing. `is_registered()` is true exactly
/// when a certificate is held, and that certificate belongs to the last
/// instance passed to `register` or `update_registration`.
pub trait RegistrationStrategy: Send {
    /// Publishes `service` unless something is already registered.
    fn register(&mut self, service: &Instance);

    /// Withdraws the current registration, if any.
    fn unregister(&mut self);

    /// Moves the registration to `service`.
    ///
    /// `None` unregisters, an unregistered strategy registers, the identical
    /// instance is left alone, anything else is registered before the old
    /// registration is withdrawn.
    fn update_registration(&mut self, service: Option<&Instance>);

    fn is_registered(&self) -> bool;

    fn certificate(&self) -> Option<Certificate>;
}

type PropertiesFn = Box<dyn Fn(&Instance) -> Properties + Send>;

struct Registered {
    certificate: Certificate,
    service: Instance,
    properties: Properties,
}

/// Default strategy: registers under fixed type tags with merged properties.
///
/// Registration properties are the configured base properties overlaid
/// with whatever the optional properties function returns for the instance.
/// Updating to the same instance re-publishes its properties in place when
/// they changed.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{InMemoryRegistry, Properties, RegistrationStrategy, RegistryRegistration, TypeTag};
/// use std::sync::Arc;
///
/// let registry = Arc::new(InMemoryRegistry::new());
/// let mut strategy = RegistryRegistration::new(registry.clone(), vec![TypeTag::new("Cache")], Properties::new());
///
/// let service: ferrous_lifecycle::Instance = Arc::new(42u32);
/// strategy.register(&service);
/// strategy.register(&service);
/// assert!(strategy.is_registered());
/// assert_eq!(registry.len(), 1);
///
/// strategy.unregister();
/// strategy.unregister();
/// assert!(registry.is_empty());
/// ```
pub struct RegistryRegistration {
    registry: Arc<dyn Registry>,
    class_names: Vec<TypeTag>,
    properties: Properties,
    properties_fn: Option<PropertiesFn>,
    current: Option<Registered>,
}

impl RegistryRegistration {
    pub fn new(registry: Arc<dyn Registry>, class_names: Vec<TypeTag>, properties: Properties) -> Self {
        Self {
            registry,
            class_names,
            properties,
            properties_fn: None,
            current: None,
        }
    }

    /// Adds per-instance properties on top of the base properties.
    pub fn with_properties_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance) -> Properties + Send + 'static,
    {
        self.properties_fn = Some(Box::new(f));
        self
    }

    /// Instance currently published, if any.
    pub fn registered_service(&self) -> Option<&Instance> {
        self.current.as_ref().map(|current| &current.service)
    }

    fn merged_properties(&self, service: &Instance) -> Properties {
        let mut merged = self.properties.clone();
        if let Some(f) = &self.properties_fn {
            merged.extend(f(service));
        }
        merged
    }

    fn publish(&self, service: &Instance) -> Option<Registered> {
        let properties = self.merged_properties(service);
        match self.registry.register(service.clone(), &self.class_names, &properties) {
            Ok(certificate) => {
                debug!(reference = %certificate.reference(), "service registered");
                Some(Registered {
                    certificate,
                    service: service.clone(),
                    properties,
                })
            }
            Err(err) => {
                warn!(error = %err, "service registration failed");
                None
            }
        }
    }

    fn withdraw(&self, registered: Registered) {
        match self.registry.unregister(&registered.certificate) {
            Ok(()) => debug!(reference = %registered.certificate.reference(), "service unregistered"),
            Err(err) => warn!(error = %err, "service unregistration failed"),
        }
    }
}

impl RegistrationStrategy for RegistryRegistration {
    fn register(&mut self, service: &Instance) {
        if self.current.is_some() {
            return;
        }
        self.current = self.publish(service);
    }

    fn unregister(&mut self) {
        if let Some(registered) = self.current.take() {
            self.withdraw(registered);
        }
    }

    fn update_registration(&mut self, service: Option<&Instance>) {
        let Some(service) = service else {
            self.unregister();
            return;
        };
        let Some(current) = &self.current else {
            self.register(service);
            return;
        };

        if Arc::ptr_eq(&current.service, service) {
            let properties = self.merged_properties(service);
            if properties != current.properties {
                match self.registry.set_properties(&current.certificate, &properties) {
                    Ok(()) => {
                        if let Some(current) = &mut self.current {
                            current.properties = properties;
                        }
                    }
                    Err(err) => warn!(error = %err, "registration properties update failed"),
                }
            }
            return;
        }

        // Register the replacement first so consumers never see a gap.
        let replacement = self.publish(service);
        if let Some(old) = self.current.take() {
            self.withdraw(old);
        }
        self.current = replacement;
    }

    fn is_registered(&self) -> bool {
        self.current.is_some()
    }

    fn certificate(&self) -> Option<Certificate> {
        self.current.as_ref().map(|current| current.certificate.clone())
    }
}
