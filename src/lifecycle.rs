//! The capability a concrete service type implements.

use crate::dependency::{ChangeType, Dependencies, Dependency, ServiceDependency};
use crate::descriptor::{Properties, TypeTag};
use crate::error::LifecycleResult;
use crate::registry::Instance;

/// Knows how to build, update, and dispose one kind of service.
///
/// The manager calls these methods with its own lock held; they must not
/// call back into the same manager. They may freely use the registry.
///
/// Returning `Ok(None)` from [`create_service`](ServiceLifecycle::create_service)
/// means "not ready yet": the manager retries on the next dependency change.
/// An `Err` is logged and handled the same way.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{
///     Dependencies, Instance, LifecycleResult, ServiceDependency, ServiceLifecycle, TypeTag,
/// };
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// impl ServiceLifecycle for Greeter {
///     fn dependency_specs(&self) -> Vec<ServiceDependency> {
///         vec![ServiceDependency::new("name", "Name")]
///     }
///
///     fn create_service(&self, deps: &Dependencies) -> LifecycleResult<Option<Instance>> {
///         let name = deps.get_required::<String>("name")?;
///         Ok(Some(Arc::new(format!("Hello, {}", name))))
///     }
///
///     fn service_class_names(&self) -> Vec<TypeTag> {
///         vec![TypeTag::new("Greeting")]
///     }
/// }
/// ```
pub trait ServiceLifecycle: Send + Sync + 'static {
    /// The dependency slots this service needs. Names must be unique.
    fn dependency_specs(&self) -> Vec<ServiceDependency>;

    /// Builds the service from a fully resolved snapshot.
    fn create_service(&self, dependencies: &Dependencies) -> LifecycleResult<Option<Instance>>;

    /// Absorbs a change to a dynamically updated dependency.
    ///
    /// Return the same instance to keep it, another instance to replace it,
    /// or `None` to withdraw the service. Keeps the service by default.
    fn handle_dependency_change(
        &self,
        service: &Instance,
        change: ChangeType,
        name: &str,
        value: Option<&Dependency>,
        dependencies: &Dependencies,
    ) -> LifecycleResult<Option<Instance>> {
        let _ = (change, name, value, dependencies);
        Ok(Some(service.clone()))
    }

    /// Tears down a service built from `dependencies`.
    fn dispose_service(&self, service: &Instance, dependencies: &Dependencies) {
        let _ = (service, dependencies);
    }

    /// Type tags the service is published under.
    fn service_class_names(&self) -> Vec<TypeTag>;

    /// Extra registration properties for a built service.
    fn service_properties(&self, service: &Instance) -> Properties {
        let _ = service;
        Properties::new()
    }
}
