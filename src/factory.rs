//! Lifecycle constructors looked up by type tag.
//!
//! Configuration refers to lifecycles by a string tag. The factory maps
//! each tag to a constructor registered up front, so an unknown tag is
//! detected when the configuration is loaded rather than when a service
//! is first needed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::Properties;
use crate::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::ServiceLifecycle;

/// Constructor for one lifecycle kind, parameterized by string properties.
pub type LifecycleConstructor =
    Arc<dyn Fn(&Properties) -> LifecycleResult<Arc<dyn ServiceLifecycle>> + Send + Sync>;

/// Table of lifecycle constructors keyed by type tag.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{
///     Dependencies, Instance, LifecycleFactory, LifecycleResult, Properties, ServiceDependency,
///     ServiceLifecycle, TypeTag,
/// };
/// use std::sync::Arc;
///
/// struct Pool {
///     size: usize,
/// }
///
/// impl ServiceLifecycle for Pool {
///     fn dependency_specs(&self) -> Vec<ServiceDependency> {
///         Vec::new()
///     }
///
///     fn create_service(&self, _deps: &Dependencies) -> LifecycleResult<Option<Instance>> {
///         Ok(Some(Arc::new(self.size)))
///     }
///
///     fn service_class_names(&self) -> Vec<TypeTag> {
///         vec![TypeTag::new("Pool")]
///     }
/// }
///
/// let mut factory = LifecycleFactory::new();
/// factory.register("pool", |params| {
///     let size = params.get("size").and_then(|s| s.parse().ok()).unwrap_or(4);
///     Ok(Arc::new(Pool { size }) as Arc<dyn ServiceLifecycle>)
/// });
///
/// assert!(factory.contains("pool"));
/// let lifecycle = factory.create("pool", &Properties::new()).unwrap();
/// assert_eq!(lifecycle.service_class_names(), vec![TypeTag::new("Pool")]);
/// assert!(factory.create("missing", &Properties::new()).is_err());
/// ```
#[derive(Default, Clone)]
pub struct LifecycleFactory {
    constructors: HashMap<String, LifecycleConstructor>,
}

impl LifecycleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the constructor for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&Properties) -> LifecycleResult<Arc<dyn ServiceLifecycle>> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.constructors.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Builds the lifecycle registered under `tag`.
    pub fn create(&self, tag: &str, parameters: &Properties) -> LifecycleResult<Arc<dyn ServiceLifecycle>> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| LifecycleError::UnknownLifecycle(tag.to_string()))?;
        constructor(parameters)
    }
}

impl std::fmt::Debug for LifecycleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleFactory")
            .field("tags", &self.tags())
            .finish()
    }
}
