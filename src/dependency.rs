//! Dependency declarations, bindings, and resolved dependency values.

use std::any::Any;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, Properties, TypeTag};
use crate::error::{LifecycleError, LifecycleResult};
use crate::registry::Instance;

/// How many instances a dependency takes and whether the service needs it.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::Cardinality;
///
/// assert!(Cardinality::MandatoryUnary.is_required());
/// assert!(!Cardinality::MandatoryUnary.is_multiple());
/// assert_eq!(Cardinality::new(false, true), Cardinality::OptionalMultiple);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Cardinality {
    /// Zero or one instance, never blocks creation
    OptionalUnary,
    /// Exactly one instance must be present
    MandatoryUnary,
    /// Any number of instances, never blocks creation
    OptionalMultiple,
    /// At least one instance must be present
    MandatoryMultiple,
}

impl Cardinality {
    pub fn new(required: bool, multiple: bool) -> Self {
        match (required, multiple) {
            (false, false) => Cardinality::OptionalUnary,
            (true, false) => Cardinality::MandatoryUnary,
            (false, true) => Cardinality::OptionalMultiple,
            (true, true) => Cardinality::MandatoryMultiple,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Cardinality::MandatoryUnary | Cardinality::MandatoryMultiple)
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Cardinality::OptionalMultiple | Cardinality::MandatoryMultiple)
    }
}

/// How a running service absorbs a change to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum UpdateStrategy {
    /// The service is rebuilt from scratch
    Static,
    /// The lifecycle's `handle_dependency_change` is called
    Dynamic,
}

/// Whether a tracker resolves instances up front or on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum BindingStrategy {
    /// Retrieve matching instances as soon as they are seen
    Eager,
    /// Retrieve an instance only when its value is asked for
    #[default]
    Lazy,
}

/// Kind of change delivered to a dynamic lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// The dependency went from unresolved to resolved
    Available,
    /// The resolved value was replaced or its registration modified
    Changed,
    /// The dependency no longer resolves
    Unavailable,
}

/// One named dependency slot a lifecycle requires.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{Cardinality, ServiceDependency, UpdateStrategy};
///
/// let db = ServiceDependency::new("db", "Connection");
/// assert_eq!(db.cardinality, Cardinality::MandatoryUnary);
/// assert_eq!(db.update_strategy, UpdateStrategy::Static);
///
/// let plugins = ServiceDependency::new("plugins", "Plugin")
///     .cardinality(Cardinality::OptionalMultiple)
///     .update_strategy(UpdateStrategy::Dynamic);
/// assert!(plugins.cardinality.is_multiple());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDependency {
    /// Name, unique within one lifecycle
    pub name: String,
    pub type_tag: TypeTag,
    pub cardinality: Cardinality,
    pub update_strategy: UpdateStrategy,
    /// Properties an explicit binding may use as its filter
    pub match_properties: Properties,
}

impl ServiceDependency {
    /// A mandatory, single, statically updated dependency.
    pub fn new(name: impl Into<String>, type_tag: impl Into<TypeTag>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            cardinality: Cardinality::MandatoryUnary,
            update_strategy: UpdateStrategy::Static,
            match_properties: Properties::new(),
        }
    }

    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn update_strategy(mut self, update_strategy: UpdateStrategy) -> Self {
        self.update_strategy = update_strategy;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_properties.insert(key.into(), value.into());
        self
    }
}

/// A dependency paired with the descriptor its tracker queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    pub dependency: ServiceDependency,
    pub descriptor: Descriptor,
    pub strategy: BindingStrategy,
}

impl ServiceBinding {
    pub fn new(dependency: ServiceDependency, descriptor: Descriptor, strategy: BindingStrategy) -> Self {
        Self {
            dependency,
            descriptor,
            strategy,
        }
    }

    /// Lazy binding against the dependency's type with no property filter.
    pub fn lazy(dependency: ServiceDependency) -> Self {
        let descriptor = Descriptor::new(dependency.type_tag.clone());
        Self::new(dependency, descriptor, BindingStrategy::Lazy)
    }

    /// Binding filtered by the dependency's own match properties.
    pub fn matching(dependency: ServiceDependency, strategy: BindingStrategy) -> Self {
        let descriptor = Descriptor::new(dependency.type_tag.clone())
            .with_properties(dependency.match_properties.clone());
        Self::new(dependency, descriptor, strategy)
    }

    pub fn name(&self) -> &str {
        &self.dependency.name
    }
}

/// Resolved value of one dependency.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Value of a unary dependency
    Single(Instance),
    /// Values of a multiple dependency, oldest registration first
    Multiple(Vec<Instance>),
}

impl Dependency {
    /// Identity comparison: same variant holding the same instances in the same order.
    pub fn same_as(&self, other: &Dependency) -> bool {
        match (self, other) {
            (Dependency::Single(a), Dependency::Single(b)) => Arc::ptr_eq(a, b),
            (Dependency::Multiple(a), Dependency::Multiple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }

    /// All instances held by this value.
    pub fn instances(&self) -> &[Instance] {
        match self {
            Dependency::Single(instance) => std::slice::from_ref(instance),
            Dependency::Multiple(instances) => instances,
        }
    }

    /// The first instance downcast to `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instances()
            .first()
            .and_then(|instance| instance.clone().downcast::<T>().ok())
    }
}

/// Snapshot of every resolved dependency, keyed by dependency name.
///
/// Unresolved dependencies are absent rather than present with an empty
/// value.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{Dependencies, Dependency};
/// use std::sync::Arc;
///
/// let mut deps = Dependencies::new();
/// deps.insert("db", Dependency::Single(Arc::new("conn-A".to_string())));
///
/// let db = deps.get::<String>("db").unwrap();
/// assert_eq!(db.as_str(), "conn-A");
/// assert!(deps.get::<String>("cache").is_none());
/// assert!(deps.get_required::<u32>("db").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    values: BTreeMap<String, Dependency>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Dependency) {
        self.values.insert(name.into(), value);
    }

    pub fn value(&self, name: &str) -> Option<&Dependency> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The (first) instance of `name` downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get(name).and_then(|value| value.downcast::<T>())
    }

    pub fn get_required<T: Any + Send + Sync>(&self, name: &str) -> LifecycleResult<Arc<T>> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| LifecycleError::MissingDependency(name.to_string()))?;
        value
            .downcast::<T>()
            .ok_or(LifecycleError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Every instance of `name` that downcasts to `T`.
    pub fn get_all<T: Any + Send + Sync>(&self, name: &str) -> Vec<Arc<T>> {
        self.values
            .get(name)
            .map(|value| {
                value
                    .instances()
                    .iter()
                    .filter_map(|instance| instance.clone().downcast::<T>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Dependency> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// True if both snapshots hold the same names bound to identical instances.
    pub fn same_as(&self, other: &Dependencies) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(name, value)| {
                other
                    .values
                    .get(name)
                    .map(|theirs| value.same_as(theirs))
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_as_uses_identity_not_equality() {
        let a: Instance = Arc::new("conn".to_string());
        let b: Instance = Arc::new("conn".to_string());

        let mut left = Dependencies::new();
        left.insert("db", Dependency::Single(a.clone()));
        let mut right = Dependencies::new();
        right.insert("db", Dependency::Single(a));
        assert!(left.same_as(&right));

        right.insert("db", Dependency::Single(b));
        assert!(!left.same_as(&right));
    }

    #[test]
    fn test_same_as_detects_missing_names() {
        let a: Instance = Arc::new(1u32);
        let mut left = Dependencies::new();
        left.insert("db", Dependency::Single(a.clone()));
        left.insert("cache", Dependency::Single(a.clone()));
        let mut right = Dependencies::new();
        right.insert("db", Dependency::Single(a));

        assert!(!left.same_as(&right));
        assert!(!right.same_as(&left));
    }

    #[test]
    fn test_multiple_order_matters() {
        let a: Instance = Arc::new(1u32);
        let b: Instance = Arc::new(2u32);
        let ab = Dependency::Multiple(vec![a.clone(), b.clone()]);
        let ba = Dependency::Multiple(vec![b, a]);
        assert!(!ab.same_as(&ba));
        assert!(ab.same_as(&ab.clone()));
    }

    #[test]
    fn test_get_all_filters_by_type() {
        let mut deps = Dependencies::new();
        deps.insert(
            "plugins",
            Dependency::Multiple(vec![
                Arc::new(1u32) as Instance,
                Arc::new("x".to_string()) as Instance,
                Arc::new(3u32) as Instance,
            ]),
        );
        let numbers: Vec<u32> = deps.get_all::<u32>("plugins").iter().map(|n| **n).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(deps.get_all::<u32>("missing").is_empty());
    }

    #[test]
    fn test_matching_binding_uses_match_properties() {
        let dep = ServiceDependency::new("db", "Connection").with_property("pool", "primary");
        let lazy = ServiceBinding::lazy(dep.clone());
        let matching = ServiceBinding::matching(dep, BindingStrategy::Eager);

        assert!(lazy.descriptor.properties.is_empty());
        assert_eq!(matching.descriptor.properties.get("pool").map(String::as_str), Some("primary"));
        assert_eq!(matching.strategy, BindingStrategy::Eager);
    }
}
