//! JSON configuration for service managers.
//!
//! A configuration names a lifecycle by type tag, passes it string
//! parameters, and optionally overrides the binding of individual
//! dependencies:
//!
//! ```json
//! {
//!   "name": "reports",
//!   "lifecycle": "report-service",
//!   "parameters": { "title": "Daily" },
//!   "properties": { "owner": "billing" },
//!   "bindings": [
//!     { "dependency": "db", "filter": { "pool": "primary" }, "strategy": "eager" }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dependency::{BindingStrategy, ServiceBinding};
use crate::descriptor::{Descriptor, Properties, TypeTag};
use crate::error::{LifecycleError, LifecycleResult};
use crate::factory::LifecycleFactory;
use crate::manager::ServiceManager;

/// Binding override for one declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Name of the dependency as declared by the lifecycle
    pub dependency: String,
    /// Type to look up instead of the declared one
    #[serde(default)]
    pub type_tag: Option<TypeTag>,
    /// Property filter; when absent the dependency's match properties are used
    #[serde(default)]
    pub filter: Option<Properties>,
    #[serde(default)]
    pub strategy: BindingStrategy,
}

/// One managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Manager name for logs; defaults to the service's first type tag
    #[serde(default)]
    pub name: Option<String>,
    /// Tag of the lifecycle constructor in the [`LifecycleFactory`]
    pub lifecycle: String,
    /// Passed to the lifecycle constructor
    #[serde(default)]
    pub parameters: Properties,
    /// Base registration properties of the service
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl ManagerConfig {
    pub fn from_json(json: &str) -> LifecycleResult<Self> {
        serde_json::from_str(json).map_err(|err| LifecycleError::Config(err.to_string()))
    }

    /// Parses a JSON array of manager configurations.
    pub fn from_json_list(json: &str) -> LifecycleResult<Vec<Self>> {
        serde_json::from_str(json).map_err(|err| LifecycleError::Config(err.to_string()))
    }

    pub fn to_json(&self) -> LifecycleResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| LifecycleError::Config(err.to_string()))
    }

    /// Constructs the lifecycle and a manager with the configured bindings.
    ///
    /// Fails on unknown lifecycle tags, on bindings for dependencies the
    /// lifecycle does not declare, and on a dependency bound twice.
    pub fn build(&self, factory: &LifecycleFactory) -> LifecycleResult<ServiceManager> {
        let lifecycle = factory.create(&self.lifecycle, &self.parameters)?;
        let specs = lifecycle.dependency_specs();

        let mut bindings = Vec::with_capacity(self.bindings.len());
        let mut seen = BTreeSet::new();
        for config in &self.bindings {
            if !seen.insert(config.dependency.as_str()) {
                return Err(LifecycleError::Config(format!(
                    "dependency '{}' is bound more than once",
                    config.dependency
                )));
            }
            let dependency = specs
                .iter()
                .find(|spec| spec.name == config.dependency)
                .cloned()
                .ok_or_else(|| LifecycleError::UnknownDependency(config.dependency.clone()))?;
            let type_tag = config
                .type_tag
                .clone()
                .unwrap_or_else(|| dependency.type_tag.clone());
            let filter = config
                .filter
                .clone()
                .unwrap_or_else(|| dependency.match_properties.clone());
            let descriptor = Descriptor::new(type_tag).with_properties(filter);
            bindings.push(ServiceBinding::new(dependency, descriptor, config.strategy));
        }

        let mut builder = ServiceManager::builder(lifecycle)
            .bindings(bindings)
            .properties(self.properties.clone());
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        Ok(builder.build())
    }
}

/// Builds one manager per configuration, failing on the first bad entry.
pub fn build_all(configs: &[ManagerConfig], factory: &LifecycleFactory) -> LifecycleResult<Vec<ServiceManager>> {
    configs.iter().map(|config| config.build(factory)).collect()
}
