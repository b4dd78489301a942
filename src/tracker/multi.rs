//! Tracker for multiple dependencies.

use std::sync::{Arc, Weak};

use super::{delegate_tracker, DependencyListener, TrackerCore, TrackerMode};
use crate::dependency::BindingStrategy;
use crate::registry::Instance;

/// Resolves a multiple dependency to every available instance.
///
/// Instances are ordered by arrival. An empty set resolves to nothing, so a
/// mandatory multiple dependency needs at least one instance.
pub struct MultiDependencyTracker {
    core: Arc<TrackerCore>,
}

impl MultiDependencyTracker {
    pub fn new(name: impl Into<String>, strategy: BindingStrategy) -> Self {
        Self {
            core: TrackerCore::new(name.into(), TrackerMode::Multiple, strategy, None),
        }
    }

    pub fn with_listener(
        name: impl Into<String>,
        strategy: BindingStrategy,
        listener: Weak<dyn DependencyListener>,
    ) -> Self {
        Self {
            core: TrackerCore::new(name.into(), TrackerMode::Multiple, strategy, Some(listener)),
        }
    }

    /// Every available instance, retrieving those not tracked yet.
    pub fn services(&self) -> Vec<Instance> {
        self.core
            .dependency()
            .map(|value| value.instances().to_vec())
            .unwrap_or_default()
    }
}

delegate_tracker!(MultiDependencyTracker);
