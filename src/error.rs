//! Error types for the lifecycle engine.

use std::fmt;

use crate::registry::Reference;

/// Lifecycle and registry errors
///
/// Most of these never escape the engine: registry failures are logged and
/// absorbed where they occur, and lifecycle failures are treated as "service
/// not yet ready". The variants that do surface come from configuration
/// mistakes caught by [`ServiceManager::start`](crate::ServiceManager::start)
/// or from the typed accessors on [`Dependencies`](crate::Dependencies).
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::LifecycleError;
///
/// let missing = LifecycleError::MissingDependency("db".to_string());
/// assert_eq!(missing.to_string(), "Dependency not available: db");
///
/// let unknown = LifecycleError::UnknownLifecycle("com.example.Cache".to_string());
/// println!("Error: {}", unknown);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The registry rejected or could not serve a request
    RegistryUnavailable(String),
    /// A reference or certificate the registry does not know about
    UnknownReference(Reference),
    /// A binding or notification names an undeclared dependency
    UnknownDependency(String),
    /// Two dependency specs share a name
    DuplicateDependency(String),
    /// A required dependency has no resolved value
    MissingDependency(String),
    /// Resolved instance has a different concrete type than requested
    TypeMismatch(&'static str),
    /// No constructor registered for a lifecycle type tag
    UnknownLifecycle(String),
    /// A lifecycle could not build or update its service
    LifecycleFailed(String),
    /// Malformed configuration document
    Config(String),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::RegistryUnavailable(msg) => write!(f, "Registry unavailable: {}", msg),
            LifecycleError::UnknownReference(reference) => write!(f, "Unknown reference: {}", reference),
            LifecycleError::UnknownDependency(name) => write!(f, "Unknown dependency: {}", name),
            LifecycleError::DuplicateDependency(name) => write!(f, "Duplicate dependency: {}", name),
            LifecycleError::MissingDependency(name) => write!(f, "Dependency not available: {}", name),
            LifecycleError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            LifecycleError::UnknownLifecycle(tag) => write!(f, "No lifecycle registered for: {}", tag),
            LifecycleError::LifecycleFailed(msg) => write!(f, "Lifecycle failed: {}", msg),
            LifecycleError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;
