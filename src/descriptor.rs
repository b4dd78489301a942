//! Type tags and lookup descriptors used to query the registry.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Registration and filter properties.
///
/// Ordered so that property sets compare and print deterministically.
pub type Properties = BTreeMap<String, String>;

/// Identifier for a service type as published in the registry.
///
/// Services are registered under one or more type tags and dependencies
/// are looked up by a single tag. Tags are plain strings so that services
/// published by one component can be consumed by another without sharing
/// Rust types; [`TypeTag::of`] derives one from a Rust type when both sides
/// do share it.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::TypeTag;
///
/// struct Connection;
///
/// let by_name = TypeTag::new("db.Connection");
/// let by_type = TypeTag::of::<Connection>();
///
/// assert_eq!(by_name.as_str(), "db.Connection");
/// assert!(by_type.as_str().ends_with("Connection"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(transparent))]
pub struct TypeTag(String);

impl TypeTag {
    /// Creates a tag from an arbitrary name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a tag from a Rust type's name.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A type tag plus a property filter.
///
/// A registered service matches when it was published under the
/// descriptor's type tag and every filter entry is present with the same
/// value in the service's registration properties. Extra registration
/// properties are ignored.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{Descriptor, Properties, TypeTag};
///
/// let descriptor = Descriptor::new("db.Connection").with_property("pool", "primary");
///
/// let mut props = Properties::new();
/// props.insert("pool".to_string(), "primary".to_string());
/// props.insert("region".to_string(), "eu".to_string());
///
/// assert!(descriptor.matches(&[TypeTag::new("db.Connection")], &props));
/// assert!(!descriptor.matches(&[TypeTag::new("db.Connection")], &Properties::new()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Type the service must be registered under
    pub type_tag: TypeTag,
    /// Properties the registration must carry
    pub properties: Properties,
}

impl Descriptor {
    /// Creates a type-only descriptor with an empty filter.
    pub fn new(type_tag: impl Into<TypeTag>) -> Self {
        Self {
            type_tag: type_tag.into(),
            properties: Properties::new(),
        }
    }

    /// Adds a required property to the filter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole property filter.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Returns true if a registration under `class_names` with `properties` matches.
    pub fn matches(&self, class_names: &[TypeTag], properties: &Properties) -> bool {
        class_names.contains(&self.type_tag)
            && self
                .properties
                .iter()
                .all(|(key, value)| properties.get(key) == Some(value))
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_tag)?;
        if !self.properties.is_empty() {
            let filter: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "[{}]", filter.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_only_descriptor_matches_any_properties() {
        let descriptor = Descriptor::new("Connection");
        let mut props = Properties::new();
        props.insert("anything".to_string(), "goes".to_string());

        assert!(descriptor.matches(&[TypeTag::new("Connection")], &props));
        assert!(descriptor.matches(&[TypeTag::new("Other"), TypeTag::new("Connection")], &Properties::new()));
        assert!(!descriptor.matches(&[TypeTag::new("Other")], &props));
    }

    #[test]
    fn test_filter_value_must_be_equal() {
        let descriptor = Descriptor::new("Connection").with_property("pool", "primary");
        let mut props = Properties::new();
        props.insert("pool".to_string(), "replica".to_string());

        assert!(!descriptor.matches(&[TypeTag::new("Connection")], &props));
    }

    #[test]
    fn test_display() {
        let descriptor = Descriptor::new("Connection")
            .with_property("b", "2")
            .with_property("a", "1");
        assert_eq!(descriptor.to_string(), "Connection[a=1,b=2]");
        assert_eq!(Descriptor::new("Connection").to_string(), "Connection");
    }
}
