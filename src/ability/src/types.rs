//! Core ability types: subjects and the catch-all markers

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Subject marker matching every subject type
pub const ALL_SUBJECTS: &str = "all";

/// Action marker matching every action (aliases the CRUD baseline)
pub const MANAGE: &str = "manage";

/// Baseline actions covered by [`MANAGE`]
pub const CRUD_ACTIONS: [&str; 4] = ["create", "read", "update", "delete"];

/// One name or a list of names (actions, subjects, fields, alias targets)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names(Vec<String>);

impl Names {
    /// Names in declaration order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterate over the names
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// True when no name was given
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the underlying list
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Names {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for Names {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for Names {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for Names {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Names {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Names {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

/// A concrete instance of a protected resource
///
/// Conditions are evaluated against the structural view returned by
/// [`Subject::attributes`]. Wrapped values (ids, timestamps, ...) should be
/// reduced to their canonical primitive there, which is what a `Serialize`
/// impl already does, so two different wrappers around the same primitive
/// compare equal.
pub trait Subject {
    /// Logical subject type name (e.g. "Post")
    fn subject_name(&self) -> Cow<'_, str>;

    /// Nested key/value view of the instance
    fn attributes(&self) -> Value;
}

/// Subject argument of a decision query: a bare type name or an instance
#[derive(Clone, Copy)]
pub enum SubjectRef<'a> {
    /// Type-level check, e.g. `can("read", "Post")`
    Type(&'a str),

    /// Instance-level check
    Instance(&'a dyn Subject),
}

impl<'a> SubjectRef<'a> {
    /// Structural data for condition evaluation, `None` for bare types
    pub fn data(&self) -> Option<Value> {
        match self {
            SubjectRef::Type(_) => None,
            SubjectRef::Instance(instance) => Some(instance.attributes()),
        }
    }

    /// Owned copy of the argument, kept on denial errors
    pub fn to_value(&self) -> SubjectValue {
        match self {
            SubjectRef::Type(name) => SubjectValue::Type((*name).to_string()),
            SubjectRef::Instance(instance) => SubjectValue::Instance {
                name: instance.subject_name().into_owned(),
                attributes: instance.attributes(),
            },
        }
    }
}

impl<'a> From<&'a str> for SubjectRef<'a> {
    fn from(name: &'a str) -> Self {
        SubjectRef::Type(name)
    }
}

impl<'a, T: Subject> From<&'a T> for SubjectRef<'a> {
    fn from(instance: &'a T) -> Self {
        SubjectRef::Instance(instance)
    }
}

impl std::fmt::Debug for SubjectRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectRef::Type(name) => f.debug_tuple("Type").field(name).finish(),
            SubjectRef::Instance(instance) => f
                .debug_tuple("Instance")
                .field(&instance.subject_name())
                .finish(),
        }
    }
}

/// Owned form of a [`SubjectRef`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectValue {
    /// Bare subject type name
    Type(String),

    /// Instance snapshot
    Instance {
        /// Subject type name reported by the instance
        name: String,
        /// Structural view at the time of the check
        attributes: Value,
    },
}

/// Generic instance: a subject type name plus arbitrary nested data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Subject type name
    #[serde(rename = "type")]
    pub name: String,

    /// Instance data
    #[serde(default)]
    pub attributes: Value,
}

impl Instance {
    /// Create an instance from a type name and JSON data
    pub fn new(name: impl Into<String>, attributes: Value) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Create an instance from any serializable value
    ///
    /// # Errors
    ///
    /// Returns [`crate::AbilityError::Serialization`] if `value` cannot be
    /// represented as JSON (e.g. a map with non-string keys).
    pub fn from_serialize<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self> {
        let attributes = serde_json::to_value(value)?;
        Ok(Self::new(name, attributes))
    }
}

impl Subject for Instance {
    fn subject_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn attributes(&self) -> Value {
        self.attributes.clone()
    }
}

/// Pluggable mapping from a subject argument to its type name
pub type SubjectNameResolver = Arc<dyn Fn(&SubjectRef<'_>) -> String + Send + Sync>;

/// Default resolver: the string itself, or the instance's own name
pub fn default_subject_name(subject: &SubjectRef<'_>) -> String {
    match subject {
        SubjectRef::Type(name) => (*name).to_string(),
        SubjectRef::Instance(instance) => instance.subject_name().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Post {
        title: String,
        views: u32,
    }

    #[test]
    fn test_subject_ref_from_str() {
        let subject: SubjectRef<'_> = "Post".into();
        assert_eq!(default_subject_name(&subject), "Post");
        assert!(subject.data().is_none());
        assert_eq!(subject.to_value(), SubjectValue::Type("Post".to_string()));
    }

    #[test]
    fn test_instance_from_serialize() {
        let post = Post {
            title: "hello".to_string(),
            views: 3,
        };
        let instance = Instance::from_serialize("Post", &post).unwrap();
        let subject: SubjectRef<'_> = (&instance).into();

        assert_eq!(default_subject_name(&subject), "Post");
        assert_eq!(subject.data(), Some(json!({"title": "hello", "views": 3})));
    }

    #[test]
    fn test_instance_from_unserializable_value() {
        use crate::error::AbilityError;
        use std::collections::HashMap;

        let mut grid: HashMap<(u8, u8), u8> = HashMap::new();
        grid.insert((0, 0), 1);

        let result = Instance::from_serialize("Board", &grid);
        assert!(matches!(result, Err(AbilityError::Serialization(_))));
    }
}
