//! # Dependency lists.
//!
//! A [`Deps`] value identifies "what inputs a producer closes over". Two lists are
//! the same identity when they have the same length and every key compares equal
//! (shallow equality, in order). The engine bumps its generation whenever the
//! identity changes.
//!
//! Keys are **opaque comparison values**, not the inputs themselves. Callers holding
//! reference types (resources, configs) must map them to stable keys such as ids,
//! names or resource versions; otherwise every observation would look like a change.
//!
//! ```rust
//! use fetchvisor::{DepKey, Deps};
//!
//! let a = Deps::new().with("project-a").with(3_u32);
//! let b = Deps::from(["project-a"]).with(3_u32);
//! assert_eq!(a, b);
//! assert_ne!(a, Deps::new().with("project-b").with(3_u32));
//! assert_eq!(a.keys()[0], DepKey::from("project-a"));
//! ```

use std::sync::Arc;

/// One opaque comparison key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// Absent/optional input.
    None,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer (ids, versions).
    Uint(u64),
    /// String key (names, namespaces, uids).
    Str(Arc<str>),
}

impl From<bool> for DepKey {
    fn from(v: bool) -> Self {
        DepKey::Bool(v)
    }
}

impl From<i32> for DepKey {
    fn from(v: i32) -> Self {
        DepKey::Int(i64::from(v))
    }
}

impl From<i64> for DepKey {
    fn from(v: i64) -> Self {
        DepKey::Int(v)
    }
}

impl From<u32> for DepKey {
    fn from(v: u32) -> Self {
        DepKey::Uint(u64::from(v))
    }
}

impl From<u64> for DepKey {
    fn from(v: u64) -> Self {
        DepKey::Uint(v)
    }
}

impl From<usize> for DepKey {
    fn from(v: usize) -> Self {
        DepKey::Uint(v as u64)
    }
}

impl From<&str> for DepKey {
    fn from(v: &str) -> Self {
        DepKey::Str(Arc::from(v))
    }
}

impl From<String> for DepKey {
    fn from(v: String) -> Self {
        DepKey::Str(Arc::from(v))
    }
}

impl From<Arc<str>> for DepKey {
    fn from(v: Arc<str>) -> Self {
        DepKey::Str(v)
    }
}

impl<K: Into<DepKey>> From<Option<K>> for DepKey {
    fn from(v: Option<K>) -> Self {
        v.map_or(DepKey::None, Into::into)
    }
}

/// Ordered list of dependency keys compared by shallow equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Deps(Vec<DepKey>);

impl Deps {
    /// Empty list: the producer closes over nothing that can change.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key.
    pub fn with(mut self, key: impl Into<DepKey>) -> Self {
        self.0.push(key.into());
        self
    }

    /// The keys, in order.
    pub fn keys(&self) -> &[DepKey] {
        &self.0
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty list.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<DepKey>, const N: usize> From<[K; N]> for Deps {
    fn from(keys: [K; N]) -> Self {
        Deps(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<DepKey>> FromIterator<K> for Deps {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Deps(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matters() {
        let a: Deps = ["ns", "name"].into();
        let b: Deps = ["name", "ns"].into();
        assert_ne!(a, b);
    }

    #[test]
    fn length_matters() {
        let a = Deps::new().with("ns");
        let b = Deps::new().with("ns").with(DepKey::None);
        assert_ne!(a, b);
    }

    #[test]
    fn optional_inputs_map_to_none_key() {
        let missing: Option<&str> = None;
        let deps = Deps::new().with(missing).with(Some("model"));
        assert_eq!(deps.keys(), &[DepKey::None, DepKey::from("model")]);
    }

    #[test]
    fn equal_values_from_different_allocations_are_equal() {
        let owned = String::from("project");
        let a = Deps::new().with(owned.clone());
        let b = Deps::new().with(owned.as_str());
        assert_eq!(a, b);
    }
}
