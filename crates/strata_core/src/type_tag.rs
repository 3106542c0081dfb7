//! Open type tags and per-type class tables
//!
//! Object, resource, and composer types are not a closed enum: plugins and
//! tests introduce new ones at runtime. A `TypeTag` is a string-backed
//! identifier that can still be written as a `const`, and a `ClassRegistry`
//! maps tags to capability objects (the per-type function table a node,
//! loader, or composer kind dispatches through).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Open, string-backed type identifier
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Tag usable in `const` items
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Tag created at runtime
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The tag's name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
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
        Self::new(name)
    }
}

/// Capability objects keyed by type tag
pub struct ClassRegistry<C: ?Sized> {
    classes: BTreeMap<TypeTag, Arc<C>>,
}

impl<C: ?Sized> ClassRegistry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    /// Register a class; fails if the tag is taken
    pub fn register(&mut self, tag: TypeTag, class: Arc<C>) -> Result<()> {
        if self.classes.contains_key(&tag) {
            return Err(Error::DuplicateName(tag.to_string()));
        }
        self.classes.insert(tag, class);
        Ok(())
    }

    /// Register or replace a class, returning the previous one
    pub fn replace(&mut self, tag: TypeTag, class: Arc<C>) -> Option<Arc<C>> {
        self.classes.insert(tag, class)
    }

    /// Class for a tag
    pub fn get(&self, tag: &TypeTag) -> Option<Arc<C>> {
        self.classes.get(tag).cloned()
    }

    /// Class for a tag name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<C>> {
        self.classes
            .iter()
            .find(|(tag, _)| tag.name() == name)
            .map(|(_, class)| class.clone())
    }

    /// Check if a tag is registered
    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.classes.contains_key(tag)
    }

    /// Registered tags in order
    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.classes.keys()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl<C: ?Sized> Default for ClassRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    const ENGLISH: TypeTag = TypeTag::from_static("English");

    #[test]
    fn test_static_and_runtime_tags_compare_equal() {
        assert_eq!(ENGLISH, TypeTag::new("English"));
        assert_eq!(ENGLISH.to_string(), "English");
    }

    #[test]
    fn test_register_and_dispatch() {
        let mut registry: ClassRegistry<dyn Greeter> = ClassRegistry::new();
        registry.register(ENGLISH, Arc::new(English)).unwrap();

        let class = registry.get(&TypeTag::new("English")).unwrap();
        assert_eq!(class.greet(), "hello");
        assert!(registry.get_by_name("French").is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry: ClassRegistry<dyn Greeter> = ClassRegistry::new();
        registry.register(ENGLISH, Arc::new(English)).unwrap();
        let err = registry.register(ENGLISH, Arc::new(English)).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "English"));
        assert_eq!(registry.len(), 1);
    }
}
