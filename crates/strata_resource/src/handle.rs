//! Resource handles
//!
//! A `ResourceRef` is the shared handle an `acquire` hands back. Cloning it
//! does not touch the manager's reference count; every successful `acquire`
//! is matched by one `release` of the same URL.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use strata_binary::ResourceUrl;

/// Load state of a resource entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Path known, bytes not parsed
    Unresolved,
    /// Parse in progress
    Loading,
    /// Typed object available
    Loaded,
    /// Object freed, metadata kept
    Unloaded,
}

impl LoadState {
    /// Whether the next acquire has to parse the payload
    pub fn needs_load(self) -> bool {
        matches!(self, Self::Unresolved | Self::Unloaded)
    }
}

/// Event from the resource manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Resource finished loading
    Loaded(String),
    /// Resource failed to load
    Failed(String, String),
    /// Resource was unloaded
    Unloaded(String),
    /// Validator refused the path
    Rejected(String),
}

/// Shared handle to a loaded resource
pub struct ResourceRef<T> {
    url: ResourceUrl,
    object: Arc<T>,
}

impl<T> ResourceRef<T> {
    pub(crate) fn new(url: ResourceUrl, object: Arc<T>) -> Self {
        Self { url, object }
    }

    /// URL the resource was acquired with
    pub fn url(&self) -> &ResourceUrl {
        &self.url
    }

    /// The shared object
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Whether two handles point at the same loaded object
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.object, &b.object)
    }
}

impl<T> Clone for ResourceRef<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            object: self.object.clone(),
        }
    }
}

impl<T> Deref for ResourceRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T> fmt::Debug for ResourceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("url", &self.url.to_string())
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
