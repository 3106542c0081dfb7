//! Resource loaders
//!
//! Loaders turn the bytes of a directory entry into a typed object. They are
//! registered per resource type tag, so plugins can add resource kinds the
//! engine has never heard of.

use crate::handle::ResourceRef;
use crate::manager::ResourceManager;
use crate::types::{decode, Payload, Resource, Text};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use strata_binary::ResourceUrl;
use strata_core::{Error, Result, TypeTag};

/// Context provided to loaders during loading
pub struct LoadContext<'a> {
    url: &'a ResourceUrl,
    data: &'a [u8],
    manager: &'a ResourceManager,
    dependencies: Vec<ResourceUrl>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(url: &'a ResourceUrl, data: &'a [u8], manager: &'a ResourceManager) -> Self {
        Self {
            url,
            data,
            manager,
            dependencies: Vec::new(),
        }
    }

    /// URL of the resource being loaded
    pub fn url(&self) -> &'a ResourceUrl {
        self.url
    }

    /// Raw entry bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read data as UTF-8
    pub fn read_string(&self) -> Result<&'a str> {
        std::str::from_utf8(self.data)
            .map_err(|e| Error::invalid_data(self.url.to_string(), format!("invalid UTF-8: {}", e)))
    }

    /// Acquire a resource this one depends on.
    ///
    /// The dependency stays acquired for as long as the dependent is loaded;
    /// if the dependent's load fails it is released again.
    pub fn acquire_dependency<T: Resource>(&mut self, url: &str) -> Result<ResourceRef<T>> {
        let object = self.acquire_erased(url, &T::TYPE)?;
        let url = ResourceUrl::parse(url)?;
        object
            .downcast::<T>()
            .map(|object| ResourceRef::new(url.clone(), object))
            .map_err(|_| Error::type_mismatch(url.to_string(), std::any::type_name::<T>(), "other object"))
    }

    pub(crate) fn acquire_erased(
        &mut self,
        url: &str,
        expected: &TypeTag,
    ) -> Result<Arc<dyn Any + Send + Sync>> {
        let wrap = |source: Error| Error::DependencyLoad {
            resource: self.url.to_string(),
            dependency: url.to_string(),
            source: Box::new(source),
        };
        let parsed = ResourceUrl::parse(url).map_err(wrap)?;
        let object = self.manager.acquire_erased(&parsed, expected).map_err(wrap)?;
        self.dependencies.push(parsed);
        Ok(object)
    }

    pub(crate) fn into_dependencies(self) -> Vec<ResourceUrl> {
        self.dependencies
    }
}

/// Trait for resource loaders
pub trait ResourceLoader: Send + Sync {
    /// Resource type this loader produces
    type Resource: Resource;

    /// Build the resource from the entry bytes
    fn load(&self, ctx: &mut LoadContext) -> Result<Self::Resource>;
}

/// Type-erased loader stored in the manager's class table
pub trait ErasedLoader: Send + Sync {
    /// Resource type this loader produces
    fn resource_type(&self) -> TypeTag;

    /// Load a resource into a shared `Any`
    fn load_erased(&self, ctx: &mut LoadContext) -> Result<Arc<dyn Any + Send + Sync>>;
}

impl<L: ResourceLoader> ErasedLoader for L {
    fn resource_type(&self) -> TypeTag {
        <L::Resource as Resource>::TYPE
    }

    fn load_erased(&self, ctx: &mut LoadContext) -> Result<Arc<dyn Any + Send + Sync>> {
        self.load(ctx)
            .map(|resource| Arc::new(resource) as Arc<dyn Any + Send + Sync>)
    }
}

/// Loader for any bincode payload; acquires the payload's dependencies
pub struct PayloadLoader<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PayloadLoader<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PayloadLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> ResourceLoader for PayloadLoader<T> {
    type Resource = T;

    fn load(&self, ctx: &mut LoadContext) -> Result<T> {
        let payload = decode::<T>(ctx.data())?;
        for (url, expected) in payload.dependencies() {
            ctx.acquire_erased(&url, &expected)?;
        }
        Ok(payload)
    }
}

/// Loader for raw UTF-8 text entries
#[derive(Default)]
pub struct TextLoader;

impl ResourceLoader for TextLoader {
    type Resource = Text;

    fn load(&self, ctx: &mut LoadContext) -> Result<Text> {
        Ok(Text {
            content: ctx.read_string()?.to_string(),
        })
    }
}
