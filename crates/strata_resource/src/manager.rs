//! Resource Manager - Central resource management
//!
//! Owns the merged binary directory and one entry per directory path. All
//! methods take `&self`; the entry table is guarded by a mutex and a condition
//! variable so that a second request for a resource that is already being
//! parsed waits for that parse instead of starting another one.

use crate::handle::{LoadState, ResourceEvent, ResourceRef};
use crate::loader::{ErasedLoader, LoadContext, PayloadLoader, ResourceLoader, TextLoader};
use crate::types::{
    ComposerDescription, Material, Mesh, PropertyGroup, Resource, SceneTemplate, Script, Shader,
    StateManager, Texture,
};
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard};
use std::any::Any;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use strata_binary::{BinaryDirectory, BinarySource, MergeReport, ResourceUrl};
use strata_core::{ClassRegistry, Error, Result, TypeTag};

/// Predicate deciding whether a directory path may load
pub type ResourceValidator = Box<dyn Fn(&str) -> bool + Send + Sync>;

type SharedObject = Arc<dyn Any + Send + Sync>;

struct Entry {
    resource_type: TypeTag,
    state: LoadState,
    object: Option<SharedObject>,
    ref_count: usize,
    dependencies: Vec<ResourceUrl>,
    loading_thread: Option<ThreadId>,
    load_count: usize,
    stale: bool,
}

impl Entry {
    fn new(resource_type: TypeTag) -> Self {
        Self {
            resource_type,
            state: LoadState::Unresolved,
            object: None,
            ref_count: 0,
            dependencies: Vec::new(),
            loading_thread: None,
            load_count: 0,
            stale: false,
        }
    }
}

/// The main resource manager
pub struct ResourceManager {
    directory: RwLock<BinaryDirectory>,
    loaders: RwLock<ClassRegistry<dyn ErasedLoader>>,
    entries: Mutex<HashMap<String, Entry>>,
    loaded: Condvar,
    validator: RwLock<Option<ResourceValidator>>,
    events: Mutex<Vec<ResourceEvent>>,
}

impl ResourceManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::with_directory(BinaryDirectory::new())
    }

    /// Create a manager over an already merged directory
    pub fn with_directory(directory: BinaryDirectory) -> Self {
        let entries = directory
            .paths()
            .filter_map(|path| {
                directory
                    .get(path)
                    .map(|info| (path.to_string(), Entry::new(info.resource_type.clone())))
            })
            .collect();

        Self {
            directory: RwLock::new(directory),
            loaders: RwLock::new(ClassRegistry::new()),
            entries: Mutex::new(entries),
            loaded: Condvar::new(),
            validator: RwLock::new(None),
            events: Mutex::new(Vec::new()),
        }
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Register a loader for its resource type
    pub fn register_loader<L: ResourceLoader + 'static>(&self, loader: L) -> Result<()> {
        self.loaders
            .write()
            .register(<L::Resource as Resource>::TYPE, Arc::new(loader))
    }

    /// Register or replace the loader for a resource type
    pub fn replace_loader<L: ResourceLoader + 'static>(&self, loader: L) {
        self.loaders
            .write()
            .replace(<L::Resource as Resource>::TYPE, Arc::new(loader));
    }

    /// Register loaders for every built-in payload
    pub fn install_builtin_loaders(&self) -> Result<()> {
        self.register_loader(PayloadLoader::<Shader>::new())?;
        self.register_loader(PayloadLoader::<Texture>::new())?;
        self.register_loader(PayloadLoader::<Material>::new())?;
        self.register_loader(PayloadLoader::<Mesh>::new())?;
        self.register_loader(PayloadLoader::<PropertyGroup>::new())?;
        self.register_loader(PayloadLoader::<StateManager>::new())?;
        self.register_loader(PayloadLoader::<Script>::new())?;
        self.register_loader(PayloadLoader::<ComposerDescription>::new())?;
        self.register_loader(PayloadLoader::<SceneTemplate>::new())?;
        self.register_loader(TextLoader)?;
        Ok(())
    }

    /// Install a validator; paths it refuses never start loading
    pub fn set_validator(&self, validator: impl Fn(&str) -> bool + Send + Sync + 'static) {
        *self.validator.write() = Some(Box::new(validator));
    }

    pub fn clear_validator(&self) {
        *self.validator.write() = None;
    }

    fn is_allowed(&self, key: &str) -> bool {
        self.validator.read().as_ref().map_or(true, |validator| validator(key))
    }

    /// Merge a binary source; its paths replace existing ones
    pub fn add_source(&self, source: BinarySource) -> MergeReport {
        let mut directory = self.directory.write();
        let report = directory.merge(source);

        let mut entries = self.entries.lock();
        for path in report.added.iter().chain(&report.overridden) {
            let Some(info) = directory.get(path) else {
                continue;
            };
            match entries.entry(path.clone()) {
                MapEntry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    entry.resource_type = info.resource_type.clone();
                    if matches!(entry.state, LoadState::Loaded | LoadState::Loading) {
                        entry.stale = true;
                        log::info!("Resource '{}' overridden while loaded, reloads after unload", path);
                    }
                }
                MapEntry::Vacant(slot) => {
                    slot.insert(Entry::new(info.resource_type.clone()));
                }
            }
        }
        report
    }

    /// Read access to the merged directory
    pub fn directory(&self) -> RwLockReadGuard<'_, BinaryDirectory> {
        self.directory.read()
    }

    // ========================================================================
    // Acquire / release
    // ========================================================================

    /// Acquire a resource, loading it if needed
    pub fn acquire<T: Resource>(&self, url: &str) -> Result<ResourceRef<T>> {
        let url = ResourceUrl::parse(url)?;
        let object = self.acquire_erased(&url, &T::TYPE)?;
        match object.downcast::<T>() {
            Ok(object) => Ok(ResourceRef::new(url, object)),
            Err(_) => {
                self.release_key(&url.directory_key());
                Err(Error::type_mismatch(
                    url.to_string(),
                    std::any::type_name::<T>(),
                    "object of another Rust type",
                ))
            }
        }
    }

    pub(crate) fn acquire_erased(&self, url: &ResourceUrl, expected: &TypeTag) -> Result<SharedObject> {
        let key = url.directory_key();
        let mut entries = self.entries.lock();

        loop {
            let entry = entries
                .get_mut(&key)
                .ok_or_else(|| Error::NotFound(url.to_string()))?;
            if entry.resource_type != *expected {
                return Err(Error::type_mismatch(
                    url.to_string(),
                    expected.name(),
                    entry.resource_type.name(),
                ));
            }

            match entry.state {
                LoadState::Loaded => {
                    if let Some(object) = entry.object.clone() {
                        entry.ref_count += 1;
                        return Ok(object);
                    }
                    break;
                }
                LoadState::Loading => {
                    if entry.loading_thread == Some(thread::current().id()) {
                        return Err(Error::Cycle(format!(
                            "'{}' was requested while it is being loaded",
                            url
                        )));
                    }
                    self.loaded.wait(&mut entries);
                }
                LoadState::Unresolved | LoadState::Unloaded => break,
            }
        }

        if !self.is_allowed(&key) {
            log::warn!("Resource '{}' rejected by validator", url);
            self.events.lock().push(ResourceEvent::Rejected(key));
            return Err(Error::Rejected(url.to_string()));
        }

        if let Some(entry) = entries.get_mut(&key) {
            entry.state = LoadState::Loading;
            entry.loading_thread = Some(thread::current().id());
        }
        drop(entries);

        let result = self.load_entry(url, &key, expected);

        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        entry.loading_thread = None;

        let outcome = match result {
            Ok((object, dependencies)) => {
                entry.state = LoadState::Loaded;
                entry.object = Some(object.clone());
                entry.dependencies = dependencies;
                entry.ref_count += 1;
                entry.load_count += 1;
                entry.stale = false;
                log::debug!("Loaded resource '{}' ({})", url, expected);
                self.events.lock().push(ResourceEvent::Loaded(key));
                Ok(object)
            }
            Err(err) => {
                entry.state = LoadState::Unresolved;
                log::warn!("Failed to load resource '{}': {}", url, err);
                self.events
                    .lock()
                    .push(ResourceEvent::Failed(key, err.to_string()));
                Err(err)
            }
        };
        self.loaded.notify_all();
        outcome
    }

    fn load_entry(
        &self,
        url: &ResourceUrl,
        key: &str,
        expected: &TypeTag,
    ) -> Result<(SharedObject, Vec<ResourceUrl>)> {
        let data = self.directory.read().read_entry(key)?;
        let loader = self
            .loaders
            .read()
            .get(expected)
            .ok_or_else(|| Error::NotFound(format!("loader for resource type '{}'", expected)))?;

        let mut ctx = LoadContext::new(url, &data, self);
        match loader.load_erased(&mut ctx) {
            Ok(object) => Ok((object, ctx.into_dependencies())),
            Err(err) => {
                for dependency in ctx.into_dependencies() {
                    self.release_key(&dependency.directory_key());
                }
                Err(err)
            }
        }
    }

    /// Release one reference; returns the remaining count
    pub fn release(&self, url: &str) -> Result<usize> {
        let key = ResourceUrl::parse(url)?.directory_key();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        if entry.ref_count == 0 {
            log::warn!("Release of unreferenced resource '{}'", url);
            return Ok(0);
        }
        entry.ref_count -= 1;
        Ok(entry.ref_count)
    }

    fn release_key(&self, key: &str) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        }
    }

    /// Loaded resource without changing its reference count
    pub fn peek<T: Resource>(&self, url: &str) -> Option<ResourceRef<T>> {
        let url = ResourceUrl::parse(url).ok()?;
        let object = self
            .entries
            .lock()
            .get(&url.directory_key())
            .filter(|entry| entry.state == LoadState::Loaded)
            .and_then(|entry| entry.object.clone())?;
        object
            .downcast::<T>()
            .ok()
            .map(|object| ResourceRef::new(url, object))
    }

    // ========================================================================
    // Unloading
    // ========================================================================

    /// Unload an unreferenced resource; returns whether it was unloaded
    pub fn unload(&self, url: &str) -> Result<bool> {
        let key = ResourceUrl::parse(url)?.directory_key();
        let mut entries = self.entries.lock();
        let entry = entries
            .get(&key)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        if entry.state != LoadState::Loaded || entry.ref_count > 0 {
            return Ok(false);
        }
        self.unload_locked(&mut entries, &key);
        Ok(true)
    }

    /// Unload every unreferenced resource, following released dependencies
    pub fn unload_unused(&self) -> usize {
        let mut entries = self.entries.lock();
        let mut count = 0;
        loop {
            let unused: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.state == LoadState::Loaded && entry.ref_count == 0)
                .map(|(key, _)| key.clone())
                .collect();
            if unused.is_empty() {
                break;
            }
            for key in unused {
                self.unload_locked(&mut entries, &key);
                count += 1;
            }
        }
        count
    }

    fn unload_locked(&self, entries: &mut HashMap<String, Entry>, key: &str) {
        let dependencies = match entries.get_mut(key) {
            Some(entry) => {
                entry.object = None;
                entry.state = LoadState::Unloaded;
                std::mem::take(&mut entry.dependencies)
            }
            None => return,
        };
        for dependency in dependencies {
            if let Some(entry) = entries.get_mut(&dependency.directory_key()) {
                entry.ref_count = entry.ref_count.saturating_sub(1);
            }
        }
        log::debug!("Unloaded resource '{}'", key);
        self.events.lock().push(ResourceEvent::Unloaded(key.to_string()));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn with_entry<R>(&self, url: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let key = ResourceUrl::parse(url).ok()?.directory_key();
        self.entries.lock().get(&key).map(f)
    }

    /// Load state, or `None` if the path is not in the directory
    pub fn state(&self, url: &str) -> Option<LoadState> {
        self.with_entry(url, |entry| entry.state)
    }

    pub fn ref_count(&self, url: &str) -> usize {
        self.with_entry(url, |entry| entry.ref_count).unwrap_or(0)
    }

    /// How many times the payload has been parsed
    pub fn load_count(&self, url: &str) -> usize {
        self.with_entry(url, |entry| entry.load_count).unwrap_or(0)
    }

    /// Whether a newer binary overrode the path after it loaded
    pub fn is_stale(&self, url: &str) -> bool {
        self.with_entry(url, |entry| entry.stale).unwrap_or(false)
    }

    /// Declared type of a path
    pub fn resource_type(&self, url: &str) -> Option<TypeTag> {
        self.with_entry(url, |entry| entry.resource_type.clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.with_entry(url, |_| ()).is_some()
    }

    /// Number of known paths
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of resources currently loaded
    pub fn loaded_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.state == LoadState::Loaded)
            .count()
    }

    /// Drain events
    pub fn drain_events(&self) -> Vec<ResourceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
