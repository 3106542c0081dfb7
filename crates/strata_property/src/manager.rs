//! Property Manager
//!
//! Values are stored sparsely per `(object, property type)` cell. A cell has an
//! optional base value and a list of overrides, each tagged with a priority
//! class. Resolution order:
//!
//! 1. the override in the highest priority class present; inside one class the
//!    most recently added override wins
//! 2. the base value
//! 3. the property type's default
//!
//! Resolved values are cached per cell and invalidated by any write to that
//! cell. The manager also keeps a change log for the frame loop and evaluates
//! bindings, which copy (and optionally convert) one cell's resolved value into
//! another cell as a binding-priority override.

use crate::property_type::{PropertyFlags, PropertyType, PropertyTypeId};
use crate::registry::PropertyTypeRegistry;
use crate::value::{FromPropertyValue, PropertyValue};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use strata_core::{Error, ObjectId, Result};

/// Ordinal priority of an override; higher classes win
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorityClass(pub u8);

impl PriorityClass {
    /// Style and property-group values applied over authored values
    pub const GROUP: Self = Self(10);
    /// State manager states
    pub const STATE: Self = Self(20);
    /// Data bindings
    pub const BINDING: Self = Self(30);
    /// Running animations
    pub const ANIMATION: Self = Self(40);
}

/// Identifies one override for later update or removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverrideToken(u64);

/// Address of one property cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyRef {
    pub object: ObjectId,
    pub property: PropertyTypeId,
}

impl PropertyRef {
    pub fn new(object: ObjectId, property: PropertyTypeId) -> Self {
        Self { object, property }
    }
}

/// A recorded write to a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyChange {
    pub object: ObjectId,
    pub property: PropertyTypeId,
    pub flags: PropertyFlags,
}

/// Identifies a binding
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

type Converter = Box<dyn Fn(&PropertyValue) -> Option<PropertyValue> + Send + Sync>;

/// Copies a source cell's resolved value into a target cell
pub struct PropertyBinding {
    source: PropertyRef,
    target: PropertyRef,
    converter: Option<Converter>,
}

impl PropertyBinding {
    /// Bind `target` to follow `source` unchanged
    pub fn new(source: PropertyRef, target: PropertyRef) -> Self {
        Self {
            source,
            target,
            converter: None,
        }
    }

    /// Convert the source value; returning `None` leaves the target unbound
    pub fn with_converter(
        mut self,
        converter: impl Fn(&PropertyValue) -> Option<PropertyValue> + Send + Sync + 'static,
    ) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    pub fn source(&self) -> PropertyRef {
        self.source
    }

    pub fn target(&self) -> PropertyRef {
        self.target
    }
}

struct ActiveBinding {
    binding: PropertyBinding,
    token: Option<OverrideToken>,
}

struct OverrideEntry {
    priority: PriorityClass,
    token: OverrideToken,
    value: PropertyValue,
}

#[derive(Default)]
struct PropertyCell {
    base: Option<PropertyValue>,
    overrides: Vec<OverrideEntry>,
    resolved: Mutex<Option<PropertyValue>>,
}

impl PropertyCell {
    fn winner(&self) -> Option<&PropertyValue> {
        self.overrides
            .iter()
            .max_by_key(|entry| (entry.priority, entry.token))
            .map(|entry| &entry.value)
            .or(self.base.as_ref())
    }

    fn invalidate(&self) {
        *self.resolved.lock() = None;
    }

    fn is_empty(&self) -> bool {
        self.base.is_none() && self.overrides.is_empty()
    }
}

/// Sparse store of property values with layered overrides
pub struct PropertyManager {
    registry: Arc<PropertyTypeRegistry>,
    cells: HashMap<PropertyRef, PropertyCell>,
    by_object: HashMap<ObjectId, BTreeSet<PropertyTypeId>>,
    tokens: HashMap<OverrideToken, PropertyRef>,
    next_sequence: u64,
    changes: Vec<PropertyChange>,
    bindings: BTreeMap<BindingId, ActiveBinding>,
    dirty_bindings: BTreeSet<BindingId>,
}

impl PropertyManager {
    /// Create a manager over a registry
    pub fn new(registry: Arc<PropertyTypeRegistry>) -> Self {
        Self {
            registry,
            cells: HashMap::new(),
            by_object: HashMap::new(),
            tokens: HashMap::new(),
            next_sequence: 0,
            changes: Vec::new(),
            bindings: BTreeMap::new(),
            dirty_bindings: BTreeSet::new(),
        }
    }

    /// The registry property types are looked up in
    pub fn registry(&self) -> &Arc<PropertyTypeRegistry> {
        &self.registry
    }

    fn property_type(&self, property: PropertyTypeId) -> Result<Arc<PropertyType>> {
        self.registry
            .get(property)
            .ok_or_else(|| Error::UnknownPropertyType(format!("#{}", property.index())))
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn cell_mut(&mut self, cell: PropertyRef) -> &mut PropertyCell {
        self.by_object
            .entry(cell.object)
            .or_default()
            .insert(cell.property);
        self.cells.entry(cell).or_default()
    }

    fn touched(&mut self, cell: PropertyRef, flags: PropertyFlags) {
        if let Some(stored) = self.cells.get(&cell) {
            stored.invalidate();
        }
        self.changes.push(PropertyChange {
            object: cell.object,
            property: cell.property,
            flags,
        });
        for (id, active) in &self.bindings {
            if active.binding.source == cell {
                self.dirty_bindings.insert(*id);
            }
        }
    }

    fn drop_if_empty(&mut self, cell: PropertyRef) {
        if self.cells.get(&cell).is_some_and(PropertyCell::is_empty) {
            self.cells.remove(&cell);
            if let Some(set) = self.by_object.get_mut(&cell.object) {
                set.remove(&cell.property);
                if set.is_empty() {
                    self.by_object.remove(&cell.object);
                }
            }
        }
    }

    // ========================================================================
    // Base values
    // ========================================================================

    /// Set the authored value of a cell
    pub fn set_base(
        &mut self,
        object: ObjectId,
        property: PropertyTypeId,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into();
        let ty = self.property_type(property)?;
        ty.validate(&value)?;

        let cell = PropertyRef::new(object, property);
        self.cell_mut(cell).base = Some(value);
        self.touched(cell, ty.flags());
        Ok(())
    }

    /// Remove the authored value; returns whether one existed
    pub fn clear_base(&mut self, object: ObjectId, property: PropertyTypeId) -> bool {
        let cell = PropertyRef::new(object, property);
        let removed = self
            .cells
            .get_mut(&cell)
            .and_then(|stored| stored.base.take())
            .is_some();
        if removed {
            let flags = self.registry.get(property).map(|ty| ty.flags()).unwrap_or_default();
            self.touched(cell, flags);
            self.drop_if_empty(cell);
        }
        removed
    }

    /// The authored value, if any
    pub fn base_value(&self, object: ObjectId, property: PropertyTypeId) -> Option<PropertyValue> {
        self.cells
            .get(&PropertyRef::new(object, property))
            .and_then(|cell| cell.base.clone())
    }

    // ========================================================================
    // Overrides
    // ========================================================================

    /// Add an override in a priority class
    pub fn add_override(
        &mut self,
        object: ObjectId,
        property: PropertyTypeId,
        priority: PriorityClass,
        value: impl Into<PropertyValue>,
    ) -> Result<OverrideToken> {
        let value = value.into();
        let ty = self.property_type(property)?;
        ty.validate(&value)?;

        let token = OverrideToken(self.next_sequence());
        let cell = PropertyRef::new(object, property);
        self.cell_mut(cell).overrides.push(OverrideEntry {
            priority,
            token,
            value,
        });
        self.tokens.insert(token, cell);
        self.touched(cell, ty.flags());
        Ok(token)
    }

    /// Replace the value of an existing override, keeping its position in its class
    pub fn update_override(
        &mut self,
        token: OverrideToken,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into();
        let cell = *self
            .tokens
            .get(&token)
            .ok_or_else(|| Error::NotFound(format!("override {:?}", token)))?;
        let ty = self.property_type(cell.property)?;
        ty.validate(&value)?;

        let entry = self
            .cells
            .get_mut(&cell)
            .and_then(|stored| stored.overrides.iter_mut().find(|e| e.token == token))
            .ok_or_else(|| Error::NotFound(format!("override {:?}", token)))?;
        if entry.value != value {
            entry.value = value;
            self.touched(cell, ty.flags());
        }
        Ok(())
    }

    /// Remove one override; returns whether it existed on this cell
    pub fn remove_override(
        &mut self,
        object: ObjectId,
        property: PropertyTypeId,
        token: OverrideToken,
    ) -> bool {
        let cell = PropertyRef::new(object, property);
        if self.tokens.get(&token) != Some(&cell) {
            return false;
        }
        self.tokens.remove(&token);
        if let Some(stored) = self.cells.get_mut(&cell) {
            stored.overrides.retain(|entry| entry.token != token);
        }
        let flags = self.registry.get(property).map(|ty| ty.flags()).unwrap_or_default();
        self.touched(cell, flags);
        self.drop_if_empty(cell);
        true
    }

    /// Remove every override of a class on a cell; returns how many were removed
    pub fn remove_overrides(
        &mut self,
        object: ObjectId,
        property: PropertyTypeId,
        priority: PriorityClass,
    ) -> usize {
        let cell = PropertyRef::new(object, property);
        let removed: Vec<OverrideToken> = match self.cells.get_mut(&cell) {
            Some(stored) => {
                let tokens = stored
                    .overrides
                    .iter()
                    .filter(|entry| entry.priority == priority)
                    .map(|entry| entry.token)
                    .collect();
                stored.overrides.retain(|entry| entry.priority != priority);
                tokens
            }
            None => return 0,
        };
        for token in &removed {
            self.tokens.remove(token);
        }
        if !removed.is_empty() {
            let flags = self.registry.get(property).map(|ty| ty.flags()).unwrap_or_default();
            self.touched(cell, flags);
            self.drop_if_empty(cell);
        }
        removed.len()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Effective value of a cell
    pub fn resolve(&self, object: ObjectId, property: PropertyTypeId) -> Result<PropertyValue> {
        let ty = self.property_type(property)?;
        let Some(cell) = self.cells.get(&PropertyRef::new(object, property)) else {
            return Ok(ty.default_value().clone());
        };

        let mut cached = cell.resolved.lock();
        if let Some(value) = cached.as_ref() {
            return Ok(value.clone());
        }
        let value = cell
            .winner()
            .cloned()
            .unwrap_or_else(|| ty.default_value().clone());
        *cached = Some(value.clone());
        Ok(value)
    }

    /// Effective value converted to a Rust type
    pub fn resolve_as<T: FromPropertyValue>(
        &self,
        object: ObjectId,
        property: PropertyTypeId,
    ) -> Result<T> {
        let value = self.resolve(object, property)?;
        T::from_value(&value).ok_or_else(|| {
            let name = self
                .registry
                .get(property)
                .map(|ty| ty.name().to_string())
                .unwrap_or_default();
            Error::type_mismatch(name, T::KIND.to_string(), value.kind().to_string())
        })
    }

    /// Whether a cell has a base value or any override
    pub fn has_value(&self, object: ObjectId, property: PropertyTypeId) -> bool {
        self.cells
            .get(&PropertyRef::new(object, property))
            .is_some_and(|cell| !cell.is_empty())
    }

    /// Property types with values on an object
    pub fn properties_of(&self, object: ObjectId) -> Vec<PropertyTypeId> {
        self.by_object
            .get(&object)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    // ========================================================================
    // Object lifetime
    // ========================================================================

    /// Drop every cell of an object and every binding touching it.
    /// Bindings that targeted other objects from this one release their
    /// overrides. Returns the number of cells dropped.
    pub fn remove_object(&mut self, object: ObjectId) -> usize {
        let doomed: Vec<BindingId> = self
            .bindings
            .iter()
            .filter(|(_, active)| {
                active.binding.source.object == object || active.binding.target.object == object
            })
            .map(|(id, _)| *id)
            .collect();
        for id in doomed {
            self.remove_binding(id);
        }

        let properties = self.by_object.remove(&object).unwrap_or_default();
        for property in &properties {
            let cell = PropertyRef::new(object, *property);
            if let Some(stored) = self.cells.remove(&cell) {
                for entry in stored.overrides {
                    self.tokens.remove(&entry.token);
                }
            }
        }
        self.changes.retain(|change| change.object != object);
        properties.len()
    }

    /// Take the change log
    pub fn drain_changes(&mut self) -> Vec<PropertyChange> {
        std::mem::take(&mut self.changes)
    }

    /// Whether anything was written since the last drain
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Install a binding and evaluate it once
    pub fn add_binding(&mut self, binding: PropertyBinding) -> Result<BindingId> {
        self.property_type(binding.source.property)?;
        self.property_type(binding.target.property)?;

        let id = BindingId(self.next_sequence());
        self.bindings.insert(
            id,
            ActiveBinding {
                binding,
                token: None,
            },
        );
        if let Err(err) = self.evaluate_binding(id) {
            self.bindings.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    /// Remove a binding; its target falls back to lower layers
    pub fn remove_binding(&mut self, id: BindingId) -> bool {
        let Some(active) = self.bindings.remove(&id) else {
            return false;
        };
        self.dirty_bindings.remove(&id);
        if let Some(token) = active.token {
            let target = active.binding.target;
            self.remove_override(target.object, target.property, token);
        }
        true
    }

    /// Number of installed bindings
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Re-evaluate bindings whose sources changed. Chains settle within one
    /// call; a cycle that keeps producing new values is cut off and logged.
    pub fn update_bindings(&mut self) -> usize {
        let max_rounds = self.bindings.len() + 1;
        let mut evaluated = 0;

        for _ in 0..max_rounds {
            if self.dirty_bindings.is_empty() {
                return evaluated;
            }
            let round = std::mem::take(&mut self.dirty_bindings);
            for id in round {
                if let Err(err) = self.evaluate_binding(id) {
                    log::warn!("Binding {:?} failed to evaluate: {}", id, err);
                }
                evaluated += 1;
            }
        }

        if !self.dirty_bindings.is_empty() {
            log::warn!(
                "Binding cycle detected; {} bindings left unsettled",
                self.dirty_bindings.len()
            );
            self.dirty_bindings.clear();
        }
        evaluated
    }

    fn evaluate_binding(&mut self, id: BindingId) -> Result<()> {
        let Some(active) = self.bindings.get(&id) else {
            return Ok(());
        };
        let source = active.binding.source;
        let target = active.binding.target;
        let existing = active.token;

        let value = self.resolve(source.object, source.property)?;
        let converted = match &active.binding.converter {
            Some(convert) => convert(&value),
            None => Some(value),
        };

        match (converted, existing) {
            (Some(value), Some(token)) => self.update_override(token, value),
            (Some(value), None) => {
                let token =
                    self.add_override(target.object, target.property, PriorityClass::BINDING, value)?;
                if let Some(active) = self.bindings.get_mut(&id) {
                    active.token = Some(token);
                }
                Ok(())
            }
            (None, Some(token)) => {
                self.remove_override(target.object, target.property, token);
                if let Some(active) = self.bindings.get_mut(&id) {
                    active.token = None;
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }
}
