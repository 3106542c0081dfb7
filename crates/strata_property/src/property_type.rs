//! Property type descriptors
//!
//! A `PropertyType` is immutable once registered. Struct types describe their
//! fields as nested property types; array types describe one element type and
//! either a fixed or an unlimited length.

use crate::value::{PropertyValue, PropertyValueKind};
use std::collections::BTreeMap;
use strata_core::{Error, Result};

/// Registry-assigned identity of a property type. The generation changes on
/// every registry teardown, so ids from before a teardown never match a type
/// registered after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyTypeId {
    index: u32,
    generation: u32,
}

impl PropertyTypeId {
    /// Id carried by a type that has not been registered
    pub const UNREGISTERED: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub(crate) const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Position in the registry
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Registry generation the id was handed out in
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Length of an array property
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayLength {
    Fixed(usize),
    Unlimited,
}

/// Behavioral flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropertyFlags {
    /// Nodes without a value take their parent's resolved value
    pub inherited: bool,
    /// Changing the value invalidates layout
    pub affects_layout: bool,
    /// Changing the value invalidates rendering
    pub affects_render: bool,
}

#[derive(Clone, Debug)]
enum Shape {
    Scalar,
    Struct(Vec<PropertyType>),
    Array {
        element: Box<PropertyType>,
        length: ArrayLength,
    },
}

/// Descriptor of a property type
#[derive(Clone, Debug)]
pub struct PropertyType {
    id: PropertyTypeId,
    name: String,
    kind: PropertyValueKind,
    default: PropertyValue,
    shape: Shape,
    flags: PropertyFlags,
    description: Option<String>,
}

impl PropertyType {
    /// Scalar type whose kind is taken from its default value
    pub fn new(name: impl Into<String>, default: impl Into<PropertyValue>) -> Self {
        let default = default.into();
        Self {
            id: PropertyTypeId::UNREGISTERED,
            name: name.into(),
            kind: default.kind(),
            default,
            shape: Shape::Scalar,
            flags: PropertyFlags::default(),
            description: None,
        }
    }

    /// Pointer to another node, given as a path; empty means unset
    pub fn pointer(name: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Pointer(String::new()))
    }

    /// Reference to a resource URL; empty means unset
    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Resource(String::new()))
    }

    /// Struct type; the default holds every field's default
    pub fn structure(name: impl Into<String>, fields: Vec<PropertyType>) -> Self {
        let default: BTreeMap<String, PropertyValue> = fields
            .iter()
            .map(|field| (field.name.clone(), field.default.clone()))
            .collect();
        Self {
            shape: Shape::Struct(fields),
            ..Self::new(name, PropertyValue::Struct(default))
        }
    }

    /// Array type; fixed arrays default to `n` element defaults, unlimited ones to empty
    pub fn array(name: impl Into<String>, element: PropertyType, length: ArrayLength) -> Self {
        let default = match length {
            ArrayLength::Fixed(n) => vec![element.default.clone(); n],
            ArrayLength::Unlimited => Vec::new(),
        };
        Self {
            shape: Shape::Array {
                element: Box::new(element),
                length,
            },
            ..Self::new(name, PropertyValue::Array(default))
        }
    }

    /// Mark as inherited
    pub fn inherited(mut self) -> Self {
        self.flags.inherited = true;
        self
    }

    /// Mark as layout-affecting
    pub fn affects_layout(mut self) -> Self {
        self.flags.affects_layout = true;
        self
    }

    /// Mark as render-affecting
    pub fn affects_render(mut self) -> Self {
        self.flags.affects_render = true;
        self
    }

    /// Attach a human-readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn assign_id(&mut self, id: PropertyTypeId) {
        self.id = id;
    }

    pub fn id(&self) -> PropertyTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyValueKind {
        self.kind
    }

    pub fn default_value(&self) -> &PropertyValue {
        &self.default
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Struct fields; empty for non-struct types
    pub fn fields(&self) -> &[PropertyType] {
        match &self.shape {
            Shape::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// Array element type and length
    pub fn element(&self) -> Option<(&PropertyType, ArrayLength)> {
        match &self.shape {
            Shape::Array { element, length } => Some((element, *length)),
            _ => None,
        }
    }

    /// Check a value against this type without coercion
    pub fn validate(&self, value: &PropertyValue) -> Result<()> {
        if value.kind() != self.kind {
            return Err(Error::type_mismatch(
                &self.name,
                self.kind.to_string(),
                value.kind().to_string(),
            ));
        }

        match (&self.shape, value) {
            (Shape::Struct(fields), PropertyValue::Struct(map)) => {
                for (key, field_value) in map {
                    let field = fields.iter().find(|f| f.name == *key).ok_or_else(|| {
                        Error::type_mismatch(
                            format!("{}.{}", self.name, key),
                            "declared field",
                            "undeclared field",
                        )
                    })?;
                    field.validate(field_value)?;
                }
            }
            (Shape::Array { element, length }, PropertyValue::Array(items)) => {
                if let ArrayLength::Fixed(n) = length {
                    if items.len() != *n {
                        return Err(Error::type_mismatch(
                            &self.name,
                            format!("{} elements", n),
                            format!("{} elements", items.len()),
                        ));
                    }
                }
                for item in items {
                    element.validate(item)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}
