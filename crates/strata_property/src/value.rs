//! Property values and value kinds

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Linear RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Components as an array
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Component-wise interpolation
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Kind of a property value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyValueKind {
    Bool,
    Int,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Matrix2,
    Matrix3,
    Matrix4,
    Color,
    String,
    Struct,
    Array,
    /// Path to another object node
    Pointer,
    /// URL of a resource
    Resource,
}

impl fmt::Display for PropertyValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Matrix2(Mat2),
    Matrix3(Mat3),
    Matrix4(Mat4),
    Color(Color),
    String(String),
    Struct(BTreeMap<String, PropertyValue>),
    Array(Vec<PropertyValue>),
    Pointer(String),
    Resource(String),
}

impl PropertyValue {
    /// The value's kind
    pub fn kind(&self) -> PropertyValueKind {
        match self {
            Self::Bool(_) => PropertyValueKind::Bool,
            Self::Int(_) => PropertyValueKind::Int,
            Self::Float(_) => PropertyValueKind::Float,
            Self::Vector2(_) => PropertyValueKind::Vector2,
            Self::Vector3(_) => PropertyValueKind::Vector3,
            Self::Vector4(_) => PropertyValueKind::Vector4,
            Self::Matrix2(_) => PropertyValueKind::Matrix2,
            Self::Matrix3(_) => PropertyValueKind::Matrix3,
            Self::Matrix4(_) => PropertyValueKind::Matrix4,
            Self::Color(_) => PropertyValueKind::Color,
            Self::String(_) => PropertyValueKind::String,
            Self::Struct(_) => PropertyValueKind::Struct,
            Self::Array(_) => PropertyValueKind::Array,
            Self::Pointer(_) => PropertyValueKind::Pointer,
            Self::Resource(_) => PropertyValueKind::Resource,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Self::Matrix4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload of `String`, `Pointer`, and `Resource` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Pointer(v) | Self::Resource(v) => Some(v),
            _ => None,
        }
    }

    /// Interpolate toward `other`; `None` for kinds that cannot be blended
    pub fn lerp(&self, other: &PropertyValue, t: f32) -> Option<PropertyValue> {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + (b - a) * t)),
            (Self::Vector2(a), Self::Vector2(b)) => Some(Self::Vector2(a.lerp(*b, t))),
            (Self::Vector3(a), Self::Vector3(b)) => Some(Self::Vector3(a.lerp(*b, t))),
            (Self::Vector4(a), Self::Vector4(b)) => Some(Self::Vector4(a.lerp(*b, t))),
            (Self::Color(a), Self::Color(b)) => Some(Self::Color(a.lerp(*b, t))),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl FromPropertyValue for $ty {
                const KIND: PropertyValueKind = PropertyValueKind::$variant;

                fn from_value(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Typed extraction from a `PropertyValue`
pub trait FromPropertyValue: Sized {
    /// Kind this type is extracted from
    const KIND: PropertyValueKind;

    /// Extract, or `None` on kind mismatch
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl_from_value! {
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec2 => Vector2,
    Vec3 => Vector3,
    Vec4 => Vector4,
    Mat2 => Matrix2,
    Mat3 => Matrix3,
    Mat4 => Matrix4,
    Color => Color,
    String => String,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_accessors() {
        let value = PropertyValue::from(0.5f32);
        assert_eq!(value.kind(), PropertyValueKind::Float);
        assert_eq!(value.as_float(), Some(0.5));
        assert_eq!(value.as_bool(), None);

        let pointer = PropertyValue::Pointer("../Camera".into());
        assert_eq!(pointer.as_str(), Some("../Camera"));
    }

    #[test]
    fn test_lerp() {
        let a = PropertyValue::Float(0.0);
        let b = PropertyValue::Float(10.0);
        assert_eq!(a.lerp(&b, 0.25), Some(PropertyValue::Float(2.5)));

        let c = PropertyValue::Color(Color::BLACK);
        let d = PropertyValue::Color(Color::WHITE);
        let mid = c.lerp(&d, 0.5).and_then(|v| v.as_color()).unwrap();
        assert!((mid.r - 0.5).abs() < 1e-6);

        assert!(PropertyValue::Bool(true).lerp(&PropertyValue::Bool(false), 0.5).is_none());
        assert!(a.lerp(&c, 0.5).is_none());
    }

    #[test]
    fn test_typed_extraction() {
        let value = PropertyValue::from(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Vec3::from_value(&value), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(f32::from_value(&value), None);
        assert_eq!(<Vec3 as FromPropertyValue>::KIND, PropertyValueKind::Vector3);
    }
}
