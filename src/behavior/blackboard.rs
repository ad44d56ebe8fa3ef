//! Shared decision state.
//!
//! A string-keyed store over a closed set of value types. Leaves communicate
//! exclusively through it: writers overwrite, typed reads return `None` on a
//! missing key or a type mismatch, and nothing here locks because the whole
//! bot is single-threaded.

use hashbrown::HashMap;

use crate::behavior::Path;
use crate::game::player::PlayerId;
use crate::render::Camera;
use crate::util::geometry::{LineSegment, Ray, Rectangle};
use crate::util::vec2::Vec2;

/// Every type a blackboard slot can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    F32(f32),
    Vec2(Vec2),
    Player(PlayerId),
    Rect(Rectangle),
    Ray(Ray),
    Line(LineSegment),
    Path(Path),
    Text(String),
    Points(Vec<Vec2>),
    Camera(Camera),
}

/// Conversion between a concrete type and its `Value` variant.
pub trait BlackboardValue: Sized {
    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_blackboard_value {
    ($ty:ty, $variant:ident) => {
        impl BlackboardValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_blackboard_value!(bool, Bool);
impl_blackboard_value!(i32, I32);
impl_blackboard_value!(f32, F32);
impl_blackboard_value!(Vec2, Vec2);
impl_blackboard_value!(PlayerId, Player);
impl_blackboard_value!(Rectangle, Rect);
impl_blackboard_value!(Ray, Ray);
impl_blackboard_value!(LineSegment, Line);
impl_blackboard_value!(Path, Path);
impl_blackboard_value!(String, Text);
impl_blackboard_value!(Vec<Vec2>, Points);
impl_blackboard_value!(Camera, Camera);

#[derive(Debug, Default)]
pub struct Blackboard {
    slots: HashMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: BlackboardValue>(&mut self, key: &str, value: T) {
        self.slots.insert(key.to_string(), value.into_value());
    }

    /// Typed read; None when missing or holding a different type.
    pub fn value<T: BlackboardValue>(&self, key: &str) -> Option<T> {
        T::from_value(self.slots.get(key)?)
    }

    pub fn value_or<T: BlackboardValue>(&self, key: &str, default: T) -> T {
        self.value(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) {
        self.slots.remove(key);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
