//! Type-erased state values.
//!
//! Publishers of every token kind live in one arena, so their values are
//! stored behind [`AnyValue`]. Typed access happens at the token boundary by
//! downcasting; equality checks (the publish no-op rule) go through
//! [`AnyValue::same_as`].

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bound for anything stored in the registry.
///
/// Values are cloned out on read and compared on write, so an equal write is
/// never published.
pub trait StateValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Object-safe view of a [`StateValue`].
pub trait AnyValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Equality across the erased boundary. Values of different types are
    /// never equal.
    fn same_as(&self, other: &dyn AnyValue) -> bool;

    fn clone_boxed(&self) -> BoxedValue;
}

pub type BoxedValue = Box<dyn AnyValue>;

impl<T: StateValue> AnyValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_as(&self, other: &dyn AnyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn clone_boxed(&self) -> BoxedValue {
        Box::new(self.clone())
    }
}

/// JSON conversion for id-bearing state, captured when the id is attached.
#[derive(Clone, Copy)]
pub struct Codec {
    encode: fn(&dyn AnyValue) -> Option<serde_json::Result<serde_json::Value>>,
    decode: fn(serde_json::Value) -> serde_json::Result<BoxedValue>,
}

impl Codec {
    pub fn of<T>() -> Self
    where
        T: StateValue + Serialize + DeserializeOwned,
    {
        Self {
            encode: encode::<T>,
            decode: decode::<T>,
        }
    }

    /// Returns `None` when the value is not of the codec's type.
    pub fn encode(&self, value: &dyn AnyValue) -> Option<serde_json::Result<serde_json::Value>> {
        (self.encode)(value)
    }

    pub fn decode(&self, json: serde_json::Value) -> serde_json::Result<BoxedValue> {
        (self.decode)(json)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Codec")
    }
}

fn encode<T: StateValue + Serialize>(
    value: &dyn AnyValue,
) -> Option<serde_json::Result<serde_json::Value>> {
    value.as_any().downcast_ref::<T>().map(serde_json::to_value)
}

fn decode<T: StateValue + DeserializeOwned>(json: serde_json::Value) -> serde_json::Result<BoxedValue> {
    let value: T = serde_json::from_value(json)?;
    Ok(Box::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_as_compares_by_value_and_type() {
        let a: BoxedValue = Box::new(5_i32);
        let b: BoxedValue = Box::new(5_i32);
        let c: BoxedValue = Box::new(6_i32);
        let d: BoxedValue = Box::new(5_i64);

        assert!(a.same_as(b.as_ref()));
        assert!(!a.same_as(c.as_ref()));
        assert!(!a.same_as(d.as_ref()));
    }

    #[test]
    fn clone_boxed_is_deep() {
        let a: BoxedValue = Box::new(vec![1, 2, 3]);
        let b = a.clone_boxed();
        assert!(a.same_as(b.as_ref()));
        assert_eq!(b.as_any().downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn codec_round_trips_through_json() {
        let codec = Codec::of::<Vec<String>>();
        let value: BoxedValue = Box::new(vec!["a".to_string()]);

        let json = codec.encode(value.as_ref()).unwrap().unwrap();
        assert_eq!(json, serde_json::json!(["a"]));

        let decoded = codec.decode(json).unwrap();
        assert!(decoded.same_as(value.as_ref()));

        let wrong: BoxedValue = Box::new(3_u8);
        assert!(codec.encode(wrong.as_ref()).is_none());
        assert!(codec.decode(serde_json::json!(3)).is_err());
    }
}
