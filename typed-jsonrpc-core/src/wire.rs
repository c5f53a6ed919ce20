//! Wire-type tags and the per-parameter type checker.
//!
//! Every native parameter type declares the tag its wire value must carry.
//! [`WireParam::check`] applies the coercion table before serde performs the
//! actual conversion.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;

/// Closed set of wire-type tags used for parameter validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Null,
    Boolean,
    Integer,
    Unsigned,
    Float,
    String,
    Array,
    Object,
}

impl WireType {
    /// Tag of a concrete wire value. Non-negative integers that fit `u64`
    /// classify as unsigned, remaining integers as signed.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => WireType::Null,
            Value::Bool(_) => WireType::Boolean,
            Value::Number(n) if n.is_u64() => WireType::Unsigned,
            Value::Number(n) if n.is_i64() => WireType::Integer,
            Value::Number(_) => WireType::Float,
            Value::String(_) => WireType::String,
            Value::Array(_) => WireType::Array,
            Value::Object(_) => WireType::Object,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Null => "null",
            WireType::Boolean => "boolean",
            WireType::Integer => "integer",
            WireType::Unsigned => "unsigned integer",
            WireType::Float => "float",
            WireType::String => "string",
            WireType::Array => "array",
            WireType::Object => "object",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a wire value was refused for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// The value carries the wrong tag.
    Type(WireType),
    /// The tag is acceptable but the number does not fit the native type.
    Range,
}

/// A native type that can be received as a procedure parameter.
pub trait WireParam: DeserializeOwned {
    const WIRE_TYPE: WireType;

    /// Checks a wire value against [`Self::WIRE_TYPE`]. The default requires
    /// exact tag equality.
    fn check(value: &Value) -> Result<(), Mismatch> {
        let actual = WireType::of(value);
        if actual == Self::WIRE_TYPE {
            Ok(())
        } else {
            Err(Mismatch::Type(actual))
        }
    }
}

fn check_signed(value: &Value, min: i64, max: i64) -> Result<(), Mismatch> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                if v < min || v > max {
                    return Err(Mismatch::Range);
                }
                Ok(())
            } else if n.is_u64() {
                // Larger than i64::MAX.
                Err(Mismatch::Range)
            } else {
                Err(Mismatch::Type(WireType::Float))
            }
        }
        other => Err(Mismatch::Type(WireType::of(other))),
    }
}

fn check_unsigned(value: &Value, max: u64) -> Result<(), Mismatch> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) if v > max => Err(Mismatch::Range),
            Some(_) => Ok(()),
            None => Err(Mismatch::Type(WireType::of(value))),
        },
        other => Err(Mismatch::Type(WireType::of(other))),
    }
}

fn check_float(value: &Value) -> Result<(), Mismatch> {
    match value {
        Value::Number(_) => Ok(()),
        other => Err(Mismatch::Type(WireType::of(other))),
    }
}

macro_rules! impl_signed {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireParam for $ty {
                const WIRE_TYPE: WireType = WireType::Integer;

                fn check(value: &Value) -> Result<(), Mismatch> {
                    check_signed(value, <$ty>::MIN as i64, <$ty>::MAX as i64)
                }
            }
        )*
    };
}

macro_rules! impl_unsigned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireParam for $ty {
                const WIRE_TYPE: WireType = WireType::Unsigned;

                fn check(value: &Value) -> Result<(), Mismatch> {
                    check_unsigned(value, <$ty>::MAX as u64)
                }
            }
        )*
    };
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

impl WireParam for f32 {
    const WIRE_TYPE: WireType = WireType::Float;

    fn check(value: &Value) -> Result<(), Mismatch> {
        check_float(value)
    }
}

impl WireParam for f64 {
    const WIRE_TYPE: WireType = WireType::Float;

    fn check(value: &Value) -> Result<(), Mismatch> {
        check_float(value)
    }
}

impl WireParam for () {
    const WIRE_TYPE: WireType = WireType::Null;
}

impl WireParam for bool {
    const WIRE_TYPE: WireType = WireType::Boolean;
}

impl WireParam for String {
    const WIRE_TYPE: WireType = WireType::String;
}

impl WireParam for PathBuf {
    const WIRE_TYPE: WireType = WireType::String;
}

impl<T: DeserializeOwned> WireParam for Vec<T> {
    const WIRE_TYPE: WireType = WireType::Array;
}

impl<T: DeserializeOwned> WireParam for VecDeque<T> {
    const WIRE_TYPE: WireType = WireType::Array;
}

impl<T: DeserializeOwned + Ord> WireParam for BTreeSet<T> {
    const WIRE_TYPE: WireType = WireType::Array;
}

impl<T: DeserializeOwned + Eq + Hash> WireParam for HashSet<T> {
    const WIRE_TYPE: WireType = WireType::Array;
}

impl<V: DeserializeOwned> WireParam for HashMap<String, V> {
    const WIRE_TYPE: WireType = WireType::Object;
}

impl<V: DeserializeOwned> WireParam for BTreeMap<String, V> {
    const WIRE_TYPE: WireType = WireType::Object;
}

impl WireParam for Map<String, Value> {
    const WIRE_TYPE: WireType = WireType::Object;
}

/// Raw JSON parameters are declared as objects.
impl WireParam for Value {
    const WIRE_TYPE: WireType = WireType::Object;
}

impl<T, const N: usize> WireParam for [T; N]
where
    [T; N]: DeserializeOwned,
{
    const WIRE_TYPE: WireType = WireType::Array;
}

/// Declares user-defined aggregate types as `object` parameters.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct Product { id: i64, name: String }
/// typed_jsonrpc_core::wire_object!(Product);
/// ```
#[macro_export]
macro_rules! wire_object {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::wire::WireParam for $ty {
                const WIRE_TYPE: $crate::wire::WireType = $crate::wire::WireType::Object;
            }
        )+
    };
}

/// Declares enumerations as `string` parameters. The labels are whatever the
/// type's serde implementation reads and writes.
#[macro_export]
macro_rules! wire_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::wire::WireParam for $ty {
                const WIRE_TYPE: $crate::wire::WireType = $crate::wire::WireType::String;
            }
        )+
    };
}
