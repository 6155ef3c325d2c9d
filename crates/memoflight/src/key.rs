// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Canonical cache keys for argument lists.
//!
//! An argument list is first lowered into an [`ArgValue`] tree: scalars, ordered sequences and
//! keyed mappings. Mapping fields are sorted by name while lowering; sequence elements keep
//! their order. The tree is then written out as compact JSON text, which becomes the
//! [`CanonicalKey`] that addresses a cache entry.
//!
//! ```
//! use std::collections::HashMap;
//!
//! use memoflight::key::encode;
//!
//! let mut a = HashMap::new();
//! a.insert("b", 2);
//! a.insert("a", 1);
//!
//! let key = encode(&(a, [3, 1, 2]))?;
//! assert_eq!(key.as_str(), r#"[{"a":1,"b":2},[3,1,2]]"#);
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::{fmt, sync::Arc};

use serde::{Serialize, Serializer, ser::SerializeMap, ser::SerializeSeq};
use serde_json::{Number, Value};

/// A structurally canonical argument value.
///
/// Every argument list is lowered into this tagged model before it is encoded. Mappings are
/// kept as field lists sorted by field name, so two mappings that only differ in insertion
/// order are equal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// An absent value. Non-finite floats also lower to `Null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer or finite float.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered sequence; element order is significant.
    Seq(Vec<Self>),
    /// A keyed mapping with fields sorted by name.
    Map(Vec<(String, Self)>),
}

impl ArgValue {
    /// Lowers any serializable value into its canonical form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented, for example because its
    /// [`Serialize`] implementation fails or because it is a map with non-scalar keys.
    pub fn from_serialize<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_value(value).map(Self::from)
    }

    /// Creates a mapping from fields in any order.
    #[must_use]
    pub fn map<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        let mut fields: Vec<(String, Self)> = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self::Map(fields)
    }

    /// Writes the canonical JSON text of this value into `out`.
    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Number(n) => out.push_str(&n.to_string()),
            Self::String(s) => write_string(s, out),
            Self::Seq(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(fields) => {
                out.push('{');
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_string(name, out);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::from(s).to_string());
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::map(fields.into_iter().map(|(k, v)| (k, Self::from(v)))),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ArgValue {
    fn from(value: Vec<T>) -> Self {
        Self::Seq(value.into_iter().map(Into::into).collect())
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

/// The deterministic key that addresses one cache entry.
///
/// Cloning is cheap; the encoded text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(Arc<str>);

impl CanonicalKey {
    /// Returns the encoded key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ArgValue> for CanonicalKey {
    fn from(value: &ArgValue) -> Self {
        let mut out = String::new();
        value.write_canonical(&mut out);
        Self(out.into())
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encodes an argument list into its canonical key.
///
/// Argument lists that are structurally equal up to the order of fields inside mappings
/// produce the same key. Positional order and sequence order are preserved.
///
/// # Errors
///
/// Returns an error if the arguments cannot be represented as a tree of scalars, sequences
/// and string-keyed mappings.
pub fn encode<A>(args: &A) -> Result<CanonicalKey, serde_json::Error>
where
    A: Serialize + ?Sized,
{
    ArgValue::from_serialize(args).map(|value| CanonicalKey::from(&value))
}
