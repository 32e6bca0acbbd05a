//! Configuration value tree.
//!
//! Policy files are parsed by an outer loader (YAML or JSON) into this closed
//! tagged union before any criterion sees them. Objects keep the order their
//! keys appeared in the source document and reject duplicate keys, so a
//! criterion never has to guess which of two `fingerprint:` entries wins.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null` / `~`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Any numeric scalar.
    Number(serde_json::Number),
    /// A string scalar.
    String(String),
    /// An order-preserving sequence.
    Array(Vec<Value>),
    /// A mapping of distinct string keys.
    Object(Object),
}

impl Value {
    /// Structural tag of this value, used in shape errors.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Array(_) => ValueKind::Array,
            Self::Object(_) => ValueKind::Object,
        }
    }

    /// Borrow the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object payload, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Parse a YAML (or JSON, which is a YAML subset) document.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error, including duplicate object keys.
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => items.into(),
            serde_json::Value::Object(map) => Self::Object(map.into_iter().collect()),
        }
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = serde_yaml::Error;

    /// Fails on non-string mapping keys and tagged values.
    fn try_from(v: serde_yaml::Value) -> Result<Self, Self::Error> {
        Self::deserialize(v)
    }
}

/// Structural tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `null`
    Null,
    /// boolean
    Bool,
    /// number
    Number,
    /// string
    String,
    /// sequence
    Array,
    /// mapping
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object
// ─────────────────────────────────────────────────────────────────────────────

/// Insertion-ordered mapping with distinct keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, returning the previous value if the key
    /// was already present (the key keeps its original position).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the object has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut obj = Self::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deserialization
// ─────────────────────────────────────────────────────────────────────────────

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut obj = Object::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            if obj.get(&key).is_some() {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            obj.insert(key, value);
        }
        Ok(Value::Object(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_object_preserves_key_order() {
        let v = Value::from_yaml_str("dns: a.example.com\nfingerprint: x\nemail: a@b.c").unwrap();
        let keys: Vec<&str> = v.as_object().unwrap().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["dns", "fingerprint", "email"]);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = Value::from_yaml_str("{\"dns\": \"a\", \"dns\": \"b\"}").unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn json_input_parses_into_same_tree() {
        let from_json: Value = serde_json::from_str(r#"{"ip": ["::1", "10.0.0.1"]}"#).unwrap();
        let from_yaml = Value::from_yaml_str("ip: ['::1', '10.0.0.1']").unwrap();
        assert_eq!(from_json, from_yaml);
    }

    #[test]
    fn scalar_kinds_are_reported() {
        let v = Value::from_yaml_str("[~, true, 3, 1.5, s, [], {}]").unwrap();
        let Value::Array(items) = v else {
            panic!("expected array");
        };
        let kinds: Vec<ValueKind> = items.iter().map(Value::kind).collect();
        assert_eq!(
            kinds,
            [
                ValueKind::Null,
                ValueKind::Bool,
                ValueKind::Number,
                ValueKind::Number,
                ValueKind::String,
                ValueKind::Array,
                ValueKind::Object,
            ]
        );
    }

    #[test]
    fn converts_from_serde_json_value() {
        let json = serde_json::json!({"dns": ["a.example.com"], "n": 1, "x": null});
        let v = Value::from(json);
        let obj = v.as_object().unwrap();
        assert_eq!(obj.get("dns"), Some(&Value::from(vec!["a.example.com"])));
        assert_eq!(obj.get("n").map(Value::kind), Some(ValueKind::Number));
        assert_eq!(obj.get("x"), Some(&Value::Null));
    }

    #[test]
    fn converts_from_serde_yaml_value() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("uri: spiffe://c/p").unwrap();
        let v = Value::try_from(yaml).unwrap();
        assert_eq!(
            v.as_object().and_then(|o| o.get("uri")),
            Some(&Value::from("spiffe://c/p"))
        );
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut obj = Object::new();
        obj.insert("a", "1");
        obj.insert("b", "2");
        assert_eq!(obj.insert("a", "3"), Some(Value::from("1")));
        let entries: Vec<_> = obj.iter().map(|(k, v)| (k, v.as_str().unwrap())).collect();
        assert_eq!(entries, [("a", "3"), ("b", "2")]);
    }
}
