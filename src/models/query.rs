//! Query-related data models.
//!
//! This module defines bound parameter values, their type hints, and the
//! result types handed back by the driver.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A row keyed by column name, in select-list order.
pub type Row = IndexMap<String, JsonValue>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl ParamValue {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Type hint attached to a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Null,
    Bool,
    Int,
    Str,
    /// Large object, bound as raw bytes
    Lob,
}

/// A value as handed to a statement: plain, or paired with a type hint.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Plain(ParamValue),
    Typed(ParamValue, ParamType),
}

impl BindValue {
    /// Pair a value with a type hint.
    pub fn typed(value: impl Into<ParamValue>, hint: ParamType) -> Self {
        Self::Typed(value.into(), hint)
    }

    /// Apply the binding policy and produce the value the driver receives.
    ///
    /// The driver has no native boolean binding, so a boolean hinted as
    /// [`ParamType::Bool`] becomes the string `"1"` or `"0"`.
    pub fn resolve(&self) -> ParamValue {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Typed(value, hint) => coerce(value, *hint),
        }
    }
}

impl<T: Into<ParamValue>> From<T> for BindValue {
    fn from(v: T) -> Self {
        Self::Plain(v.into())
    }
}

fn bool_string(b: bool) -> String {
    let digit = if b { "1" } else { "0" };
    digit.to_string()
}

fn coerce(value: &ParamValue, hint: ParamType) -> ParamValue {
    match (hint, value) {
        (ParamType::Null, _) => ParamValue::Null,
        (_, ParamValue::Null) => ParamValue::Null,

        (ParamType::Bool, ParamValue::Bool(b)) => ParamValue::String(bool_string(*b)),

        (ParamType::Int, ParamValue::Bool(b)) => ParamValue::Int(i64::from(*b)),
        (ParamType::Int, ParamValue::Float(f)) => ParamValue::Int(*f as i64),
        (ParamType::Int, ParamValue::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(ParamValue::Int)
            .unwrap_or_else(|_| value.clone()),

        (ParamType::Str, ParamValue::Bool(b)) => ParamValue::String(bool_string(*b)),
        (ParamType::Str, ParamValue::Int(i)) => ParamValue::String(i.to_string()),
        (ParamType::Str, ParamValue::Float(f)) => ParamValue::String(f.to_string()),

        (ParamType::Lob, ParamValue::String(s)) => ParamValue::Bytes(s.as_bytes().to_vec()),

        _ => value.clone(),
    }
}

/// Where a value is bound: a 1-based position or a `:name` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Placeholder {
    Position(usize),
    Name(String),
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(n) => write!(f, "{}", n),
            Self::Name(name) => write!(f, ":{}", name),
        }
    }
}

/// Values bound to a statement, in insertion order.
///
/// Positional values are numbered from 1 in the order they are added. Binding
/// the same placeholder twice replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundValues {
    values: IndexMap<Placeholder, BindValue>,
    next_position: usize,
}

impl BoundValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn bind(mut self, value: impl Into<BindValue>) -> Self {
        self.push(value);
        self
    }

    /// Bind a value to a `:name` placeholder.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<BindValue>) -> Self {
        self.insert(Placeholder::Name(name.into()), value.into());
        self
    }

    /// Append a positional value in place.
    pub fn push(&mut self, value: impl Into<BindValue>) {
        let position = self.next_position + 1;
        self.insert(Placeholder::Position(position), value.into());
    }

    /// Bind a value to an explicit placeholder.
    pub fn insert(&mut self, placeholder: Placeholder, value: BindValue) {
        if let Placeholder::Position(n) = placeholder {
            self.next_position = self.next_position.max(n);
        }
        self.values.insert(placeholder, value);
    }

    /// Merge another set of values into this one, later values win.
    pub fn extend(&mut self, other: &BoundValues) {
        for (placeholder, value) in other.iter() {
            self.insert(placeholder.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Placeholder, &BindValue)> {
        self.values.iter()
    }

    pub fn get(&self, placeholder: &Placeholder) -> Option<&BindValue> {
        self.values.get(placeholder)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_named(&self) -> bool {
        self.values.keys().any(|p| matches!(p, Placeholder::Name(_)))
    }

    pub fn has_positional(&self) -> bool {
        self.values
            .keys()
            .any(|p| matches!(p, Placeholder::Position(_)))
    }
}

impl<T: Into<BindValue>> From<Vec<T>> for BoundValues {
    fn from(values: Vec<T>) -> Self {
        values.into_iter().fold(Self::new(), |acc, v| acc.bind(v))
    }
}

impl<T: Into<BindValue>, const N: usize> From<[T; N]> for BoundValues {
    fn from(values: [T; N]) -> Self {
        values.into_iter().fold(Self::new(), |acc, v| acc.bind(v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows returned by a statement, decoded to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl ResultSet {
    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Convert into rows keyed by column name.
    ///
    /// When two columns share a name the later one wins, as with an
    /// associative fetch.
    pub fn into_rows(self) -> Vec<Row> {
        let names: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();
        self.rows
            .into_iter()
            .map(|values| names.iter().cloned().zip(values).collect())
            .collect()
    }
}

/// Outcome of a statement run for its side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Not reported by PostgreSQL; use `RETURNING` there.
    pub last_insert_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_value_types() {
        assert!(ParamValue::Null.is_null());
        assert!(!ParamValue::Bool(true).is_null());
        assert_eq!(ParamValue::Int(42).type_name(), "int");
        assert_eq!(ParamValue::from("hello").type_name(), "string");
        assert_eq!(ParamValue::from(None::<i64>), ParamValue::Null);
        assert_eq!(ParamValue::from(Some(7)), ParamValue::Int(7));
    }

    #[test]
    fn test_plain_bool_binds_natively() {
        assert_eq!(BindValue::from(true).resolve(), ParamValue::Bool(true));
    }

    #[test]
    fn test_bool_with_bool_hint_becomes_string() {
        assert_eq!(
            BindValue::typed(true, ParamType::Bool).resolve(),
            ParamValue::String("1".to_string())
        );
        assert_eq!(
            BindValue::typed(false, ParamType::Bool).resolve(),
            ParamValue::String("0".to_string())
        );
    }

    #[test]
    fn test_non_bool_with_bool_hint_is_untouched() {
        assert_eq!(
            BindValue::typed(1, ParamType::Bool).resolve(),
            ParamValue::Int(1)
        );
    }

    #[test]
    fn test_int_hint_coercions() {
        assert_eq!(
            BindValue::typed("42", ParamType::Int).resolve(),
            ParamValue::Int(42)
        );
        assert_eq!(
            BindValue::typed("forty", ParamType::Int).resolve(),
            ParamValue::String("forty".to_string())
        );
        assert_eq!(
            BindValue::typed(true, ParamType::Int).resolve(),
            ParamValue::Int(1)
        );
        assert_eq!(
            BindValue::typed(3.9, ParamType::Int).resolve(),
            ParamValue::Int(3)
        );
    }

    #[test]
    fn test_str_null_and_lob_hints() {
        assert_eq!(
            BindValue::typed(12, ParamType::Str).resolve(),
            ParamValue::String("12".to_string())
        );
        assert_eq!(
            BindValue::typed("x", ParamType::Null).resolve(),
            ParamValue::Null
        );
        assert_eq!(
            BindValue::typed("ab", ParamType::Lob).resolve(),
            ParamValue::Bytes(vec![b'a', b'b'])
        );
    }

    #[test]
    fn test_positional_values_are_one_based() {
        let values = BoundValues::from(vec!["a", "b"]);
        let keys: Vec<_> = values.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Placeholder::Position(1), Placeholder::Position(2)]);
    }

    #[test]
    fn test_rebinding_replaces_value() {
        let values = BoundValues::new()
            .bind_named("id", 1)
            .bind_named("id", 2);
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get(&Placeholder::Name("id".to_string())),
            Some(&BindValue::Plain(ParamValue::Int(2)))
        );
    }

    #[test]
    fn test_placeholder_serializes_as_map_key() {
        let mut map = IndexMap::new();
        map.insert(Placeholder::Position(1), ParamValue::Int(5));
        map.insert(Placeholder::Name("name".to_string()), ParamValue::from("Anna"));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, json!({"1": 5, "name": "Anna"}));
    }

    #[test]
    fn test_result_set_into_rows() {
        let result = ResultSet {
            columns: vec![
                ColumnMetadata::new("id", "INTEGER"),
                ColumnMetadata::new("name", "TEXT"),
            ],
            rows: vec![vec![json!(1), json!("Anna")]],
        };
        assert_eq!(result.row_count(), 1);
        let rows = result.into_rows();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("Anna"));
        assert_eq!(rows[0].keys().next().map(String::as_str), Some("id"));
    }
}
