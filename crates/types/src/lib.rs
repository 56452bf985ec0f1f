use std::cmp::Ordering;
use std::fmt;

/// Column types understood by the harness and the emulator, named after
/// their GoogleSQL spelling when displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Text,
    Bool,
}

impl SqlType {
    /// Parse a DDL type name such as `STRING(1024)`, `INT64` or `BOOL`.
    ///
    /// Length arguments are accepted and ignored.
    pub fn parse(raw: &str) -> Option<SqlType> {
        let base = raw.split('(').next().unwrap_or(raw).trim().to_uppercase();
        match base.as_str() {
            "INT64" | "INT" | "INTEGER" | "BIGINT" => Some(SqlType::Int),
            "STRING" | "TEXT" | "VARCHAR" => Some(SqlType::Text),
            "BOOL" | "BOOLEAN" => Some(SqlType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Int => "INT64",
            SqlType::Text => "STRING",
            SqlType::Bool => "BOOL",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type of a non-NULL value. NULL is untyped.
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Int(_) => Some(SqlType::Int),
            Value::Text(_) => Some(SqlType::Text),
            Value::Bool(_) => Some(SqlType::Bool),
            Value::Null => None,
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

/// Total order used for primary keys and ORDER BY: NULL sorts first, values
/// of different types are ordered by type.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_same_type(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Greater, Less};

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(Value::Null.cmp(&Value::Text("a".into())), Less);
        assert_eq!(Value::Int(0).cmp(&Value::Null), Greater);
    }

    #[test]
    fn parse_spanner_type_names() {
        assert_eq!(SqlType::parse("STRING(1024)"), Some(SqlType::Text));
        assert_eq!(SqlType::parse("string(MAX)"), Some(SqlType::Text));
        assert_eq!(SqlType::parse("INT64"), Some(SqlType::Int));
        assert_eq!(SqlType::parse("BOOL"), Some(SqlType::Bool));
        assert_eq!(SqlType::parse("FLOAT64"), None);
        assert_eq!(SqlType::Text.to_string(), "STRING");
    }

    #[test]
    fn value_serializes_with_variant_tag() {
        let json = serde_json::to_string(&Value::Text("a1".into())).unwrap();
        assert_eq!(json, r#"{"Text":"a1"}"#);
    }

    proptest! {
        #[test]
        fn text_order_matches_string_order(a in ".*", b in ".*") {
            let ord = Value::Text(a.clone()).cmp(&Value::Text(b.clone()));
            prop_assert_eq!(ord, a.cmp(&b));
        }
    }
}
