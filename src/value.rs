//! Query values: the leaves of a condition tree.

use serde::Serialize;
use serde_json::Number;
use std::fmt;

/// The kind of a scalar literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    String,
    Number,
    Boolean,
    Enum,
    Null,
}

/// A literal value known when the descriptor is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Scalar {
    String(String),
    Number(Number),
    Boolean(bool),
    /// An enum constant; resolves to its symbolic `variant` name.
    Enum { ty: String, variant: String },
    Null,
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::String(_) => ScalarKind::String,
            Scalar::Number(_) => ScalarKind::Number,
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::Enum { .. } => ScalarKind::Enum,
            Scalar::Null => ScalarKind::Null,
        }
    }
}

/// A value inside a condition tree.
///
/// Parameters are placeholders: they carry only a name and are bound to a
/// concrete value at call time by the [`crate::resolver::ValueResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum QueryValue {
    Scalar(Scalar),
    Array(Vec<QueryValue>),
    Parameter(String),
}

impl QueryValue {
    pub fn string(value: impl Into<String>) -> Self {
        QueryValue::Scalar(Scalar::String(value.into()))
    }

    pub fn number(value: impl Into<Number>) -> Self {
        QueryValue::Scalar(Scalar::Number(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        QueryValue::Scalar(Scalar::Boolean(value))
    }

    pub fn enumeration(ty: impl Into<String>, variant: impl Into<String>) -> Self {
        QueryValue::Scalar(Scalar::Enum {
            ty: ty.into(),
            variant: variant.into(),
        })
    }

    pub fn null() -> Self {
        QueryValue::Scalar(Scalar::Null)
    }

    pub fn array(items: impl IntoIterator<Item = QueryValue>) -> Self {
        QueryValue::Array(items.into_iter().collect())
    }

    pub fn param(name: impl Into<String>) -> Self {
        QueryValue::Parameter(name.into())
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, QueryValue::Parameter(_))
    }

    /// Names of every parameter in this value, in left-to-right order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_parameter_names(&mut names);
        names
    }

    pub(crate) fn collect_parameter_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            QueryValue::Scalar(_) => {}
            QueryValue::Array(items) => {
                for item in items {
                    item.collect_parameter_names(names);
                }
            }
            QueryValue::Parameter(name) => names.push(name),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::string(value)
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::string(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::number(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::boolean(value)
    }
}

impl From<Scalar> for QueryValue {
    fn from(value: Scalar) -> Self {
        QueryValue::Scalar(value)
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Scalar(Scalar::String(s)) => write!(f, "{s:?}"),
            QueryValue::Scalar(Scalar::Number(n)) => write!(f, "{n}"),
            QueryValue::Scalar(Scalar::Boolean(b)) => write!(f, "{b}"),
            QueryValue::Scalar(Scalar::Enum { ty, variant }) => write!(f, "{ty}.{variant}"),
            QueryValue::Scalar(Scalar::Null) => write!(f, "null"),
            QueryValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            QueryValue::Parameter(name) => write!(f, ":{name}"),
        }
    }
}

/// The shape of a value as far as the `IN` / `BETWEEN` arity checks care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    Array(usize),
    /// Not known until call time.
    Deferred,
}

/// Implemented by every leaf type a condition tree can carry.
pub trait ConditionValue {
    fn shape(&self) -> ValueShape;

    /// True when this is an array with at least one array element.
    fn nests_arrays(&self) -> bool;
}

impl ConditionValue for QueryValue {
    fn shape(&self) -> ValueShape {
        match self {
            QueryValue::Scalar(_) => ValueShape::Scalar,
            QueryValue::Array(items) => ValueShape::Array(items.len()),
            QueryValue::Parameter(_) => ValueShape::Deferred,
        }
    }

    fn nests_arrays(&self) -> bool {
        match self {
            QueryValue::Array(items) => items.iter().any(|item| matches!(item, QueryValue::Array(_))),
            _ => false,
        }
    }
}

impl ConditionValue for serde_json::Value {
    fn shape(&self) -> ValueShape {
        match self {
            serde_json::Value::Array(items) => ValueShape::Array(items.len()),
            _ => ValueShape::Scalar,
        }
    }

    fn nests_arrays(&self) -> bool {
        match self {
            serde_json::Value::Array(items) => items.iter().any(serde_json::Value::is_array),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(Scalar::String("a".into()).kind(), ScalarKind::String);
        assert_eq!(Scalar::Number(7.into()).kind(), ScalarKind::Number);
        assert_eq!(Scalar::Boolean(true).kind(), ScalarKind::Boolean);
        assert_eq!(
            Scalar::Enum { ty: "Status".into(), variant: "ACTIVE".into() }.kind(),
            ScalarKind::Enum
        );
        assert_eq!(Scalar::Null.kind(), ScalarKind::Null);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(QueryValue::from("x").shape(), ValueShape::Scalar);
        assert_eq!(QueryValue::param("p").shape(), ValueShape::Deferred);
        assert_eq!(
            QueryValue::array([QueryValue::number(1), QueryValue::null()]).shape(),
            ValueShape::Array(2)
        );
        assert_eq!(serde_json::json!([1, 2, 3]).shape(), ValueShape::Array(3));
        assert_eq!(serde_json::json!({"a": 1}).shape(), ValueShape::Scalar);
        assert!(serde_json::json!([[1], 2]).nests_arrays());
        assert!(!serde_json::json!([1, null]).nests_arrays());
        assert!(!QueryValue::array([QueryValue::param("a"), QueryValue::null()]).nests_arrays());
    }

    #[test]
    fn test_parameter_names_in_order() {
        let value = QueryValue::array([
            QueryValue::param("first"),
            QueryValue::number(3),
            QueryValue::array([QueryValue::param("second")]),
        ]);
        assert_eq!(value.parameter_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_display() {
        let value = QueryValue::array([
            QueryValue::from("a"),
            QueryValue::number(2),
            QueryValue::param("p"),
            QueryValue::enumeration("Status", "ACTIVE"),
            QueryValue::null(),
        ]);
        assert_eq!(value.to_string(), r#"["a", 2, :p, Status.ACTIVE, null]"#);
    }
}
