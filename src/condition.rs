//! Condition trees and the validating factories that build them.
//!
//! A [`Condition`] is generic over its leaf value type so the same shape can
//! carry unresolved [`QueryValue`]s (what the builder produces and the cache
//! stores), pending per-call values, and finally bound `serde_json::Value`s.

use crate::error::{Error, Result};
use crate::value::{ConditionValue, QueryValue, ValueShape};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterEquals,
    LesserThan,
    LesserEquals,
    Like,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Between,
    And,
    Or,
    Not,
    IgnoreCase,
}

impl Operator {
    /// True for operators that compare an attribute with a value.
    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            Operator::And | Operator::Or | Operator::Not | Operator::IgnoreCase
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "EQUALS",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterEquals => "GREATER_EQUALS",
            Operator::LesserThan => "LESSER_THAN",
            Operator::LesserEquals => "LESSER_EQUALS",
            Operator::Like => "LIKE",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::In => "IN",
            Operator::Between => "BETWEEN",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::IgnoreCase => "IGNORE_CASE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operator of a logical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Connective {
    And,
    Or,
}

impl From<Connective> for Operator {
    fn from(value: Connective) -> Self {
        match value {
            Connective::And => Operator::And,
            Connective::Or => Operator::Or,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Comparison<V = QueryValue> {
    pub attribute: String,
    pub operator: Operator,
    pub value: V,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Logical<V = QueryValue> {
    pub connective: Connective,
    pub children: Vec<Condition<V>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Condition<V = QueryValue> {
    Comparison(Comparison<V>),
    Logical(Logical<V>),
    Not(Box<Condition<V>>),
    IgnoreCase(Box<Condition<V>>),
}

impl<V> Condition<V> {
    pub fn operator(&self) -> Operator {
        match self {
            Condition::Comparison(comparison) => comparison.operator,
            Condition::Logical(logical) => logical.connective.into(),
            Condition::Not(_) => Operator::Not,
            Condition::IgnoreCase(_) => Operator::IgnoreCase,
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison<V>> {
        match self {
            Condition::Comparison(comparison) => Some(comparison),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<&Logical<V>> {
        match self {
            Condition::Logical(logical) => Some(logical),
            _ => None,
        }
    }

    /// The single child of a `Not` or `IgnoreCase` wrapper.
    pub fn inner(&self) -> Option<&Condition<V>> {
        match self {
            Condition::Not(inner) | Condition::IgnoreCase(inner) => Some(inner),
            _ => None,
        }
    }

    /// True when this is a logical node joined with `connective`.
    pub fn is_logical(&self, connective: Connective) -> bool {
        matches!(self, Condition::Logical(logical) if logical.connective == connective)
    }

    /// Negates a condition; negating a `Not` returns its child.
    pub fn not(condition: Condition<V>) -> Self {
        match condition {
            Condition::Not(inner) => *inner,
            condition => Condition::Not(Box::new(condition)),
        }
    }

    /// Marks a bare comparison as case-insensitive.
    pub fn ignore_case(condition: Condition<V>) -> Result<Self> {
        match condition {
            Condition::Comparison(_) => Ok(Condition::IgnoreCase(Box::new(condition))),
            other => Err(Error::illegal_argument(format!(
                "IGNORE_CASE can only wrap a comparison, found {}",
                other.operator()
            ))),
        }
    }

    /// Joins two or more conditions with AND.
    pub fn and_of(children: impl IntoIterator<Item = Condition<V>>) -> Result<Self> {
        Self::logical_of(Connective::And, children)
    }

    /// Joins two or more conditions with OR.
    pub fn or_of(children: impl IntoIterator<Item = Condition<V>>) -> Result<Self> {
        Self::logical_of(Connective::Or, children)
    }

    fn logical_of(
        connective: Connective,
        children: impl IntoIterator<Item = Condition<V>>,
    ) -> Result<Self> {
        let mut children: Vec<_> = children.into_iter().collect();
        match children.len() {
            0 => Err(Error::illegal_argument(format!(
                "{} requires at least one condition",
                Operator::from(connective)
            ))),
            1 => Ok(children.remove(0)),
            _ => Ok(Condition::Logical(Logical {
                connective,
                children,
            })),
        }
    }

    /// Appends `other` with `connective`, flattening into a matching root.
    fn join(self, connective: Connective, other: Condition<V>) -> Self {
        match self {
            Condition::Logical(mut logical) if logical.connective == connective => {
                logical.children.push(other);
                Condition::Logical(logical)
            }
            root => Condition::Logical(Logical {
                connective,
                children: vec![root, other],
            }),
        }
    }

    /// Wraps the condition so it can no longer be composed.
    pub fn read_only(self) -> ReadOnlyCondition<V> {
        ReadOnlyCondition { inner: self }
    }

    /// Replaces single-child logical groups with their child, recursively.
    pub(crate) fn collapse_single_groups(self) -> Self {
        match self {
            Condition::Logical(logical) => {
                let mut children: Vec<_> = logical
                    .children
                    .into_iter()
                    .map(Condition::collapse_single_groups)
                    .collect();
                if children.len() == 1 {
                    children.remove(0)
                } else {
                    Condition::Logical(Logical {
                        connective: logical.connective,
                        children,
                    })
                }
            }
            Condition::Not(inner) => Condition::Not(Box::new(inner.collapse_single_groups())),
            Condition::IgnoreCase(inner) => {
                Condition::IgnoreCase(Box::new(inner.collapse_single_groups()))
            }
            comparison => comparison,
        }
    }

    /// Visits every comparison leaf in left-to-right order.
    pub fn for_each_comparison<'a>(&'a self, f: &mut impl FnMut(&'a Comparison<V>)) {
        match self {
            Condition::Comparison(comparison) => f(comparison),
            Condition::Logical(logical) => {
                for child in &logical.children {
                    child.for_each_comparison(f);
                }
            }
            Condition::Not(inner) | Condition::IgnoreCase(inner) => inner.for_each_comparison(f),
        }
    }
}

impl<V: ConditionValue> Condition<V> {
    fn leaf(attribute: impl Into<String>, operator: Operator, value: V) -> Self {
        Condition::Comparison(Comparison {
            attribute: attribute.into(),
            operator,
            value,
        })
    }

    pub fn eq(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::Equals, value)
    }

    pub fn gt(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::GreaterThan, value)
    }

    pub fn gte(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::GreaterEquals, value)
    }

    pub fn lt(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::LesserThan, value)
    }

    pub fn lte(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::LesserEquals, value)
    }

    pub fn like(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::Like, value)
    }

    pub fn contains(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::Contains, value)
    }

    pub fn starts_with(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::StartsWith, value)
    }

    pub fn ends_with(attribute: impl Into<String>, value: V) -> Self {
        Self::leaf(attribute, Operator::EndsWith, value)
    }

    /// Membership test; the value must be an array (or a parameter bound to one).
    pub fn in_list(attribute: impl Into<String>, value: V) -> Result<Self> {
        let attribute = attribute.into();
        match value.shape() {
            ValueShape::Array(_) | ValueShape::Deferred => {
                Ok(Self::leaf(attribute, Operator::In, value))
            }
            ValueShape::Scalar => Err(Error::illegal_argument(format!(
                "IN on `{attribute}` requires an array value"
            ))),
        }
    }

    /// Range test; the value must be an array of exactly two non-array elements.
    pub fn between(attribute: impl Into<String>, value: V) -> Result<Self> {
        let attribute = attribute.into();
        match value.shape() {
            ValueShape::Array(2) if value.nests_arrays() => Err(Error::illegal_argument(format!(
                "BETWEEN on `{attribute}` requires two scalar bounds"
            ))),
            ValueShape::Array(2) | ValueShape::Deferred => {
                Ok(Self::leaf(attribute, Operator::Between, value))
            }
            ValueShape::Array(len) => Err(Error::illegal_argument(format!(
                "BETWEEN on `{attribute}` requires exactly two values, found {len}"
            ))),
            ValueShape::Scalar => Err(Error::illegal_argument(format!(
                "BETWEEN on `{attribute}` requires an array of two values"
            ))),
        }
    }

    /// Builds a comparison from an operator chosen at runtime.
    pub fn comparison(attribute: impl Into<String>, operator: Operator, value: V) -> Result<Self> {
        match operator {
            Operator::In => Self::in_list(attribute, value),
            Operator::Between => Self::between(attribute, value),
            operator if operator.is_comparison() => Ok(Self::leaf(attribute, operator, value)),
            operator => Err(Error::illegal_argument(format!(
                "{operator} is not a comparison operator"
            ))),
        }
    }
}

impl Condition {
    /// Parameter names referenced by this tree, in left-to-right order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.for_each_comparison(&mut |comparison| {
            comparison.value.collect_parameter_names(&mut names)
        });
        names
    }
}

/// Composition available on a condition handle.
pub trait Composable<V> {
    fn and(self, other: Condition<V>) -> Result<Condition<V>>;

    fn or(self, other: Condition<V>) -> Result<Condition<V>>;

    fn negate(self) -> Result<Condition<V>>;
}

impl<V> Composable<V> for Condition<V> {
    fn and(self, other: Condition<V>) -> Result<Condition<V>> {
        Ok(self.join(Connective::And, other))
    }

    fn or(self, other: Condition<V>) -> Result<Condition<V>> {
        Ok(self.join(Connective::Or, other))
    }

    fn negate(self) -> Result<Condition<V>> {
        Ok(Condition::not(self))
    }
}

/// A condition that rejects further composition.
///
/// It compares equal to the condition it wraps, but its hash includes a
/// read-only marker, so the two hash differently. Callers must not mix
/// wrapped and unwrapped conditions as keys of the same hashed collection.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ReadOnlyCondition<V = QueryValue> {
    inner: Condition<V>,
}

impl<V> ReadOnlyCondition<V> {
    pub fn get(&self) -> &Condition<V> {
        &self.inner
    }

    pub fn into_inner(self) -> Condition<V> {
        self.inner
    }

    fn rejected(&self, operation: &str) -> Error {
        Error::illegal_state(format!(
            "cannot {operation} a read-only {} condition",
            self.inner.operator()
        ))
    }
}

impl<V> Composable<V> for ReadOnlyCondition<V> {
    fn and(self, _other: Condition<V>) -> Result<Condition<V>> {
        Err(self.rejected("and"))
    }

    fn or(self, _other: Condition<V>) -> Result<Condition<V>> {
        Err(self.rejected("or"))
    }

    fn negate(self) -> Result<Condition<V>> {
        Err(self.rejected("negate"))
    }
}

impl<V> std::ops::Deref for ReadOnlyCondition<V> {
    type Target = Condition<V>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<V: PartialEq> PartialEq for ReadOnlyCondition<V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<V: PartialEq> PartialEq<Condition<V>> for ReadOnlyCondition<V> {
    fn eq(&self, other: &Condition<V>) -> bool {
        self.inner == *other
    }
}

impl<V: PartialEq> PartialEq<ReadOnlyCondition<V>> for Condition<V> {
    fn eq(&self, other: &ReadOnlyCondition<V>) -> bool {
        *self == other.inner
    }
}

impl<V: Eq> Eq for ReadOnlyCondition<V> {}

impl<V: Hash> Hash for ReadOnlyCondition<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "read-only".hash(state);
        self.inner.hash(state);
    }
}

impl<V: fmt::Display> fmt::Display for Condition<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison(comparison) => write!(
                f,
                "{} {} {}",
                comparison.attribute, comparison.operator, comparison.value
            ),
            Condition::Logical(logical) => {
                write!(f, "(")?;
                for (i, child) in logical.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", Operator::from(logical.connective))?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Condition::Not(inner) => write!(f, "NOT({inner})"),
            Condition::IgnoreCase(inner) => write!(f, "IGNORE_CASE({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn name_eq() -> Condition {
        Condition::eq("name", QueryValue::param("name"))
    }

    #[test]
    fn test_double_negation_cancels() {
        let condition = name_eq();
        let negated = Condition::not(condition.clone());
        assert_eq!(negated.operator(), Operator::Not);
        assert_eq!(Condition::not(negated), condition);
    }

    #[test]
    fn test_between_arity() {
        let ok = Condition::between(
            "age",
            QueryValue::array([QueryValue::number(10), QueryValue::number(20)]),
        );
        assert!(ok.is_ok());

        let one = Condition::between("age", QueryValue::array([QueryValue::number(10)]));
        assert!(matches!(one, Err(Error::IllegalArgument(_))));

        let three = Condition::between(
            "age",
            QueryValue::array([
                QueryValue::number(1),
                QueryValue::number(2),
                QueryValue::number(3),
            ]),
        );
        assert!(matches!(three, Err(Error::IllegalArgument(_))));

        let scalar = Condition::between("age", QueryValue::number(1));
        assert!(matches!(scalar, Err(Error::IllegalArgument(_))));
    }

    #[test]
    fn test_between_rejects_array_bounds() {
        let nested = Condition::between(
            "age",
            QueryValue::array([QueryValue::array([QueryValue::number(1)]), QueryValue::number(2)]),
        );
        assert!(matches!(nested, Err(Error::IllegalArgument(_))));

        let bound = Condition::between("age", serde_json::json!([[18, 65], [18, 65]]));
        assert!(matches!(bound, Err(Error::IllegalArgument(_))));
        assert!(Condition::between("age", serde_json::json!([18, null])).is_ok());
    }

    #[test]
    fn test_in_requires_array() {
        assert!(matches!(
            Condition::in_list("status", QueryValue::from("open")),
            Err(Error::IllegalArgument(_))
        ));
        assert!(Condition::in_list("status", QueryValue::array([QueryValue::from("open")])).is_ok());
        assert!(Condition::in_list("status", QueryValue::param("status")).is_ok());
    }

    #[test]
    fn test_comparison_rejects_logical_operators() {
        for operator in [Operator::And, Operator::Or, Operator::Not, Operator::IgnoreCase] {
            let result = Condition::comparison("name", operator, QueryValue::from("x"));
            assert!(matches!(result, Err(Error::IllegalArgument(_))), "{operator}");
        }
        let gt = Condition::comparison("age", Operator::GreaterThan, QueryValue::number(3)).unwrap();
        assert_eq!(gt.operator(), Operator::GreaterThan);
    }

    #[test]
    fn test_ignore_case_wraps_like() {
        let like = Condition::like("name", QueryValue::from("Ada%"));
        let wrapped = Condition::ignore_case(like.clone()).unwrap();
        assert_eq!(wrapped.operator(), Operator::IgnoreCase);
        assert_eq!(wrapped.inner(), Some(&like));
    }

    #[test]
    fn test_ignore_case_rejects_non_comparisons() {
        let negated = Condition::not(name_eq());
        assert!(matches!(
            Condition::ignore_case(negated),
            Err(Error::IllegalArgument(_))
        ));

        let logical = Condition::and_of([name_eq(), Condition::gt("age", QueryValue::number(1))]).unwrap();
        assert!(Condition::ignore_case(logical).is_err());
    }

    #[test]
    fn test_static_and_or() {
        let a = name_eq();
        let b = Condition::gt("age", QueryValue::param("age"));
        let c = Condition::lt("age", QueryValue::number(99));

        let and = Condition::and_of([a.clone(), b.clone(), c.clone()]).unwrap();
        let logical = and.as_logical().unwrap();
        assert_eq!(logical.connective, Connective::And);
        assert_eq!(logical.children, vec![a.clone(), b, c]);

        assert_eq!(Condition::or_of([a.clone()]).unwrap(), a);
        assert!(Condition::<QueryValue>::or_of([]).is_err());
    }

    #[test]
    fn test_instance_and_flattens() {
        let a = name_eq();
        let b = Condition::gt("age", QueryValue::param("age"));
        let c = Condition::eq("active", QueryValue::boolean(true));

        let chained = a.clone().and(b.clone()).unwrap().and(c.clone()).unwrap();
        assert_eq!(chained, Condition::and_of([a.clone(), b.clone(), c.clone()]).unwrap());

        let mixed = a.clone().and(b.clone()).unwrap().or(c.clone()).unwrap();
        let logical = mixed.as_logical().unwrap();
        assert_eq!(logical.connective, Connective::Or);
        assert_eq!(logical.children.len(), 2);
        assert!(logical.children[0].is_logical(Connective::And));
    }

    #[test]
    fn test_negate() {
        let condition = name_eq();
        let negated = condition.clone().negate().unwrap();
        assert_eq!(negated, Condition::Not(Box::new(condition.clone())));
        assert_eq!(negated.negate().unwrap(), condition);
    }

    #[test]
    fn test_read_only_rejects_composition() {
        let other = Condition::gt("age", QueryValue::number(3));
        let read_only = name_eq().read_only();

        assert!(matches!(read_only.clone().and(other.clone()), Err(Error::IllegalState(_))));
        assert!(matches!(read_only.clone().or(other), Err(Error::IllegalState(_))));
        assert!(matches!(read_only.negate(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_read_only_equals_original_but_hashes_differently() {
        let original = name_eq();
        let read_only = original.clone().read_only();

        // Equal by value, different hashes.
        assert_eq!(read_only, original);
        assert_eq!(original, read_only);
        assert_ne!(hash_of(&read_only), hash_of(&original));
        assert_eq!(read_only.get(), &original);
        assert_eq!(read_only.operator(), Operator::Equals);
    }

    #[test]
    fn test_collapse_single_groups() {
        let a = name_eq();
        let b = Condition::gt("age", QueryValue::param("age"));
        let tree = Condition::Logical(Logical {
            connective: Connective::And,
            children: vec![
                a.clone(),
                Condition::Logical(Logical {
                    connective: Connective::Or,
                    children: vec![b.clone()],
                }),
            ],
        });
        assert_eq!(
            tree.collapse_single_groups(),
            Condition::and_of([a, b]).unwrap()
        );
    }

    #[test]
    fn test_parameter_names() {
        let tree = Condition::and_of([
            name_eq(),
            Condition::between(
                "age",
                QueryValue::array([QueryValue::param("low"), QueryValue::param("high")]),
            )
            .unwrap(),
        ])
        .unwrap();
        assert_eq!(tree.parameter_names(), vec!["name", "low", "high"]);
    }

    #[test]
    fn test_display() {
        let tree = Condition::or_of([
            Condition::not(name_eq()),
            Condition::ignore_case(Condition::like("city", QueryValue::from("Ber%"))).unwrap(),
        ])
        .unwrap();
        assert_eq!(
            tree.to_string(),
            r#"(NOT(name EQUALS :name) OR IGNORE_CASE(city LIKE "Ber%"))"#
        );
    }
}
