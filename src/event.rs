//! Parse events emitted by the front-ends, in strict left-to-right order.

use crate::condition::{Connective, Operator};
use crate::value::QueryValue;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Where a predicate's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A parameter named after the attribute, bound at call time.
    Parameter,
    /// An explicit literal, array or named parameter.
    Value(QueryValue),
}

/// One recognised attribute predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Raw attribute path segments, e.g. `["Address", "ZipCode"]`.
    pub attribute: Vec<String>,
    pub operator: Operator,
    pub operand: Operand,
    pub negated: bool,
    pub ignore_case: bool,
}

impl Predicate {
    pub fn new(attribute: Vec<String>, operator: Operator) -> Self {
        Self {
            attribute,
            operator,
            operand: Operand::Parameter,
            negated: false,
            ignore_case: false,
        }
    }

    pub fn with_value(mut self, value: QueryValue) -> Self {
        self.operand = Operand::Value(value);
        self
    }

    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// Count-only result shape.
    Count,
    /// Maximum number of results.
    Limit(usize),
    Predicate(Predicate),
    /// Sets the connective for the next predicate.
    Connective(Connective),
    OrderBy {
        attribute: Vec<String>,
        direction: Direction,
        ignore_case: bool,
    },
    End,
}
