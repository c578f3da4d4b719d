//! The artifacts handed to storage executors.

use crate::condition::Condition;
use crate::event::Direction;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sort {
    pub attribute: String,
    pub direction: Direction,
    pub ignore_case: bool,
}

/// A compiled query: built once per descriptor and entity, then shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
    pub entity: String,
    pub condition: Option<Condition>,
    pub sorts: Vec<Sort>,
    /// Maximum number of results; 0 means unbounded.
    pub limit: usize,
    pub count: bool,
}

impl QueryDescriptor {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            condition: None,
            sorts: Vec::new(),
            limit: 0,
            count: false,
        }
    }

    /// Parameter names in the order positional arguments are bound.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.condition
            .as_ref()
            .map(|condition| condition.parameter_names())
            .unwrap_or_default()
    }
}

/// A descriptor whose condition has been bound to one call's arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundQuery {
    pub entity: String,
    pub condition: Option<Condition<serde_json::Value>>,
    pub sorts: Vec<Sort>,
    pub limit: usize,
    pub count: bool,
}
