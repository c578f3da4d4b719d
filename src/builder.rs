//! Folds an ordered stream of parse events into a [`QueryDescriptor`].
//!
//! ```text
//! events ──► DescriptorBuilder::apply (one event at a time)
//!              ├─ Predicate   ──► ConditionBuilder::push
//!              │                    ├─ factory (validates IN / BETWEEN)
//!              │                    ├─ IgnoreCase wrap, then Not wrap
//!              │                    └─ merge into root
//!              ├─ Connective  ──► flips the pending AND / OR
//!              ├─ OrderBy / Limit / Count ──► descriptor fields
//!              └─ End         ──► no further events accepted
//! ```
//!
//! Merge rules, with `c` the pending connective:
//!
//! 1. no root: the new node becomes the root;
//! 2. root is a `c` group: append to it;
//! 3. root is not a group: `c(root, new)`;
//! 4. root is a group of the other connective: if its last child is a `c`
//!    group append there, otherwise append a new `c(new)` group.
//!
//! Groups left with a single child by rule 4 are collapsed when the build
//! finishes.
//!
//! Parameters derived from an attribute are unique within one descriptor: a
//! repeated attribute, or the upper bound of a `BETWEEN`, gets a `_1`, `_2`
//! ... suffix. Explicit named parameters keep their name and may repeat.

use crate::condition::{Condition, Connective, Logical, Operator};
use crate::descriptor::{QueryDescriptor, Sort};
use crate::error::{Error, Result};
use crate::event::{Operand, ParseEvent, Predicate};
use crate::normalizer::{format_attribute, AttributeNormalizer};
use crate::value::QueryValue;
use std::collections::HashSet;
use tracing::trace;

/// Incrementally composes predicates into one condition tree.
pub struct ConditionBuilder<'a> {
    entity: &'a str,
    normalizer: &'a dyn AttributeNormalizer,
    root: Option<Condition>,
    use_and: bool,
    parameters: HashSet<String>,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(entity: &'a str, normalizer: &'a dyn AttributeNormalizer) -> Self {
        Self {
            entity,
            normalizer,
            root: None,
            use_and: true,
            parameters: HashSet::new(),
        }
    }

    pub fn set_connective(&mut self, connective: Connective) {
        self.use_and = connective == Connective::And;
    }

    fn connective(&self) -> Connective {
        if self.use_and {
            Connective::And
        } else {
            Connective::Or
        }
    }

    /// Builds the predicate's node and merges it into the tree.
    pub fn push(&mut self, predicate: Predicate) -> Result<()> {
        let node = self.build_node(predicate)?;
        let connective = self.connective();
        self.root = Some(match self.root.take() {
            None => node,
            Some(root) => merge(root, connective, node),
        });
        Ok(())
    }

    fn build_node(&mut self, predicate: Predicate) -> Result<Condition> {
        let path = format_attribute(&predicate.attribute);
        let attribute = self.normalizer.normalize(self.entity, &path);
        let value = match predicate.operand {
            Operand::Value(value) => {
                self.parameters
                    .extend(value.parameter_names().into_iter().map(str::to_string));
                value
            }
            Operand::Parameter if predicate.operator == Operator::Between => {
                let low = self.derive_parameter(&path);
                let high = self.derive_parameter(&path);
                QueryValue::array([QueryValue::param(low), QueryValue::param(high)])
            }
            Operand::Parameter => QueryValue::param(self.derive_parameter(&path)),
        };

        let mut node = Condition::comparison(attribute, predicate.operator, value)?;
        if predicate.ignore_case {
            node = Condition::ignore_case(node)?;
        }
        if predicate.negated {
            node = Condition::not(node);
        }
        Ok(node)
    }

    /// `path`, or `path_N` with the smallest free `N`.
    fn derive_parameter(&mut self, path: &str) -> String {
        let mut name = path.to_string();
        let mut suffix = 0;
        while self.parameters.contains(&name) {
            suffix += 1;
            name = format!("{path}_{suffix}");
        }
        self.parameters.insert(name.clone());
        name
    }

    /// The current root, exactly as merged so far.
    pub fn root(&self) -> Option<&Condition> {
        self.root.as_ref()
    }

    pub fn finish(self) -> Option<Condition> {
        self.root.map(Condition::collapse_single_groups)
    }
}

fn merge(root: Condition, connective: Connective, node: Condition) -> Condition {
    match root {
        Condition::Logical(mut logical) if logical.connective == connective => {
            logical.children.push(node);
            Condition::Logical(logical)
        }
        Condition::Logical(mut logical) => {
            match logical.children.last_mut() {
                Some(Condition::Logical(last)) if last.connective == connective => {
                    last.children.push(node);
                }
                _ => logical.children.push(Condition::Logical(Logical {
                    connective,
                    children: vec![node],
                })),
            }
            Condition::Logical(logical)
        }
        root => Condition::Logical(Logical {
            connective,
            children: vec![root, node],
        }),
    }
}

/// Collects the whole descriptor: condition, sorts, limit and count flag.
pub struct DescriptorBuilder<'a> {
    conditions: ConditionBuilder<'a>,
    sorts: Vec<Sort>,
    limit: usize,
    count: bool,
    ended: bool,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(entity: &'a str, normalizer: &'a dyn AttributeNormalizer) -> Self {
        Self {
            conditions: ConditionBuilder::new(entity, normalizer),
            sorts: Vec::new(),
            limit: 0,
            count: false,
            ended: false,
        }
    }

    /// Applies one event; shaped for use with `Iterator::try_fold`.
    pub fn apply(mut self, event: ParseEvent) -> Result<Self> {
        trace!(?event, entity = self.conditions.entity, "applying parse event");

        if self.ended {
            return Err(Error::illegal_state(format!(
                "event {event:?} received after the end of the stream"
            )));
        }

        match event {
            ParseEvent::Count => self.count = true,
            ParseEvent::Limit(limit) => self.limit = limit,
            ParseEvent::Predicate(predicate) => self.conditions.push(predicate)?,
            ParseEvent::Connective(connective) => self.conditions.set_connective(connective),
            ParseEvent::OrderBy {
                attribute,
                direction,
                ignore_case,
            } => {
                let path = format_attribute(&attribute);
                let attribute = self
                    .conditions
                    .normalizer
                    .normalize(self.conditions.entity, &path);
                self.sorts.push(Sort {
                    attribute,
                    direction,
                    ignore_case,
                });
            }
            ParseEvent::End => self.ended = true,
        }
        Ok(self)
    }

    pub fn finish(self) -> QueryDescriptor {
        QueryDescriptor {
            entity: self.conditions.entity.to_string(),
            condition: self.conditions.finish(),
            sorts: self.sorts,
            limit: self.limit,
            count: self.count,
        }
    }
}

/// Builds a descriptor from a complete event stream.
pub fn build_descriptor(
    entity: &str,
    normalizer: &dyn AttributeNormalizer,
    events: impl IntoIterator<Item = ParseEvent>,
) -> Result<QueryDescriptor> {
    let builder = events
        .into_iter()
        .try_fold(DescriptorBuilder::new(entity, normalizer), DescriptorBuilder::apply)?;
    Ok(builder.finish())
}
