//! Call-time resolution of condition trees.
//!
//! Resolution runs in three steps for every invocation:
//!
//! 1. [`ValueResolver::prepare`] walks a cached tree and registers each
//!    parameter with a fresh [`Params`] registry, producing a
//!    `Condition<Pending>` whose parameter leaves point at empty slots;
//! 2. the caller fills the slots, by name or by position;
//! 3. [`ValueResolver::materialize`] reads every slot, runs the converters
//!    and re-checks the `IN` / `BETWEEN` shapes against the bound values.
//!
//! Bindings are `Rc`-based on purpose: a registry belongs to one call on one
//! thread and cannot be shared.

use crate::condition::{Condition, Logical};
use crate::convert::ValueConverters;
use crate::error::{Error, Result};
use crate::value::{ConditionValue, QueryValue, Scalar, ValueShape};
use serde::Serialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::rc::Rc;

/// A named single-assignment slot.
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    name: Rc<str>,
    slot: Rc<OnceCell<Value>>,
}

impl ParameterBinding {
    fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            slot: Rc::new(OnceCell::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn set(&self, value: Value) -> Result<()> {
        self.slot
            .set(value)
            .map_err(|_| Error::ParameterAlreadyBound(self.name.to_string()))
    }

    pub fn get(&self) -> Result<&Value> {
        self.slot
            .get()
            .ok_or_else(|| Error::UnresolvedParameter(self.name.to_string()))
    }
}

/// The parameter registry of a single invocation.
#[derive(Debug, Default)]
pub struct Params {
    bindings: Vec<ParameterBinding>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter and returns its (still empty) slot.
    pub fn register(&mut self, name: &str) -> ParameterBinding {
        let binding = ParameterBinding::new(name);
        self.bindings.push(binding.clone());
        binding
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Registered names, in registration order. A name may repeat.
    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(ParameterBinding::name).collect()
    }

    pub fn unbound(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|binding| !binding.is_bound())
            .map(ParameterBinding::name)
            .collect()
    }

    /// Binds every slot registered under `name`.
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mut found = false;
        for binding in self.bindings.iter().filter(|binding| binding.name() == name) {
            binding.set(value.clone())?;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(Error::illegal_argument(format!("unknown parameter `{name}`")))
        }
    }

    pub fn bind_serialize<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|err| Error::UnsupportedValue(format!("parameter `{name}`: {err}")))?;
        self.bind(name, value)
    }

    /// Distinct names, in order of first registration.
    pub fn distinct_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.bindings.iter().map(ParameterBinding::name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Binds arguments by position, one per distinct name, in first-registration order.
    pub fn bind_all(&self, args: impl IntoIterator<Item = Value>) -> Result<()> {
        let names = self.distinct_names();
        let args: Vec<Value> = args.into_iter().collect();
        if args.len() != names.len() {
            return Err(Error::illegal_argument(format!(
                "expected {} arguments, found {}",
                names.len(),
                args.len()
            )));
        }
        for (name, arg) in names.into_iter().zip(args) {
            self.bind(name, arg)?;
        }
        Ok(())
    }
}

/// A leaf whose parameters may not be bound yet.
#[derive(Debug, Clone)]
pub enum Pending {
    Value(Value),
    Deferred(ParameterBinding),
    Array(Vec<Pending>),
}

impl ConditionValue for Pending {
    fn shape(&self) -> ValueShape {
        match self {
            Pending::Value(value) => value.shape(),
            Pending::Deferred(_) => ValueShape::Deferred,
            Pending::Array(items) => ValueShape::Array(items.len()),
        }
    }

    fn nests_arrays(&self) -> bool {
        match self {
            Pending::Value(value) => value.nests_arrays(),
            Pending::Deferred(_) => false,
            Pending::Array(items) => items.iter().any(|item| match item {
                Pending::Value(value) => value.is_array(),
                Pending::Array(_) => true,
                Pending::Deferred(_) => false,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValueResolver {
    converters: ValueConverters,
}

impl ValueResolver {
    pub fn new(converters: ValueConverters) -> Self {
        Self { converters }
    }

    pub fn converters(&self) -> &ValueConverters {
        &self.converters
    }

    pub fn resolve_value(&self, value: &QueryValue, params: &mut Params) -> Pending {
        match value {
            QueryValue::Scalar(scalar) => Pending::Value(scalar_to_json(scalar)),
            QueryValue::Array(items) => Pending::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item, params))
                    .collect(),
            ),
            QueryValue::Parameter(name) => Pending::Deferred(params.register(name)),
        }
    }

    pub fn prepare(&self, condition: &Condition, params: &mut Params) -> Result<Condition<Pending>> {
        Ok(match condition {
            Condition::Comparison(comparison) => Condition::comparison(
                comparison.attribute.clone(),
                comparison.operator,
                self.resolve_value(&comparison.value, params),
            )?,
            Condition::Logical(logical) => Condition::Logical(Logical {
                connective: logical.connective,
                children: logical
                    .children
                    .iter()
                    .map(|child| self.prepare(child, params))
                    .collect::<Result<_>>()?,
            }),
            Condition::Not(inner) => Condition::Not(Box::new(self.prepare(inner, params)?)),
            Condition::IgnoreCase(inner) => {
                Condition::IgnoreCase(Box::new(self.prepare(inner, params)?))
            }
        })
    }

    pub fn materialize(&self, condition: Condition<Pending>) -> Result<Condition<Value>> {
        Ok(match condition {
            Condition::Comparison(comparison) => Condition::comparison(
                comparison.attribute,
                comparison.operator,
                self.materialize_value(comparison.value)?,
            )?,
            Condition::Logical(logical) => Condition::Logical(Logical {
                connective: logical.connective,
                children: logical
                    .children
                    .into_iter()
                    .map(|child| self.materialize(child))
                    .collect::<Result<_>>()?,
            }),
            Condition::Not(inner) => Condition::Not(Box::new(self.materialize(*inner)?)),
            Condition::IgnoreCase(inner) => {
                Condition::IgnoreCase(Box::new(self.materialize(*inner)?))
            }
        })
    }

    pub fn materialize_value(&self, pending: Pending) -> Result<Value> {
        match pending {
            Pending::Value(value) => self.convert(value),
            Pending::Deferred(binding) => self.convert(binding.get()?.clone()),
            Pending::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.materialize_value(item))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    fn convert(&self, value: Value) -> Result<Value> {
        if let Some(converter) = self.converters.find(&value) {
            return converter.convert(value);
        }
        match value {
            Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.convert(item))
                    .collect::<Result<_>>()?,
            )),
            Value::Object(_) => Err(Error::UnsupportedValue(format!(
                "no converter accepts {value}"
            ))),
            value => Ok(value),
        }
    }

    /// Prepares, binds `args` by position and materializes in one go.
    pub fn resolve(
        &self,
        condition: &Condition,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Condition<Value>> {
        let mut params = Params::new();
        let pending = self.prepare(condition, &mut params)?;
        params.bind_all(args)?;
        self.materialize(pending)
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::String(s) => Value::String(s.clone()),
        Scalar::Number(n) => Value::Number(n.clone()),
        Scalar::Boolean(b) => Value::Bool(*b),
        Scalar::Enum { variant, .. } => Value::String(variant.clone()),
        Scalar::Null => Value::Null,
    }
}
