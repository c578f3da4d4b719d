//! Optional conversion of bound values before they reach a storage engine.

use crate::error::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A capability-based conversion step.
pub trait ValueConverter: Send + Sync {
    fn supports(&self, value: &Value) -> bool;

    fn convert(&self, value: Value) -> Result<Value>;
}

/// Adapts a `(predicate, convert)` closure pair.
pub struct FnConverter<P, C> {
    predicate: P,
    convert: C,
}

impl<P, C> FnConverter<P, C>
where
    P: Fn(&Value) -> bool + Send + Sync,
    C: Fn(Value) -> Result<Value> + Send + Sync,
{
    pub fn new(predicate: P, convert: C) -> Self {
        Self { predicate, convert }
    }
}

impl<P, C> ValueConverter for FnConverter<P, C>
where
    P: Fn(&Value) -> bool + Send + Sync,
    C: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn supports(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    fn convert(&self, value: Value) -> Result<Value> {
        (self.convert)(value)
    }
}

/// Converters tried in registration order; the first that supports a value wins.
#[derive(Clone, Default)]
pub struct ValueConverters {
    converters: Vec<Arc<dyn ValueConverter>>,
}

impl ValueConverters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, converter: impl ValueConverter + 'static) {
        self.converters.push(Arc::new(converter));
    }

    pub fn with(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.push(converter);
        self
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub fn find(&self, value: &Value) -> Option<&dyn ValueConverter> {
        self.converters
            .iter()
            .find(|converter| converter.supports(value))
            .map(|converter| converter.as_ref())
    }

    /// Converts with the first supporting converter; other values pass through.
    pub fn convert(&self, value: Value) -> Result<Value> {
        match self.find(&value) {
            Some(converter) => converter.convert(value),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for ValueConverters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverters")
            .field("len", &self.converters.len())
            .finish()
    }
}
