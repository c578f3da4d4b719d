//! The entry point tying the front-ends, the builder, the cache and the resolver together.

use crate::builder::build_descriptor;
use crate::cache::{CacheKey, DerivationCache, DescriptorKind};
use crate::condition::Condition;
use crate::config::DeriverConfig;
use crate::convert::{ValueConverter, ValueConverters};
use crate::descriptor::{BoundQuery, QueryDescriptor};
use crate::error::Result;
use crate::method::parse_method;
use crate::normalizer::{AttributeNormalizer, IdentityNormalizer};
use crate::parser::parse_text;
use crate::resolver::{Params, ValueResolver};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Derives query descriptors and binds them to call arguments.
///
/// A deriver is an ordinary value: build one per configuration and share it
/// by reference or `Arc`. Descriptors are cached per (kind, text, entity)
/// unless caching is disabled.
pub struct QueryDeriver {
    normalizer: Box<dyn AttributeNormalizer>,
    resolver: ValueResolver,
    cache: DerivationCache,
    cache_enabled: bool,
}

impl Default for QueryDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryDeriver {
    pub fn new() -> Self {
        Self {
            normalizer: Box::new(IdentityNormalizer),
            resolver: ValueResolver::default(),
            cache: DerivationCache::new(),
            cache_enabled: true,
        }
    }

    pub fn from_config(config: &DeriverConfig) -> Self {
        Self::new()
            .with_normalizer(config.normalizer())
            .with_cache(config.cache)
    }

    pub fn with_normalizer(mut self, normalizer: impl AttributeNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn with_converter(self, converter: impl ValueConverter + 'static) -> Self {
        let converters = self.resolver.converters().clone().with(converter);
        self.with_converters(converters)
    }

    pub fn with_converters(mut self, converters: ValueConverters) -> Self {
        self.resolver = ValueResolver::new(converters);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Derives a descriptor from a method name such as `findByNameAndAgeGreaterThan`.
    pub fn derive_method(&self, method: &str, entity: &str) -> Result<Arc<QueryDescriptor>> {
        self.derive(DescriptorKind::Method, method, entity)
    }

    /// Derives a descriptor from query text such as `name = :name and age > 18`.
    pub fn derive_text(&self, text: &str, entity: &str) -> Result<Arc<QueryDescriptor>> {
        self.derive(DescriptorKind::Text, text, entity)
    }

    fn derive(&self, kind: DescriptorKind, descriptor: &str, entity: &str) -> Result<Arc<QueryDescriptor>> {
        let build = || {
            debug!(%kind, descriptor, entity, "building query descriptor");
            let events = match kind {
                DescriptorKind::Method => parse_method(descriptor)?,
                DescriptorKind::Text => parse_text(descriptor)?,
            };
            build_descriptor(entity, self.normalizer.as_ref(), events)
        };

        if !self.cache_enabled {
            return build().map(Arc::new);
        }
        self.cache
            .get_or_try_insert_with(CacheKey::new(kind, descriptor, entity), build)
    }

    /// Binds positional arguments, in parameter order, to a fresh copy of the descriptor's condition.
    pub fn bind(
        &self,
        descriptor: &QueryDescriptor,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<BoundQuery> {
        let condition = match &descriptor.condition {
            Some(condition) => Some(self.resolver.resolve(condition, args)?),
            None => {
                Params::new().bind_all(args)?;
                None
            }
        };
        Ok(bound(descriptor, condition))
    }

    /// Binds arguments by parameter name.
    pub fn bind_named<S: AsRef<str>>(
        &self,
        descriptor: &QueryDescriptor,
        args: impl IntoIterator<Item = (S, Value)>,
    ) -> Result<BoundQuery> {
        let mut params = Params::new();
        let pending = descriptor
            .condition
            .as_ref()
            .map(|condition| self.resolver.prepare(condition, &mut params))
            .transpose()?;
        for (name, value) in args {
            params.bind(name.as_ref(), value)?;
        }
        let condition = pending
            .map(|pending| self.resolver.materialize(pending))
            .transpose()?;
        Ok(bound(descriptor, condition))
    }

    pub fn cache(&self) -> &DerivationCache {
        &self.cache
    }

    pub fn resolver(&self) -> &ValueResolver {
        &self.resolver
    }
}

fn bound(descriptor: &QueryDescriptor, condition: Option<Condition<Value>>) -> BoundQuery {
    BoundQuery {
        entity: descriptor.entity.clone(),
        condition,
        sorts: descriptor.sorts.clone(),
        limit: descriptor.limit,
        count: descriptor.count,
    }
}

impl fmt::Debug for QueryDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDeriver")
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Comparison, Connective, Logical, Operator};
    use crate::convert::FnConverter;
    use crate::error::Error;
    use crate::event::Direction;
    use crate::value::QueryValue;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_find_by_name_and_age_greater_than() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_method("findByNameAndAgeGreaterThan", "Person").unwrap();

        let expected = Condition::Logical(Logical {
            connective: Connective::And,
            children: vec![
                Condition::Comparison(Comparison {
                    attribute: "name".to_string(),
                    operator: Operator::Equals,
                    value: QueryValue::param("name"),
                }),
                Condition::Comparison(Comparison {
                    attribute: "age".to_string(),
                    operator: Operator::GreaterThan,
                    value: QueryValue::param("age"),
                }),
            ],
        });
        assert_eq!(descriptor.entity, "Person");
        assert_eq!(descriptor.condition, Some(expected));
        assert!(descriptor.sorts.is_empty());
        assert_eq!(descriptor.limit, 0);
        assert!(!descriptor.count);
        assert_eq!(descriptor.parameter_names(), vec!["name", "age"]);
    }

    #[test]
    fn test_find_first_by_status_ignore_case() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_method("findFirstByStatusIgnoreCase", "Person").unwrap();

        assert_eq!(descriptor.limit, 1);
        let condition = descriptor.condition.as_ref().unwrap();
        assert_eq!(condition.operator(), Operator::IgnoreCase);
        assert_eq!(
            condition.inner(),
            Some(&Condition::eq("status", QueryValue::param("status")))
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let deriver = QueryDeriver::new().with_cache(false);
        let method = "findByNameOrAgeLessThanAndCityInOrderByNameDesc";
        let first = deriver.derive_method(method, "Person").unwrap();
        let second = deriver.derive_method(method, "Person").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert!(deriver.cache().is_empty());
    }

    #[test]
    fn test_cached_descriptors_are_shared() {
        let deriver = QueryDeriver::new();
        let first = deriver.derive_text("name = :name", "Person").unwrap();
        let second = deriver.derive_text("name = :name", "Person").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        deriver.derive_method("findByName", "Person").unwrap();
        assert_eq!(deriver.cache().len(), 2);
    }

    #[test]
    fn test_parse_failures_are_reported_and_not_cached() {
        let deriver = QueryDeriver::new();
        let err = deriver.derive_method("deleteByName", "Person").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = deriver.derive_text("name in 'x'", "Person").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = deriver.derive_text("tags in 5", "Person").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(deriver.cache().is_empty());
    }

    #[test]
    fn test_text_predicates_wrap_in_order() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver
            .derive_text("status in :s and name = 'x' ignore case and age between 1 and 2", "Person")
            .unwrap();
        let condition = descriptor.condition.as_ref().unwrap();
        assert_eq!(condition.operator(), Operator::And);
        assert_eq!(condition.as_logical().map(|logical| logical.children.len()), Some(3));

        let descriptor = deriver.derive_text("not status = :s ignore case", "Person").unwrap();
        let condition = descriptor.condition.as_ref().unwrap();
        assert_eq!(condition.operator(), Operator::Not);
        assert_eq!(condition.inner().map(Condition::operator), Some(Operator::IgnoreCase));
    }

    #[test]
    fn test_config_maps_attributes() {
        let config = DeriverConfig::from_json_str(
            r#"{ "attributes": { "Person": { "address.zipCode": "zip", "name": "full_name" } } }"#,
        )
        .unwrap();
        let deriver = QueryDeriver::from_config(&config);
        let descriptor = deriver
            .derive_method("findByAddress_ZipCodeOrderByNameDesc", "Person")
            .unwrap();

        assert_eq!(
            descriptor.condition,
            Some(Condition::eq("zip", QueryValue::param("address.zipCode")))
        );
        assert_eq!(descriptor.sorts[0].attribute, "full_name");
        assert_eq!(descriptor.sorts[0].direction, Direction::Desc);
    }

    #[test]
    fn test_bind_positional() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_method("findTop5ByNameAndAgeBetween", "Person").unwrap();
        let bound = deriver
            .bind(&descriptor, vec![json!("Ada"), json!(18), json!(65)])
            .unwrap();

        assert_eq!(bound.limit, 5);
        assert_eq!(
            bound.condition,
            Some(
                Condition::and_of([
                    Condition::eq("name", json!("Ada")),
                    Condition::between("age", json!([18, 65])).unwrap(),
                ])
                .unwrap()
            )
        );

        let err = deriver.bind(&descriptor, vec![json!("Ada")]).unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(_)));
    }

    #[test]
    fn test_bind_named_and_unbound() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_text("name = :name or nickname = :name", "Person").unwrap();

        let bound = deriver.bind_named(&descriptor, [("name", json!("Ada"))]).unwrap();
        assert_eq!(
            bound.condition,
            Some(
                Condition::or_of([
                    Condition::eq("name", json!("Ada")),
                    Condition::eq("nickname", json!("Ada")),
                ])
                .unwrap()
            )
        );

        let err = deriver
            .bind_named(&descriptor, Vec::<(&str, Value)>::new())
            .unwrap_err();
        assert_eq!(err, Error::UnresolvedParameter("name".to_string()));
    }

    #[test]
    fn test_bind_named_between_bounds() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_method("findByAgeBetween", "Person").unwrap();
        assert_eq!(descriptor.parameter_names(), vec!["age", "age_1"]);

        let bound = deriver
            .bind_named(&descriptor, [("age", json!(18)), ("age_1", json!(65))])
            .unwrap();
        assert_eq!(
            bound.condition,
            Some(Condition::between("age", json!([18, 65])).unwrap())
        );

        let err = deriver.bind_named(&descriptor, [("age", json!(18))]).unwrap_err();
        assert_eq!(err, Error::UnresolvedParameter("age_1".to_string()));

        let err = deriver
            .bind_named(&descriptor, [("age", json!([18, 65])), ("age_1", json!([18, 65]))])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(_)));
    }

    #[test]
    fn test_bind_positional_repeated_placeholder() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_text("name = :name or nickname = :name", "Person").unwrap();

        let bound = deriver.bind(&descriptor, vec![json!("Ada")]).unwrap();
        assert_eq!(
            bound.condition,
            Some(
                Condition::or_of([
                    Condition::eq("name", json!("Ada")),
                    Condition::eq("nickname", json!("Ada")),
                ])
                .unwrap()
            )
        );

        let err = deriver.bind(&descriptor, vec![json!("Ada"), json!("Grace")]).unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(_)));
    }

    #[test]
    fn test_bind_repeated_method_attribute() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver
            .derive_method("findByAgeGreaterThanAndAgeLessThan", "Person")
            .unwrap();
        let bound = deriver.bind(&descriptor, vec![json!(18), json!(65)]).unwrap();
        assert_eq!(
            bound.condition,
            Some(
                Condition::and_of([
                    Condition::gt("age", json!(18)),
                    Condition::lt("age", json!(65)),
                ])
                .unwrap()
            )
        );
    }

    #[test]
    fn test_bind_without_condition() {
        let deriver = QueryDeriver::new();
        let descriptor = deriver.derive_text("count", "Person").unwrap();
        let bound = deriver.bind(&descriptor, Vec::new()).unwrap();
        assert!(bound.count);
        assert_eq!(bound.condition, None);
        assert!(deriver.bind(&descriptor, vec![json!(1)]).is_err());
    }

    #[test]
    fn test_converter_runs_on_bind() {
        let deriver = QueryDeriver::new().with_converter(FnConverter::new(
            |value| value.is_string(),
            |value| Ok(json!(value.as_str().unwrap_or_default().trim())),
        ));
        let descriptor = deriver.derive_method("findByName", "Person").unwrap();
        let bound = deriver.bind(&descriptor, vec![json!("  Ada ")]).unwrap();
        assert_eq!(bound.condition, Some(Condition::eq("name", json!("Ada"))));
    }

    #[test]
    fn test_shared_across_threads() {
        let deriver = QueryDeriver::new();
        let descriptors: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| deriver.derive_method("findByName", "Person").unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });
        assert!(descriptors.iter().all(|d| Arc::ptr_eq(d, &descriptors[0])));
        assert_eq!(deriver.cache().len(), 1);
    }
}
