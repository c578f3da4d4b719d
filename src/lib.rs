//! Derives backend-agnostic condition trees from query method names and query text.
//!
//! ```text
//! "findByNameAndAgeGreaterThan" ─► method ─┐
//!                                          ├─► ParseEvent* ─► builder ─► QueryDescriptor ─► cache
//! "name = :name and age > 18"   ─► parser ─┘                                    │
//!                                                        call args ─► resolver ─┴─► BoundQuery
//! ```

pub mod builder;
pub mod cache;
pub mod condition;
pub mod config;
pub mod convert;
pub mod deriver;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod lexer;
pub mod method;
pub mod normalizer;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

pub use condition::{Composable, Condition, Connective, Operator, ReadOnlyCondition};
pub use config::DeriverConfig;
pub use deriver::QueryDeriver;
pub use descriptor::{BoundQuery, QueryDescriptor, Sort};
pub use error::{Error, Result};
pub use value::QueryValue;
