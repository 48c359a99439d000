//! # atfx-query
//!
//! Condition evaluation, relation path search and aggregation over an
//! [`atfx_model::AtfxCache`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use atfx_query::{Condition, ConditionEvaluator, SelOperator, SelValue};
//!
//! let evaluator = ConditionEvaluator::new(&cache);
//!
//! // Tests with a linked measurement whose quantity count is 5
//! let candidates = cache.instance_iids(test)?;
//! let result = evaluator.filter(
//!     test,
//!     &candidates,
//!     &[Condition::new(meas, "quantity_count", SelOperator::Eq, SelValue::LongLong(5))],
//! )?;
//! println!("{} tests match", result.count());
//! ```
//!
//! ## Supported Operators
//!
//! | Operator | Case-insensitive | Negated |
//! |----------|------------------|---------|
//! | `EQ` | `CI_EQ` | `NEQ`, `CI_NEQ` |
//! | `LIKE` | `CI_LIKE` | `NOTLIKE`, `CI_NOTLIKE` |
//! | `INSET` | `CI_INSET` | `NOTINSET`, `CI_NOTINSET` |
//!
//! `LT`, `GT`, `LTE` and `GTE` are recognized and rejected as not
//! implemented. Of the aggregate functions only `MAX` is implemented.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        atfx-query                            │
//! │                                                              │
//! │  ConditionEvaluator                                          │
//! │  ├── resolve attribute or relation of each condition         │
//! │  ├── find relation path (≤ 2 hops, PathCache LRU)            │
//! │  ├── follow path per candidate, any reached instance matches │
//! │  └── return FilterResult with stats                          │
//! │                                                              │
//! │  aggregate             MAX over attributes / to-1 relations  │
//! │  WildcardResultBuilder all attributes + to-1 relations       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod aggregate;
mod cache;
mod condition;
mod config;
mod error;
mod evaluator;
mod path;
mod result;
mod wildcard;

// Public re-exports
pub use aggregate::{aggregate, AggregateFunction};
pub use cache::PathCache;
pub use condition::{like_match, Condition, SelOperator, SelValue};
pub use config::{PathCacheConfig, QueryConfig, QueryConfigBuilder};
pub use error::{QueryError, QueryResult};
pub use evaluator::ConditionEvaluator;
pub use path::{find_relation_path, PathSearch, RelationPath, MAX_PATH_LENGTH};
pub use result::{ExecutionStats, FilterResult};
pub use wildcard::{ColumnSource, WildcardColumn, WildcardResult, WildcardResultBuilder, WildcardRow};
