//! # crudquery
//!
//! Declarative filtering and pagination for CRUD APIs built on Sea-ORM.
//!
//! A client sends a JSON [`Filter`] (conditions with nested `or` alternatives,
//! dot paths into relations, `->` paths into JSON columns, sorting, paging);
//! the [`QueryEngine`] compiles it against a [`Record`] type and runs it:
//!
//! ```rust,ignore
//! let engine = QueryEngine::new(EngineConfig::default());
//! let filter = FilterQuery { filter: Some(encoded) }.decode()?;
//! let page: PageResult<User> = engine.page::<User>(&db, &filter).await?;
//! ```
//!
//! Writes go through the [`AuditStamper`], which fills ids, timestamps and
//! actor columns from the ambient [`AuditContext`].

pub mod audit;
pub mod config;
pub mod engine;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod query_builder;
pub mod resolver;
pub mod statistics;
pub mod traits;

pub use audit::{AuditColumns, AuditContext, AuditStamper};
pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use errors::{ApiError, FilterError};
pub use filtering::{Condition, FieldPath, Filter, Operator, OrderSpec, SortOrder};
pub use models::{FilterQuery, PageResult};
pub use resolver::{FieldNameRegistry, FieldNames};
pub use serde_with;
pub use statistics::{Aggregate, FieldMatch};
pub use traits::{MergeIntoActiveModel, Record};
