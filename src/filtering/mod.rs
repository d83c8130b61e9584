//! # Declarative Filtering
//!
//! Compiles a JSON [`Filter`] into native `sea_orm` predicates.
//!
//! ## Pipeline
//!
//! 1. **Parse**: field references become [`FieldPath`]s and condition values are
//!    checked against their [`Operator`] while the filter is deserialized.
//! 2. **Compile**: [`compile_where`] turns the `where` list into a
//!    [`CompiledWhere`], a disjunction of AND-groups keyed by logical field name.
//!    [`compile_permission_where`] is the flat variant used for permission checks.
//! 3. **Lower**: [`lowering::lower`] maps logical names to physical columns
//!    through the [`FieldNameRegistry`](crate::resolver::FieldNameRegistry) and
//!    produces a `sea_orm::Condition` for the connected backend.
//!
//! ## Condition Examples
//!
//! ```rust,ignore
//! // age >= 18 AND (email ILIKE '%example.com%' OR name = 'root')
//! { "where": [
//!     { "by": "age", "operator": ">=", "value": 18 },
//!     { "by": "email", "operator": "ilike", "value": "example.com",
//!       "or": [{ "by": "name", "value": "root" }] }
//! ] }
//!
//! // Related record: users whose profile lives in Oslo
//! { "where": [{ "by": "profile.city", "value": "Oslo" }] }
//!
//! // Scalar inside a JSON column
//! { "where": [{ "by": "meta->plan.tier", "value": "gold" }] }
//!
//! // Date range; bounds are normalized to "YYYY-MM-DD HH:MM:SS"
//! { "where": [{ "by": "created_at", "operator": "between",
//!               "value": ["2024-01-01", "2024-02-01"] }] }
//! ```

pub mod ast;
pub mod conditions;
pub mod lowering;
pub mod operators;
pub mod pagination;
pub mod path;
pub mod permission;
pub mod predicate;
pub mod sort;

pub use crate::errors::FilterError;
pub use ast::{
    CANONICAL_DATETIME_FORMAT, Condition, ConditionValue, Filter, OrderSpec, SortOrder,
    normalize_datetime,
};
pub use conditions::compile_where;
pub use lowering::lower;
pub use operators::Operator;
pub use pagination::Pagination;
pub use path::FieldPath;
pub use permission::compile_permission_where;
pub use predicate::{Comparison, CompiledWhere, Predicate, WhereGroup};
pub use sort::{
    DEFAULT_SORT_FIELD, OrderTarget, RelationJoin, apply_orders, field_expr, resolve_order,
    resolve_orders,
};
