//! Flat "search" queries.
//!
//! Unlike paging, which returns records and eager-loads relations separately,
//! a search query joins every requested relation and returns one row per
//! result with explicit, aliased columns:
//!
//! ```text
//! SELECT "users"."id" AS "id", ..., "profile"."city" AS "profile.city"
//! FROM "users" LEFT JOIN "profiles" AS "profile" ON "users"."id" = "profile"."user_id"
//! WHERE ... ORDER BY ... LIMIT ... OFFSET ...
//! ```

use sea_orm::{
    Condition, DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Select,
};

use crate::{
    config::EngineConfig,
    filtering::{
        Filter, FilterError, Pagination, RelationJoin, field_expr, lowering::column_expr,
        resolve_orders,
    },
    resolver::{FieldNameRegistry, FieldNames},
    traits::Record,
};

/// Build the search query for `R`.
///
/// `condition` is the already lowered `where` of `filter`. Output columns
/// default to every field of `R` under its logical name, plus every field of
/// each joined relation under `relation.field`. Only the first `orderBy`
/// entry is used.
///
/// # Errors
///
/// Returns a [`FilterError`] when a relation, selected field, sort field or
/// group field cannot be resolved.
pub fn build_search<R: Record>(
    registry: &FieldNameRegistry,
    backend: DbBackend,
    filter: &Filter,
    condition: Condition,
    config: &EngineConfig,
) -> Result<Select<R::EntityType>, FilterError> {
    let names = registry.resolve::<R>();
    let mut joins = Joins::default();
    for relation in &filter.relations {
        joins.add(RelationJoin::for_relation(&names, relation)?);
    }

    let mut select = R::EntityType::find().select_only();
    if filter.select.is_empty() {
        select = select_all(select, &names, registry, &joins);
    } else {
        for path in &filter.select {
            let (expr, join) = field_expr(path, &names, registry, backend)?;
            joins.extend(join);
            select = select.column_as(expr, path.to_string().as_str());
        }
    }

    let first_order = filter.order_by.first().cloned().into_iter().collect::<Vec<_>>();
    let order = resolve_orders(&first_order, &names, registry, backend)?;
    for target in &order {
        joins.extend(target.join.clone());
    }

    if let Some(path) = &filter.group_by {
        let (expr, join) = field_expr(path, &names, registry, backend)?;
        joins.extend(join);
        select = select.group_by(expr);
    }

    for join in &joins.0 {
        join.apply(names.table(), QueryTrait::query(&mut select));
    }

    select = select.filter(condition);
    for target in order {
        select = select.order_by(target.expr, target.order);
    }

    let pagination = Pagination::from_filter(filter, config);
    Ok(select.offset(pagination.skip).limit(pagination.take))
}

fn select_all<E: EntityTrait>(
    mut select: Select<E>,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    joins: &Joins,
) -> Select<E> {
    for (logical, physical) in names.columns() {
        select = select.column_as(
            column_expr(names.table(), physical),
            logical.as_str(),
        );
    }
    for join in &joins.0 {
        let target = registry.by_table(&join.table);
        if target.is_identity() {
            tracing::debug!(relation = %join.alias, "Joined table is not registered, its columns are not selected");
        }
        for (logical, physical) in target.columns() {
            let alias = format!("{}.{logical}", join.alias);
            select = select.column_as(
                column_expr(&join.alias, physical),
                alias.as_str(),
            );
        }
    }
    select
}

/// Joins in first-use order, one per relation.
#[derive(Default)]
struct Joins(Vec<RelationJoin>);

impl Joins {
    fn add(&mut self, join: RelationJoin) {
        if !self.0.iter().any(|j| j.alias == join.alias) {
            self.0.push(join);
        }
    }
}

impl Extend<RelationJoin> for Joins {
    fn extend<I: IntoIterator<Item = RelationJoin>>(&mut self, iter: I) {
        for join in iter {
            self.add(join);
        }
    }
}
