use sea_orm::{
    DbBackend, EntityTrait, Order, QueryOrder, QueryTrait, Select,
    sea_query::{Alias, Expr, JoinType, SelectStatement, SimpleExpr},
};

use super::{
    FieldPath, FilterError, OrderSpec,
    lowering::{column_expr, json_extract},
};
use crate::resolver::{FieldNameRegistry, FieldNames};

/// Default sort column when a filter has no `orderBy`.
pub const DEFAULT_SORT_FIELD: &str = "id";

/// LEFT JOIN of a related table under the relation's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationJoin {
    pub alias: String,
    pub table: String,
    pub from_col: String,
    pub to_col: String,
}

impl RelationJoin {
    /// Resolve the join for relation `name` of `names`.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::UnknownRelation` when the relation is not declared
    /// and `FilterError::ToManyJoin` when joining it would repeat parent rows.
    pub fn for_relation(names: &FieldNames, name: &str) -> Result<Self, FilterError> {
        let link = names.relation(name)?;
        if link.to_many {
            return Err(FilterError::ToManyJoin {
                relation: name.to_string(),
            });
        }
        Ok(Self {
            alias: name.to_string(),
            table: link.to_table.clone(),
            from_col: link.from_col.clone(),
            to_col: link.to_col.clone(),
        })
    }

    pub fn apply(&self, parent: &str, query: &mut SelectStatement) {
        query.join_as(
            JoinType::LeftJoin,
            Alias::new(&self.table),
            Alias::new(&self.alias),
            Expr::col((Alias::new(parent), Alias::new(&self.from_col)))
                .equals((Alias::new(&self.alias), Alias::new(&self.to_col))),
        );
    }
}

/// A resolved sort: the expression to order by and the join it needs, if any.
#[derive(Debug, Clone)]
pub struct OrderTarget {
    pub expr: SimpleExpr,
    pub order: Order,
    pub join: Option<RelationJoin>,
}

/// Expression for a field reference outside a condition.
///
/// `rel.field` reads from a LEFT JOIN aliased as `rel`; only one relation level
/// is supported.
///
/// # Errors
///
/// Returns `FilterError::UnknownField`, `FilterError::UnknownRelation`,
/// `FilterError::ToManyJoin` for `has_many` relations, or
/// `FilterError::UnsupportedNestedPath` for deeper relation paths.
pub fn field_expr(
    path: &FieldPath,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
) -> Result<(SimpleExpr, Option<RelationJoin>), FilterError> {
    match path {
        FieldPath::Field(name) => Ok((column_expr(names.table(), names.physical(name)?), None)),
        FieldPath::Json { field, pointer } => {
            let column = column_expr(names.table(), names.physical(field)?);
            Ok((json_extract(column, pointer, backend), None))
        }
        FieldPath::Relation(segments) => match segments.as_slice() {
            [relation, field] => {
                let join = RelationJoin::for_relation(names, relation)?;
                let target = registry.by_table(&join.table);
                let expr = column_expr(&join.alias, target.physical(field)?);
                Ok((expr, Some(join)))
            }
            _ => Err(FilterError::UnsupportedNestedPath {
                path: path.to_string(),
            }),
        },
    }
}

/// Resolve an [`OrderSpec`] against the table described by `names`.
///
/// # Errors
///
/// See [`field_expr`].
pub fn resolve_order(
    spec: &OrderSpec,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
) -> Result<OrderTarget, FilterError> {
    let (expr, join) = field_expr(&spec.by, names, registry, backend)?;
    Ok(OrderTarget {
        expr,
        order: spec.order.into(),
        join,
    })
}

/// Resolve every spec, falling back to `id` ascending when there are none.
///
/// # Errors
///
/// See [`resolve_order`].
pub fn resolve_orders(
    specs: &[OrderSpec],
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
) -> Result<Vec<OrderTarget>, FilterError> {
    if specs.is_empty() {
        let column = names.physical(DEFAULT_SORT_FIELD).unwrap_or(DEFAULT_SORT_FIELD);
        return Ok(vec![OrderTarget {
            expr: column_expr(names.table(), column),
            order: Order::Asc,
            join: None,
        }]);
    }
    specs
        .iter()
        .map(|spec| resolve_order(spec, names, registry, backend))
        .collect()
}

/// Apply resolved sorts to a select, joining each relation once.
pub fn apply_orders<E: EntityTrait>(
    mut select: Select<E>,
    targets: Vec<OrderTarget>,
    parent: &str,
) -> Select<E> {
    let mut joined: Vec<String> = Vec::new();
    for target in targets {
        if let Some(join) = &target.join {
            if !joined.contains(&join.alias) {
                join.apply(parent, QueryTrait::query(&mut select));
                joined.push(join.alias.clone());
            }
        }
        select = select.order_by(target.expr, target.order);
    }
    select
}
