//! Lowering of a [`CompiledWhere`] to a `sea_orm` condition.
//!
//! - Plain predicates compare the qualified physical column.
//! - JSON predicates compare the value at their pointer: numerically when the
//!   operand is a number, otherwise as text, so `true` and `"true"` match the
//!   same documents on every backend.
//! - Relation predicates become `parent.key IN (SELECT child.key FROM child ...)`,
//!   so filtering on a to-many relation never duplicates parent rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{
    DbBackend, Value,
    sea_query::{Alias, BinOper, Condition, Expr, Func, Query, SimpleExpr},
};
use serde_json::Value as Json;
use uuid::Uuid;

use super::{
    CANONICAL_DATETIME_FORMAT, Comparison, CompiledWhere, ConditionValue, FilterError, Operator,
    Predicate, WhereGroup, conditions::scalar_text,
};
use crate::resolver::{FieldNameRegistry, FieldNames};

/// How literal values are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindMode {
    /// Against a real column; UUID and timestamp strings bind typed
    Column,
    /// Against a JSON value that keeps its JSON type
    Json,
    /// Against a value extracted as text
    Text,
}

/// Lower `compiled` against the table described by `names`.
///
/// # Errors
///
/// Returns `FilterError::UnknownField` or `FilterError::UnknownRelation` when a
/// predicate names something the table does not have.
pub fn lower(
    compiled: &CompiledWhere,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
) -> Result<Condition, FilterError> {
    if compiled.is_match_all() {
        return Ok(Condition::all());
    }

    let mut condition = Condition::any();
    for group in &compiled.groups {
        condition = condition.add(lower_group(group, names, registry, backend, names.table())?);
    }
    Ok(condition)
}

fn lower_group(
    group: &WhereGroup,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
    qualifier: &str,
) -> Result<Condition, FilterError> {
    let mut condition = Condition::all();
    for (field, predicate) in group.entries() {
        let expr = match predicate {
            Predicate::Compare(comparison) => {
                let column = column_expr(qualifier, names.physical(field)?);
                if comparison.operator == Operator::JsonContains {
                    json_contains(column, None, &comparison.value, backend)
                } else {
                    compare(column, comparison, BindMode::Column)
                }
            }
            Predicate::Json { pointer, comparison } => {
                let column = column_expr(qualifier, names.physical(field)?);
                if comparison.operator == Operator::JsonContains {
                    json_contains(column, Some(pointer.as_str()), &comparison.value, backend)
                } else if is_numeric(comparison) {
                    let number = json_extract(column, pointer, backend)
                        .cast_as(Alias::new(float_type(backend)));
                    compare(number, comparison, BindMode::Json)
                } else {
                    compare(json_text(column, pointer, backend), comparison, BindMode::Text)
                }
            }
            Predicate::Relation(inner) => {
                relation_subquery(field, inner, names, registry, backend, qualifier)?
            }
        };
        condition = condition.add(expr);
    }
    Ok(condition)
}

fn relation_subquery(
    relation: &str,
    group: &WhereGroup,
    names: &FieldNames,
    registry: &FieldNameRegistry,
    backend: DbBackend,
    qualifier: &str,
) -> Result<SimpleExpr, FilterError> {
    let link = names.relation(relation)?;
    let target = registry.by_table(&link.to_table);
    let alias = format!("{qualifier}__{relation}");
    let inner = lower_group(group, &target, registry, backend, &alias)?;

    let subquery = Query::select()
        .column((Alias::new(&alias), Alias::new(&link.to_col)))
        .from_as(Alias::new(&link.to_table), Alias::new(&alias))
        .cond_where(inner)
        .to_owned();

    Ok(Expr::col((Alias::new(qualifier), Alias::new(&link.from_col))).in_subquery(subquery))
}

pub(crate) fn column_expr(qualifier: &str, column: &str) -> SimpleExpr {
    Expr::col((Alias::new(qualifier), Alias::new(column))).into()
}

/// Floating point type name used for numeric casts.
pub(crate) const fn float_type(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => "DOUBLE PRECISION",
        DbBackend::MySql => "DOUBLE",
        DbBackend::Sqlite => "REAL",
    }
}

/// The scalar at `pointer` inside a JSON column, as the backend extracts it.
///
/// SQLite keeps the JSON type (booleans become 1/0); MySQL and Postgres
/// return text.
pub(crate) fn json_extract(column: SimpleExpr, pointer: &str, backend: DbBackend) -> SimpleExpr {
    let path = SimpleExpr::Value(Value::from(pointer));
    match backend {
        DbBackend::Sqlite => Func::cust(Alias::new("JSON_EXTRACT")).args([column, path]).into(),
        DbBackend::MySql => Func::cust(Alias::new("JSON_UNQUOTE"))
            .arg(Func::cust(Alias::new("JSON_EXTRACT")).args([column, path]))
            .into(),
        DbBackend::Postgres => SimpleExpr::from(
            Func::cust(Alias::new("jsonb_path_query_first"))
                .args([column.cast_as(Alias::new("jsonb")), path.cast_as(Alias::new("jsonpath"))]),
        )
        .binary(BinOper::Custom("#>>"), Expr::cust("'{}'")),
    }
}

/// The value at `pointer` as text, with booleans spelled `true`/`false` on
/// every backend.
fn json_text(column: SimpleExpr, pointer: &str, backend: DbBackend) -> SimpleExpr {
    match backend {
        DbBackend::Sqlite => {
            let path = SimpleExpr::Value(Value::from(pointer));
            let json_type = || {
                Expr::expr(Func::cust(Alias::new("json_type")).args([column.clone(), path.clone()]))
            };
            Expr::case(json_type().eq("true"), Expr::val("true"))
                .case(json_type().eq("false"), Expr::val("false"))
                .finally(json_extract(column.clone(), pointer, backend).cast_as(Alias::new("TEXT")))
                .into()
        }
        DbBackend::MySql | DbBackend::Postgres => json_extract(column, pointer, backend),
    }
}

fn is_numeric(comparison: &Comparison) -> bool {
    if comparison.operator.is_pattern() {
        return false;
    }
    match &comparison.value {
        ConditionValue::Scalar(v) => v.is_number(),
        ConditionValue::List(items) => !items.is_empty() && items.iter().all(Json::is_number),
        ConditionValue::Range(low, high) => low.is_number() && high.is_number(),
        ConditionValue::Null => false,
    }
}

fn json_contains(
    column: SimpleExpr,
    pointer: Option<&str>,
    value: &ConditionValue,
    backend: DbBackend,
) -> SimpleExpr {
    let needle = Json::from(value.clone());
    let path = pointer.map(|p| SimpleExpr::Value(Value::from(p)));

    match backend {
        DbBackend::Sqlite => {
            let member = SimpleExpr::Value(bind(&needle, BindMode::Json));
            match path {
                Some(path) => Expr::cust_with_exprs(
                    "EXISTS (SELECT 1 FROM json_each(?, ?) WHERE json_each.value = ?)",
                    [column, path, member],
                ),
                None => Expr::cust_with_exprs(
                    "EXISTS (SELECT 1 FROM json_each(?) WHERE json_each.value = ?)",
                    [column, member],
                ),
            }
        }
        DbBackend::MySql => {
            let document = SimpleExpr::Value(Value::from(needle.to_string()));
            let mut call = Func::cust(Alias::new("JSON_CONTAINS")).args([column, document]);
            if let Some(path) = path {
                call = call.arg(path);
            }
            call.into()
        }
        DbBackend::Postgres => {
            let document = match needle {
                Json::Array(_) | Json::Object(_) => needle,
                scalar => Json::Array(vec![scalar]),
            };
            let document =
                SimpleExpr::Value(Value::from(document.to_string())).cast_as(Alias::new("jsonb"));
            let target = match path {
                Some(path) => SimpleExpr::from(
                    Func::cust(Alias::new("jsonb_path_query_first"))
                        .args([column.cast_as(Alias::new("jsonb")), path.cast_as(Alias::new("jsonpath"))]),
                ),
                None => column.cast_as(Alias::new("jsonb")),
            };
            target.binary(BinOper::Custom("@>"), document)
        }
    }
}

fn compare(target: SimpleExpr, comparison: &Comparison, mode: BindMode) -> SimpleExpr {
    let operator = comparison.operator;

    if operator.is_case_insensitive() {
        let text = pattern(&comparison.value).to_uppercase();
        let upper = Expr::expr(Func::upper(target));
        return if operator == Operator::ILike {
            upper.like(text)
        } else {
            upper.not_like(text)
        };
    }

    let expr = Expr::expr(target);
    let bind_all = |items: &[Json]| items.iter().map(|v| bind(v, mode)).collect::<Vec<_>>();

    match (operator, &comparison.value) {
        (Operator::IsNotNull, _) => expr.is_not_null(),
        (_, ConditionValue::Null) => expr.is_null(),
        (Operator::Like, value) => expr.like(pattern(value)),
        (Operator::NotLike, value) => expr.not_like(pattern(value)),
        (Operator::Ne | Operator::Not, ConditionValue::Scalar(v)) => expr.ne(bind(v, mode)),
        (Operator::Lt, ConditionValue::Scalar(v)) => expr.lt(bind(v, mode)),
        (Operator::Lte, ConditionValue::Scalar(v)) => expr.lte(bind(v, mode)),
        (Operator::Gt, ConditionValue::Scalar(v)) => expr.gt(bind(v, mode)),
        (Operator::Gte, ConditionValue::Scalar(v)) => expr.gte(bind(v, mode)),
        (_, ConditionValue::Scalar(v)) => expr.eq(bind(v, mode)),
        (Operator::NotIn | Operator::Not, ConditionValue::List(items)) => {
            expr.is_not_in(bind_all(items))
        }
        (_, ConditionValue::List(items)) => expr.is_in(bind_all(items)),
        (Operator::Not, ConditionValue::Range(low, high)) => {
            expr.not_between(bind(low, mode), bind(high, mode))
        }
        (_, ConditionValue::Range(low, high)) => expr.between(bind(low, mode), bind(high, mode)),
    }
}

fn pattern(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Scalar(v) => scalar_text(v),
        other => scalar_text(&Json::from(other.clone())),
    }
}

fn bind(value: &Json, mode: BindMode) -> Value {
    match (value, mode) {
        (Json::String(s), BindMode::Column) => Uuid::parse_str(s)
            .map(Value::from)
            .ok()
            .or_else(|| timestamp(s).map(Value::from))
            .unwrap_or_else(|| Value::from(s.clone())),
        (Json::String(s), BindMode::Json) => Value::from(s.clone()),
        (Json::Number(n), BindMode::Column | BindMode::Json) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_f64().map(Value::from))
            .unwrap_or_else(|| Value::from(n.to_string())),
        (Json::Bool(b), BindMode::Column | BindMode::Json) => Value::from(*b),
        (other, _) => Value::from(scalar_text(other)),
    }
}

/// A full timestamp (`between` bounds are normalized to this form, RFC 3339 is
/// accepted too), bound typed so it compares the way the column is stored.
fn timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, CANONICAL_DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}
