//! The query descriptor accepted by the engine.
//!
//! A [`Filter`] arrives as JSON (usually base64 encoded in a `filter` query
//! parameter, see [`crate::models::FilterQuery`]):
//!
//! ```json
//! {
//!   "page": 2,
//!   "limit": 25,
//!   "orderBy": { "by": "profile.city", "order": "DESC" },
//!   "where": [
//!     { "by": "age", "operator": ">=", "value": 18 },
//!     { "by": "email", "operator": "ilike", "value": "example.com",
//!       "or": [{ "by": "name", "operator": "=", "value": "root" }] }
//!   ],
//!   "relations": ["profile"],
//!   "ignorePaginationCount": true
//! }
//! ```
//!
//! Conditions are validated while they are deserialized: the value must have
//! the shape its operator expects.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{OneOrMany, formats::PreferOne, serde_as};

use super::{FieldPath, FilterError, Operator};

/// Output format for normalized `between` bounds.
pub const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// 1-based page number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// A single sort spec or a list of them
    #[serde_as(as = "OneOrMany<_, PreferOne>")]
    pub order_by: Vec<OrderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<FieldPath>,
    /// Explicit output fields for search queries
    pub select: Vec<FieldPath>,
    #[serde(rename = "where")]
    pub conditions: Vec<Condition>,
    /// Relations to eager-load (and join, for search queries)
    #[serde_as(as = "OneOrMany<_, PreferOne>")]
    pub relations: Vec<String>,
    /// Opaque passthrough bag for the host
    pub extra: Map<String, Value>,
    /// Skip the total-count query; the result count is then 0
    pub ignore_pagination_count: bool,
    /// Only the count is wanted
    pub count: bool,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order_by.push(spec);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relations.push(relation.into());
        self
    }

    #[must_use]
    pub fn without_count(mut self) -> Self {
        self.ignore_pagination_count = true;
        self
    }

    /// Whether any condition (including nested alternatives) targets `field`.
    #[must_use]
    pub fn mentions_field(&self, field: &str) -> bool {
        fn walk(conditions: &[Condition], field: &str) -> bool {
            conditions
                .iter()
                .any(|c| c.by.root() == field || walk(&c.or, field))
        }
        walk(&self.conditions, field)
    }
}

/// One filter predicate, optionally carrying alternatives in `or`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub by: FieldPath,
    pub operator: Operator,
    pub value: ConditionValue,
    pub or: Vec<Condition>,
}

impl Condition {
    /// Build a condition, checking the value against the operator.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPath` or `FilterError::InvalidValue`.
    pub fn new(by: &str, operator: Operator, value: impl Into<Value>) -> Result<Self, FilterError> {
        let by = FieldPath::parse(by)?;
        let value = ConditionValue::for_operator(&by, operator, value.into())?;
        Ok(Self {
            by,
            operator,
            value,
            or: Vec::new(),
        })
    }

    /// Shorthand for an equality condition.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn eq(by: &str, value: impl Into<Value>) -> Result<Self, FilterError> {
        Self::new(by, Operator::Eq, value)
    }

    /// Attach alternatives to this condition.
    #[must_use]
    pub fn or(mut self, alternatives: Vec<Condition>) -> Self {
        self.or = alternatives;
        self
    }

    /// The same condition with its alternatives stripped.
    #[must_use]
    pub fn without_alternatives(&self) -> Self {
        Self {
            by: self.by.clone(),
            operator: self.operator,
            value: self.value.clone(),
            or: Vec::new(),
        }
    }
}

/// Wire form of a condition, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCondition {
    by: FieldPath,
    #[serde(default = "default_operator")]
    operator: String,
    #[serde(default)]
    value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    or: Vec<Condition>,
}

fn default_operator() -> String {
    "=".to_string()
}

impl TryFrom<RawCondition> for Condition {
    type Error = FilterError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let operator = Operator::from_token_lenient(&raw.operator);
        let value = ConditionValue::for_operator(&raw.by, operator, raw.value)?;
        Ok(Self {
            by: raw.by,
            operator,
            value,
            or: raw.or,
        })
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        Self {
            by: condition.by,
            operator: condition.operator.token().to_string(),
            value: condition.value.into(),
            or: condition.or,
        }
    }
}

/// The value of a condition, shaped by its operator.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Null,
    /// A single JSON scalar (objects are only accepted for `jsonContains`)
    Scalar(Value),
    List(Vec<Value>),
    Range(Value, Value),
}

impl ConditionValue {
    /// Validate `value` for `operator`.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidValue` when the shape does not fit the operator.
    pub fn for_operator(by: &FieldPath, operator: Operator, value: Value) -> Result<Self, FilterError> {
        let invalid = |reason: &str| FilterError::invalid_value(by, operator, reason);

        if operator.is_nullary() {
            return Ok(Self::Null);
        }

        match operator {
            Operator::In | Operator::NotIn => match value {
                Value::Array(items) => {
                    if items.iter().any(|v| !is_scalar(v)) {
                        return Err(invalid("list items must be scalars"));
                    }
                    Ok(Self::List(items))
                }
                Value::Null => Err(invalid("expects a list of values")),
                v if is_scalar(&v) => Ok(Self::List(vec![v])),
                _ => Err(invalid("expects a list of values")),
            },
            Operator::Between => match value {
                Value::Array(mut items) if items.len() == 2 && items.iter().all(is_scalar) => {
                    let high = items.pop().unwrap_or(Value::Null);
                    let low = items.pop().unwrap_or(Value::Null);
                    Ok(Self::Range(low, high))
                }
                _ => Err(invalid("expects a two-element array")),
            },
            Operator::Not => match value {
                Value::Null => Ok(Self::Null),
                Value::Array(items) if items.iter().all(is_scalar) => Ok(Self::List(items)),
                v if is_scalar(&v) => Ok(Self::Scalar(v)),
                _ => Err(invalid("expects a scalar, a list or null")),
            },
            Operator::JsonContains => match value {
                Value::Null => Err(invalid("expects a value")),
                v => Ok(Self::Scalar(v)),
            },
            Operator::Eq | Operator::Ne => match value {
                Value::Null => Ok(Self::Null),
                v if is_scalar(&v) => Ok(Self::Scalar(v)),
                _ => Err(invalid("expects a scalar or null")),
            },
            _ => match value {
                v if is_scalar(&v) => Ok(Self::Scalar(v)),
                _ => Err(invalid("expects a scalar value")),
            },
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

impl From<ConditionValue> for Value {
    fn from(value: ConditionValue) -> Self {
        match value {
            ConditionValue::Null => Self::Null,
            ConditionValue::Scalar(v) => v,
            ConditionValue::List(items) => Self::Array(items),
            ConditionValue::Range(low, high) => Self::Array(vec![low, high]),
        }
    }
}

/// Normalize a date-like string to [`CANONICAL_DATETIME_FORMAT`].
///
/// Returns `None` when the string does not look like a date or timestamp.
#[must_use]
pub fn normalize_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(CANONICAL_DATETIME_FORMAT).to_string());
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.format(CANONICAL_DATETIME_FORMAT).to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(CANONICAL_DATETIME_FORMAT).to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl From<String> for SortOrder {
    /// `ASC` in any case is ascending; anything else is descending.
    fn from(value: String) -> Self {
        if value.to_uppercase() == "ASC" {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => "ASC".to_string(),
            SortOrder::Desc => "DESC".to_string(),
        }
    }
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub by: FieldPath,
    #[serde(default)]
    pub order: SortOrder,
}

impl OrderSpec {
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPath` for a malformed field reference.
    pub fn new(by: &str, order: SortOrder) -> Result<Self, FilterError> {
        Ok(Self {
            by: FieldPath::parse(by)?,
            order,
        })
    }
}
