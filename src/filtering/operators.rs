//! Condition operators and the value shapes they accept.

use std::fmt;

/// Comparison operators for conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equality (=)
    Eq,
    /// Not equal (!= or <>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// LIKE pattern matching
    Like,
    /// Case-insensitive LIKE
    ILike,
    /// NOT LIKE
    NotLike,
    /// Case-insensitive NOT LIKE
    NotILike,
    /// IN (array of values)
    In,
    /// NOT IN (array of values)
    NotIn,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
    /// BETWEEN two bounds
    Between,
    /// Negation of the value's natural comparison
    Not,
    /// JSON array column contains the value (permission queries only)
    JsonContains,
}

impl Operator {
    /// Parse an operator token. Tokens are case-sensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "like" => Self::Like,
            "ilike" => Self::ILike,
            "notlike" => Self::NotLike,
            "notilike" => Self::NotILike,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "isNull" => Self::IsNull,
            "isNotNull" => Self::IsNotNull,
            "between" => Self::Between,
            "not" => Self::Not,
            "jsonContains" => Self::JsonContains,
            _ => return None,
        })
    }

    /// Parse an operator token. Unknown tokens become [`Operator::Eq`] and
    /// are logged.
    #[must_use]
    pub fn from_token_lenient(token: &str) -> Self {
        Self::from_token(token).unwrap_or_else(|| {
            tracing::warn!(operator = %token, "Unrecognized filter operator, using '='");
            Self::Eq
        })
    }

    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::NotLike => "notlike",
            Self::NotILike => "notilike",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::Between => "between",
            Self::Not => "not",
            Self::JsonContains => "jsonContains",
        }
    }

    /// Pattern operators have their value wrapped in `%` markers.
    #[must_use]
    pub fn is_pattern(self) -> bool {
        matches!(self, Self::Like | Self::ILike | Self::NotLike | Self::NotILike)
    }

    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        matches!(self, Self::ILike | Self::NotILike)
    }

    /// Operators that ignore the supplied value.
    #[must_use]
    pub fn is_nullary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
