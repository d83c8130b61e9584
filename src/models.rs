use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::filtering::{Filter, FilterError};

/// One page of records plus the total number of matches.
///
/// `count` is 0 when the filter asked to skip counting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub count: u64,
}

impl<T> PageResult<T> {
    #[must_use]
    pub fn new(data: Vec<T>, count: u64) -> Self {
        Self { data, count }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
        }
    }

    /// Convert every record, keeping the count.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
        }
    }
}

/// Query parameters carrying a [`Filter`].
///
/// The `filter` parameter holds the filter document, base64 encoded (standard
/// or URL-safe alphabet) or as plain JSON:
///
/// ```json
/// {"page": 1, "limit": 20, "where": [{"by": "name", "operator": "ilike", "value": "ada"}]}
/// ```
#[derive(Debug, Deserialize, IntoParams, ToSchema, Default)]
#[into_params(parameter_in = Query)]
pub struct FilterQuery {
    /// Base64 or JSON encoded filter document.
    #[param(example = json!({
        "page": 1,
        "limit": 20,
        "orderBy": {"by": "created_at", "order": "DESC"},
        "where": [{"by": "name", "operator": "ilike", "value": "ada"}]
    }))]
    pub filter: Option<String>,
}

impl FilterQuery {
    /// Decode the carried filter; an absent parameter is the default filter.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Decode` when the parameter is neither base64
    /// encoded JSON nor JSON, or does not describe a valid filter.
    pub fn decode(&self) -> Result<Filter, FilterError> {
        self.filter
            .as_deref()
            .map_or_else(|| Ok(Filter::default()), Filter::from_encoded)
    }
}

impl Filter {
    /// Parse a filter from a query parameter value.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Decode` when the value cannot be read as a filter.
    pub fn from_encoded(raw: &str) -> Result<Self, FilterError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        if raw.starts_with('{') {
            return serde_json::from_str(raw).map_err(FilterError::decode);
        }

        let bytes = STANDARD
            .decode(raw)
            .or_else(|_| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')))
            .map_err(FilterError::decode)?;
        serde_json::from_slice(&bytes).map_err(FilterError::decode)
    }

    /// Encode this filter the way [`Filter::from_encoded`] reads it.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Decode` if the filter cannot be serialized.
    pub fn to_encoded(&self) -> Result<String, FilterError> {
        let json = serde_json::to_vec(self).map_err(FilterError::decode)?;
        Ok(STANDARD.encode(json))
    }
}
