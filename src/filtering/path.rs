//! Typed field references.
//!
//! Conditions and sort specs address fields with a small string convention:
//!
//! - `email`: a column on the record itself
//! - `profile.city`: a column on a related record (any depth: `a.b.c`)
//! - `meta->flags.enabled`: a scalar inside a JSON column, read at `$.flags.enabled`
//!
//! The string is parsed once into a [`FieldPath`] so the compiler never re-parses it.

use std::fmt;

use super::FilterError;

const MAX_PATH_LENGTH: usize = 100;
const ARROW: &str = "->";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// Plain column on the record being queried
    Field(String),
    /// Relation traversal; the last segment is the column on the final related record
    Relation(Vec<String>),
    /// Scalar extracted from a JSON column at `pointer` (always starts with `$.`)
    Json { field: String, pointer: String },
}

impl FieldPath {
    /// Parse a field reference.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPath` for empty references, empty segments,
    /// names starting with `_`, or references longer than 100 characters.
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FilterError::invalid_path(raw, "field reference is empty"));
        }
        if raw.len() > MAX_PATH_LENGTH {
            return Err(FilterError::invalid_path(raw, "field reference is too long"));
        }

        if let Some((field, pointer)) = raw.split_once(ARROW) {
            validate_segment(raw, field)?;
            let segments: Vec<&str> = pointer.split('.').collect();
            if segments.iter().any(|s| s.trim().is_empty()) {
                return Err(FilterError::invalid_path(raw, "JSON pointer has an empty segment"));
            }
            return Ok(Self::Json {
                field: field.to_string(),
                pointer: format!("$.{}", segments.join(".")),
            });
        }

        if raw.contains('.') {
            let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
            for segment in &segments {
                validate_segment(raw, segment)?;
            }
            return Ok(Self::Relation(segments));
        }

        validate_segment(raw, raw)?;
        Ok(Self::Field(raw.to_string()))
    }

    /// The first segment: the column name, relation name, or JSON column name.
    #[must_use]
    pub fn root(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::Relation(segments) => segments.first().map_or("", String::as_str),
            Self::Json { field, .. } => field,
        }
    }

    #[must_use]
    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Relation(_))
    }
}

fn validate_segment(raw: &str, segment: &str) -> Result<(), FilterError> {
    if segment.is_empty() {
        return Err(FilterError::invalid_path(raw, "path has an empty segment"));
    }
    if segment.starts_with('_') {
        return Err(FilterError::invalid_path(raw, "names may not start with '_'"));
    }
    if segment.chars().any(char::is_whitespace) {
        return Err(FilterError::invalid_path(raw, "names may not contain whitespace"));
    }
    Ok(())
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Relation(segments) => write!(f, "{}", segments.join(".")),
            Self::Json { field, pointer } => {
                write!(f, "{field}{ARROW}{}", pointer.trim_start_matches("$."))
            }
        }
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl serde::Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_field() {
        assert_eq!(FieldPath::parse("email").unwrap(), FieldPath::Field("email".into()));
    }

    #[test]
    fn test_root_of_each_shape() {
        assert_eq!(FieldPath::parse("profile.city").unwrap().root(), "profile");
        assert_eq!(FieldPath::parse("meta->plan").unwrap().root(), "meta");
        assert_eq!(FieldPath::Relation(Vec::new()).root(), "");
    }

    #[test]
    fn test_relation_path_any_depth() {
        assert_eq!(
            FieldPath::parse("a.b.c").unwrap(),
            FieldPath::Relation(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_json_pointer_is_prefixed() {
        let path = FieldPath::parse("meta->flags.enabled").unwrap();
        assert_eq!(
            path,
            FieldPath::Json {
                field: "meta".into(),
                pointer: "$.flags.enabled".into()
            }
        );
        assert_eq!(path.to_string(), "meta->flags.enabled");
        assert_eq!(path.root(), "meta");
    }

    #[test]
    fn test_rejects_malformed_paths() {
        for raw in ["", "a..b", ".a", "a.", "_secret", "meta->", "meta->a..b", "->a", "a b"] {
            assert!(FieldPath::parse(raw).is_err(), "{raw:?} should be rejected");
        }
        assert!(FieldPath::parse(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let path: FieldPath = serde_json::from_str(r#""profile.city""#).unwrap();
        assert!(path.is_relation());
        assert_eq!(serde_json::to_string(&path).unwrap(), r#""profile.city""#);
    }
}
