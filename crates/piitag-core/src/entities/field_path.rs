use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::CoreError;

/// Deepest nesting a field path may have: a top-level column, or one record
/// level below it.
pub const MAX_FIELD_DEPTH: usize = 2;

/// Ordered field names locating a column (`email`) or a record sub-field
/// (`customer.phone`).
///
/// Serialized as the dotted form. Construction rejects empty segments and
/// depths above [`MAX_FIELD_DEPTH`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from its segments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an empty path, an empty segment,
    /// a segment containing `.`, or more than [`MAX_FIELD_DEPTH`] segments.
    pub fn new<I, S>(segments: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(CoreError::Validation("field path is empty".into()));
        }
        if segments.len() > MAX_FIELD_DEPTH {
            return Err(CoreError::Validation(format!(
                "field path '{}' is nested {} levels deep (max {MAX_FIELD_DEPTH})",
                segments.join("."),
                segments.len()
            )));
        }
        if let Some(bad) = segments.iter().find(|s| s.is_empty() || s.contains('.')) {
            return Err(CoreError::Validation(format!(
                "invalid field path segment '{bad}'"
            )));
        }
        Ok(Self(segments))
    }

    /// A top-level column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `name` is empty or contains `.`.
    pub fn top(name: impl Into<String>) -> Result<Self, CoreError> {
        Self::new([name.into()])
    }

    /// A sub-field of a top-level record column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if either name is empty or contains `.`.
    pub fn nested(parent: impl Into<String>, child: impl Into<String>) -> Result<Self, CoreError> {
        Self::new([parent.into(), child.into()])
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// First segment (the top-level column).
    #[must_use]
    pub fn root(&self) -> &str {
        &self.0[0]
    }

    /// Segments joined with `sep`.
    #[must_use]
    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split('.'))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for FieldPath {
    fn schema_name() -> Cow<'static, str> {
        "FieldPath".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "description": "Dotted column path, at most two segments (e.g. customer.phone)",
            "pattern": "^[^.]+(\\.[^.]+)?$"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_path_displays_dotted() {
        let path = FieldPath::nested("customer", "phone").unwrap();
        assert_eq!(path.to_string(), "customer.phone");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.root(), "customer");
    }

    #[test]
    fn rejects_depth_above_two() {
        let err = FieldPath::new(["a", "b", "c"]).unwrap_err();
        assert!(err.to_string().contains("3 levels"));
        assert!("a.b.c".parse::<FieldPath>().is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(FieldPath::new(Vec::<String>::new()).is_err());
        assert!("customer.".parse::<FieldPath>().is_err());
        assert!(FieldPath::top("").is_err());
    }

    #[test]
    fn parent_and_child_are_distinct_keys() {
        let parent = FieldPath::top("customer").unwrap();
        let child = FieldPath::nested("customer", "phone").unwrap();
        assert_ne!(parent, child);
        assert!(parent < child);
    }

    #[test]
    fn serde_uses_dotted_string() {
        let path = FieldPath::nested("customer", "phone").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"customer.phone\"");
        let back: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<FieldPath>("\"a.b.c\"").is_err());
    }
}
