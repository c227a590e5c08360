//! Serde helpers for flexible deserialization.
//!
//! Documents coming off the wire are decoded through [`deserialize_with_warnings`],
//! which logs fields the target type does not capture and, on failure, reports the
//! path of the offending value so that callers can log something actionable.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A JSON value that could not be deserialized into the requested type.
#[derive(Debug)]
pub(crate) struct PathError {
    /// Dotted path of the failing value, empty when the root itself is wrong.
    pub path: String,
    pub source: serde_json::Error,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.source)
        } else {
            write!(f, "at `{}`: {}", self.path, self.source)
        }
    }
}

impl StdError for PathError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl From<PathError> for crate::error::Error {
    fn from(e: PathError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::Internal, e)
    }
}

/// Deserialize JSON with unknown field warnings.
///
/// This function deserializes JSON to a target type while detecting and logging
/// any fields that are not captured by the type definition.
///
/// # Returns
///
/// The deserialized value, or the failing path and error if deserialization fails.
/// Unknown fields trigger warnings but do not cause deserialization to fail.
///
/// # Example
///
/// ```ignore
/// let json = serde_json::json!({
///     "known_field": "value",
///     "unknown_field": "extra"
/// });
/// let result: MyType = deserialize_with_warnings(json)?;
/// // Logs: WARN unknown field "unknown_field" with value "extra" in MyType
/// ```
pub(crate) fn deserialize_with_warnings<T: DeserializeOwned>(
    value: Value,
) -> Result<T, PathError> {
    tracing::trace!(
        type_name = %type_name::<T>(),
        json = %value,
        "deserializing JSON"
    );

    // Keep the original around so we can look up unknown field values later
    let original = value.clone();

    let mut unknown_paths: Vec<String> = Vec::new();

    let deserialized: Result<T, serde_json::Error> = serde_ignored::deserialize(value, |path| {
        unknown_paths.push(path.to_string());
    });

    let Ok(result) = deserialized else {
        // Re-deserialize with serde_path_to_error to get the error path
        let with_path: Result<T, _> = serde_path_to_error::deserialize(original);
        let path_err = with_path.err().map_or_else(
            || PathError {
                path: String::new(),
                source: <serde_json::Error as serde::de::Error>::custom(
                    "inconsistent deserialization result",
                ),
            },
            |e| {
                // The root path displays as "."
                let path = e.path().to_string();
                PathError {
                    path: if path == "." { String::new() } else { path },
                    source: e.into_inner(),
                }
            },
        );
        return Err(path_err);
    };

    if !unknown_paths.is_empty() {
        let type_name = type_name::<T>();
        for path in unknown_paths {
            let value_display = format_value(lookup_value(&original, &path));

            tracing::warn!(
                type_name = %type_name,
                field = %path,
                value = %value_display,
                "unknown field in JSON document"
            );
        }
    }

    Ok(result)
}

/// Look up a value in a JSON structure by dotted path.
///
/// `?` segments (Option wrappers) are skipped; numeric segments index arrays.
/// Returns `None` if the path doesn't exist or traverses a non-container value.
fn lookup_value<'value>(value: &'value Value, path: &str) -> Option<&'value Value> {
    let mut current = value;

    for segment in path.split('.') {
        if segment.is_empty() || segment == "?" {
            continue;
        }

        match current {
            Value::Object(map) => {
                current = map.get(segment)?;
            }
            Value::Array(arr) => {
                let index: usize = segment.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<unable to retrieve>".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{Value, json};
    use tracing::Level;

    use super::*;
    use crate::test_support::with_logs;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestStruct {
        known_field: String,
        #[serde(default)]
        optional_field: Option<i32>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct NestedStruct {
        outer: String,
        inner: InnerStruct,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct InnerStruct {
        value: i32,
    }

    #[test]
    fn deserialize_known_fields_only() {
        let json = json!({
            "known_field": "value",
            "optional_field": 42
        });

        let result: TestStruct = deserialize_with_warnings(json).expect("deserialization failed");
        assert_eq!(result.known_field, "value");
        assert_eq!(result.optional_field, Some(42));
    }

    #[test]
    fn deserialize_with_unknown_fields() {
        let json = json!({
            "known_field": "value",
            "unknown_field": "extra",
            "another_unknown": 123
        });

        let result: TestStruct = deserialize_with_warnings(json).expect("deserialization failed");
        assert_eq!(result.known_field, "value");
        assert_eq!(result.optional_field, None);
    }

    #[test]
    fn missing_required_field_fails() {
        let json = json!({ "optional_field": 42 });

        let err = deserialize_with_warnings::<TestStruct>(json).unwrap_err();
        assert!(
            err.source.to_string().contains("known_field"),
            "error should name the missing field: {}",
            err.source
        );
    }

    #[test]
    fn wrong_type_reports_path() {
        let json = json!({
            "outer": "test",
            "inner": { "value": "not a number" }
        });

        let err = deserialize_with_warnings::<NestedStruct>(json).unwrap_err();
        assert_eq!(err.path, "inner.value");
    }

    #[test]
    fn lookup_value_walks_objects_and_arrays() {
        let json = json!({ "data": [{ "id": 1 }, { "id": 2 }] });

        assert_eq!(lookup_value(&json, "data.1.id"), Some(&Value::from(2)));
        assert_eq!(lookup_value(&json, "data.?.5"), None);
        assert_eq!(format_value(None), "<unable to retrieve>");
    }

    #[test]
    fn warning_is_emitted_for_unknown_fields() {
        let (result, logs) = with_logs(|| {
            let json = json!({
                "outer": "test",
                "inner": { "value": 42, "nested_unknown": "surprise" }
            });
            deserialize_with_warnings::<NestedStruct>(json)
        });

        assert_eq!(result.expect("deserialization failed").inner.value, 42);
        assert_eq!(
            logs.count(Level::WARN, "unknown field in JSON document"),
            1,
            "exactly one unknown field should be reported"
        );
    }
}
