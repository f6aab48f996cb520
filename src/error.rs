//! Unified error type for every request-surface operation.
//!
//! `AppError` is the single error type returned by the `commands` layer.
//! It serializes as `{ "kind": "...", "message": "..." }` so the host can
//! programmatically distinguish error categories.

use serde::ser::SerializeStruct;

/// Application-level error returned by all usage commands.
///
/// Each variant maps to a distinct failure domain. The host receives a JSON
/// object with `kind` (variant name) and `message` (human-readable description).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The period selector is not one of `hour`, `day`, `week`, `month`.
    #[error("{0}")]
    InvalidPeriod(String),

    /// The count falls outside the range accepted for the period.
    #[error("{0}")]
    InvalidCount(String),

    /// The usage-access permission has not been granted.
    #[error("{0}")]
    UsageAccessDenied(String),

    /// The installed-application catalog could not be listed.
    #[error("{0}")]
    CatalogUnavailable(String),

    /// The network statistics subsystem failed for a whole transport.
    #[error("{0}")]
    StatsUnavailable(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidPeriod(_) => "InvalidPeriod",
            AppError::InvalidCount(_) => "InvalidCount",
            AppError::UsageAccessDenied(_) => "UsageAccessDenied",
            AppError::CatalogUnavailable(_) => "CatalogUnavailable",
            AppError::StatsUnavailable(_) => "StatsUnavailable",
        }
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }` for the host.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(AppError::InvalidPeriod("p".into()).kind(), "InvalidPeriod");
        assert_eq!(AppError::InvalidCount("c".into()).kind(), "InvalidCount");
        assert_eq!(
            AppError::UsageAccessDenied("u".into()).kind(),
            "UsageAccessDenied"
        );
        assert_eq!(
            AppError::CatalogUnavailable("a".into()).kind(),
            "CatalogUnavailable"
        );
        assert_eq!(
            AppError::StatsUnavailable("s".into()).kind(),
            "StatsUnavailable"
        );
    }

    #[test]
    fn test_error_display_shows_message() {
        let err = AppError::InvalidCount("Count must be between 1 and 7".into());
        assert_eq!(err.to_string(), "Count must be between 1 and 7");
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = AppError::InvalidPeriod("Allowed values: hour, day, week, month".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "InvalidPeriod");
        assert_eq!(json["message"], "Allowed values: hour, day, week, month");
    }

    #[test]
    fn test_all_variants_serialize_with_two_fields() {
        let variants: Vec<AppError> = vec![
            AppError::InvalidPeriod("a".into()),
            AppError::InvalidCount("b".into()),
            AppError::UsageAccessDenied("c".into()),
            AppError::CatalogUnavailable("d".into()),
            AppError::StatsUnavailable("e".into()),
        ];
        for err in variants {
            let json = serde_json::to_value(&err).unwrap();
            let obj = json.as_object().unwrap();
            assert_eq!(obj.len(), 2, "Expected exactly 2 fields for {err:?}");
            assert!(obj.contains_key("kind"));
            assert!(obj.contains_key("message"));
        }
    }
}
