//! Input validation for upsert identity fields.
//!
//! Runs before any storage I/O; a rejected input leaves both shapes
//! untouched.

use crate::error::ValidationError;

/// Longest accepted place name.
pub const MAX_PLACE_NAME_LEN: usize = 120;

/// Validate a city or state name.
///
/// Blank (empty or whitespace-only) names are rejected as missing; names
/// longer than [`MAX_PLACE_NAME_LEN`] characters are rejected as invalid.
pub fn validate_place_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    if value.chars().count() > MAX_PLACE_NAME_LEN {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("longer than {MAX_PLACE_NAME_LEN} characters"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_normal_names() {
        assert!(validate_place_name("city", "Pune").is_ok());
        assert!(validate_place_name("state", "Tamil Nadu").is_ok());
        assert!(validate_place_name("city", "Delhi-NCR").is_ok());
    }

    #[test]
    fn test_rejects_blank() {
        for blank in ["", " ", "\t", "  \n "] {
            let err = validate_place_name("city", blank).unwrap_err();
            assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
        }
    }

    #[test]
    fn test_rejects_overlong() {
        let long = "x".repeat(MAX_PLACE_NAME_LEN + 1);
        let err = validate_place_name("state", &long).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));

        let at_limit = "x".repeat(MAX_PLACE_NAME_LEN);
        assert!(validate_place_name("state", &at_limit).is_ok());
    }
}
