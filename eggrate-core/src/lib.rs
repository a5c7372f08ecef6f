//! EGGRATE Core - Entity Types
//!
//! Pure data structures with no behavior beyond input validation. All other
//! crates depend on this. This crate contains no I/O.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod error;
pub mod validation;

pub use error::{
    CacheError, ConfigError, EggRateError, EggRateResult, StorageError, ValidationError,
};
pub use validation::validate_place_name;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Defines typed surrogate-id wrappers over UUIDv7.
///
/// UUIDv7 embeds a Unix timestamp, making ids naturally sortable by creation
/// time. The wrappers keep a state id from being passed where a city id is
/// expected.
macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new timestamp-sortable id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id! {
    /// Surrogate id for a state row in the normalized shape.
    StateId
}
entity_id! {
    /// Surrogate id for a city row in the normalized shape.
    CityId
}
entity_id! {
    /// Surrogate id for a rate row in the normalized shape.
    RateId
}

// ============================================================================
// DATASETS (cache namespaces)
// ============================================================================

/// Logical dataset a cache entry summarizes.
///
/// Every cache key carries its dataset as a single-byte prefix, so bulk
/// invalidation can target one dataset without touching the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// Rate aggregates and listings.
    Rates,
    /// City listings.
    Cities,
    /// State listings.
    States,
}

impl Dataset {
    /// Single-byte discriminant used as the key prefix.
    pub fn as_byte(self) -> u8 {
        match self {
            Dataset::Rates => 0,
            Dataset::Cities => 1,
            Dataset::States => 2,
        }
    }

    /// Decode a discriminant byte back to a dataset.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Dataset::Rates),
            1 => Some(Dataset::Cities),
            2 => Some(Dataset::States),
            _ => None,
        }
    }
}

// ============================================================================
// RATE VALUE (fixed-point, 2 decimal digits)
// ============================================================================

/// Largest accepted rate: 100000.00 in paise.
pub const MAX_RATE_PAISE: i64 = 10_000_000;

/// A price with fixed-point semantics: exactly two decimal digits, stored as
/// integer paise. Floating point never touches the stored representation.
///
/// Valid range is `0 < rate <= 100000.00`. Construction is fallible; a
/// `RateValue` that exists is always in range.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RateValue(i64);

impl RateValue {
    /// Construct from integer paise.
    pub fn from_paise(paise: i64) -> Result<Self, ValidationError> {
        if paise <= 0 || paise > MAX_RATE_PAISE {
            return Err(ValidationError::InvalidValue {
                field: "rate".to_string(),
                reason: format!("out of range: {paise} paise"),
            });
        }
        Ok(Self(paise))
    }

    /// Parse a decimal string such as `"6.35"`, `"7"`, or `"7.5"`.
    ///
    /// At most two fractional digits are accepted; more precision than the
    /// store can represent is rejected rather than silently rounded.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidValue {
            field: "rate".to_string(),
            reason: format!("{reason}: {input:?}"),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a number"));
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a number with at most 2 decimals"));
        }

        let whole: i64 = whole.parse().map_err(|_| invalid("not a number"))?;
        let frac_paise = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("not a number"))? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid("not a number"))?,
        };

        let paise = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac_paise))
            .ok_or_else(|| invalid("out of range"))?;
        Self::from_paise(paise)
    }

    /// Integer paise.
    pub fn paise(self) -> i64 {
        self.0
    }
}

impl TryFrom<f64> for RateValue {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "rate".to_string(),
                reason: format!("not a finite number: {value}"),
            });
        }
        Self::from_paise((value * 100.0).round() as i64)
    }
}

impl fmt::Display for RateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// DOMAIN RECORDS
// ============================================================================

/// The unified rate shape returned by every read path.
///
/// Callers cannot tell whether a record came from the normalized or the
/// legacy shape; the router guarantees the fields mean the same thing either
/// way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    /// City name.
    pub city: String,
    /// State name.
    pub state: String,
    /// Calendar date the rate applies to.
    pub date: NaiveDate,
    /// Price per unit.
    pub rate: RateValue,
    /// When this record was last written.
    pub updated_at: Timestamp,
}

/// Input for an upsert. At most one rate exists per (city, state, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRate {
    /// City name. Must be non-blank.
    pub city: String,
    /// State name. Must be non-blank.
    pub state: String,
    /// Calendar date the rate applies to.
    pub date: NaiveDate,
    /// Price per unit.
    pub rate: RateValue,
}

impl NewRate {
    /// Validate identity fields before any write attempt.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_place_name("city", &self.city)?;
        validate_place_name("state", &self.state)?;
        Ok(())
    }
}

/// Read-side filter over rate records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateFilter {
    /// Every record.
    All,
    /// All records for a state.
    State {
        /// State name.
        state: String,
    },
    /// All records for one city.
    City {
        /// State name.
        state: String,
        /// City name.
        city: String,
    },
    /// All records for a date, across locations.
    Date {
        /// Calendar date.
        date: NaiveDate,
    },
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_distinct_per_call() {
        assert_ne!(StateId::new(), StateId::new());
        assert_ne!(CityId::new(), CityId::new());
    }

    #[test]
    fn test_dataset_byte_roundtrip() {
        for dataset in [Dataset::Rates, Dataset::Cities, Dataset::States] {
            assert_eq!(Dataset::from_byte(dataset.as_byte()), Some(dataset));
        }
        assert_eq!(Dataset::from_byte(200), None);
    }

    #[test]
    fn test_rate_value_parse() {
        assert_eq!(RateValue::parse("6.35").unwrap().paise(), 635);
        assert_eq!(RateValue::parse("7").unwrap().paise(), 700);
        assert_eq!(RateValue::parse("7.5").unwrap().paise(), 750);
        assert_eq!(RateValue::parse(" 12.00 ").unwrap().paise(), 1200);
    }

    #[test]
    fn test_rate_value_parse_rejects_garbage() {
        for bad in ["", "abc", "6.355", "6,35", "-1", ".5", "6.", "1e3"] {
            assert!(RateValue::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_rate_value_range() {
        assert!(RateValue::from_paise(0).is_err());
        assert!(RateValue::from_paise(-100).is_err());
        assert!(RateValue::from_paise(MAX_RATE_PAISE).is_ok());
        assert!(RateValue::from_paise(MAX_RATE_PAISE + 1).is_err());
    }

    #[test]
    fn test_rate_value_display() {
        assert_eq!(RateValue::parse("6.35").unwrap().to_string(), "6.35");
        assert_eq!(RateValue::parse("7").unwrap().to_string(), "7.00");
        assert_eq!(RateValue::parse("7.5").unwrap().to_string(), "7.50");
    }

    #[test]
    fn test_rate_value_from_f64() {
        assert_eq!(RateValue::try_from(6.35).unwrap().paise(), 635);
        assert!(RateValue::try_from(f64::NAN).is_err());
        assert!(RateValue::try_from(-2.0).is_err());
    }

    #[test]
    fn test_new_rate_validate() {
        let rate = NewRate {
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            rate: RateValue::parse("6.35").unwrap(),
        };
        assert!(rate.validate().is_ok());

        let blank_city = NewRate {
            city: "   ".to_string(),
            ..rate.clone()
        };
        assert!(blank_city.validate().is_err());
    }

    #[test]
    fn test_rate_record_serde_roundtrip() {
        let record = RateRecord {
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            rate: RateValue::parse("6.35").unwrap(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: RateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any in-range paise value renders and re-parses to itself.
        #[test]
        fn prop_rate_display_parse_roundtrip(paise in 1i64..=MAX_RATE_PAISE) {
            let rate = RateValue::from_paise(paise).expect("in range");
            let parsed = RateValue::parse(&rate.to_string()).expect("display form parses");
            prop_assert_eq!(rate, parsed);
        }

        /// Parsing never panics on arbitrary input.
        #[test]
        fn prop_rate_parse_total(input in ".{0,24}") {
            let _ = RateValue::parse(&input);
        }
    }
}
