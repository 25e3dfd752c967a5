//! Core type definitions with validation.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty or whitespace-only.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A numeric value fell outside its accepted range (or was NaN).
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A value that must be strictly positive was zero, negative or NaN.
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// The year is outside the configured range.
    #[error("year {year} is outside the accepted range {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    /// The year range itself is inverted.
    #[error("invalid year range {min}..={max}")]
    InvalidYearRange { min: i32, max: i32 },

    /// A list index did not point at an existing element.
    #[error("index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Unrecognized tillage practice label.
    #[error("unknown tillage practice: {value}")]
    UnknownTillage { value: String },

    /// Unrecognized soil texture label.
    #[error("unknown soil texture: {value}")]
    UnknownTexture { value: String },

    /// Unrecognized loss policy label.
    #[error("unknown loss policy: {value}")]
    UnknownLossPolicy { value: String },
}

/// Checks that `value` lies in `[min, max]`, rejecting NaN.
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    if value.is_nan() || !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// A validated parcel ("terreno") name.
///
/// Names are trimmed on construction and must not be blank. Comparison is
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParcelName(String);

impl ParcelName {
    /// Creates a new name after trimming and validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty {
                field: "parcel name",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParcelName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParcelName> for String {
    fn from(name: ParcelName) -> Self {
        name.0
    }
}

impl Borrow<str> for ParcelName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ParcelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParcelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar year used as the top-level grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(i32);

impl Year {
    /// Wraps a raw year. Range checks happen in [`YearRange::check`].
    pub const fn new(year: i32) -> Self {
        Self(year)
    }

    /// Returns the raw year.
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Year {
    fn from(year: i32) -> Self {
        Self(year)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of years a store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    min: i32,
    max: i32,
}

impl YearRange {
    /// Earliest year offered by the calculator.
    pub const EARLIEST: i32 = 1950;

    /// Creates a range, rejecting `min > max`.
    pub fn new(min: i32, max: i32) -> Result<Self, ValidationError> {
        if min > max {
            return Err(ValidationError::InvalidYearRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// The standard range from 1950 up to and including `current_year`.
    pub fn until(current_year: i32) -> Result<Self, ValidationError> {
        Self::new(Self::EARLIEST, current_year)
    }

    pub const fn min(self) -> i32 {
        self.min
    }

    pub const fn max(self) -> i32 {
        self.max
    }

    /// Returns the year if it lies within the range.
    pub fn check(self, year: Year) -> Result<Year, ValidationError> {
        if year.0 < self.min || year.0 > self.max {
            return Err(ValidationError::YearOutOfRange {
                year: year.0,
                min: self.min,
                max: self.max,
            });
        }
        Ok(year)
    }
}
