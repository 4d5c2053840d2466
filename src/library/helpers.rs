//! Helper functions that don't belong elsewhere

use std::time::Duration;
use thiserror::Error;

/// Value that can not be used as a timeout duration
#[derive(Debug, Error, PartialEq)]
pub enum InvalidDuration {
    /// Input is not a number at all
    #[error("'{0}' is not a number")]
    NotANumber(String),
    /// Input is NaN or infinite
    #[error("{0} is not a finite number")]
    NotFinite(f64),
    /// Input is zero or negative
    #[error("{0} is not a positive number")]
    NotPositive(f64),
    /// Input exceeds the largest representable duration
    #[error("{0} is too large to be used as a duration")]
    TooLarge(f64),
}

/// Converts a number of milliseconds into a [`Duration`]
///
/// Only finite, strictly positive values are accepted. Fractional milliseconds are retained.
pub fn millis_to_duration(millis: f64) -> Result<Duration, InvalidDuration> {
    if !millis.is_finite() {
        return Err(InvalidDuration::NotFinite(millis));
    }

    if millis <= 0.0 {
        return Err(InvalidDuration::NotPositive(millis));
    }

    Duration::try_from_secs_f64(millis / 1000.0).map_err(|_| InvalidDuration::TooLarge(millis))
}

/// Parses a Duration from a string containing milliseconds.
/// Useful for command line parsing
pub fn parse_millis(src: &str) -> Result<Duration, InvalidDuration> {
    let trimmed = src.trim();
    let millis = trimmed
        .parse::<f64>()
        .map_err(|_| InvalidDuration::NotANumber(trimmed.to_owned()))?;

    millis_to_duration(millis)
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accept_positive_millis() {
        assert_eq!(millis_to_duration(4000.0), Ok(Duration::from_secs(4)));
        assert_eq!(millis_to_duration(0.5), Ok(Duration::from_micros(500)));
    }

    #[test]
    fn reject_non_positive_millis() {
        assert_eq!(millis_to_duration(0.0), Err(InvalidDuration::NotPositive(0.0)));
        assert_eq!(
            millis_to_duration(-100.0),
            Err(InvalidDuration::NotPositive(-100.0))
        );
    }

    #[test]
    fn reject_non_finite_millis() {
        assert!(millis_to_duration(f64::NAN).is_err());
        assert!(millis_to_duration(f64::INFINITY).is_err());
    }

    #[test]
    fn reject_oversized_millis() {
        assert_eq!(millis_to_duration(1e300), Err(InvalidDuration::TooLarge(1e300)));
        assert!(parse_millis("1e300").is_err());
    }

    #[test]
    fn parse_numeric_strings() {
        assert_eq!(parse_millis(" 2000 "), Ok(Duration::from_secs(2)));
        assert_eq!(
            parse_millis("ten"),
            Err(InvalidDuration::NotANumber("ten".into()))
        );
        assert!(parse_millis("-1").is_err());
    }
}
