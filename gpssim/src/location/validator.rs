//! Coordinate validation for operator input.
//!
//! Turns raw text (typed fields) or raw numbers (map picks) into a
//! [`CandidateCoordinate`] or a specific [`InvalidReason`]. Everything here
//! is a pure function and safe to call from any thread.
//!
//! # Rules
//!
//! 1. Empty latitude or longitude text is `MissingField` (checked before parsing)
//! 2. Text that is not a finite real number is `NonNumericInput`
//! 3. Latitude outside `[-90, 90]` is `OutOfRangeLatitude`
//! 4. Longitude outside `[-180, 180]` is `OutOfRangeLongitude`
//! 5. Altitude that is absent or unparsable falls back to [`DEFAULT_ALTITUDE`]

use super::state::{CandidateCoordinate, CoordinateOrigin, DEFAULT_ALTITUDE};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Which coordinate field an input error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Latitude,
    Longitude,
}

impl std::fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude => write!(f, "latitude"),
            Self::Longitude => write!(f, "longitude"),
        }
    }
}

/// Why operator input was rejected.
///
/// Each variant carries a distinct message so the operator can tell them
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    /// Latitude or longitude text was empty.
    #[error("Please enter a {0}")]
    MissingField(CoordinateField),

    /// Text could not be read as a finite number.
    #[error("The {0} must be a number")]
    NonNumericInput(CoordinateField),

    /// Latitude outside -90..=90.
    #[error("Latitude must be between -90 and 90 degrees")]
    OutOfRangeLatitude,

    /// Longitude outside -180..=180.
    #[error("Longitude must be between -180 and 180 degrees")]
    OutOfRangeLongitude,
}

/// Outcome of validating a candidate coordinate.
pub type ValidationResult = Result<CandidateCoordinate, InvalidReason>;

/// Validate typed latitude/longitude/altitude text.
///
/// The resulting candidate is tagged [`CoordinateOrigin::TypedInput`].
pub fn validate(lat_text: &str, lon_text: &str, alt_text: Option<&str>) -> ValidationResult {
    validate_text(lat_text, lon_text, alt_text, CoordinateOrigin::TypedInput)
}

/// Validate text input and tag the candidate with `origin`.
pub fn validate_text(
    lat_text: &str,
    lon_text: &str,
    alt_text: Option<&str>,
    origin: CoordinateOrigin,
) -> ValidationResult {
    let lat_text = lat_text.trim();
    let lon_text = lon_text.trim();

    if lat_text.is_empty() {
        return Err(InvalidReason::MissingField(CoordinateField::Latitude));
    }
    if lon_text.is_empty() {
        return Err(InvalidReason::MissingField(CoordinateField::Longitude));
    }

    let latitude = parse_finite(lat_text)
        .ok_or(InvalidReason::NonNumericInput(CoordinateField::Latitude))?;
    check_latitude(latitude)?;

    let longitude = parse_finite(lon_text)
        .ok_or(InvalidReason::NonNumericInput(CoordinateField::Longitude))?;
    check_longitude(longitude)?;

    Ok(CandidateCoordinate::new(
        latitude,
        longitude,
        parse_altitude(alt_text),
        origin,
    ))
}

/// Validate an already-numeric coordinate (e.g. a map pick).
///
/// NaN and infinities are treated as non-numeric input. A missing or
/// non-finite altitude falls back to [`DEFAULT_ALTITUDE`].
pub fn validate_coordinate(
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    origin: CoordinateOrigin,
) -> ValidationResult {
    if !latitude.is_finite() {
        return Err(InvalidReason::NonNumericInput(CoordinateField::Latitude));
    }
    check_latitude(latitude)?;

    if !longitude.is_finite() {
        return Err(InvalidReason::NonNumericInput(CoordinateField::Longitude));
    }
    check_longitude(longitude)?;

    let altitude = altitude
        .filter(|alt| alt.is_finite())
        .unwrap_or(DEFAULT_ALTITUDE);

    Ok(CandidateCoordinate::new(latitude, longitude, altitude, origin))
}

/// Re-check a candidate that was built elsewhere.
///
/// Candidates with [`CoordinateOrigin::DeviceGps`] are valid by construction
/// and pass through untouched.
pub fn validate_candidate(candidate: CandidateCoordinate) -> ValidationResult {
    if candidate.origin == CoordinateOrigin::DeviceGps {
        return Ok(candidate);
    }
    validate_coordinate(
        candidate.latitude,
        candidate.longitude,
        Some(candidate.altitude),
        candidate.origin,
    )
}

fn check_latitude(latitude: f64) -> Result<(), InvalidReason> {
    if LATITUDE_RANGE.contains(&latitude) {
        Ok(())
    } else {
        Err(InvalidReason::OutOfRangeLatitude)
    }
}

fn check_longitude(longitude: f64) -> Result<(), InvalidReason> {
    if LONGITUDE_RANGE.contains(&longitude) {
        Ok(())
    } else {
        Err(InvalidReason::OutOfRangeLongitude)
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_altitude(alt_text: Option<&str>) -> f64 {
    alt_text
        .map(str::trim)
        .and_then(parse_finite)
        .unwrap_or(DEFAULT_ALTITUDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinate_defaults_altitude() {
        let candidate = validate("39.9042", "116.4074", None).unwrap();

        assert_eq!(candidate.latitude, 39.9042);
        assert_eq!(candidate.longitude, 116.4074);
        assert_eq!(candidate.altitude, DEFAULT_ALTITUDE);
        assert_eq!(candidate.origin, CoordinateOrigin::TypedInput);
    }

    #[test]
    fn test_explicit_altitude_is_kept() {
        let candidate = validate("39.9042", "116.4074", Some("120.5")).unwrap();
        assert_eq!(candidate.altitude, 120.5);
    }

    #[test]
    fn test_unparsable_altitude_falls_back() {
        assert_eq!(validate("1", "1", Some("high")).unwrap().altitude, 50.0);
        assert_eq!(validate("1", "1", Some("")).unwrap().altitude, 50.0);
        assert_eq!(validate("1", "1", Some("NaN")).unwrap().altitude, 50.0);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert!(validate("90", "180", None).is_ok());
        assert!(validate("-90", "-180", None).is_ok());
        assert!(validate("0", "0", None).is_ok());
    }

    #[test]
    fn test_out_of_range_latitude() {
        assert_eq!(validate("91", "0", None), Err(InvalidReason::OutOfRangeLatitude));
        assert_eq!(
            validate("-90.0001", "0", None),
            Err(InvalidReason::OutOfRangeLatitude)
        );
    }

    #[test]
    fn test_out_of_range_longitude() {
        assert_eq!(validate("0", "180.5", None), Err(InvalidReason::OutOfRangeLongitude));
        assert_eq!(validate("0", "-181", None), Err(InvalidReason::OutOfRangeLongitude));
    }

    #[test]
    fn test_missing_field_checked_before_parse() {
        assert_eq!(
            validate("", "abc", None),
            Err(InvalidReason::MissingField(CoordinateField::Latitude))
        );
        assert_eq!(
            validate("abc", "  ", None),
            Err(InvalidReason::MissingField(CoordinateField::Longitude))
        );
    }

    #[test]
    fn test_non_numeric_input() {
        assert_eq!(
            validate("north", "10", None),
            Err(InvalidReason::NonNumericInput(CoordinateField::Latitude))
        );
        assert_eq!(
            validate("10", "east", None),
            Err(InvalidReason::NonNumericInput(CoordinateField::Longitude))
        );
        assert_eq!(
            validate("inf", "10", None),
            Err(InvalidReason::NonNumericInput(CoordinateField::Latitude))
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let candidate = validate(" 53.5 ", "\t10.0", Some(" 12 ")).unwrap();
        assert_eq!(candidate.latitude, 53.5);
        assert_eq!(candidate.longitude, 10.0);
        assert_eq!(candidate.altitude, 12.0);
    }

    #[test]
    fn test_validate_coordinate_numeric() {
        let candidate =
            validate_coordinate(43.6, 1.4, None, CoordinateOrigin::MapPick).unwrap();
        assert_eq!(candidate.origin, CoordinateOrigin::MapPick);
        assert_eq!(candidate.altitude, DEFAULT_ALTITUDE);

        assert_eq!(
            validate_coordinate(f64::NAN, 1.4, None, CoordinateOrigin::MapPick),
            Err(InvalidReason::NonNumericInput(CoordinateField::Latitude))
        );
        assert_eq!(
            validate_coordinate(0.0, 200.0, None, CoordinateOrigin::MapPick),
            Err(InvalidReason::OutOfRangeLongitude)
        );
    }

    #[test]
    fn test_validate_candidate_skips_device_origin() {
        let device = CandidateCoordinate::new(1.0, 2.0, 3.0, CoordinateOrigin::DeviceGps);
        assert_eq!(validate_candidate(device), Ok(device));

        let typed = CandidateCoordinate::new(95.0, 2.0, 3.0, CoordinateOrigin::TypedInput);
        assert_eq!(validate_candidate(typed), Err(InvalidReason::OutOfRangeLatitude));
    }

    #[test]
    fn test_messages_are_distinct() {
        let messages = [
            InvalidReason::MissingField(CoordinateField::Latitude).to_string(),
            InvalidReason::MissingField(CoordinateField::Longitude).to_string(),
            InvalidReason::NonNumericInput(CoordinateField::Latitude).to_string(),
            InvalidReason::NonNumericInput(CoordinateField::Longitude).to_string(),
            InvalidReason::OutOfRangeLatitude.to_string(),
            InvalidReason::OutOfRangeLongitude.to_string(),
        ];

        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
