//! Utility functions for decimal normalization and coordinate validation

use geo::Point;

/// Maximum absolute latitude in WGS84 degrees
pub const MAX_LATITUDE: f64 = 90.0;

/// Maximum absolute longitude in WGS84 degrees
pub const MAX_LONGITUDE: f64 = 180.0;

/// Parse a decimal string that may use either a comma or a dot as separator
///
/// The station feed encodes numbers as `"1,459"` while user input and some
/// mirrors use `"1.459"`. Surrounding whitespace is ignored.
///
/// # Returns
/// `None` for empty, non-numeric or non-finite input
#[inline]
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: f64 = if trimmed.contains(',') {
        trimmed.replace(',', ".").parse().ok()?
    } else {
        trimmed.parse().ok()?
    };

    value.is_finite().then_some(value)
}

/// Check that a latitude/longitude pair lies on the WGS84 globe
#[inline(always)]
pub fn is_valid_wgs84(lat: f64, lon: f64) -> bool {
    (-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&lon)
}

/// Parse a latitude/longitude pair of raw strings into a `Point` (x = lon, y = lat)
///
/// Returns `None` if either value is missing, unparsable or off the globe.
#[inline]
pub fn parse_position(lat: Option<&str>, lon: Option<&str>) -> Option<Point<f64>> {
    let lat = parse_decimal(lat?)?;
    let lon = parse_decimal(lon?)?;
    is_valid_wgs84(lat, lon).then(|| Point::new(lon, lat))
}
