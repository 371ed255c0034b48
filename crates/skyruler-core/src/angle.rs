//! Astronomical angle formatting.
//!
//! Angular separations are rendered in degrees/arcminutes/arcseconds
//! using the typographic prime symbols (`°`, `′`, `″`). Coordinate pairs
//! are rendered in a compact sexagesimal form with ASCII quote marks,
//! which keeps them short enough for on-image labels.

use crate::measurement::MeasurementPoint;
use crate::transform::angular_distance;

const ARCSEC_PER_MINUTE: i64 = 60;
const ARCSEC_PER_DEGREE: i64 = 3600;

/// Format an angular quantity given in arcseconds.
///
/// The value is rounded to the nearest whole arcsecond, then rendered as
/// `N″` below one arcminute, `M′ N″` below one degree, and `D° M′ N″`
/// otherwise. Once a unit's threshold is reached it is always shown,
/// even when the lower units are zero.
///
/// Negative and non-finite inputs are treated as zero.
///
/// # Examples
///
/// ```
/// use skyruler_core::angle::format_angle;
///
/// assert_eq!(format_angle(59.0), "59″");
/// assert_eq!(format_angle(60.0), "1′ 0″");
/// assert_eq!(format_angle(3600.0), "1° 0′ 0″");
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_angle(arcseconds: f64) -> String {
    let total = if arcseconds.is_finite() && arcseconds > 0.0 {
        arcseconds.round() as i64
    } else {
        0
    };

    if total < ARCSEC_PER_MINUTE {
        format!("{total}″")
    } else if total < ARCSEC_PER_DEGREE {
        let minutes = total / ARCSEC_PER_MINUTE;
        let seconds = total % ARCSEC_PER_MINUTE;
        format!("{minutes}′ {seconds}″")
    } else {
        let degrees = total / ARCSEC_PER_DEGREE;
        let minutes = (total % ARCSEC_PER_DEGREE) / ARCSEC_PER_MINUTE;
        let seconds = total % ARCSEC_PER_MINUTE;
        format!("{degrees}° {minutes}′ {seconds}″")
    }
}

/// Format a pixel length as `"{round(px)} px"`.
#[must_use]
pub fn format_pixels(pixels: f64) -> String {
    format!("{:.0} px", pixels.round())
}

/// Format a right ascension / declination pair compactly.
///
/// Renders `HHh MMm SSs, ±DD° MM' SS"` with every component zero-padded
/// to two digits. Rounding carries upward: 59.6 seconds becomes the
/// next minute, 60 minutes the next hour (or degree), and hours wrap
/// at 24.
///
/// Returns an empty string if either coordinate is absent.
///
/// # Examples
///
/// ```
/// use skyruler_core::angle::format_coordinates_compact;
///
/// let text = format_coordinates_compact(Some(5.125), Some(8.75));
/// assert_eq!(text, "05h 07m 30s, +08° 45' 00\"");
/// assert_eq!(format_coordinates_compact(None, Some(20.0)), "");
/// ```
#[must_use]
pub fn format_coordinates_compact(ra_hours: Option<f64>, dec_degrees: Option<f64>) -> String {
    let (Some(ra), Some(dec)) = (ra_hours, dec_degrees) else {
        return String::new();
    };
    if !ra.is_finite() || !dec.is_finite() {
        return String::new();
    }
    format!("{}, {}", format_ra(ra), format_dec(dec))
}

/// `HHh MMm SSs`, carrying rounded seconds into minutes and hours.
#[allow(clippy::cast_possible_truncation)]
fn format_ra(ra_hours: f64) -> String {
    let total_seconds = (ra_hours.rem_euclid(24.0) * 3600.0).round() as i64;
    let hours = (total_seconds / 3600) % 24;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}h {minutes:02}m {seconds:02}s")
}

/// `±DD° MM' SS"`, carrying rounded arcseconds into arcminutes and degrees.
#[allow(clippy::cast_possible_truncation)]
fn format_dec(dec_degrees: f64) -> String {
    let total_arcsec = (dec_degrees.abs() * 3600.0).round() as i64;
    let sign = if dec_degrees < 0.0 && total_arcsec > 0 {
        '-'
    } else {
        '+'
    };
    let degrees = total_arcsec / ARCSEC_PER_DEGREE;
    let minutes = (total_arcsec % ARCSEC_PER_DEGREE) / ARCSEC_PER_MINUTE;
    let seconds = total_arcsec % ARCSEC_PER_MINUTE;
    format!("{sign}{degrees:02}° {minutes:02}' {seconds:02}\"")
}

/// Format the distance between two measurement endpoints.
///
/// When a plate solution is in effect and both endpoints carry celestial
/// coordinates, the label is the great-circle separation formatted with
/// [`format_angle`]. Otherwise it falls back to the pixel distance.
#[must_use]
pub fn format_distance(
    start: &MeasurementPoint,
    end: &MeasurementPoint,
    plate_solution_available: bool,
) -> String {
    if plate_solution_available
        && let (Some(a), Some(b)) = (start.celestial(), end.celestial())
    {
        return format_angular_distance(a.ra, a.dec, b.ra, b.dec);
    }
    format_pixels(start.position().distance(end.position()))
}

/// Format the great-circle separation between two coordinates.
///
/// RA in hours, Dec in degrees.
#[must_use]
pub fn format_angular_distance(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> String {
    format_angle(angular_distance(ra1, dec1, ra2, dec2) * 3600.0)
}
