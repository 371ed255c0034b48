//! Scale-invariant measurement presets.
//!
//! A preset stores a measurement in sky terms: the celestial endpoints and,
//! for rectangles, the angular width and height. Loading one against a
//! different image recomputes the pixel geometry from that image's local
//! plate scale around the viewport centre.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;
use crate::measurement::{FinalizedMeasurement, ShapeMode, rectangle_arcseconds};
use crate::transform::{CoordinateTransform, angular_distance};
use crate::types::{Point, Size};

/// Portable record of a measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementPreset {
    /// Store-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// User-facing name.
    pub name: String,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Start right ascension (hours).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ra: Option<f64>,
    /// Start declination (degrees).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_dec: Option<f64>,
    /// End right ascension (hours).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ra: Option<f64>,
    /// End declination (degrees).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_dec: Option<f64>,
    /// Rectangle width (arcseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_arcseconds: Option<f64>,
    /// Rectangle height (arcseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_arcseconds: Option<f64>,
    /// Whether the rectangle was shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_rectangle: Option<bool>,
    /// Whether the circle was shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_circle: Option<bool>,
}

impl MeasurementPreset {
    /// An empty preset with just a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Angular width and height, if both are stored.
    #[must_use]
    pub fn dimensions_arcseconds(&self) -> Option<(f64, f64)> {
        self.width_arcseconds.zip(self.height_arcseconds)
    }

    /// Shape recorded in the preset. Rectangle wins if both flags are set.
    #[must_use]
    pub fn shape_mode(&self) -> ShapeMode {
        if self.show_rectangle == Some(true) {
            ShapeMode::Rectangle
        } else if self.show_circle == Some(true) {
            ShapeMode::Circle
        } else {
            ShapeMode::None
        }
    }
}

/// Why a preset could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    /// The current image has no usable plate solution.
    #[error("this image is not plate-solved, so a saved measurement cannot be placed on it")]
    NoPlateSolution,

    /// A preset document could not be parsed.
    #[error("malformed preset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the plate scale for a reconstruction was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "source", content = "pxPerArcsec")]
pub enum PlateScale {
    /// Sampled at the normal offset.
    Sampled(f64),
    /// Sampled at the smaller retry offset.
    Retried(f64),
    /// Neither sample worked; the configured fallback.
    Fallback(f64),
}

impl PlateScale {
    /// Pixels per arcsecond.
    #[must_use]
    pub const fn pixels_per_arcsecond(self) -> f64 {
        match self {
            Self::Sampled(s) | Self::Retried(s) | Self::Fallback(s) => s,
        }
    }
}

/// Something the user should be told once about a reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionNotice {
    /// The viewport centre itself could not be mapped to the sky.
    CenterUnresolved,
}

impl ReconstructionNotice {
    /// Text shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CenterUnresolved => {
                "The centre of the view could not be mapped to sky coordinates; \
                 the measurement was placed using an estimated scale."
            }
        }
    }
}

/// A preset turned back into a measurement.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The rebuilt measurement, ready to append to the history.
    pub measurement: FinalizedMeasurement,
    /// Plate scale used, for rectangle presets.
    pub plate_scale: Option<PlateScale>,
    /// One-time notice for the user, if any.
    pub notice: Option<ReconstructionNotice>,
}

/// Build a preset from a finalized measurement.
///
/// Angular width/height are stored only for rectangles whose endpoints
/// both have celestial coordinates.
#[must_use]
pub fn to_preset(
    measurement: &FinalizedMeasurement,
    name: &str,
    transform: &CoordinateTransform<'_>,
) -> MeasurementPreset {
    let start = measurement.start_point();
    let end = measurement.end_point();
    let dimensions = if measurement.show_rectangle()
        && start.celestial().is_some()
        && end.celestial().is_some()
    {
        rectangle_arcseconds(start.position(), end.position(), transform).or_else(|| {
            measurement
                .dimensions()
                .and_then(|d| d.width_arcseconds.zip(d.height_arcseconds))
        })
    } else {
        None
    };
    MeasurementPreset {
        id: None,
        name: name.to_owned(),
        notes: None,
        start_ra: start.ra,
        start_dec: start.dec,
        end_ra: end.ra,
        end_dec: end.dec,
        width_arcseconds: dimensions.map(|(w, _)| w),
        height_arcseconds: dimensions.map(|(_, h)| h),
        show_rectangle: Some(measurement.show_rectangle()),
        show_circle: Some(measurement.show_circle()),
    }
}

/// Rebuild a measurement from a preset against the current image.
///
/// # Errors
///
/// Returns [`PresetError::NoPlateSolution`] if `transform` has no plate
/// solution; nothing is created in that case.
pub fn from_preset(
    preset: &MeasurementPreset,
    viewport: Size,
    transform: &CoordinateTransform<'_>,
    config: &OverlayConfig,
    now: Duration,
) -> Result<Reconstruction, PresetError> {
    if !transform.has_plate_solution() {
        return Err(PresetError::NoPlateSolution);
    }
    let center = viewport.center();
    let notice = transform
        .point_to_celestial(center)
        .is_none()
        .then_some(ReconstructionNotice::CenterUnresolved);

    let (start, end, shape, plate_scale) = match preset.dimensions_arcseconds() {
        Some((width, height)) => {
            let scale = estimate_plate_scale(center, viewport, transform, config);
            let (start, end) = place_rectangle(center, width, height, scale, transform);
            (start, end, ShapeMode::Rectangle, Some(scale))
        }
        None => {
            let half = config.default_preset_length / 2.0;
            (
                center.offset(-half, 0.0),
                center.offset(half, 0.0),
                preset.shape_mode(),
                None,
            )
        }
    };

    let measurement = FinalizedMeasurement::new(
        transform.sample(start),
        transform.sample(end),
        shape,
        now,
        transform,
        config,
    );
    log::info!(
        "reconstructed preset {:?}: {}",
        preset.name,
        measurement.distance_label()
    );
    Ok(Reconstruction {
        measurement,
        plate_scale,
        notice,
    })
}

/// Initial rectangle centred on `center`, then one corrective pass that
/// rescales the end point (start fixed) so the realized angular size
/// matches the target.
fn place_rectangle(
    center: Point,
    width: f64,
    height: f64,
    scale: PlateScale,
    transform: &CoordinateTransform<'_>,
) -> (Point, Point) {
    let ppa = scale.pixels_per_arcsecond();
    let (w_px, h_px) = (width * ppa, height * ppa);
    let start = center.offset(-w_px / 2.0, -h_px / 2.0);
    let end = start.offset(w_px, h_px);

    let Some((real_w, real_h)) = rectangle_arcseconds(start, end, transform) else {
        return (start, end);
    };
    let corrected_w = if real_w > 0.0 { w_px * width / real_w } else { w_px };
    let corrected_h = if real_h > 0.0 { h_px * height / real_h } else { h_px };
    (start, start.offset(corrected_w, corrected_h))
}

/// Local pixels-per-arcsecond around `center`.
///
/// Tries the normal sampling offset, then the smaller retry offset, then
/// gives up and returns the configured fallback.
#[must_use]
pub fn estimate_plate_scale(
    center: Point,
    viewport: Size,
    transform: &CoordinateTransform<'_>,
    config: &OverlayConfig,
) -> PlateScale {
    if let Some(scale) = sample_plate_scale(center, viewport, config.scale_sample_fraction, transform, config) {
        return PlateScale::Sampled(scale);
    }
    log::warn!(
        "plate scale sampling at {:.0}% failed, retrying at {:.0}%",
        config.scale_sample_fraction * 100.0,
        config.scale_retry_fraction * 100.0
    );
    if let Some(scale) = sample_plate_scale(center, viewport, config.scale_retry_fraction, transform, config) {
        return PlateScale::Retried(scale);
    }
    log::warn!(
        "plate scale sampling failed, using fallback {} px/arcsec",
        config.fallback_plate_scale
    );
    PlateScale::Fallback(config.fallback_plate_scale)
}

fn sample_plate_scale(
    center: Point,
    viewport: Size,
    fraction: f64,
    transform: &CoordinateTransform<'_>,
    config: &OverlayConfig,
) -> Option<f64> {
    let dx = viewport.width * fraction;
    let dy = viewport.height * fraction;
    let a = center.offset(-dx, -dy);
    let b = center.offset(dx, dy);
    let ca = transform.point_to_celestial(a)?;
    let cb = transform.point_to_celestial(b)?;
    let arcseconds = angular_distance(ca.ra, ca.dec, cb.ra, cb.dec) * 3600.0;
    if !arcseconds.is_finite() || arcseconds <= 0.0 {
        return None;
    }
    let scale = a.distance(b) / arcseconds;
    (scale.is_finite() && scale >= config.min_plate_scale).then_some(scale)
}

/// Parse a preset document: either one preset object or an array.
///
/// # Errors
///
/// Returns [`PresetError::Json`] if `text` is neither.
pub fn parse_presets(text: &str) -> Result<Vec<MeasurementPreset>, PresetError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Document {
        Many(Vec<MeasurementPreset>),
        One(MeasurementPreset),
    }
    Ok(match serde_json::from_str(text)? {
        Document::Many(presets) => presets,
        Document::One(preset) => vec![preset],
    })
}
