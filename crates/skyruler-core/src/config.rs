//! Overlay calibration knobs.
//!
//! Every threshold and distance the overlay uses lives here so hosts can
//! tune them without touching the state machine. The defaults are
//! empirically tuned; none of them is load-bearing for correctness.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration for a [`MeasurementOverlay`](crate::MeasurementOverlay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Minimum pointer travel (px) for a press-drag-release to complete
    /// a measurement. Shorter gestures count as the first click of a
    /// click-click placement.
    pub drag_threshold: f64,

    /// Minimum interval between celestial re-samples while a whole shape
    /// is being dragged (milliseconds).
    pub drag_sync_interval_ms: u64,

    /// Viewport change (px, either axis) that invalidates on-screen
    /// measurements.
    pub resize_threshold: f64,

    /// Base offset between an endpoint and its coordinate label (px).
    pub label_distance: f64,

    /// Radius of the endpoint marker (px).
    pub point_radius: f64,

    /// Grab radius around an endpoint for dragging it (px).
    pub handle_radius: f64,

    /// Grab distance from the measurement line for dragging the whole
    /// shape (px).
    pub line_grab_distance: f64,

    /// Coordinate label box width (px).
    pub point_label_width: f64,

    /// Coordinate label box height (px).
    pub point_label_height: f64,

    /// Rectangle dimension label box width (px).
    pub dimension_label_width: f64,

    /// Rectangle dimension label box height (px).
    pub dimension_label_height: f64,

    /// Plate-scale sampling offset as a fraction of the viewport.
    pub scale_sample_fraction: f64,

    /// Smaller offset tried when the first sampling fails.
    pub scale_retry_fraction: f64,

    /// Plate scale (px per arcsecond) used when sampling fails entirely.
    pub fallback_plate_scale: f64,

    /// Plate scales below this (px per arcsecond) count as failed samples.
    pub min_plate_scale: f64,

    /// Length (px) of a reconstructed preset that carries no dimensions.
    pub default_preset_length: f64,

    /// Preference key holding the default shape mode.
    pub shape_preference_key: String,

    /// Retention of the shape preference (days).
    pub shape_preference_days: u64,
}

impl OverlayConfig {
    /// Default drag-to-place threshold.
    pub const DEFAULT_DRAG_THRESHOLD: f64 = 10.0;
    /// Default re-sample interval while dragging a shape.
    pub const DEFAULT_DRAG_SYNC_INTERVAL_MS: u64 = 100;
    /// Default resize threshold.
    pub const DEFAULT_RESIZE_THRESHOLD: f64 = 50.0;
    /// Default label offset.
    pub const DEFAULT_LABEL_DISTANCE: f64 = 20.0;
    /// Default plate-scale sampling fraction.
    pub const DEFAULT_SCALE_SAMPLE_FRACTION: f64 = 0.10;
    /// Default plate-scale retry fraction.
    pub const DEFAULT_SCALE_RETRY_FRACTION: f64 = 0.05;
    /// Default fallback plate scale.
    pub const DEFAULT_FALLBACK_PLATE_SCALE: f64 = 0.25;
    /// Default reconstructed preset length.
    pub const DEFAULT_PRESET_LENGTH: f64 = 200.0;

    /// Drag re-sample interval as a [`Duration`].
    #[must_use]
    pub const fn drag_sync_interval(&self) -> Duration {
        Duration::from_millis(self.drag_sync_interval_ms)
    }

    /// Shape preference retention as a [`Duration`].
    #[must_use]
    pub const fn shape_preference_ttl(&self) -> Duration {
        Duration::from_secs(self.shape_preference_days.saturating_mul(SECONDS_PER_DAY))
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            drag_threshold: Self::DEFAULT_DRAG_THRESHOLD,
            drag_sync_interval_ms: Self::DEFAULT_DRAG_SYNC_INTERVAL_MS,
            resize_threshold: Self::DEFAULT_RESIZE_THRESHOLD,
            label_distance: Self::DEFAULT_LABEL_DISTANCE,
            point_radius: 5.0,
            handle_radius: 8.0,
            line_grab_distance: 6.0,
            point_label_width: 150.0,
            point_label_height: 20.0,
            dimension_label_width: 60.0,
            dimension_label_height: 20.0,
            scale_sample_fraction: Self::DEFAULT_SCALE_SAMPLE_FRACTION,
            scale_retry_fraction: Self::DEFAULT_SCALE_RETRY_FRACTION,
            fallback_plate_scale: Self::DEFAULT_FALLBACK_PLATE_SCALE,
            min_plate_scale: 0.01,
            default_preset_length: Self::DEFAULT_PRESET_LENGTH,
            shape_preference_key: "measurement-shape".to_owned(),
            shape_preference_days: 365,
        }
    }
}
