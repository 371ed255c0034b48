//! skyruler-core: Measurement overlay for astronomical images (sans-IO).
//!
//! Lets a user place two-point measurements on a displayed image and
//! reports them in pixels or, when the image is plate-solved, as angular
//! separations on the sky. The crate holds:
//!
//! - a pixel to celestial transform driven by a plate-solving grid,
//! - astronomical angle and coordinate formatting,
//! - the click/drag placement state machine and the measurement history,
//! - label layout with collision avoidance,
//! - scale-invariant presets that survive a change of image,
//! - a viewport resize guard.
//!
//! This crate has **no I/O dependencies**. Everything it needs from the
//! page (image bounds, time, dialogs, preferences) comes in through the
//! traits in [`host`]. Start with [`MeasurementOverlay`].

pub mod angle;
pub mod clock;
pub mod config;
pub mod history;
pub mod host;
pub mod layout;
pub mod measurement;
pub mod overlay;
pub mod preset;
pub mod resize;
pub mod session;
pub mod transform;
pub mod types;

pub use angle::{format_angle, format_angular_distance, format_coordinates_compact};
pub use clock::{Clock, ManualClock, SyncThrottle, SystemClock};
pub use config::OverlayConfig;
pub use history::MeasurementHistory;
pub use host::{
    ImageGeometry, MemoryPreferences, MemoryPresetStore, OverlayHost, PreferenceStore, PresetStore,
};
pub use measurement::{DragTarget, FinalizedMeasurement, MeasurementPoint, ShapeMode};
pub use overlay::{MeasurementOverlay, OverlayEvent};
pub use preset::{MeasurementPreset, PresetError, from_preset, to_preset};
pub use resize::ResizeGuard;
pub use session::{MeasurementSession, SessionOutcome, SessionState};
pub use transform::{
    CoordinateTransform, MatrixError, PlateSolution, PlateSolvingMatrix, SkyProjection,
    angular_distance, pixel_distance, point_to_celestial,
};
pub use types::{Celestial, ImageBounds, Point, Rect, Size};
