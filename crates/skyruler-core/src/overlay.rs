//! The measurement overlay: one object per activation wiring the session,
//! history, presets and resize guard to the host.

use crate::config::OverlayConfig;
use crate::history::MeasurementHistory;
use crate::host::{OverlayHost, PreferenceStore};
use crate::measurement::{FinalizedMeasurement, ShapeMode};
use crate::preset::{self, MeasurementPreset, PresetError};
use crate::resize::ResizeGuard;
use crate::session::{InputContext, MeasurementSession, Preview, SessionOutcome, SessionState};
use crate::transform::{CoordinateTransform, PlateSolution, PlateSolvingMatrix, SkyProjection};
use crate::types::{Point, Size};

/// Confirmation text for deleting one measurement.
pub const DELETE_MESSAGE: &str = "Delete this measurement?";
/// Confirmation text for clearing every measurement.
pub const CLEAR_ALL_MESSAGE: &str = "Clear all measurements?";

/// Something the host should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// The first point of a new measurement was placed.
    MeasurementStarted,
    /// A measurement was finalized or finished being edited.
    MeasurementComplete(FinalizedMeasurement),
    /// The user asked to leave measuring mode.
    ExitMeasuringMode,
    /// The viewport changed enough to invalidate on-screen measurements.
    ResizeWarning,
}

enum Pointer {
    Down,
    Move,
    Up,
}

/// Interactive measurement overlay bound to a host.
pub struct MeasurementOverlay<H, P> {
    host: H,
    preferences: P,
    config: OverlayConfig,
    active: bool,
    projection: Option<Box<dyn SkyProjection>>,
    viewport: Option<Size>,
    session: MeasurementSession,
    history: MeasurementHistory,
    guard: ResizeGuard,
    hover_suppressed: bool,
    events: Vec<OverlayEvent>,
}

impl<H: OverlayHost, P: PreferenceStore> MeasurementOverlay<H, P> {
    /// Create an active overlay, reading the default shape from the
    /// preference store.
    pub fn new(host: H, preferences: P, config: OverlayConfig) -> Self {
        let shape_mode = preferences
            .get(&config.shape_preference_key)
            .and_then(|value| ShapeMode::from_preference(&value))
            .unwrap_or_default();
        let guard = ResizeGuard::new(config.resize_threshold);
        Self {
            host,
            preferences,
            config,
            active: true,
            projection: None,
            viewport: None,
            session: MeasurementSession::new(shape_mode),
            history: MeasurementHistory::new(),
            guard,
            hover_suppressed: false,
            events: Vec::new(),
        }
    }

    /// The host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The preference store.
    pub const fn preferences(&self) -> &P {
        &self.preferences
    }

    /// Calibration knobs.
    pub const fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Finalized measurements.
    pub const fn history(&self) -> &MeasurementHistory {
        &self.history
    }

    /// Placement/drag state.
    pub const fn session(&self) -> &MeasurementSession {
        &self.session
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether pointer input is being handled.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a plate solution is in effect.
    pub const fn has_plate_solution(&self) -> bool {
        self.projection.is_some()
    }

    /// Whether the last viewport change may have invalidated measurements.
    pub const fn measurements_affected_by_resize(&self) -> bool {
        self.guard.measurements_affected_by_resize()
    }

    /// Default shape for new measurements.
    pub const fn shape_mode(&self) -> ShapeMode {
        self.session.shape_mode()
    }

    /// The unfinished measurement, if any.
    pub fn preview(&self) -> Option<Preview> {
        let transform = CoordinateTransform::new(self.projection.as_deref(), &self.host);
        self.session.preview(&transform)
    }

    /// Take all events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<OverlayEvent> {
        std::mem::take(&mut self.events)
    }

    /// Turn pointer handling on or off.
    ///
    /// Deactivating discards the unfinished placement, abandons any drag
    /// and releases hover suppression. Reactivating starts a fresh
    /// session; finalized measurements are kept.
    pub fn set_active(&mut self, active: bool) {
        if active == self.active {
            return;
        }
        self.active = active;
        if active {
            self.session = MeasurementSession::new(self.session.shape_mode());
        } else {
            self.session.reset(&mut self.history);
            self.set_hover_suppressed(false);
        }
        log::debug!("overlay active: {active}");
    }

    /// Replace the plate solution from a host matrix.
    ///
    /// An absent, incomplete or malformed matrix puts the overlay into
    /// pixel-only mode. Returns whether a plate solution is now in effect.
    pub fn set_plate_solving_matrix(&mut self, matrix: Option<&PlateSolvingMatrix>) -> bool {
        self.projection = match matrix.map(PlateSolution::from_matrix) {
            Some(Ok(solution)) => Some(Box::new(solution) as Box<dyn SkyProjection>),
            Some(Err(e)) => {
                log::debug!("plate solution unusable, measuring in pixels: {e}");
                None
            }
            None => None,
        };
        self.projection.is_some()
    }

    /// Replace the plate solution with an arbitrary projection.
    pub fn set_projection(&mut self, projection: Option<Box<dyn SkyProjection>>) {
        self.projection = projection;
    }

    /// Report the current viewport size.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = Some(viewport);
        let has_measurements = !self.history.is_empty() || self.session.is_placing();
        if self.guard.observe(viewport, has_measurements) {
            log::info!("viewport resize may have invalidated measurements");
            self.events.push(OverlayEvent::ResizeWarning);
        }
    }

    /// Primary button pressed.
    pub fn pointer_down(&mut self, p: Point) -> SessionOutcome {
        self.pointer(Pointer::Down, p)
    }

    /// Pointer moved.
    pub fn pointer_move(&mut self, p: Point) -> SessionOutcome {
        self.pointer(Pointer::Move, p)
    }

    /// Primary button released.
    pub fn pointer_up(&mut self, p: Point) -> SessionOutcome {
        self.pointer(Pointer::Up, p)
    }

    /// Escape pressed. With nothing to cancel, asks to leave measuring mode.
    pub fn escape(&mut self) -> SessionOutcome {
        if !self.active {
            return SessionOutcome::Ignored;
        }
        let outcome = self.session.escape(&mut self.history);
        if outcome == SessionOutcome::Ignored {
            self.events.push(OverlayEvent::ExitMeasuringMode);
        }
        self.apply(outcome);
        outcome
    }

    fn pointer(&mut self, kind: Pointer, p: Point) -> SessionOutcome {
        if !self.active {
            return SessionOutcome::Ignored;
        }
        let ctx = InputContext {
            transform: CoordinateTransform::new(self.projection.as_deref(), &self.host),
            config: &self.config,
            now: self.host.now(),
        };
        let outcome = match kind {
            Pointer::Down => self.session.pointer_down(p, &mut self.history, &ctx),
            Pointer::Move => self.session.pointer_move(p, &mut self.history, &ctx),
            Pointer::Up => self.session.pointer_up(p, &mut self.history, &ctx),
        };
        self.apply(outcome);
        outcome
    }

    fn apply(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Started => {
                self.set_hover_suppressed(true);
                self.events.push(OverlayEvent::MeasurementStarted);
            }
            SessionOutcome::DragStarted { .. } => self.set_hover_suppressed(true),
            SessionOutcome::Finalized(index)
            | SessionOutcome::DragFinished { index, moved: true } => {
                self.set_hover_suppressed(false);
                if let Some(measurement) = self.history.get(index) {
                    self.events
                        .push(OverlayEvent::MeasurementComplete(measurement.clone()));
                }
            }
            SessionOutcome::DragFinished { moved: false, .. }
            | SessionOutcome::Cancelled
            | SessionOutcome::DragCancelled(_) => self.set_hover_suppressed(false),
            SessionOutcome::Ignored | SessionOutcome::Previewed | SessionOutcome::Dragged { .. } => {}
        }
    }

    fn set_hover_suppressed(&mut self, suppressed: bool) {
        if self.hover_suppressed != suppressed {
            self.hover_suppressed = suppressed;
            self.host.suppress_hover(suppressed);
        }
    }

    fn remember_shape(&mut self, mode: ShapeMode) {
        self.session.set_shape_mode(mode);
        self.preferences.set(
            &self.config.shape_preference_key,
            mode.as_str(),
            self.config.shape_preference_ttl(),
        );
    }

    /// Toggle the circle or rectangle of measurement `index`.
    ///
    /// The resulting mode becomes the default for new measurements and is
    /// persisted. Returns the new mode, or `None` for a bad index.
    pub fn toggle_shape(&mut self, index: usize, requested: ShapeMode) -> Option<ShapeMode> {
        let transform = CoordinateTransform::new(self.projection.as_deref(), &self.host);
        let mode = self
            .history
            .toggle_shape(index, requested, &transform, &self.config)?;
        self.remember_shape(mode);
        Some(mode)
    }

    /// Toggle the default shape for new measurements without editing any
    /// existing one.
    pub fn toggle_default_shape(&mut self, requested: ShapeMode) -> ShapeMode {
        let mode = self.session.shape_mode().toggled(requested);
        self.remember_shape(mode);
        mode
    }

    /// Delete one measurement after confirmation. Returns `true` if it was
    /// removed.
    pub fn delete_measurement(&mut self, index: usize) -> bool {
        if self.session.is_dragging() || self.history.get(index).is_none() {
            return false;
        }
        if !self.host.confirm(DELETE_MESSAGE) {
            return false;
        }
        let Some(removed) = self.history.remove(index) else {
            return false;
        };
        self.session.entry_removed(index);
        if self.history.is_empty() && !self.session.is_placing() {
            self.guard.reset();
        }
        log::info!("deleted measurement {index} ({})", removed.distance_label());
        true
    }

    /// Remove every measurement, including an unfinished one, after
    /// confirmation. Returns `true` if anything was cleared.
    pub fn clear_all(&mut self) -> bool {
        if self.history.is_empty() && !self.session.is_placing() {
            return false;
        }
        if !self.host.confirm(CLEAR_ALL_MESSAGE) {
            return false;
        }
        self.session.reset(&mut self.history);
        let count = self.history.clear();
        self.session.history_cleared();
        self.guard.reset();
        self.set_hover_suppressed(false);
        log::info!("cleared {count} measurements");
        true
    }

    /// Keep the measurements despite the resize warning.
    pub fn dismiss_resize_warning(&mut self) {
        self.guard.dismiss();
    }

    /// Plain-text summary of measurement `index`.
    pub fn summary(&self, index: usize) -> Option<String> {
        self.history.get(index).map(FinalizedMeasurement::summary)
    }

    /// Build a preset from measurement `index`.
    pub fn to_preset(&self, index: usize, name: &str) -> Option<MeasurementPreset> {
        let transform = CoordinateTransform::new(self.projection.as_deref(), &self.host);
        self.history
            .get(index)
            .map(|m| preset::to_preset(m, name, &transform))
    }

    /// Reconstruct a preset around the viewport centre and append it.
    ///
    /// Failures and one-time notices are also shown through the host.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NoPlateSolution`] if there is no plate
    /// solution; nothing is added in that case.
    pub fn load_preset(&mut self, preset: &MeasurementPreset) -> Result<usize, PresetError> {
        let viewport = self
            .viewport
            .or_else(|| {
                self.host
                    .image_bounds()
                    .map(|b| Size::new(b.rect.max_x(), b.rect.max_y()))
            })
            .unwrap_or(Size::new(0.0, 0.0));
        let transform = CoordinateTransform::new(self.projection.as_deref(), &self.host);
        let result = preset::from_preset(preset, viewport, &transform, &self.config, self.host.now());
        let reconstruction = match result {
            Ok(reconstruction) => reconstruction,
            Err(e) => {
                log::warn!("cannot load preset {:?}: {e}", preset.name);
                self.host.notify(&e.to_string());
                return Err(e);
            }
        };
        if let Some(notice) = reconstruction.notice {
            self.host.notify(notice.message());
        }
        let index = self.history.push(reconstruction.measurement.clone());
        self.events
            .push(OverlayEvent::MeasurementComplete(reconstruction.measurement));
        Ok(index)
    }
}
