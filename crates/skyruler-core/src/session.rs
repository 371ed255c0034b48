//! Interactive placement and drag state machine.
//!
//! ```text
//!            press (on image)             release >= threshold
//!   Idle ──────────────────────▶ StartPlaced ───────────────────▶ Complete
//!    ▲                             │  │  second press                 │
//!    │        Escape / same point  │  └──────────────────────────────▶│
//!    └─────────────────────────────┘                                  │
//!                        press on a handle            release         │
//!   Complete / Idle ─────────────────────▶ Dragging ─────────▶ Complete
//! ```
//!
//! Finalized measurements go straight into the [`MeasurementHistory`];
//! `Complete` only remembers which entry was finalized last and behaves
//! like `Idle` for the next press. Drags always edit history entries.

use std::time::Duration;

use crate::angle::format_distance;
use crate::config::OverlayConfig;
use crate::history::{EntryDrag, MeasurementHistory};
use crate::measurement::{DragTarget, FinalizedMeasurement, MeasurementPoint, ShapeMode};
use crate::transform::CoordinateTransform;
use crate::types::Point;

/// A second press this close to the start point cancels the placement.
const SAME_POINT_TOLERANCE: f64 = 1.0;

/// Everything a transition needs from the outside world.
#[derive(Clone, Copy)]
pub struct InputContext<'a> {
    /// Transform bound to the current matrix and image geometry.
    pub transform: CoordinateTransform<'a>,
    /// Calibration knobs.
    pub config: &'a OverlayConfig,
    /// Current time on the host clock.
    pub now: Duration,
}

/// Observable state of a [`MeasurementSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing in progress.
    Idle,
    /// The first point is placed.
    StartPlaced,
    /// A measurement was just finalized.
    Complete,
    /// A history entry is being dragged.
    Dragging(DragTarget),
}

/// What a single input event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No state change.
    Ignored,
    /// The first point was placed.
    Started,
    /// The live preview moved.
    Previewed,
    /// An in-progress placement was abandoned.
    Cancelled,
    /// A measurement was appended to the history at this index.
    Finalized(usize),
    /// A drag of a history entry began.
    DragStarted {
        /// Entry index.
        index: usize,
        /// Grabbed part.
        target: DragTarget,
    },
    /// A drag moved its entry.
    Dragged {
        /// Entry index.
        index: usize,
        /// Whether celestial data was refreshed by this move.
        synced: bool,
    },
    /// A drag ended with its final re-sample.
    DragFinished {
        /// Entry index.
        index: usize,
        /// Whether the entry actually moved.
        moved: bool,
    },
    /// A drag was abandoned and the entry restored.
    DragCancelled(usize),
}

/// In-progress placement.
#[derive(Debug, Clone)]
struct Placement {
    start: MeasurementPoint,
    /// Where the button went down, while it is still held.
    pressed_at: Option<Point>,
    preview: Option<MeasurementPoint>,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    StartPlaced(Placement),
    Complete,
    Dragging(EntryDrag),
}

/// Live preview of an unfinished measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// The placed start point.
    pub start: MeasurementPoint,
    /// Where the pointer currently is, if it has moved on the image.
    pub end: Option<MeasurementPoint>,
    /// Distance label for `start`-`end`.
    pub distance_label: Option<String>,
}

/// One activation's worth of placement and drag state.
#[derive(Debug, Clone)]
pub struct MeasurementSession {
    phase: Phase,
    shape_mode: ShapeMode,
    last_finalized: Option<usize>,
}

impl Default for MeasurementSession {
    fn default() -> Self {
        Self::new(ShapeMode::None)
    }
}

impl MeasurementSession {
    /// Start idle with `shape_mode` as the default for new measurements.
    #[must_use]
    pub const fn new(shape_mode: ShapeMode) -> Self {
        Self {
            phase: Phase::Idle,
            shape_mode,
            last_finalized: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::StartPlaced(_) => SessionState::StartPlaced,
            Phase::Complete => SessionState::Complete,
            Phase::Dragging(drag) => SessionState::Dragging(drag.target()),
        }
    }

    /// Shape applied to newly finalized measurements.
    #[must_use]
    pub const fn shape_mode(&self) -> ShapeMode {
        self.shape_mode
    }

    /// Change the shape applied to newly finalized measurements.
    pub const fn set_shape_mode(&mut self, shape_mode: ShapeMode) {
        self.shape_mode = shape_mode;
    }

    /// History index of the most recently finalized measurement.
    #[must_use]
    pub const fn last_finalized(&self) -> Option<usize> {
        self.last_finalized
    }

    /// Returns `true` while a placement is unfinished.
    #[must_use]
    pub const fn is_placing(&self) -> bool {
        matches!(self.phase, Phase::StartPlaced(_))
    }

    /// Returns `true` while a history entry is being dragged.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging(_))
    }

    /// The unfinished measurement, if any.
    #[must_use]
    pub fn preview(&self, transform: &CoordinateTransform<'_>) -> Option<Preview> {
        let Phase::StartPlaced(placement) = &self.phase else {
            return None;
        };
        Some(Preview {
            start: placement.start,
            end: placement.preview,
            distance_label: placement
                .preview
                .map(|end| format_distance(&placement.start, &end, transform.has_plate_solution())),
        })
    }

    /// Primary button pressed at `p`.
    ///
    /// With a start point placed, the press completes the measurement,
    /// except when it lands within 1 px of the start point: that cancels
    /// the placement instead, returns [`SessionOutcome::Cancelled`] and
    /// finalizes nothing. Otherwise a press on an existing handle starts
    /// a drag and any other press on the image places a new start point.
    pub fn pointer_down(
        &mut self,
        p: Point,
        history: &mut MeasurementHistory,
        ctx: &InputContext<'_>,
    ) -> SessionOutcome {
        if !ctx.transform.is_on_image(p) {
            log::debug!("ignoring press outside the image at ({:.1}, {:.1})", p.x, p.y);
            return SessionOutcome::Ignored;
        }
        match &mut self.phase {
            Phase::Dragging(_) => SessionOutcome::Ignored,
            Phase::StartPlaced(placement) => {
                if placement.start.position().distance(p) <= SAME_POINT_TOLERANCE {
                    self.phase = Phase::Idle;
                    return SessionOutcome::Cancelled;
                }
                let start = placement.start;
                self.finalize(start, p, history, ctx)
            }
            Phase::Idle | Phase::Complete => {
                if let Some((index, target)) = history.hit_test(p, ctx.config)
                    && let Some(drag) =
                        history.begin_drag(index, target, p, ctx.config.drag_sync_interval())
                {
                    self.phase = Phase::Dragging(drag);
                    return SessionOutcome::DragStarted { index, target };
                }
                self.phase = Phase::StartPlaced(Placement {
                    start: ctx.transform.sample(p),
                    pressed_at: Some(p),
                    preview: None,
                });
                SessionOutcome::Started
            }
        }
    }

    /// Pointer moved to `p`.
    pub fn pointer_move(
        &mut self,
        p: Point,
        history: &mut MeasurementHistory,
        ctx: &InputContext<'_>,
    ) -> SessionOutcome {
        match &mut self.phase {
            Phase::StartPlaced(placement) => {
                if !ctx.transform.is_on_image(p) {
                    return SessionOutcome::Ignored;
                }
                placement.preview = Some(ctx.transform.sample(p));
                SessionOutcome::Previewed
            }
            Phase::Dragging(drag) => {
                match history.drag_to(drag, p, &ctx.transform, ctx.config, ctx.now) {
                    Some(synced) => SessionOutcome::Dragged {
                        index: drag.index(),
                        synced,
                    },
                    None => {
                        self.phase = Phase::Idle;
                        SessionOutcome::Cancelled
                    }
                }
            }
            Phase::Idle | Phase::Complete => SessionOutcome::Ignored,
        }
    }

    /// Primary button released at `p`.
    ///
    /// A release ends any drag wherever it happens. During placement it
    /// completes a press-drag-release gesture once the pointer has
    /// travelled at least the drag threshold; a shorter gesture leaves
    /// the start point placed for a click-click measurement.
    pub fn pointer_up(
        &mut self,
        p: Point,
        history: &mut MeasurementHistory,
        ctx: &InputContext<'_>,
    ) -> SessionOutcome {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Dragging(mut drag) => {
                history.drag_to(&mut drag, p, &ctx.transform, ctx.config, ctx.now);
                let index = drag.index();
                let moved = drag.moved();
                if history.end_drag(drag, &ctx.transform, ctx.config).is_none() {
                    return SessionOutcome::Cancelled;
                }
                self.phase = Phase::Complete;
                self.last_finalized = Some(index);
                SessionOutcome::DragFinished { index, moved }
            }
            Phase::StartPlaced(mut placement) => {
                let Some(pressed_at) = placement.pressed_at.take() else {
                    self.phase = Phase::StartPlaced(placement);
                    return SessionOutcome::Ignored;
                };
                if !ctx.transform.is_on_image(p) {
                    self.phase = Phase::StartPlaced(placement);
                    return SessionOutcome::Ignored;
                }
                if pressed_at.distance(p) >= ctx.config.drag_threshold {
                    let start = placement.start;
                    self.finalize(start, p, history, ctx)
                } else {
                    self.phase = Phase::StartPlaced(placement);
                    SessionOutcome::Ignored
                }
            }
            other => {
                self.phase = other;
                SessionOutcome::Ignored
            }
        }
    }

    /// Escape pressed. Cancels a placement or a drag; otherwise ignored.
    pub fn escape(&mut self, history: &mut MeasurementHistory) -> SessionOutcome {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::StartPlaced(_) => SessionOutcome::Cancelled,
            Phase::Dragging(drag) => {
                let index = drag.index();
                history.cancel_drag(drag);
                self.phase = Phase::Complete;
                SessionOutcome::DragCancelled(index)
            }
            other => {
                self.phase = other;
                SessionOutcome::Ignored
            }
        }
    }

    /// Discard all session-local state, restoring any dragged entry.
    pub fn reset(&mut self, history: &mut MeasurementHistory) {
        if let Phase::Dragging(drag) = std::mem::replace(&mut self.phase, Phase::Idle) {
            history.cancel_drag(drag);
        }
    }

    /// Keep `last_finalized` pointing at the same entry after a removal.
    pub const fn entry_removed(&mut self, index: usize) {
        self.last_finalized = match self.last_finalized {
            Some(last) if last == index => None,
            Some(last) if last > index => Some(last - 1),
            other => other,
        };
    }

    /// Forget `last_finalized` after the history was cleared.
    pub fn history_cleared(&mut self) {
        self.last_finalized = None;
        if matches!(self.phase, Phase::Complete) {
            self.phase = Phase::Idle;
        }
    }

    fn finalize(
        &mut self,
        start: MeasurementPoint,
        end: Point,
        history: &mut MeasurementHistory,
        ctx: &InputContext<'_>,
    ) -> SessionOutcome {
        let measurement = FinalizedMeasurement::new(
            start,
            ctx.transform.sample(end),
            self.shape_mode,
            ctx.now,
            &ctx.transform,
            ctx.config,
        );
        log::info!("measurement finalized: {}", measurement.distance_label());
        let index = history.push(measurement);
        self.phase = Phase::Complete;
        self.last_finalized = Some(index);
        SessionOutcome::Finalized(index)
    }
}
