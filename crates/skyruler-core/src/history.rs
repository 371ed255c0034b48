//! Finalized measurements for the current viewing session.
//!
//! Entries are edited in place. A drag is described by an [`EntryDrag`]
//! handle that the caller keeps between pointer events; the history
//! applies it to the entry it points at.

use std::time::Duration;

use crate::clock::SyncThrottle;
use crate::config::OverlayConfig;
use crate::measurement::{DragTarget, FinalizedMeasurement, ShapeMode};
use crate::transform::CoordinateTransform;
use crate::types::Point;

/// Ordered list of finalized measurements, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MeasurementHistory {
    entries: Vec<FinalizedMeasurement>,
}

/// An in-progress drag of one history entry.
#[derive(Debug, Clone)]
pub struct EntryDrag {
    index: usize,
    target: DragTarget,
    anchor: Point,
    original: FinalizedMeasurement,
    throttle: SyncThrottle,
    moved: bool,
}

impl EntryDrag {
    /// Index of the entry being dragged.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// What is being dragged.
    #[must_use]
    pub const fn target(&self) -> DragTarget {
        self.target
    }

    /// Returns `true` once the pointer has moved away from the anchor.
    #[must_use]
    pub const fn moved(&self) -> bool {
        self.moved
    }

    /// The entry as it was when the drag began.
    #[must_use]
    pub const fn original(&self) -> &FinalizedMeasurement {
        &self.original
    }
}

impl MeasurementHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement, returning its index.
    pub fn push(&mut self, measurement: FinalizedMeasurement) -> usize {
        self.entries.push(measurement);
        self.entries.len() - 1
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FinalizedMeasurement> {
        self.entries.get(index)
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FinalizedMeasurement> {
        self.entries.iter()
    }

    /// Entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[FinalizedMeasurement] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<FinalizedMeasurement> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Remove every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Apply a shape toggle to one entry.
    ///
    /// Returns the entry's new shape mode, or `None` for a bad index.
    pub fn toggle_shape(
        &mut self,
        index: usize,
        requested: ShapeMode,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
    ) -> Option<ShapeMode> {
        let entry = self.entries.get_mut(index)?;
        let mode = entry.shape_mode().toggled(requested);
        entry.set_shape_mode(mode, transform, config);
        Some(mode)
    }

    /// Find the drag target under `p`, newest entries first.
    ///
    /// Endpoints of any entry take precedence over shape bodies.
    #[must_use]
    pub fn hit_test(&self, p: Point, config: &OverlayConfig) -> Option<(usize, DragTarget)> {
        let mut body = None;
        for (index, entry) in self.entries.iter().enumerate().rev() {
            match entry.hit_test(p, config) {
                Some(DragTarget::WholeShape) => {
                    body.get_or_insert((index, DragTarget::WholeShape));
                }
                Some(target) => return Some((index, target)),
                None => {}
            }
        }
        body
    }

    /// Start dragging `target` of entry `index` from pointer position
    /// `anchor`.
    #[must_use]
    pub fn begin_drag(
        &self,
        index: usize,
        target: DragTarget,
        anchor: Point,
        sync_interval: Duration,
    ) -> Option<EntryDrag> {
        let original = self.entries.get(index)?.clone();
        Some(EntryDrag {
            index,
            target,
            anchor,
            original,
            throttle: SyncThrottle::new(sync_interval),
            moved: false,
        })
    }

    /// Move the dragged entry so the grabbed point follows `p`.
    ///
    /// Pixel positions always update. An endpoint drag re-samples that
    /// endpoint and its labels on every call; a whole-shape drag only
    /// re-samples when the throttle allows. Returns `Some(true)` if
    /// celestial data was refreshed by this call, `None` if the entry no
    /// longer exists.
    pub fn drag_to(
        &mut self,
        drag: &mut EntryDrag,
        p: Point,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
        now: Duration,
    ) -> Option<bool> {
        let entry = self.entries.get_mut(drag.index)?;
        let (dx, dy) = drag.anchor.delta_to(p);
        drag.moved |= dx.abs() > f64::EPSILON || dy.abs() > f64::EPSILON;
        match drag.target {
            DragTarget::StartPoint | DragTarget::EndPoint => {
                let from = match drag.target {
                    DragTarget::StartPoint => drag.original.start_point().position(),
                    _ => drag.original.end_point().position(),
                };
                if let Some(point) = entry.endpoint_mut(drag.target) {
                    transform.resample(point, from.offset(dx, dy));
                }
                entry.refresh(transform, config);
                Some(true)
            }
            DragTarget::WholeShape => {
                let start = drag.original.start_point().position().offset(dx, dy);
                let end = drag.original.end_point().position().offset(dx, dy);
                entry.set_positions(start, end);
                if drag.throttle.try_acquire(now) {
                    resync(entry, transform, config);
                    Some(true)
                } else {
                    entry.relayout(config);
                    log::debug!("drag sync deferred for measurement {}", drag.index);
                    Some(false)
                }
            }
        }
    }

    /// Finish a drag with a final authoritative re-sample.
    ///
    /// Returns the edited entry, or `None` if it no longer exists.
    pub fn end_drag(
        &mut self,
        drag: EntryDrag,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
    ) -> Option<&FinalizedMeasurement> {
        let entry = self.entries.get_mut(drag.index)?;
        if drag.moved {
            resync(entry, transform, config);
        }
        Some(entry)
    }

    /// Abandon a drag, restoring the entry's pre-drag state.
    pub fn cancel_drag(&mut self, drag: EntryDrag) -> bool {
        let Some(entry) = self.entries.get_mut(drag.index) else {
            return false;
        };
        *entry = drag.original;
        true
    }
}

/// Re-sample both endpoints at their current positions and refresh.
fn resync(entry: &mut FinalizedMeasurement, transform: &CoordinateTransform<'_>, config: &OverlayConfig) {
    for target in [DragTarget::StartPoint, DragTarget::EndPoint] {
        if let Some(point) = entry.endpoint_mut(target) {
            let at = point.position();
            transform.resample(point, at);
        }
    }
    entry.refresh(transform, config);
}

impl<'a> IntoIterator for &'a MeasurementHistory {
    type Item = &'a FinalizedMeasurement;
    type IntoIter = std::slice::Iter<'a, FinalizedMeasurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Celestial, ImageBounds, Rect, Size};

    fn bounds() -> ImageBounds {
        ImageBounds {
            rect: Rect::new(0.0, 0.0, 1000.0, 1000.0),
            natural: Size::new(1000.0, 1000.0),
        }
    }

    fn linear(p: Point) -> Option<Celestial> {
        Some(Celestial::new(p.x / 54_000.0, p.y / 3600.0))
    }

    fn measurement(
        transform: &CoordinateTransform<'_>,
        start: Point,
        end: Point,
        shape: ShapeMode,
    ) -> FinalizedMeasurement {
        FinalizedMeasurement::new(
            transform.sample(start),
            transform.sample(end),
            shape,
            Duration::ZERO,
            transform,
            &OverlayConfig::default(),
        )
    }

    fn history_with_line(transform: &CoordinateTransform<'_>) -> MeasurementHistory {
        let mut history = MeasurementHistory::new();
        history.push(measurement(
            transform,
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            ShapeMode::None,
        ));
        history
    }

    #[test]
    fn push_remove_clear() {
        let bounds = bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        let mut history = history_with_line(&transform);
        let second = history.push(measurement(
            &transform,
            Point::new(0.0, 0.0),
            Point::new(0.0, 50.0),
            ShapeMode::None,
        ));
        assert_eq!(second, 1);
        assert_eq!(history.len(), 2);
        assert!(history.remove(5).is_none());
        let removed = history.remove(0).unwrap();
        assert_eq!(removed.distance_label(), "100 px");
        assert_eq!(history.get(0).unwrap().distance_label(), "50 px");
        assert_eq!(history.clear(), 1);
        assert!(history.is_empty());
    }

    #[test]
    fn toggle_sequences_keep_shapes_exclusive() {
        let bounds = bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&transform);
        let sequence = [
            ShapeMode::Circle,
            ShapeMode::Rectangle,
            ShapeMode::Rectangle,
            ShapeMode::Circle,
            ShapeMode::Circle,
            ShapeMode::Rectangle,
            ShapeMode::Circle,
        ];
        for requested in sequence {
            history.toggle_shape(0, requested, &transform, &config).unwrap();
            let entry = history.get(0).unwrap();
            assert!(!(entry.show_circle() && entry.show_rectangle()));
            assert_eq!(entry.dimensions().is_some(), entry.show_rectangle());
        }
        assert!(history.get(0).unwrap().show_circle());
        assert_eq!(history.toggle_shape(9, ShapeMode::Circle, &transform, &config), None);
    }

    #[test]
    fn hit_test_prefers_endpoints_of_older_entries_over_newer_bodies() {
        let bounds = bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&transform);
        // A big circle around the first entry's end point.
        history.push(measurement(
            &transform,
            Point::new(250.0, 100.0),
            Point::new(250.0, 300.0),
            ShapeMode::Circle,
        ));
        assert_eq!(
            history.hit_test(Point::new(201.0, 101.0), &config),
            Some((0, DragTarget::EndPoint))
        );
        assert_eq!(
            history.hit_test(Point::new(300.0, 150.0), &config),
            Some((1, DragTarget::WholeShape))
        );
        assert_eq!(history.hit_test(Point::new(900.0, 900.0), &config), None);
    }

    #[test]
    fn endpoint_drag_resamples_every_move() {
        let bounds = bounds();
        let projection = linear;
        let transform = CoordinateTransform::new(Some(&projection), &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&transform);
        let mut drag = history
            .begin_drag(0, DragTarget::EndPoint, Point::new(202.0, 100.0), config.drag_sync_interval())
            .unwrap();

        let synced = history.drag_to(&mut drag, Point::new(302.0, 100.0), &transform, &config, Duration::ZERO);
        assert_eq!(synced, Some(true));
        let entry = history.get(0).unwrap();
        assert_eq!(entry.end_point().position(), Point::new(300.0, 100.0));
        assert!((entry.end_point().ra.unwrap() - 300.0 / 54_000.0).abs() < 1e-12);
        assert_eq!(entry.midpoint(), Point::new(200.0, 100.0));
        assert_eq!(entry.distance_label(), "3′ 20″");
    }

    #[test]
    fn whole_shape_drag_is_throttled_with_final_sync() {
        let bounds = bounds();
        let projection = linear;
        let transform = CoordinateTransform::new(Some(&projection), &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&transform);
        let mut drag = history
            .begin_drag(0, DragTarget::WholeShape, Point::new(150.0, 100.0), config.drag_sync_interval())
            .unwrap();

        let at = |ms| Duration::from_millis(ms);
        assert_eq!(
            history.drag_to(&mut drag, Point::new(160.0, 100.0), &transform, &config, at(1000)),
            Some(true)
        );
        assert_eq!(
            history.drag_to(&mut drag, Point::new(170.0, 110.0), &transform, &config, at(1050)),
            Some(false)
        );
        let entry = history.get(0).unwrap();
        // Pixels follow the pointer immediately; celestial data lags.
        assert_eq!(entry.start_point().position(), Point::new(120.0, 110.0));
        assert!((entry.start_point().dec.unwrap() - 100.0 / 3600.0).abs() < 1e-12);

        assert_eq!(
            history.drag_to(&mut drag, Point::new(180.0, 120.0), &transform, &config, at(1100)),
            Some(true)
        );
        history.drag_to(&mut drag, Point::new(190.0, 130.0), &transform, &config, at(1120));
        let entry = history.end_drag(drag, &transform, &config).unwrap();
        assert_eq!(entry.start_point().position(), Point::new(140.0, 130.0));
        assert!((entry.start_point().dec.unwrap() - 130.0 / 3600.0).abs() < 1e-12);
        assert!((entry.end_point().ra.unwrap() - 240.0 / 54_000.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_loss_mid_drag_keeps_celestial_and_falls_back_to_pixels() {
        let bounds = bounds();
        let projection = linear;
        let solved = CoordinateTransform::new(Some(&projection), &bounds);
        let unsolved = CoordinateTransform::new(None, &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&solved);
        let before = *history.get(0).unwrap().start_point();
        let mut drag = history
            .begin_drag(0, DragTarget::StartPoint, Point::new(100.0, 100.0), config.drag_sync_interval())
            .unwrap();
        history.drag_to(&mut drag, Point::new(90.0, 100.0), &unsolved, &config, Duration::ZERO);
        let entry = history.end_drag(drag, &unsolved, &config).unwrap();
        assert_eq!(entry.start_point().ra, before.ra);
        assert_eq!(entry.start_point().dec, before.dec);
        assert_eq!(entry.distance_label(), "110 px");
    }

    #[test]
    fn cancel_drag_restores_original() {
        let bounds = bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        let config = OverlayConfig::default();
        let mut history = history_with_line(&transform);
        let original = history.get(0).unwrap().clone();
        let mut drag = history
            .begin_drag(0, DragTarget::WholeShape, Point::new(150.0, 100.0), config.drag_sync_interval())
            .unwrap();
        history.drag_to(&mut drag, Point::new(400.0, 400.0), &transform, &config, Duration::ZERO);
        assert_ne!(history.get(0).unwrap(), &original);
        assert!(history.cancel_drag(drag));
        assert_eq!(history.get(0).unwrap(), &original);
    }

    #[test]
    fn drag_of_missing_entry_is_rejected() {
        let history = MeasurementHistory::new();
        assert!(history
            .begin_drag(0, DragTarget::StartPoint, Point::new(0.0, 0.0), Duration::ZERO)
            .is_none());
    }
}
