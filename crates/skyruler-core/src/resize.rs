//! Viewport resize detection.
//!
//! Measurements are stored in overlay pixels, so a large viewport change
//! (which usually rescales the displayed image) leaves them pointing at
//! the wrong part of the sky. The guard only raises a flag; it never
//! touches measurement data.

use crate::types::Size;

/// Watches viewport sizes against a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeGuard {
    threshold: f64,
    baseline: Option<Size>,
    affected: bool,
    warned: bool,
}

impl ResizeGuard {
    /// Create a guard that trips on changes larger than `threshold` px in
    /// either dimension.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            baseline: None,
            affected: false,
            warned: false,
        }
    }

    /// Record a viewport size.
    ///
    /// While no measurements exist the baseline simply follows the
    /// viewport. Otherwise small changes are measured against the
    /// unchanged baseline, so slow drift still trips the guard
    /// eventually. Returns `true` if this call raised the warning.
    pub fn observe(&mut self, viewport: Size, has_measurements: bool) -> bool {
        let Some(baseline) = self.baseline else {
            self.baseline = Some(viewport);
            return false;
        };
        if !has_measurements {
            self.baseline = Some(viewport);
            return false;
        }
        let dw = (viewport.width - baseline.width).abs();
        let dh = (viewport.height - baseline.height).abs();
        if dw <= self.threshold && dh <= self.threshold {
            return false;
        }
        log::debug!("viewport changed by {dw:.0}x{dh:.0} px with measurements on screen");
        self.baseline = Some(viewport);
        self.affected = true;
        if self.warned {
            return false;
        }
        self.warned = true;
        true
    }

    /// Whether on-screen measurements may no longer match the image.
    #[must_use]
    pub const fn measurements_affected_by_resize(&self) -> bool {
        self.affected
    }

    /// User dismissed the warning; keep the measurements.
    pub const fn dismiss(&mut self) {
        self.affected = false;
        self.warned = false;
    }

    /// Measurements were cleared; nothing can be affected any more.
    pub const fn reset(&mut self) {
        self.dismiss();
    }

    /// Current baseline size.
    #[must_use]
    pub const fn baseline(&self) -> Option<Size> {
        self.baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_at(width: f64, height: f64) -> ResizeGuard {
        let mut guard = ResizeGuard::new(50.0);
        guard.observe(Size::new(width, height), false);
        guard
    }

    #[test]
    fn small_change_is_ignored() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(!guard.observe(Size::new(1030.0, 830.0), true));
        assert!(!guard.measurements_affected_by_resize());
    }

    #[test]
    fn large_change_with_measurements_trips() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(guard.observe(Size::new(1060.0, 860.0), true));
        assert!(guard.measurements_affected_by_resize());
        // Further changes do not warn again.
        assert!(!guard.observe(Size::new(1200.0, 860.0), true));
        assert!(guard.measurements_affected_by_resize());
    }

    #[test]
    fn one_dimension_is_enough() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(guard.observe(Size::new(1000.0, 740.0), true));
    }

    #[test]
    fn large_change_without_measurements_moves_baseline() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(!guard.observe(Size::new(1200.0, 900.0), false));
        assert!(!guard.measurements_affected_by_resize());
        assert_eq!(guard.baseline(), Some(Size::new(1200.0, 900.0)));
        assert!(!guard.observe(Size::new(1220.0, 900.0), true));
    }

    #[test]
    fn cumulative_drift_trips() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(!guard.observe(Size::new(1030.0, 800.0), true));
        assert!(guard.observe(Size::new(1060.0, 800.0), true));
    }

    #[test]
    fn warning_is_one_shot_until_dismissed() {
        let mut guard = guard_at(1000.0, 800.0);
        assert!(guard.observe(Size::new(1100.0, 800.0), true));
        assert!(!guard.observe(Size::new(1200.0, 800.0), true));
        guard.dismiss();
        assert!(!guard.measurements_affected_by_resize());
        assert!(guard.observe(Size::new(1300.0, 800.0), true));
    }
}
