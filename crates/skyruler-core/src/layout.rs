//! Label placement for measurement endpoints.
//!
//! Coordinate labels are pushed outward along the measurement line,
//! further for diagonal and near-horizontal lines, and sideways for
//! near-vertical ones. A single collision pass then nudges them off any
//! rectangle dimension label, which always keeps its position.
//!
//! Label positions are the *centres* of their boxes. The pass is a local
//! heuristic for the two-label / two-dimension-label case; it does not
//! guarantee a collision-free result in general.

use std::f64::consts::FRAC_PI_2;

use crate::config::OverlayConfig;
use crate::types::{Point, Rect};

/// Lines within this angle of horizontal get the extra horizontal offset.
const NEARLY_HORIZONTAL_DEG: f64 = 22.5;
/// Lines within this angle of vertical get the lateral offset.
const NEARLY_VERTICAL_DEG: f64 = 15.0;
/// End labels sit this much further out than start labels.
const END_LABEL_FACTOR: f64 = 1.5;
/// Maximum extra offset for exactly horizontal lines, in base distances.
const HORIZONTAL_BOOST_FACTOR: f64 = 3.5;
/// Sideways offset for near-vertical lines (px).
const VERTICAL_LATERAL_OFFSET: f64 = 15.0;
/// Gap between a rectangle edge and its dimension label (px).
const DIMENSION_LABEL_GAP: f64 = 15.0;

/// What a label box belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Endpoint coordinate label; may be moved.
    Point,
    /// Rectangle width/height label; never moved.
    Dimension,
}

/// An axis-aligned label footprint used during collision resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelBoundingBox {
    /// Footprint in overlay coordinates.
    pub rect: Rect,
    /// Higher priority labels stay put.
    pub priority: u8,
    /// Label category.
    pub kind: LabelKind,
}

impl LabelBoundingBox {
    fn point(center: Point, config: &OverlayConfig) -> Self {
        Self {
            rect: Rect::centered(center, config.point_label_width, config.point_label_height),
            priority: 0,
            kind: LabelKind::Point,
        }
    }

    fn dimension(center: Point, config: &OverlayConfig) -> Self {
        Self {
            rect: Rect::centered(
                center,
                config.dimension_label_width,
                config.dimension_label_height,
            ),
            priority: 1,
            kind: LabelKind::Dimension,
        }
    }
}

/// Laid-out positions of the two coordinate labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPlacement {
    /// Centre of the start label.
    pub start: Point,
    /// Centre of the end label.
    pub end: Point,
}

/// Anchors of the two rectangle dimension labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionAnchors {
    /// Width label, centred below the lower edge.
    pub width: Point,
    /// Height label, centred right of the right-hand edge.
    pub height: Point,
}

/// Dimension label anchors for the rectangle spanned by two endpoints.
#[must_use]
pub fn dimension_anchors(start: Point, end: Point, config: &OverlayConfig) -> DimensionAnchors {
    let rect = Rect::spanning(start, end);
    let center = rect.center();
    DimensionAnchors {
        width: Point::new(
            center.x,
            rect.max_y() + DIMENSION_LABEL_GAP + config.dimension_label_height / 2.0,
        ),
        height: Point::new(
            rect.max_x() + DIMENSION_LABEL_GAP + config.dimension_label_width / 2.0,
            center.y,
        ),
    }
}

/// Compute positions for the start and end coordinate labels.
///
/// `dimension_labels` are the anchors of any fixed labels to avoid
/// (the rectangle width/height labels); pass an empty slice otherwise.
#[must_use]
pub fn layout_point_labels(
    start: Point,
    end: Point,
    dimension_labels: &[Point],
    config: &OverlayConfig,
) -> LabelPlacement {
    let (dx, dy) = start.delta_to(end);
    let length = dx.hypot(dy);
    // A zero-length line reads as horizontal: start left, end right.
    let (ux, uy) = if length > f64::EPSILON {
        (dx / length, dy / length)
    } else {
        (1.0, 0.0)
    };
    let angle = uy.atan2(ux);

    // Deviation from horizontal, folded into [0, π/2].
    let from_horizontal = {
        let a = angle.abs();
        a.min(std::f64::consts::PI - a)
    };
    let from_vertical = (FRAC_PI_2 - from_horizontal).abs();
    let nearly_horizontal_limit = NEARLY_HORIZONTAL_DEG.to_radians();
    let nearly_horizontal = from_horizontal <= nearly_horizontal_limit;
    let nearly_vertical = from_vertical <= NEARLY_VERTICAL_DEG.to_radians();

    let base = config.label_distance;
    let diagonal_boost = (2.0 * angle).sin().abs() * base;
    let horizontal_boost = if nearly_horizontal {
        let closeness = 1.0 - from_horizontal / nearly_horizontal_limit;
        HORIZONTAL_BOOST_FACTOR * base * closeness
    } else {
        0.0
    };

    let start_offset = base + config.point_radius + diagonal_boost + horizontal_boost;
    let end_offset =
        END_LABEL_FACTOR.mul_add(base, config.point_radius) + diagonal_boost + horizontal_boost;

    let mut start_label = start.offset(-ux * start_offset, -uy * start_offset);
    let mut end_label = end.offset(ux * end_offset, uy * end_offset);

    if nearly_vertical {
        // Perpendicular to the line; start and end go to opposite sides.
        let (nx, ny) = (-uy, ux);
        start_label = start_label.offset(nx * VERTICAL_LATERAL_OFFSET, ny * VERTICAL_LATERAL_OFFSET);
        end_label = end_label.offset(-nx * VERTICAL_LATERAL_OFFSET, -ny * VERTICAL_LATERAL_OFFSET);
    }

    let fixed: Vec<LabelBoundingBox> = dimension_labels
        .iter()
        .map(|&anchor| LabelBoundingBox::dimension(anchor, config))
        .collect();

    LabelPlacement {
        start: resolve_collisions(start_label, &fixed, config),
        end: resolve_collisions(end_label, &fixed, config),
    }
}

/// Nudge one point label off each higher-priority box it overlaps.
///
/// Moves along the axis with the smaller overlap, away from the fixed
/// box's centre.
fn resolve_collisions(center: Point, fixed: &[LabelBoundingBox], config: &OverlayConfig) -> Point {
    let mut label = LabelBoundingBox::point(center, config);
    for other in fixed {
        if other.priority <= label.priority {
            continue;
        }
        let Some((overlap_x, overlap_y)) = label.rect.overlap(&other.rect) else {
            continue;
        };
        let ours = label.rect.center();
        let theirs = other.rect.center();
        if overlap_x < overlap_y {
            let direction = if ours.x < theirs.x { -1.0 } else { 1.0 };
            label.rect.x += direction * overlap_x;
        } else {
            let direction = if ours.y < theirs.y { -1.0 } else { 1.0 };
            label.rect.y += direction * overlap_y;
        }
    }
    label.rect.center()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OverlayConfig {
        OverlayConfig::default()
    }

    #[test]
    fn horizontal_line_puts_start_left_and_end_right() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(200.0, 100.0);
        let placement = layout_point_labels(start, end, &[], &config());
        assert!(placement.start.x < start.x);
        assert!(placement.end.x > end.x);
        assert!((placement.start.y - 100.0).abs() < 1e-9);
        assert!((placement.end.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn horizontal_labels_clear_the_line() {
        // Exactly horizontal: 20 + 5 + 70 = 95 px out, more than half the
        // 150 px label width, so the box does not cover the endpoint.
        let start = Point::new(300.0, 100.0);
        let end = Point::new(400.0, 100.0);
        let placement = layout_point_labels(start, end, &[], &config());
        assert!((start.x - placement.start.x - 95.0).abs() < 1e-9);
        assert!((placement.end.x - end.x - 105.0).abs() < 1e-9);
        assert!(start.x - placement.start.x > 75.0);
    }

    #[test]
    fn end_label_sits_further_out_than_start() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(300.0, 300.0);
        let placement = layout_point_labels(start, end, &[], &config());
        let start_gap = placement.start.distance(start);
        let end_gap = placement.end.distance(end);
        assert!(end_gap > start_gap);
        // 45°: diagonal boost is a full base distance, no horizontal boost.
        assert!((start_gap - 45.0).abs() < 1e-9, "start gap {start_gap}");
        assert!((end_gap - 55.0).abs() < 1e-9, "end gap {end_gap}");
    }

    #[test]
    fn vertical_line_offsets_labels_to_opposite_sides() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(100.0, 300.0);
        let placement = layout_point_labels(start, end, &[], &config());
        assert!(placement.start.y < start.y);
        assert!(placement.end.y > end.y);
        let start_side = placement.start.x - 100.0;
        let end_side = placement.end.x - 100.0;
        assert!((start_side.abs() - 15.0).abs() < 1e-9);
        assert!((end_side.abs() - 15.0).abs() < 1e-9);
        assert!(start_side * end_side < 0.0, "labels must be on opposite sides");
    }

    #[test]
    fn zero_length_line_is_treated_as_horizontal() {
        let p = Point::new(50.0, 50.0);
        let placement = layout_point_labels(p, p, &[], &config());
        assert!(placement.start.x < p.x);
        assert!(placement.end.x > p.x);
    }

    #[test]
    fn dimension_anchors_sit_below_and_right() {
        let anchors = dimension_anchors(Point::new(300.0, 200.0), Point::new(100.0, 100.0), &config());
        assert!((anchors.width.x - 200.0).abs() < 1e-9);
        assert!(anchors.width.y > 200.0);
        assert!(anchors.height.x > 300.0);
        assert!((anchors.height.y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn point_label_moves_off_dimension_label() {
        let config = config();
        // Steep line whose end label lands near a dimension label.
        let start = Point::new(100.0, 100.0);
        let end = Point::new(110.0, 200.0);
        let unobstructed = layout_point_labels(start, end, &[], &config);
        let obstacle = unobstructed.end.offset(0.0, 5.0);
        let placement = layout_point_labels(start, end, &[obstacle], &config);

        let label = Rect::centered(placement.end, config.point_label_width, config.point_label_height);
        let fixed = Rect::centered(
            obstacle,
            config.dimension_label_width,
            config.dimension_label_height,
        );
        assert!(
            label.overlap(&fixed).is_none_or(|(_, oy)| oy < 1e-9),
            "collision must be resolved"
        );
        assert!((unobstructed.end.y - placement.end.y - 15.0).abs() < 1e-9);
        // Vertical overlap (15 px) is smaller than horizontal (60 px), so
        // the label moves up, away from the obstacle below it.
        assert!((placement.end.x - unobstructed.end.x).abs() < 1e-9);
        assert!(placement.end.y < unobstructed.end.y);
    }

    #[test]
    fn non_overlapping_dimension_labels_are_ignored() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(200.0, 100.0);
        let far = Point::new(1000.0, 1000.0);
        assert_eq!(
            layout_point_labels(start, end, &[far], &config()),
            layout_point_labels(start, end, &[], &config()),
        );
    }
}
