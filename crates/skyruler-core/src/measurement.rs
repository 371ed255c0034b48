//! Measurement records.
//!
//! A [`FinalizedMeasurement`] owns its two [`MeasurementPoint`]s outright;
//! edits always go through methods that keep the derived data (distance
//! label, label layout, rectangle dimensions) in step with the geometry.

use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::angle::{format_angle, format_coordinates_compact, format_distance, format_pixels};
use crate::config::OverlayConfig;
use crate::layout::{dimension_anchors, layout_point_labels};
use crate::transform::{CoordinateTransform, angular_distance};
use crate::types::{Celestial, Point, Rect};

/// One endpoint of a measurement.
///
/// Celestial fields are absent whenever no plate solution was available
/// or the transform could not resolve the pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    /// Horizontal overlay position (px).
    pub x: f64,
    /// Vertical overlay position (px).
    pub y: f64,
    /// Right ascension in hours.
    pub ra: Option<f64>,
    /// Declination in degrees.
    pub dec: Option<f64>,
}

impl MeasurementPoint {
    /// Create a point with optional celestial coordinates.
    #[must_use]
    pub fn new(position: Point, celestial: Option<Celestial>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            ra: celestial.map(|c| c.ra),
            dec: celestial.map(|c| c.dec),
        }
    }

    /// Create a pixel-only point.
    #[must_use]
    pub const fn pixel(position: Point) -> Self {
        Self {
            x: position.x,
            y: position.y,
            ra: None,
            dec: None,
        }
    }

    /// Overlay position.
    #[must_use]
    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Celestial coordinate, if both components are present.
    #[must_use]
    pub fn celestial(&self) -> Option<Celestial> {
        Some(Celestial::new(self.ra?, self.dec?))
    }

    /// Move without touching the celestial fields.
    pub const fn set_position(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }

    /// Replace the celestial fields.
    pub fn set_celestial(&mut self, celestial: Option<Celestial>) {
        self.ra = celestial.map(|c| c.ra);
        self.dec = celestial.map(|c| c.dec);
    }

    /// Compact sexagesimal label, empty without coordinates.
    #[must_use]
    pub fn coordinate_label(&self) -> String {
        format_coordinates_compact(self.ra, self.dec)
    }
}

/// Optional shape drawn around a measurement.
///
/// A single enum keeps circle and rectangle mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeMode {
    /// Plain line.
    #[default]
    None,
    /// Circle centred on the start point through the end point.
    Circle,
    /// Axis-aligned rectangle spanned by the endpoints.
    Rectangle,
}

impl ShapeMode {
    /// Stored preference value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
        }
    }

    /// Parse a stored preference value.
    #[must_use]
    pub fn from_preference(value: &str) -> Option<Self> {
        match value.trim() {
            "none" => Some(Self::None),
            "circle" => Some(Self::Circle),
            "rectangle" => Some(Self::Rectangle),
            _ => None,
        }
    }

    /// Result of pressing the `requested` shape toggle in this mode.
    ///
    /// Pressing the active shape turns it off; pressing the other one
    /// switches to it.
    #[must_use]
    pub fn toggled(self, requested: Self) -> Self {
        if self == requested { Self::None } else { requested }
    }
}

/// Which part of a measurement a drag moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragTarget {
    /// The start endpoint only.
    StartPoint,
    /// The end endpoint only.
    EndPoint,
    /// Both endpoints together.
    WholeShape,
}

/// Width and height of a rectangle measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectangleDimensions {
    /// Formatted width (angular when resolvable, else pixels).
    pub width_label: String,
    /// Formatted height.
    pub height_label: String,
    /// Angular width, if resolvable.
    pub width_arcseconds: Option<f64>,
    /// Angular height, if resolvable.
    pub height_arcseconds: Option<f64>,
    /// Centre of the width label.
    pub width_anchor: Point,
    /// Centre of the height label.
    pub height_anchor: Point,
}

/// Angular width and height (arcseconds) of the rectangle spanned by
/// two points.
///
/// Samples the transform at the midpoints of opposite edges, so the
/// result follows the local plate scale rather than scaling the
/// diagonal. `None` if any of the four samples fails.
#[must_use]
pub fn rectangle_arcseconds(
    start: Point,
    end: Point,
    transform: &CoordinateTransform<'_>,
) -> Option<(f64, f64)> {
    let rect = Rect::spanning(start, end);
    let center = rect.center();
    let left = transform.point_to_celestial(Point::new(rect.x, center.y))?;
    let right = transform.point_to_celestial(Point::new(rect.max_x(), center.y))?;
    let top = transform.point_to_celestial(Point::new(center.x, rect.y))?;
    let bottom = transform.point_to_celestial(Point::new(center.x, rect.max_y()))?;
    let width = angular_distance(left.ra, left.dec, right.ra, right.dec) * 3600.0;
    let height = angular_distance(top.ra, top.dec, bottom.ra, bottom.dec) * 3600.0;
    Some((width, height))
}

/// A completed two-point measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedMeasurement {
    start_point: MeasurementPoint,
    end_point: MeasurementPoint,
    distance_label: String,
    timestamp_ms: u64,
    start_label_position: Point,
    end_label_position: Point,
    shape_mode: ShapeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimensions: Option<RectangleDimensions>,
}

impl FinalizedMeasurement {
    /// Build a measurement and compute all derived data.
    #[must_use]
    pub fn new(
        start_point: MeasurementPoint,
        end_point: MeasurementPoint,
        shape_mode: ShapeMode,
        timestamp: Duration,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
    ) -> Self {
        let mut measurement = Self {
            start_point,
            end_point,
            distance_label: String::new(),
            timestamp_ms: u64::try_from(timestamp.as_millis()).unwrap_or(u64::MAX),
            start_label_position: start_point.position(),
            end_label_position: end_point.position(),
            shape_mode,
            dimensions: None,
        };
        measurement.refresh(transform, config);
        measurement
    }

    /// Start endpoint.
    #[must_use]
    pub const fn start_point(&self) -> &MeasurementPoint {
        &self.start_point
    }

    /// End endpoint.
    #[must_use]
    pub const fn end_point(&self) -> &MeasurementPoint {
        &self.end_point
    }

    /// Arithmetic mean of the two endpoints.
    #[must_use]
    pub fn midpoint(&self) -> Point {
        self.start_point.position().midpoint(self.end_point.position())
    }

    /// Endpoint separation in pixels.
    #[must_use]
    pub fn pixel_distance(&self) -> f64 {
        self.start_point.position().distance(self.end_point.position())
    }

    /// Formatted distance.
    #[must_use]
    pub fn distance_label(&self) -> &str {
        &self.distance_label
    }

    /// Creation time in milliseconds on the host clock.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Centre of the start coordinate label.
    #[must_use]
    pub const fn start_label_position(&self) -> Point {
        self.start_label_position
    }

    /// Centre of the end coordinate label.
    #[must_use]
    pub const fn end_label_position(&self) -> Point {
        self.end_label_position
    }

    /// Current shape.
    #[must_use]
    pub const fn shape_mode(&self) -> ShapeMode {
        self.shape_mode
    }

    /// Whether the circle is shown.
    #[must_use]
    pub fn show_circle(&self) -> bool {
        self.shape_mode == ShapeMode::Circle
    }

    /// Whether the rectangle is shown.
    #[must_use]
    pub fn show_rectangle(&self) -> bool {
        self.shape_mode == ShapeMode::Rectangle
    }

    /// Rectangle width/height, present only in rectangle mode.
    #[must_use]
    pub const fn dimensions(&self) -> Option<&RectangleDimensions> {
        self.dimensions.as_ref()
    }

    /// Circle radius in pixels (the endpoint distance).
    #[must_use]
    pub fn circle_radius(&self) -> f64 {
        self.pixel_distance()
    }

    /// Rectangle spanned by the endpoints.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        Rect::spanning(self.start_point.position(), self.end_point.position())
    }

    /// Switch shape and refresh derived data.
    pub fn set_shape_mode(
        &mut self,
        shape_mode: ShapeMode,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
    ) {
        self.shape_mode = shape_mode;
        self.refresh(transform, config);
    }

    /// Recompute the distance label, rectangle dimensions and label layout
    /// from the current endpoints.
    pub fn refresh(&mut self, transform: &CoordinateTransform<'_>, config: &OverlayConfig) {
        self.distance_label = format_distance(
            &self.start_point,
            &self.end_point,
            transform.has_plate_solution(),
        );
        self.dimensions = (self.shape_mode == ShapeMode::Rectangle)
            .then(|| self.measure_rectangle(transform, config));
        self.relayout(config);
    }

    /// Recompute only the label layout (pixel geometry changed, celestial
    /// data not yet re-sampled).
    pub fn relayout(&mut self, config: &OverlayConfig) {
        let start = self.start_point.position();
        let end = self.end_point.position();
        let fixed = match &mut self.dimensions {
            Some(dims) => {
                let anchors = dimension_anchors(start, end, config);
                dims.width_anchor = anchors.width;
                dims.height_anchor = anchors.height;
                vec![anchors.width, anchors.height]
            }
            None => Vec::new(),
        };
        let placement = layout_point_labels(start, end, &fixed, config);
        self.start_label_position = placement.start;
        self.end_label_position = placement.end;
    }

    fn measure_rectangle(
        &self,
        transform: &CoordinateTransform<'_>,
        config: &OverlayConfig,
    ) -> RectangleDimensions {
        let start = self.start_point.position();
        let end = self.end_point.position();
        let rect = Rect::spanning(start, end);
        let angular = if transform.has_plate_solution() {
            rectangle_arcseconds(start, end, transform)
        } else {
            None
        };
        let (width_label, height_label) = angular.map_or_else(
            || (format_pixels(rect.width), format_pixels(rect.height)),
            |(w, h)| (format_angle(w), format_angle(h)),
        );
        let anchors = dimension_anchors(start, end, config);
        RectangleDimensions {
            width_label,
            height_label,
            width_arcseconds: angular.map(|(w, _)| w),
            height_arcseconds: angular.map(|(_, h)| h),
            width_anchor: anchors.width,
            height_anchor: anchors.height,
        }
    }

    /// Mutable access to one endpoint.
    pub(crate) const fn endpoint_mut(&mut self, target: DragTarget) -> Option<&mut MeasurementPoint> {
        match target {
            DragTarget::StartPoint => Some(&mut self.start_point),
            DragTarget::EndPoint => Some(&mut self.end_point),
            DragTarget::WholeShape => None,
        }
    }

    /// Replace both endpoints' pixel positions, keeping celestial data.
    pub(crate) const fn set_positions(&mut self, start: Point, end: Point) {
        self.start_point.set_position(start);
        self.end_point.set_position(end);
    }

    /// Which drag handle, if any, lies under `p`.
    ///
    /// Endpoints win over the shape body; the end point wins over the
    /// start point when they overlap.
    #[must_use]
    pub fn hit_test(&self, p: Point, config: &OverlayConfig) -> Option<DragTarget> {
        let start = self.start_point.position();
        let end = self.end_point.position();
        if p.distance(end) <= config.handle_radius {
            return Some(DragTarget::EndPoint);
        }
        if p.distance(start) <= config.handle_radius {
            return Some(DragTarget::StartPoint);
        }
        let inside_shape = match self.shape_mode {
            ShapeMode::None => false,
            ShapeMode::Circle => p.distance(start) <= self.circle_radius(),
            ShapeMode::Rectangle => self.bounding_rect().contains(p),
        };
        if inside_shape || p.distance_to_segment(start, end) <= config.line_grab_distance {
            return Some(DragTarget::WholeShape);
        }
        None
    }

    /// Plain-text summary for copying to the clipboard.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Distance: {}", self.distance_label);
        let start = self.start_point.coordinate_label();
        if !start.is_empty() {
            let _ = writeln!(out, "Start: {start}");
        }
        let end = self.end_point.coordinate_label();
        if !end.is_empty() {
            let _ = writeln!(out, "End: {end}");
        }
        if let Some(dims) = &self.dimensions {
            let _ = writeln!(out, "Size: {} × {}", dims.width_label, dims.height_label);
        }
        out
    }
}
