//! SVG export serializer.
//!
//! Renders the measurement overlay into an SVG string using the [`svg`]
//! crate for document construction and XML escaping. The document uses
//! overlay pixels as its coordinate system, so it can be laid directly
//! over a screenshot of the viewport.
//!
//! Each measurement becomes a `<g>` holding its line, endpoint markers,
//! optional circle or rectangle, and labels at their laid-out positions.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::{Circle, Description, Element, Group, Line, Rectangle, Title};
use svg::node::{Node, Text};

use skyruler_core::session::Preview;
use skyruler_core::{FinalizedMeasurement, MeasurementPoint, OverlayConfig, Point, ShapeMode, Size};

const LINE_COLOR: &str = "#ffd400";
const SHAPE_COLOR: &str = "#4fc3f7";
const LABEL_COLOR: &str = "white";
const FONT_SIZE: u32 = 12;
/// Distance labels sit this far above the midpoint (px).
const DISTANCE_LABEL_RISE: f64 = 8.0;

/// Metadata to embed in the SVG document.
///
/// When present, a `<title>` and/or `<desc>` element is emitted
/// immediately after the opening `<svg>` tag.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,
}

/// A `<text>` element centred on `at`.
fn label(at: Point, content: &str, class: &str) -> Element {
    let mut text = Element::new("text");
    text.assign("x", at.x);
    text.assign("y", at.y);
    text.assign("class", class);
    text.assign("text-anchor", "middle");
    text.assign("dominant-baseline", "middle");
    text.assign("font-size", FONT_SIZE);
    text.assign("fill", LABEL_COLOR);
    text.append(Text::new(content));
    text
}

fn segment(start: Point, end: Point) -> Line {
    Line::new()
        .set("x1", start.x)
        .set("y1", start.y)
        .set("x2", end.x)
        .set("y2", end.y)
        .set("stroke", LINE_COLOR)
        .set("stroke-width", 2)
}

fn marker(p: Point, radius: f64) -> Circle {
    Circle::new()
        .set("cx", p.x)
        .set("cy", p.y)
        .set("r", radius)
        .set("fill", LINE_COLOR)
}

fn coordinate_label(group: Group, point: &MeasurementPoint, at: Point) -> Group {
    let text = point.coordinate_label();
    if text.is_empty() {
        group
    } else {
        group.add(label(at, &text, "coordinates"))
    }
}

fn measurement_group(index: usize, m: &FinalizedMeasurement, config: &OverlayConfig) -> Group {
    let start = m.start_point().position();
    let end = m.end_point().position();
    let mut group = Group::new()
        .set("id", format!("measurement-{index}"))
        .set("class", "measurement");

    match m.shape_mode() {
        ShapeMode::None => {}
        ShapeMode::Circle => {
            group = group.add(
                Circle::new()
                    .set("cx", start.x)
                    .set("cy", start.y)
                    .set("r", m.circle_radius())
                    .set("fill", "none")
                    .set("stroke", SHAPE_COLOR)
                    .set("stroke-dasharray", "6 4"),
            );
        }
        ShapeMode::Rectangle => {
            let rect = m.bounding_rect();
            group = group.add(
                Rectangle::new()
                    .set("x", rect.x)
                    .set("y", rect.y)
                    .set("width", rect.width)
                    .set("height", rect.height)
                    .set("fill", "none")
                    .set("stroke", SHAPE_COLOR)
                    .set("stroke-dasharray", "6 4"),
            );
        }
    }

    group = group
        .add(segment(start, end))
        .add(marker(start, config.point_radius))
        .add(marker(end, config.point_radius))
        .add(label(
            m.midpoint().offset(0.0, -DISTANCE_LABEL_RISE),
            m.distance_label(),
            "distance",
        ));
    group = coordinate_label(group, m.start_point(), m.start_label_position());
    group = coordinate_label(group, m.end_point(), m.end_label_position());

    if let Some(dims) = m.dimensions() {
        group = group
            .add(label(dims.width_anchor, &dims.width_label, "dimension"))
            .add(label(dims.height_anchor, &dims.height_label, "dimension"));
    }
    group
}

fn preview_group(preview: &Preview, config: &OverlayConfig) -> Group {
    let start = preview.start.position();
    let mut group = Group::new()
        .set("id", "preview")
        .add(marker(start, config.point_radius));
    if let Some(end) = preview.end {
        let end = end.position();
        group = group.add(segment(start, end).set("stroke-dasharray", "4 4"));
        if let Some(text) = &preview.distance_label {
            group = group.add(label(
                start.midpoint(end).offset(0.0, -DISTANCE_LABEL_RISE),
                text,
                "distance",
            ));
        }
    }
    group
}

/// Serialize the overlay into an SVG document string.
///
/// `viewport` sets the document size and `viewBox`; coordinates are
/// emitted unchanged. `preview` is the unfinished measurement, if any.
///
/// # Examples
///
/// ```
/// use skyruler_core::{OverlayConfig, Size};
/// use skyruler_export::{SvgMetadata, to_svg};
///
/// let svg = to_svg(&[], None, Size::new(640.0, 480.0), &OverlayConfig::default(), &SvgMetadata::default());
/// assert!(svg.contains("viewBox=\"0 0 640 480\""));
/// ```
#[must_use]
pub fn to_svg(
    measurements: &[FinalizedMeasurement],
    preview: Option<&Preview>,
    viewport: Size,
    config: &OverlayConfig,
    metadata: &SvgMetadata<'_>,
) -> String {
    let mut doc = Document::new()
        .set("width", viewport.width)
        .set("height", viewport.height)
        .set("viewBox", (0, 0, viewport.width, viewport.height))
        .set("font-family", "sans-serif");

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    for (index, m) in measurements.iter().enumerate() {
        doc = doc.add(measurement_group(index, m, config));
    }
    if let Some(preview) = preview {
        doc = doc.add(preview_group(preview, config));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use skyruler_core::{Celestial, CoordinateTransform, ImageBounds, Rect};

    use super::*;

    fn bounds() -> ImageBounds {
        ImageBounds {
            rect: Rect::new(0.0, 0.0, 800.0, 600.0),
            natural: Size::new(800.0, 600.0),
        }
    }

    fn measurement(shape: ShapeMode, solved: bool) -> FinalizedMeasurement {
        let bounds = bounds();
        let projection = |p: Point| Some(Celestial::new(p.x / 54_000.0, p.y / 3600.0));
        let transform = if solved {
            CoordinateTransform::new(Some(&projection), &bounds)
        } else {
            CoordinateTransform::new(None, &bounds)
        };
        FinalizedMeasurement::new(
            transform.sample(Point::new(100.0, 100.0)),
            transform.sample(Point::new(250.0, 180.0)),
            shape,
            Duration::ZERO,
            &transform,
            &OverlayConfig::default(),
        )
    }

    fn render(measurements: &[FinalizedMeasurement]) -> String {
        to_svg(
            measurements,
            None,
            Size::new(800.0, 600.0),
            &OverlayConfig::default(),
            &SvgMetadata::default(),
        )
    }

    #[test]
    fn empty_overlay_is_valid_document() {
        let svg = render(&[]);
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
        assert!(!svg.contains("<g"));
    }

    #[test]
    fn line_measurement_renders_line_markers_and_label() {
        let svg = render(&[measurement(ShapeMode::None, false)]);
        assert!(svg.contains("id=\"measurement-0\""));
        assert!(svg.contains("<line"));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("170 px"));
        assert!(!svg.contains("<rect"));
        assert!(!svg.contains("class=\"coordinates\""));
    }

    #[test]
    fn circle_and_rectangle_shapes() {
        let svg = render(&[measurement(ShapeMode::Circle, false)]);
        assert_eq!(svg.matches("<circle").count(), 3);

        let svg = render(&[measurement(ShapeMode::Rectangle, false)]);
        assert!(svg.contains("<rect"));
        assert!(svg.contains("150 px"));
        assert!(svg.contains("80 px"));
        assert_eq!(svg.matches("class=\"dimension\"").count(), 2);
    }

    #[test]
    fn solved_measurement_has_coordinate_labels() {
        let svg = render(&[measurement(ShapeMode::None, true)]);
        assert_eq!(svg.matches("class=\"coordinates\"").count(), 2);
        assert!(svg.contains("00h 00m 07s"));
    }

    #[test]
    fn metadata_is_escaped() {
        let svg = to_svg(
            &[],
            None,
            Size::new(10.0, 10.0),
            &OverlayConfig::default(),
            &SvgMetadata {
                title: Some("M31 & friends"),
                description: Some("<field>"),
            },
        );
        assert!(svg.contains("<title>M31 &amp; friends</title>"));
        assert!(svg.contains("&lt;field&gt;"));
    }

    #[test]
    fn preview_is_dashed() {
        let preview = Preview {
            start: MeasurementPoint::pixel(Point::new(10.0, 10.0)),
            end: Some(MeasurementPoint::pixel(Point::new(40.0, 50.0))),
            distance_label: Some("50 px".to_owned()),
        };
        let svg = to_svg(
            &[],
            Some(&preview),
            Size::new(100.0, 100.0),
            &OverlayConfig::default(),
            &SvgMetadata::default(),
        );
        assert!(svg.contains("id=\"preview\""));
        assert!(svg.contains("stroke-dasharray=\"4 4\""));
        assert!(svg.contains("50 px"));
    }
}
