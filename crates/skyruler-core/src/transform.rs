//! Pixel to celestial coordinate transform.
//!
//! A plate solution arrives from the host as a [`PlateSolvingMatrix`]: a
//! rectangle of the natural image, a grid spacing, and two row-major
//! sample grids holding right ascension and declination (both degrees)
//! at every grid node. [`PlateSolution`] is the validated form of that
//! record and answers lookups by bilinear interpolation.
//!
//! [`CoordinateTransform`] binds a projection to the host's image
//! geometry so callers can work purely in overlay coordinates.
//!
//! Nothing here ever fails loudly: an unusable matrix or an unresolvable
//! point simply yields `None`, and callers degrade to pixel-only output.

use serde::{Deserialize, Serialize};

use crate::host::ImageGeometry;
use crate::measurement::MeasurementPoint;
use crate::types::{Celestial, ImageBounds, Point};

/// Raw plate-solving record supplied by the host.
///
/// Valid only if all four fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateSolvingMatrix {
    /// `"x0,y0,x1,y1"` in natural image pixels.
    #[serde(default)]
    pub matrix_rect: Option<String>,
    /// Grid spacing in natural image pixels.
    #[serde(default)]
    pub matrix_delta: Option<f64>,
    /// Comma-separated right ascension samples (degrees), row-major.
    #[serde(default)]
    pub ra_matrix: Option<String>,
    /// Comma-separated declination samples (degrees), row-major.
    #[serde(default)]
    pub dec_matrix: Option<String>,
}

impl PlateSolvingMatrix {
    /// Returns `true` if every field is present.
    ///
    /// A record with any field missing is treated as entirely absent.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.matrix_rect.is_some()
            && self.matrix_delta.is_some()
            && self.ra_matrix.is_some()
            && self.dec_matrix.is_some()
    }
}

/// Why a [`PlateSolvingMatrix`] could not be used.
///
/// These never reach the user; the overlay logs them and falls back to
/// pixel-only mode.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatrixError {
    /// A required field was absent.
    #[error("plate-solving matrix is missing `{0}`")]
    MissingField(&'static str),

    /// The rectangle was not four finite numbers with positive extent.
    #[error("invalid matrix rectangle: {0:?}")]
    InvalidRect(String),

    /// The grid spacing was not a positive finite number.
    #[error("invalid matrix delta: {0}")]
    InvalidDelta(f64),

    /// A sample could not be parsed as a finite number.
    #[error("invalid sample {value:?} in `{field}`")]
    InvalidSample {
        /// Which grid the sample belongs to.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// A grid did not have one sample per node.
    #[error("`{field}` has {actual} samples, expected {expected}")]
    SampleCount {
        /// Which grid was wrong.
        field: &'static str,
        /// `columns * rows`.
        expected: usize,
        /// Samples actually present.
        actual: usize,
    },
}

/// Something that maps natural image pixels to the sky.
///
/// [`PlateSolution`] is the production implementation; tests can plug in
/// closed-form projections.
pub trait SkyProjection {
    /// Celestial coordinate at a natural image pixel, or `None` if the
    /// pixel lies outside the solved region.
    fn natural_to_celestial(&self, natural: Point) -> Option<Celestial>;
}

impl<F> SkyProjection for F
where
    F: Fn(Point) -> Option<Celestial>,
{
    fn natural_to_celestial(&self, natural: Point) -> Option<Celestial> {
        self(natural)
    }
}

/// A validated interpolation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateSolution {
    origin: Point,
    delta: f64,
    columns: usize,
    rows: usize,
    ra_degrees: Vec<f64>,
    dec_degrees: Vec<f64>,
}

impl PlateSolution {
    /// Validate and parse a host matrix.
    ///
    /// # Errors
    ///
    /// Returns a [`MatrixError`] describing the first problem found.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_matrix(matrix: &PlateSolvingMatrix) -> Result<Self, MatrixError> {
        let rect = matrix
            .matrix_rect
            .as_deref()
            .ok_or(MatrixError::MissingField("matrixRect"))?;
        let delta = matrix
            .matrix_delta
            .ok_or(MatrixError::MissingField("matrixDelta"))?;
        let ra = matrix
            .ra_matrix
            .as_deref()
            .ok_or(MatrixError::MissingField("raMatrix"))?;
        let dec = matrix
            .dec_matrix
            .as_deref()
            .ok_or(MatrixError::MissingField("decMatrix"))?;

        let corners: Vec<f64> = rect
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| MatrixError::InvalidRect(rect.to_owned()))?;
        let [x0, y0, x1, y1] = corners[..] else {
            return Err(MatrixError::InvalidRect(rect.to_owned()));
        };
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) || x1 <= x0 || y1 <= y0 {
            return Err(MatrixError::InvalidRect(rect.to_owned()));
        }
        if !delta.is_finite() || delta <= 0.0 {
            return Err(MatrixError::InvalidDelta(delta));
        }

        // Node count along one axis; `None` if it does not fit a usize.
        let nodes = |extent: f64| {
            let steps = (extent / delta).floor();
            (steps < usize::MAX as f64)
                .then(|| steps as usize)
                .and_then(|steps| steps.checked_add(1))
        };
        let (Some(columns), Some(rows)) = (nodes(x1 - x0), nodes(y1 - y0)) else {
            return Err(MatrixError::InvalidRect(rect.to_owned()));
        };
        if columns < 2 || rows < 2 {
            return Err(MatrixError::InvalidRect(rect.to_owned()));
        }
        let expected = columns
            .checked_mul(rows)
            .ok_or_else(|| MatrixError::InvalidRect(rect.to_owned()))?;

        let ra_degrees = parse_samples(ra, "raMatrix", expected)?;
        let dec_degrees = parse_samples(dec, "decMatrix", expected)?;

        Ok(Self {
            origin: Point::new(x0, y0),
            delta,
            columns,
            rows,
            ra_degrees,
            dec_degrees,
        })
    }

    /// Grid width in nodes.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Grid height in nodes.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    fn node(&self, column: usize, row: usize) -> (f64, f64) {
        let i = row * self.columns + column;
        (self.ra_degrees[i], self.dec_degrees[i])
    }
}

impl TryFrom<&PlateSolvingMatrix> for PlateSolution {
    type Error = MatrixError;

    fn try_from(matrix: &PlateSolvingMatrix) -> Result<Self, Self::Error> {
        Self::from_matrix(matrix)
    }
}

impl SkyProjection for PlateSolution {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn natural_to_celestial(&self, natural: Point) -> Option<Celestial> {
        let gx = (natural.x - self.origin.x) / self.delta;
        let gy = (natural.y - self.origin.y) / self.delta;
        let max_x = (self.columns - 1) as f64;
        let max_y = (self.rows - 1) as f64;
        if !(0.0..=max_x).contains(&gx) || !(0.0..=max_y).contains(&gy) {
            return None;
        }

        // Clamp so the far edge interpolates within the last cell.
        let col = (gx.floor() as usize).min(self.columns - 2);
        let row = (gy.floor() as usize).min(self.rows - 2);
        let fx = gx - col as f64;
        let fy = gy - row as f64;

        let (ra00, dec00) = self.node(col, row);
        let (ra10, dec10) = self.node(col + 1, row);
        let (ra01, dec01) = self.node(col, row + 1);
        let (ra11, dec11) = self.node(col + 1, row + 1);

        // Unwrap across the 0/360 seam relative to the first corner.
        let ra10 = unwrap_degrees(ra10, ra00);
        let ra01 = unwrap_degrees(ra01, ra00);
        let ra11 = unwrap_degrees(ra11, ra00);

        let ra = bilinear(ra00, ra10, ra01, ra11, fx, fy).rem_euclid(360.0);
        let dec = bilinear(dec00, dec10, dec01, dec11, fx, fy);
        Some(Celestial::new(ra / 15.0, dec))
    }
}

fn parse_samples(
    text: &str,
    field: &'static str,
    expected: usize,
) -> Result<Vec<f64>, MatrixError> {
    let samples = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(MatrixError::InvalidSample {
                field,
                value: s.to_owned(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if samples.len() != expected {
        return Err(MatrixError::SampleCount {
            field,
            expected,
            actual: samples.len(),
        });
    }
    Ok(samples)
}

fn unwrap_degrees(value: f64, reference: f64) -> f64 {
    let diff = value - reference;
    if diff > 180.0 {
        value - 360.0
    } else if diff < -180.0 {
        value + 360.0
    } else {
        value
    }
}

fn bilinear(v00: f64, v10: f64, v01: f64, v11: f64, fx: f64, fy: f64) -> f64 {
    let top = (v10 - v00).mul_add(fx, v00);
    let bottom = (v11 - v01).mul_add(fx, v01);
    (bottom - top).mul_add(fy, top)
}

/// Great-circle distance in degrees between two coordinates.
///
/// Right ascension is an hour angle (0-24 h, converted to radians with
/// `π / 12`); declination is in degrees. Uses the haversine formula,
/// which stays accurate for the small separations typical of a single
/// image.
#[must_use]
pub fn angular_distance(
    ra1_hours: f64,
    dec1_degrees: f64,
    ra2_hours: f64,
    dec2_degrees: f64,
) -> f64 {
    let hour_to_rad = std::f64::consts::PI / 12.0;
    let ra1 = ra1_hours * hour_to_rad;
    let ra2 = ra2_hours * hour_to_rad;
    let dec1 = dec1_degrees.to_radians();
    let dec2 = dec2_degrees.to_radians();

    let half_ddec = ((dec2 - dec1) / 2.0).sin();
    let half_dra = ((ra2 - ra1) / 2.0).sin();
    let a = (dec1.cos() * dec2.cos())
        .mul_add(half_dra * half_dra, half_ddec * half_ddec)
        .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    c.to_degrees()
}

/// Euclidean distance in pixels between two overlay points.
#[must_use]
pub fn pixel_distance(a: Point, b: Point) -> f64 {
    a.distance(b)
}

/// A projection bound to the host's current image geometry.
///
/// Cheap to construct; the overlay builds one per input event so it
/// always sees the latest matrix and image bounds.
#[derive(Clone, Copy)]
pub struct CoordinateTransform<'a> {
    projection: Option<&'a dyn SkyProjection>,
    geometry: &'a dyn ImageGeometry,
}

impl<'a> CoordinateTransform<'a> {
    /// Bind a projection (if any) to the host geometry.
    #[must_use]
    pub fn new(projection: Option<&'a dyn SkyProjection>, geometry: &'a dyn ImageGeometry) -> Self {
        Self {
            projection,
            geometry,
        }
    }

    /// Returns `true` if a plate solution is in effect.
    #[must_use]
    pub fn has_plate_solution(&self) -> bool {
        self.projection.is_some()
    }

    /// Current image bounds from the host.
    #[must_use]
    pub fn image_bounds(&self) -> Option<ImageBounds> {
        self.geometry.image_bounds()
    }

    /// Returns `true` if `p` lies on the displayed image.
    #[must_use]
    pub fn is_on_image(&self, p: Point) -> bool {
        self.image_bounds().is_some_and(|b| b.rect.contains(p))
    }

    /// Celestial coordinate under an overlay point.
    ///
    /// `None` if there is no plate solution, the host image is not on
    /// screen, or the point falls outside the solved region.
    #[must_use]
    pub fn point_to_celestial(&self, p: Point) -> Option<Celestial> {
        let projection = self.projection?;
        let natural = self.image_bounds()?.to_natural(p)?;
        projection.natural_to_celestial(natural)
    }

    /// A fresh [`MeasurementPoint`] at `p`.
    #[must_use]
    pub fn sample(&self, p: Point) -> MeasurementPoint {
        MeasurementPoint::new(p, self.point_to_celestial(p))
    }

    /// Move `point` to `p` and re-sample its celestial coordinates.
    ///
    /// Without a plate solution the previous celestial values are kept
    /// so they survive a transient loss of the matrix; with one, an
    /// unresolvable pixel clears them.
    pub fn resample(&self, point: &mut MeasurementPoint, p: Point) {
        point.set_position(p);
        if self.has_plate_solution() {
            point.set_celestial(self.point_to_celestial(p));
        }
    }
}

/// Map a pixel to the sky from a raw host matrix.
///
/// Parses `matrix` on every call; prefer [`PlateSolution::from_matrix`]
/// plus [`CoordinateTransform`] for repeated lookups.
#[must_use]
pub fn point_to_celestial(
    p: Point,
    matrix: Option<&PlateSolvingMatrix>,
    geometry: &dyn ImageGeometry,
) -> Option<Celestial> {
    let solution = PlateSolution::from_matrix(matrix?).ok()?;
    CoordinateTransform::new(Some(&solution), geometry).point_to_celestial(p)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Rect, Size};

    /// 3x3 grid over natural pixels 0..200, RA increasing with x,
    /// Dec increasing with y.
    fn grid_matrix() -> PlateSolvingMatrix {
        PlateSolvingMatrix {
            matrix_rect: Some("0,0,200,200".to_owned()),
            matrix_delta: Some(100.0),
            ra_matrix: Some("10,11,12, 10,11,12, 10,11,12".to_owned()),
            dec_matrix: Some("20,20,20, 21,21,21, 22,22,22".to_owned()),
        }
    }

    fn identity_bounds() -> ImageBounds {
        ImageBounds {
            rect: Rect::new(0.0, 0.0, 200.0, 200.0),
            natural: Size::new(200.0, 200.0),
        }
    }

    #[test]
    fn complete_matrix_requires_every_field() {
        assert!(grid_matrix().is_complete());
        let missing = PlateSolvingMatrix {
            dec_matrix: None,
            ..grid_matrix()
        };
        assert!(!missing.is_complete());
        assert_eq!(
            PlateSolution::from_matrix(&missing),
            Err(MatrixError::MissingField("decMatrix"))
        );
    }

    #[test]
    fn parse_grid_dimensions() {
        let solution = PlateSolution::from_matrix(&grid_matrix()).unwrap();
        assert_eq!(solution.columns(), 3);
        assert_eq!(solution.rows(), 3);
    }

    #[test]
    fn rejects_bad_rect_delta_and_samples() {
        let bad_rect = PlateSolvingMatrix {
            matrix_rect: Some("0,0,200".to_owned()),
            ..grid_matrix()
        };
        assert!(matches!(
            PlateSolution::from_matrix(&bad_rect),
            Err(MatrixError::InvalidRect(_))
        ));

        let bad_delta = PlateSolvingMatrix {
            matrix_delta: Some(0.0),
            ..grid_matrix()
        };
        assert_eq!(
            PlateSolution::from_matrix(&bad_delta),
            Err(MatrixError::InvalidDelta(0.0))
        );

        let bad_sample = PlateSolvingMatrix {
            ra_matrix: Some("10,11,x,10,11,12,10,11,12".to_owned()),
            ..grid_matrix()
        };
        assert!(matches!(
            PlateSolution::from_matrix(&bad_sample),
            Err(MatrixError::InvalidSample { field: "raMatrix", .. })
        ));

        let short = PlateSolvingMatrix {
            dec_matrix: Some("20,20,20".to_owned()),
            ..grid_matrix()
        };
        assert_eq!(
            PlateSolution::from_matrix(&short),
            Err(MatrixError::SampleCount {
                field: "decMatrix",
                expected: 9,
                actual: 3,
            })
        );
    }

    #[test]
    fn oversized_grid_is_rejected_without_overflow() {
        for rect in ["0,0,1e10,1e10", "0,0,1e30,10", "-1e308,0,1e308,10"] {
            let huge = PlateSolvingMatrix {
                matrix_rect: Some(rect.to_owned()),
                matrix_delta: Some(1.0),
                ..grid_matrix()
            };
            assert!(
                matches!(
                    PlateSolution::from_matrix(&huge),
                    Err(MatrixError::InvalidRect(_))
                ),
                "{rect}"
            );
        }

        // Fits in a usize but can never match the samples supplied.
        let large = PlateSolvingMatrix {
            matrix_rect: Some("0,0,1e6,1e6".to_owned()),
            matrix_delta: Some(1.0),
            ..grid_matrix()
        };
        assert!(matches!(
            PlateSolution::from_matrix(&large),
            Err(MatrixError::SampleCount { field: "raMatrix", .. })
        ));
    }

    #[test]
    fn interpolates_at_nodes_and_between() {
        let solution = PlateSolution::from_matrix(&grid_matrix()).unwrap();
        let c = solution.natural_to_celestial(Point::new(0.0, 0.0)).unwrap();
        assert!((c.ra - 10.0 / 15.0).abs() < 1e-12);
        assert!((c.dec - 20.0).abs() < 1e-12);

        let c = solution.natural_to_celestial(Point::new(150.0, 50.0)).unwrap();
        assert!((c.ra - 11.5 / 15.0).abs() < 1e-12);
        assert!((c.dec - 20.5).abs() < 1e-12);

        // Far corner lies on the grid boundary and still resolves.
        let c = solution.natural_to_celestial(Point::new(200.0, 200.0)).unwrap();
        assert!((c.ra - 12.0 / 15.0).abs() < 1e-12);
        assert!((c.dec - 22.0).abs() < 1e-12);
    }

    #[test]
    fn outside_grid_is_unresolved() {
        let solution = PlateSolution::from_matrix(&grid_matrix()).unwrap();
        assert!(solution.natural_to_celestial(Point::new(-1.0, 10.0)).is_none());
        assert!(solution.natural_to_celestial(Point::new(10.0, 200.5)).is_none());
    }

    #[test]
    fn interpolation_unwraps_ra_seam() {
        let matrix = PlateSolvingMatrix {
            matrix_rect: Some("0,0,100,100".to_owned()),
            matrix_delta: Some(100.0),
            ra_matrix: Some("359,1,359,1".to_owned()),
            dec_matrix: Some("0,0,1,1".to_owned()),
        };
        let solution = PlateSolution::from_matrix(&matrix).unwrap();
        let c = solution.natural_to_celestial(Point::new(50.0, 0.0)).unwrap();
        // Halfway between 359° and 1° is 0°, not 180°.
        assert!(c.ra.abs() < 1e-9 || (c.ra - 24.0).abs() < 1e-9, "ra = {}", c.ra);

        let c = solution.natural_to_celestial(Point::new(25.0, 0.0)).unwrap();
        assert!((c.ra - 359.5 / 15.0).abs() < 1e-9, "ra = {}", c.ra);
    }

    #[test]
    fn transform_maps_through_displayed_bounds() {
        let solution = PlateSolution::from_matrix(&grid_matrix()).unwrap();
        // Image displayed at half size, offset by (50, 50).
        let bounds = ImageBounds {
            rect: Rect::new(50.0, 50.0, 100.0, 100.0),
            natural: Size::new(200.0, 200.0),
        };
        let transform = CoordinateTransform::new(Some(&solution), &bounds);
        let c = transform.point_to_celestial(Point::new(100.0, 100.0)).unwrap();
        assert!((c.ra - 11.0 / 15.0).abs() < 1e-12);
        assert!((c.dec - 21.0).abs() < 1e-12);
        assert!(transform.is_on_image(Point::new(60.0, 60.0)));
        assert!(!transform.is_on_image(Point::new(10.0, 60.0)));
    }

    #[test]
    fn transform_without_projection_resolves_nothing() {
        let bounds = identity_bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        assert!(!transform.has_plate_solution());
        assert!(transform.point_to_celestial(Point::new(10.0, 10.0)).is_none());
        let sample = transform.sample(Point::new(10.0, 10.0));
        assert_eq!(sample.celestial(), None);
    }

    #[test]
    fn resample_keeps_last_values_without_projection() {
        let bounds = identity_bounds();
        let transform = CoordinateTransform::new(None, &bounds);
        let mut point = MeasurementPoint::new(Point::new(0.0, 0.0), Some((1.0, 2.0).into()));
        transform.resample(&mut point, Point::new(5.0, 5.0));
        assert_eq!(point.position(), Point::new(5.0, 5.0));
        assert_eq!(point.celestial(), Some(Celestial::new(1.0, 2.0)));
    }

    #[test]
    fn resample_clears_unresolvable_points() {
        let solution = PlateSolution::from_matrix(&grid_matrix()).unwrap();
        let bounds = identity_bounds();
        let transform = CoordinateTransform::new(Some(&solution), &bounds);
        let mut point = MeasurementPoint::new(Point::new(0.0, 0.0), Some((1.0, 2.0).into()));
        transform.resample(&mut point, Point::new(500.0, 5.0));
        assert_eq!(point.celestial(), None);
    }

    #[test]
    fn raw_matrix_convenience() {
        let bounds = identity_bounds();
        let c = point_to_celestial(Point::new(100.0, 0.0), Some(&grid_matrix()), &bounds).unwrap();
        assert!((c.ra - 11.0 / 15.0).abs() < 1e-12);
        assert!(point_to_celestial(Point::new(100.0, 0.0), None, &bounds).is_none());
        let incomplete = PlateSolvingMatrix::default();
        assert!(point_to_celestial(Point::new(100.0, 0.0), Some(&incomplete), &bounds).is_none());
    }

    #[test]
    fn closures_are_projections() {
        let projection = |p: Point| Some(Celestial::new(p.x, p.y));
        let bounds = identity_bounds();
        let transform = CoordinateTransform::new(Some(&projection), &bounds);
        assert_eq!(
            transform.point_to_celestial(Point::new(3.0, 4.0)),
            Some(Celestial::new(3.0, 4.0))
        );
    }

    // --- angular_distance ---

    #[test]
    fn angular_distance_is_symmetric() {
        let d1 = angular_distance(10.0, 20.0, 11.5, -5.0);
        let d2 = angular_distance(11.5, -5.0, 10.0, 20.0);
        assert!((d1 - d2).abs() < 1e-12);
    }

    #[test]
    fn angular_distance_ra_is_in_hours() {
        // One hour of RA on the equator is 15 degrees.
        assert!((angular_distance(0.0, 0.0, 1.0, 0.0) - 15.0).abs() < 1e-9);
        // Declination is already in degrees.
        assert!((angular_distance(5.0, 10.0, 5.0, 12.5) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn angular_distance_shrinks_with_declination() {
        let expected = 15.0 * 60f64.to_radians().cos();
        let d = angular_distance(0.0, 60.0, 1.0 / 3600.0, 60.0) * 3600.0;
        // Tiny separations follow the small-angle cos(dec) rule.
        assert!((d - expected).abs() < 1e-6, "d = {d}, expected {expected}");
    }

    #[test]
    fn angular_distance_to_self_is_zero() {
        assert!(angular_distance(7.3, -41.2, 7.3, -41.2).abs() < 1e-12);
    }

    #[test]
    fn pixel_distance_examples() {
        assert!((pixel_distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)) - 5.0).abs() < 1e-12);
        assert!((pixel_distance(Point::new(0.0, 0.0), Point::new(3.0, 0.0)) - 3.0).abs() < 1e-12);
        let a = Point::new(1.0, 9.0);
        let b = Point::new(-4.0, 2.0);
        assert!((pixel_distance(a, b) - pixel_distance(b, a)).abs() < f64::EPSILON);
    }
}
