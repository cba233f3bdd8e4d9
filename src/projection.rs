//! Linear mapping from lon/lat degrees onto a fixed-size canvas.
//!
//! `x = (lon - west) / (east - west) * W`
//! `y = H - (lat - south) / (north - south) * H`
//!
//! North is up, so latitude is flipped into image coordinates. When an
//! axis has zero extent (e.g. a dataset with one unique point) every point
//! lands on the middle of the canvas along that axis.

use crate::error::{ExportError, Result};
use crate::types::{extent, BoundingBox, CanvasPoint, CanvasSize, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    west: f64,
    south: f64,
    // None on a zero-extent axis
    lon_span: Option<f64>,
    lat_span: Option<f64>,
    canvas: CanvasSize,
}

impl Projector {
    /// Project against a viewport. The box must be non-degenerate.
    pub fn new(bbox: &BoundingBox, canvas: CanvasSize) -> Result<Self> {
        bbox.validate()?;
        check_canvas(canvas)?;
        Ok(Projector {
            west: bbox.west,
            south: bbox.south,
            lon_span: Some(bbox.east - bbox.west),
            lat_span: Some(bbox.north - bbox.south),
            canvas,
        })
    }

    /// Project against the extent of `points`, so all of them land on the
    /// canvas. Zero-extent axes fall back to the canvas centre.
    pub fn fit<'a, I>(points: I, canvas: CanvasSize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        check_canvas(canvas)?;
        let rect = extent(points)
            .ok_or_else(|| ExportError::Config("cannot fit a projection to zero points".to_string()))?;
        let span = |d: f64| if d > 0.0 && d.is_finite() { Some(d) } else { None };
        Ok(Projector {
            west: rect.min().x,
            south: rect.min().y,
            lon_span: span(rect.width()),
            lat_span: span(rect.height()),
            canvas,
        })
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn project(&self, p: &GeoPoint) -> CanvasPoint {
        let w = f64::from(self.canvas.width);
        let h = f64::from(self.canvas.height);
        let x = match self.lon_span {
            Some(span) => (p.x() - self.west) / span * w,
            None => w / 2.0,
        };
        let y = match self.lat_span {
            Some(span) => h - (p.y() - self.south) / span * h,
            None => h / 2.0,
        };
        CanvasPoint { x, y }
    }

    pub fn project_all(&self, points: &[GeoPoint]) -> Vec<CanvasPoint> {
        points.iter().map(|p| self.project(p)).collect()
    }
}

fn check_canvas(canvas: CanvasSize) -> Result<()> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(ExportError::Config(format!(
            "canvas must be non-empty, got {}x{}",
            canvas.width, canvas.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn close(a: CanvasPoint, x: f64, y: f64) -> bool {
        (a.x - x).abs() < EPS && (a.y - y).abs() < EPS
    }

    fn viewport() -> Projector {
        let bbox = BoundingBox::new(140.0, 155.0, -40.0, -30.0).unwrap();
        Projector::new(&bbox, CanvasSize::default()).unwrap()
    }

    #[test]
    fn corners_and_centre() {
        let p = viewport();
        assert!(close(p.project(&Point::new(140.0, -40.0)), 0.0, 1000.0));
        assert!(close(p.project(&Point::new(155.0, -30.0)), 1000.0, 0.0));
        assert!(close(p.project(&Point::new(147.5, -35.0)), 500.0, 500.0));
    }

    #[test]
    fn non_square_canvas() {
        let bbox = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let p = Projector::new(&bbox, CanvasSize { width: 200, height: 100 }).unwrap();
        assert!(close(p.project(&Point::new(10.0, 0.0)), 200.0, 100.0));
    }

    #[test]
    fn degenerate_viewport_is_config_error() {
        let flat = BoundingBox { west: 1.0, east: 1.0, south: 0.0, north: 2.0 };
        assert!(matches!(
            Projector::new(&flat, CanvasSize::default()),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn zero_canvas_is_config_error() {
        let bbox = BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(Projector::new(&bbox, CanvasSize { width: 0, height: 10 }).is_err());
    }

    #[test]
    fn single_point_lands_in_centre() {
        let pts = vec![Point::new(151.2, -33.8), Point::new(151.2, -33.8)];
        let p = Projector::fit(&pts, CanvasSize::default()).unwrap();
        assert!(close(p.project(&pts[0]), 500.0, 500.0));
    }

    #[test]
    fn one_flat_axis_centres_only_that_axis() {
        let pts = vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)];
        let p = Projector::fit(&pts, CanvasSize::default()).unwrap();
        assert!(close(p.project(&pts[0]), 0.0, 500.0));
        assert!(close(p.project(&pts[1]), 1000.0, 500.0));
    }

    #[test]
    fn fit_with_no_points_is_config_error() {
        let none: Vec<GeoPoint> = Vec::new();
        assert!(matches!(
            Projector::fit(&none, CanvasSize::default()),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn sample_points_are_distinct_and_on_canvas() {
        let p = viewport();
        let out = p.project_all(&[Point::new(151.2, -33.8), Point::new(144.9, -37.8)]);
        assert_ne!(out[0], out[1]);
        for c in out {
            assert!((0.0..=1000.0).contains(&c.x) && (0.0..=1000.0).contains(&c.y));
        }
    }

    fn bbox_strategy() -> impl Strategy<Value = BoundingBox> {
        (-180.0f64..170.0, 0.01f64..10.0, -90.0f64..80.0, 0.01f64..10.0).prop_map(
            |(west, w, south, h)| BoundingBox { west, east: west + w, south, north: south + h },
        )
    }

    proptest! {
        #[test]
        fn inside_points_stay_on_canvas(
            bbox in bbox_strategy(),
            fx in 0.0f64..=1.0,
            fy in 0.0f64..=1.0,
            width in 1u32..4000,
            height in 1u32..4000,
        ) {
            let canvas = CanvasSize { width, height };
            let p = Projector::new(&bbox, canvas).unwrap();
            let geo = Point::new(
                bbox.west + fx * (bbox.east - bbox.west),
                bbox.south + fy * (bbox.north - bbox.south),
            );
            let c = p.project(&geo);
            let tol = 1e-6;
            prop_assert!(c.x >= -tol && c.x <= f64::from(width) + tol);
            prop_assert!(c.y >= -tol && c.y <= f64::from(height) + tol);
        }

        #[test]
        fn projection_is_monotonic(
            bbox in bbox_strategy(),
            a in (0.0f64..1.0, 0.0f64..1.0),
            b in (0.0f64..1.0, 0.0f64..1.0),
        ) {
            let p = Projector::new(&bbox, CanvasSize::default()).unwrap();
            let at = |(fx, fy): (f64, f64)| Point::new(
                bbox.west + fx * (bbox.east - bbox.west),
                bbox.south + fy * (bbox.north - bbox.south),
            );
            let (ga, gb) = (at(a), at(b));
            let (ca, cb) = (p.project(&ga), p.project(&gb));
            // east is right, north is up
            if ga.x() < gb.x() { prop_assert!(ca.x <= cb.x); }
            if ga.y() < gb.y() { prop_assert!(ca.y >= cb.y); }
        }

        #[test]
        fn projection_is_order_independent(
            pts in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 2..30),
        ) {
            let pts: Vec<GeoPoint> = pts.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            let mut reversed = pts.clone();
            reversed.reverse();
            let forward = Projector::fit(&pts, CanvasSize::default()).unwrap();
            let backward = Projector::fit(&reversed, CanvasSize::default()).unwrap();
            for p in &pts {
                prop_assert_eq!(forward.project(p), backward.project(p));
            }
        }

        #[test]
        fn fitted_points_never_leave_canvas(
            pts in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 1..30),
        ) {
            let pts: Vec<GeoPoint> = pts.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            let p = Projector::fit(&pts, CanvasSize::default()).unwrap();
            for c in p.project_all(&pts) {
                prop_assert!(c.x.is_finite() && c.y.is_finite());
                prop_assert!((-1e-6..=1000.0 + 1e-6).contains(&c.x));
                prop_assert!((-1e-6..=1000.0 + 1e-6).contains(&c.y));
            }
        }
    }
}
