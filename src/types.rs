use crate::color::Rgb;
use crate::error::{ExportError, Result};
use geo::{BoundingRect, MultiPoint, Point, Rect};
use serde::{Deserialize, Serialize};

/// A WGS-84 position in degrees. `x` is longitude, `y` is latitude.
pub type GeoPoint = Point<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub points: Vec<GeoPoint>,
}

/// Per-session display settings for one layer. Not part of the source data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub visible: bool,
    pub color: Rgb,
}

impl Default for LayerStyle {
    fn default() -> Self {
        LayerStyle {
            visible: true,
            color: Rgb::palette(0),
        }
    }
}

/// All layers parsed from one download, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub layers: Vec<Layer>,
}

impl Dataset {
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn point_count(&self) -> usize {
        self.layers.iter().map(|l| l.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Mean of every loaded point, used to centre the preview map.
    pub fn centroid(&self) -> Option<GeoPoint> {
        let n = self.point_count();
        if n == 0 {
            return None;
        }
        let (sum_lon, sum_lat) = self
            .layers
            .iter()
            .flat_map(|l| l.points.iter())
            .fold((0.0, 0.0), |(x, y), p| (x + p.x(), y + p.y()));
        Some(Point::new(sum_lon / n as f64, sum_lat / n as f64))
    }
}

/// A geographic rectangle with `west < east` and `south < north`.
///
/// Boxes crossing the antimeridian are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self> {
        let bbox = BoundingBox { west, east, south, north };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        let all_finite = [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ExportError::Config(format!("non-finite bounding box {:?}", self)));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(ExportError::Config(format!(
                "degenerate bounding box (west {}, east {}, south {}, north {})",
                self.west, self.east, self.south, self.north
            )));
        }
        Ok(())
    }

    /// Strict containment: points on an edge are outside.
    pub fn contains(&self, p: &GeoPoint) -> bool {
        self.west < p.x() && p.x() < self.east && self.south < p.y() && p.y() < self.north
    }
}

/// The smallest rectangle covering a set of points.
///
/// Unlike [`BoundingBox`] this may have zero width or height, e.g. for a
/// single point.
pub fn extent<'a, I>(points: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    let multi: MultiPoint<f64> = points.into_iter().copied().collect();
    multi.bounding_rect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        CanvasSize { width: 1000, height: 1000 }
    }
}

/// Canvas position, origin top-left, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}
