use crate::error::{ExportError, Result};
use crate::types::{BoundingBox, Dataset, GeoPoint, LayerStyle};
use std::collections::HashMap;
use tracing::debug;

/// Which points count as visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Viewport {
    /// Every point of every enabled layer, regardless of position.
    IncludeAll,
    /// Only points strictly inside the box.
    Within(BoundingBox),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleLayer {
    pub name: String,
    pub style: LayerStyle,
    pub points: Vec<GeoPoint>,
}

/// Filter enabled layers down to their visible points.
///
/// Layers that end up with no points are left out entirely. Errors with
/// [`ExportError::NoVisibleData`] when nothing at all survives.
pub fn filter_visible(
    dataset: &Dataset,
    styles: &HashMap<String, LayerStyle>,
    viewport: &Viewport,
) -> Result<Vec<VisibleLayer>> {
    if let Viewport::Within(bbox) = viewport {
        bbox.validate()?;
    }

    let mut visible = Vec::new();

    for layer in &dataset.layers {
        let style = styles.get(&layer.name).copied().unwrap_or_default();
        if !style.visible {
            continue;
        }

        let points: Vec<GeoPoint> = match viewport {
            Viewport::IncludeAll => layer.points.clone(),
            Viewport::Within(bbox) => layer
                .points
                .iter()
                .filter(|p| bbox.contains(p))
                .copied()
                .collect(),
        };

        debug!("Layer '{}': {}/{} points visible", layer.name, points.len(), layer.points.len());
        if points.is_empty() {
            continue;
        }

        visible.push(VisibleLayer {
            name: layer.name.clone(),
            style,
            points,
        });
    }

    if visible.is_empty() {
        return Err(ExportError::NoVisibleData);
    }
    Ok(visible)
}
