use crate::error::{FormatError, Result};
use crate::markup::Element;
use crate::types::{Dataset, GeoPoint, Layer};
use geo::Point;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};

pub const UNNAMED_LAYER: &str = "Unnamed";

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Result of parsing one download.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub dataset: Dataset,
    /// Placemarks with a Point whose coordinates were missing or unparsable.
    pub skipped: usize,
}

/// Parse raw KMZ or KML bytes into layers.
pub fn load_dataset(bytes: &[u8], content_type: Option<&str>) -> Result<Extraction> {
    let markup = if is_archive(bytes, content_type) {
        debug!("Input looks like a KMZ archive");
        read_kml_entry(bytes)?
    } else {
        debug!("Input treated as plain KML");
        decode_text(bytes.to_vec())?
    };

    let root = Element::parse(&markup)?;
    let extraction = extract_layers(&root);

    if extraction.skipped > 0 {
        warn!("Skipped {} placemarks with unusable coordinates", extraction.skipped);
    }
    if extraction.dataset.is_empty() {
        return Err(FormatError::NoPoints.into());
    }

    info!(
        "Loaded {} points in {} layers",
        extraction.dataset.point_count(),
        extraction.dataset.layers.len()
    );
    Ok(extraction)
}

fn is_archive(bytes: &[u8], content_type: Option<&str>) -> bool {
    if bytes.starts_with(ZIP_SIGNATURE) {
        return true;
    }
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("kmz") || ct.contains("zip")
        })
        .unwrap_or(false)
}

/// The single `.kml` entry of a KMZ archive, as text.
fn read_kml_entry(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(FormatError::from)?;

    let kml_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.to_ascii_lowercase().ends_with(".kml"))
        .map(|n| n.to_string())
        .collect();

    let name = match kml_names.as_slice() {
        [] => return Err(FormatError::NoMarkupEntry.into()),
        [only] => only,
        many => return Err(FormatError::MultipleMarkupEntries(many.len()).into()),
    };
    debug!("Found KML file in KMZ: {}", name);

    let mut entry = archive.by_name(name).map_err(FormatError::from)?;
    let mut buf = Vec::new();
    entry
        .read_to_end(&mut buf)
        .map_err(|e| FormatError::Archive(e.to_string()))?;
    decode_text(buf)
}

fn decode_text(bytes: Vec<u8>) -> Result<String> {
    let text = String::from_utf8(bytes)
        .map_err(|e| FormatError::Markup(format!("not UTF-8: {}", e)))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Walk every Folder of a parsed KML tree and collect its Point placemarks.
///
/// Folders are visited in document order at any depth; a folder's points
/// include those of folders nested inside it. Folders without points are
/// dropped. A folder whose name is already taken gets the first free
/// ` (n)` suffix.
pub fn extract_layers(root: &Element) -> Extraction {
    let mut layers = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();

    for folder in root.descendants("Folder") {
        let base_name = folder
            .child("name")
            .and_then(Element::trimmed_text)
            .unwrap_or(UNNAMED_LAYER);

        let points: Vec<GeoPoint> = folder
            .descendants("Placemark")
            .flat_map(|placemark| placemark.descendants("Point"))
            .filter_map(point_coordinates)
            .collect();

        if points.is_empty() {
            debug!("Folder '{}' has no points, omitting", base_name);
            continue;
        }

        let mut name = base_name.to_string();
        let mut n = 2;
        while taken.contains(&name) {
            name = format!("{} ({})", base_name, n);
            n += 1;
        }
        taken.insert(name.clone());

        debug!("Layer '{}': {} points", name, points.len());
        layers.push(Layer { name, points });
    }

    Extraction {
        dataset: Dataset { layers },
        skipped: count_unusable_placemarks(root),
    }
}

/// Placemarks with at least one Point whose coordinates can't be read.
/// Each counts once, however deeply its folder is nested.
fn count_unusable_placemarks(root: &Element) -> usize {
    root.descendants("Placemark")
        .filter(|placemark| {
            placemark
                .descendants("Point")
                .any(|point| point_coordinates(point).is_none())
        })
        .count()
}

fn point_coordinates(point: &Element) -> Option<GeoPoint> {
    let text = point
        .descendants("coordinates")
        .next()
        .and_then(Element::trimmed_text)?;
    parse_coordinate(text)
}

/// Parse `lon,lat[,alt]`. Longitude comes first in KML.
pub fn parse_coordinate(text: &str) -> Option<GeoPoint> {
    let mut parts = text.split(',').map(str::trim);
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if !(lon.is_finite() && lat.is_finite()) {
        return None;
    }
    Some(Point::new(lon, lat))
}
