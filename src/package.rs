//! Zip packaging of rendered layers and the optional pin CSV.

use crate::error::{ExportError, Result};
use crate::types::GeoPoint;
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::sync::OnceLock;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One rendered layer waiting to be packed.
pub struct LayerDocument {
    pub layer_name: String,
    pub svg: String,
}

/// One row of the pin dump.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PinRow<'a> {
    pub layer: &'a str,
    pub lat: f64,
    pub lon: f64,
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_\-]").expect("static regex"));
    let safe = re.replace_all(name, "_").into_owned();
    if safe.is_empty() {
        "layer".to_string()
    } else {
        safe
    }
}

/// Archive entry names for `layer_names`, one per layer, in order.
/// Names that collide after sanitising get `_2`, `_3`, ... appended.
pub fn entry_names<'a, I>(layer_names: I, extension: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::new();
    for layer in layer_names {
        let stem = sanitize_name(layer);
        let mut candidate = format!("{}.{}", stem, extension);
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}.{}", stem, n, extension);
            n += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// `layer,lat,lon` CSV for every exported point.
pub fn pins_csv<'a, I>(layers: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [GeoPoint])>,
{
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for (layer, points) in layers {
        for p in points {
            wtr.serialize(PinRow { layer, lat: p.y(), lon: p.x() })
                .map_err(|e| ExportError::Io(format!("CSV: {}", e)))?;
        }
    }
    wtr.into_inner()
        .map_err(|e| ExportError::Io(format!("CSV: {}", e)))
}

/// Bundle rendered layers (and optionally a CSV) into a zip buffer.
pub fn build_archive(documents: &[LayerDocument], csv: Option<(&str, &[u8])>) -> Result<Vec<u8>> {
    let bytes = write_archive(Cursor::new(Vec::new()), documents, csv)?.into_inner();
    info!("Packed {} layers into {} byte archive", documents.len(), bytes.len());
    Ok(bytes)
}

fn write_archive<W: Write + Seek>(
    writer: W,
    documents: &[LayerDocument],
    csv: Option<(&str, &[u8])>,
) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let zip_err = |e: zip::result::ZipError| ExportError::Io(format!("archive: {}", e));
    let io_err = |e: std::io::Error| ExportError::Io(format!("archive: {}", e));

    let names = entry_names(documents.iter().map(|d| d.layer_name.as_str()), "svg");
    for (doc, name) in documents.iter().zip(&names) {
        debug!("Adding {} for layer '{}'", name, doc.layer_name);
        zip.start_file(name.as_str(), options).map_err(zip_err)?;
        zip.write_all(doc.svg.as_bytes()).map_err(io_err)?;
    }

    if let Some((csv_name, body)) = csv {
        zip.start_file(csv_name, options).map_err(zip_err)?;
        zip.write_all(body).map_err(io_err)?;
    }

    zip.finish().map_err(zip_err)
}
