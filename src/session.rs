use crate::color::Rgb;
use crate::config::AppConfig;
use crate::data::Extraction;
use crate::error::{ExportError, Result};
use crate::package::{build_archive, pins_csv, LayerDocument};
use crate::processing::{filter_visible, Viewport, VisibleLayer};
use crate::projection::Projector;
use crate::render::{render_layer_svg, MarkerStyle};
use crate::types::{CanvasSize, Dataset, LayerStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Export settings that don't change between clicks.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub canvas: CanvasSize,
    pub marker_radius: f64,
    pub include_csv: bool,
    pub csv_name: String,
}

impl ExportOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        ExportOptions {
            canvas: config.render.canvas(),
            marker_radius: config.render.marker_radius,
            include_csv: config.output.include_csv,
            csv_name: config.output.csv_name.clone(),
        }
    }
}

/// What an export produced.
#[derive(Debug)]
pub struct ExportBundle {
    pub archive: Vec<u8>,
    pub layers: Vec<String>,
    pub point_count: usize,
}

#[derive(Debug, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub point_count: usize,
    pub visible: bool,
    pub color: Rgb,
    /// `[lat, lon]` pairs, the order map widgets expect.
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub map_id: Option<String>,
    pub center: Option<[f64; 2]>,
    pub skipped: usize,
    pub layers: Vec<LayerSummary>,
}

/// One user's loaded map and their per-layer choices.
///
/// Loading a new map replaces the dataset and resets every style.
#[derive(Debug, Default)]
pub struct Session {
    map_id: Option<String>,
    dataset: Option<Dataset>,
    skipped: usize,
    styles: HashMap<String, LayerStyle>,
    default_color: Option<Rgb>,
}

impl Session {
    pub fn new(default_color: Option<Rgb>) -> Self {
        Session {
            default_color,
            ..Session::default()
        }
    }

    pub fn load(&mut self, map_id: Option<String>, extraction: Extraction) {
        self.styles = extraction
            .dataset
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let color = self.default_color.unwrap_or_else(|| Rgb::palette(i));
                (layer.name.clone(), LayerStyle { visible: true, color })
            })
            .collect();
        info!(
            "Session now holds {} layers from {}",
            extraction.dataset.layers.len(),
            map_id.as_deref().unwrap_or("local file")
        );
        self.map_id = map_id;
        self.skipped = extraction.skipped;
        self.dataset = Some(extraction.dataset);
    }

    pub fn dataset(&self) -> Result<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| ExportError::Input("no map loaded yet".to_string()))
    }

    pub fn style(&self, layer: &str) -> Option<LayerStyle> {
        self.styles.get(layer).copied()
    }

    fn style_mut(&mut self, layer: &str) -> Result<&mut LayerStyle> {
        self.styles
            .get_mut(layer)
            .ok_or_else(|| ExportError::Input(format!("unknown layer '{}'", layer)))
    }

    pub fn set_visible(&mut self, layer: &str, visible: bool) -> Result<()> {
        self.style_mut(layer)?.visible = visible;
        Ok(())
    }

    pub fn set_color(&mut self, layer: &str, color: &str) -> Result<()> {
        let rgb: Rgb = color.parse()?;
        self.style_mut(layer)?.color = rgb;
        Ok(())
    }

    /// Apply a visibility and/or colour change to one layer. Nothing
    /// changes unless the layer exists and the colour is valid.
    pub fn update_layer(&mut self, layer: &str, visible: Option<bool>, color: Option<&str>) -> Result<()> {
        let color = color.map(str::parse::<Rgb>).transpose()?;
        let style = self.style_mut(layer)?;
        if let Some(visible) = visible {
            style.visible = visible;
        }
        if let Some(color) = color {
            style.color = color;
        }
        Ok(())
    }

    /// Show exactly the named layers and hide the rest.
    pub fn select_only<S: AsRef<str>>(&mut self, layers: &[S]) -> Result<()> {
        for name in layers {
            self.style_mut(name.as_ref())?;
        }
        for (name, style) in self.styles.iter_mut() {
            style.visible = layers.iter().any(|l| l.as_ref() == name.as_str());
        }
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        let layers = self
            .dataset
            .iter()
            .flat_map(|ds| ds.layers.iter())
            .map(|layer| {
                let style = self.style(&layer.name).unwrap_or_default();
                LayerSummary {
                    name: layer.name.clone(),
                    point_count: layer.points.len(),
                    visible: style.visible,
                    color: style.color,
                    points: layer.points.iter().map(|p| [p.y(), p.x()]).collect(),
                }
            })
            .collect();

        SessionSummary {
            map_id: self.map_id.clone(),
            center: self
                .dataset
                .as_ref()
                .and_then(Dataset::centroid)
                .map(|c| [c.y(), c.x()]),
            skipped: self.skipped,
            layers,
        }
    }

    /// Filter, project, render and pack the visible layers.
    pub fn export(&self, viewport: &Viewport, options: &ExportOptions) -> Result<ExportBundle> {
        let dataset = self.dataset()?;
        let visible = filter_visible(dataset, &self.styles, viewport)?;
        export_layers(&visible, viewport, options)
    }
}

/// Opaque handle the browser keeps in a cookie.
pub type SessionId = String;

/// Every live session, one per browser. Sessions never see each other's
/// dataset or styles.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    default_color: Option<Rgb>,
}

impl SessionStore {
    pub fn new(default_color: Option<Rgb>) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            default_color,
        }
    }

    fn new_id() -> SessionId {
        format!("{:032x}", rand::random::<u128>())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a map into the caller's session, creating one when `id` is
    /// missing or unknown. Returns the id the caller should keep using.
    pub fn load(
        &self,
        id: Option<&str>,
        map_id: Option<String>,
        extraction: Extraction,
    ) -> (SessionId, SessionSummary) {
        let mut sessions = self.lock();
        let id = match id {
            Some(known) if sessions.contains_key(known) => known.to_string(),
            _ => {
                let fresh = Self::new_id();
                debug!("Opening session {}", fresh);
                fresh
            }
        };
        let session = sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(self.default_color));
        session.load(map_id, extraction);
        let summary = session.summary();
        (id, summary)
    }

    /// Summary of the caller's session; empty when there is none yet.
    pub fn summary(&self, id: Option<&str>) -> SessionSummary {
        let sessions = self.lock();
        match id.and_then(|id| sessions.get(id)) {
            Some(session) => session.summary(),
            None => Session::default().summary(),
        }
    }

    /// Run `f` against the caller's session.
    pub fn with_session<T, F>(&self, id: Option<&str>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut sessions = self.lock();
        let session = id
            .and_then(|id| sessions.get_mut(id))
            .ok_or_else(|| ExportError::Input("no map loaded yet".to_string()))?;
        f(session)
    }
}

fn export_layers(
    visible: &[VisibleLayer],
    viewport: &Viewport,
    options: &ExportOptions,
) -> Result<ExportBundle> {
    let projector = match viewport {
        Viewport::Within(bbox) => Projector::new(bbox, options.canvas)?,
        Viewport::IncludeAll => {
            Projector::fit(visible.iter().flat_map(|l| l.points.iter()), options.canvas)?
        }
    };
    let marker = MarkerStyle {
        radius: options.marker_radius,
        canvas: projector.canvas(),
    };

    let documents: Vec<LayerDocument> = visible
        .iter()
        .map(|layer| LayerDocument {
            layer_name: layer.name.clone(),
            svg: render_layer_svg(
                &layer.name,
                &projector.project_all(&layer.points),
                layer.style.color,
                &marker,
            ),
        })
        .collect();

    let csv = if options.include_csv {
        Some(pins_csv(
            visible.iter().map(|l| (l.name.as_str(), l.points.as_slice())),
        )?)
    } else {
        None
    };

    let archive = build_archive(
        &documents,
        csv.as_deref().map(|body| (options.csv_name.as_str(), body)),
    )?;

    Ok(ExportBundle {
        archive,
        layers: visible.iter().map(|l| l.name.clone()).collect(),
        point_count: visible.iter().map(|l| l.points.len()).sum(),
    })
}
