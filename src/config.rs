use crate::color::Rgb;
use crate::error::ExportError;
use crate::types::CanvasSize;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub endpoint: String,
    pub force_kml: bool, // ask for plain KML instead of KMZ
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub marker_radius: f64,
    pub default_color: Option<Rgb>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub archive_name: String,
    pub include_csv: bool,
    pub csv_name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            endpoint: "https://www.google.com/maps/d/kml".to_string(),
            force_kml: false,
            timeout_secs: 30,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: 1000,
            height: 1000,
            marker_radius: 5.0,
            default_color: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            archive_name: "svg_layers_export.zip".to_string(),
            include_csv: false,
            csv_name: "all_pins.csv".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8080 }
    }
}

impl RenderConfig {
    pub fn canvas(&self) -> CanvasSize {
        CanvasSize { width: self.width, height: self.height }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Falls back to the built-in defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ExportError> {
        if self.render.width == 0 || self.render.height == 0 {
            return Err(ExportError::Config(format!(
                "canvas must be non-empty, got {}x{}",
                self.render.width, self.render.height
            )));
        }
        if !(self.render.marker_radius.is_finite() && self.render.marker_radius > 0.0) {
            return Err(ExportError::Config(format!(
                "marker radius must be positive, got {}",
                self.render.marker_radius
            )));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ExportError::Config("fetch timeout must be at least 1s".to_string()));
        }
        Ok(())
    }
}
