pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod markup;
pub mod package;
pub mod processing;
pub mod projection;
pub mod render;
pub mod server;
pub mod session;
pub mod types;

use anyhow::{anyhow, Context};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::processing::Viewport;
use crate::session::{ExportOptions, Session};
use crate::types::BoundingBox;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the pins of a My Maps map as per-layer SVGs in a zip
    #[command(group(ArgGroup::new("source").required(true).args(["url", "input"])))]
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// My Maps share URL (must contain mid=...)
        #[arg(short, long)]
        url: Option<String>,
        /// Local .kml or .kmz file instead of a download
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Viewport as WEST,EAST,SOUTH,NORTH
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true, conflicts_with = "all")]
        bbox: Option<BoundingBox>,
        /// Export every pin regardless of position
        #[arg(long)]
        all: bool,
        /// Also write all_pins.csv into the archive
        #[arg(long)]
        csv: bool,
        /// Only export these layers (repeatable)
        #[arg(long = "layer", value_name = "NAME")]
        layers: Vec<String>,
        /// Layer colour as NAME=#RRGGBB (repeatable)
        #[arg(long = "color", value_name = "NAME=HEX")]
        colors: Vec<String>,
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Serve the interactive preview and export page
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{}': {}", p, e)))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [west, east, south, north] => {
            BoundingBox::new(*west, *east, *south, *north).map_err(|e| e.to_string())
        }
        _ => Err(format!("expected WEST,EAST,SOUTH,NORTH, got {} values", parts.len())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            config,
            url,
            input,
            bbox,
            all,
            csv,
            layers,
            colors,
            out,
        } => {
            let app_config = config::AppConfig::load_or_default(&config)?;

            // 1. Get the raw bytes
            let (map_id, bytes, content_type) = match (&url, &input) {
                (Some(url), _) => {
                    let map_id = locator::require_map_id(url)?.to_string();
                    let retriever = fetch::Retriever::new(&app_config.fetch)?;
                    let raw = retriever.fetch(&map_id).await?;
                    (Some(map_id), raw.bytes, raw.content_type)
                }
                (None, Some(path)) => {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("Failed to read input file: {:?}", path))?;
                    (None, bytes, content_type_for(path))
                }
                (None, None) => return Err(anyhow!("either --url or --input is required")),
            };

            // 2. Parse layers
            let extraction = data::load_dataset(&bytes, content_type.as_deref())?;

            // 3. Apply layer choices
            let mut session = Session::new(app_config.render.default_color);
            session.load(map_id, extraction);
            if !layers.is_empty() {
                session.select_only(&layers)?;
            }
            for spec in &colors {
                let (name, hex) = spec
                    .rsplit_once('=')
                    .ok_or_else(|| anyhow!("--color expects NAME=HEX, got '{}'", spec))?;
                session.set_color(name, hex)?;
            }

            // 4. Export
            let viewport = match bbox {
                Some(bbox) if !all => Viewport::Within(bbox),
                _ => Viewport::IncludeAll,
            };
            let mut options = ExportOptions::from_config(&app_config);
            options.include_csv |= csv;

            let bundle = session.export(&viewport, &options)?;
            let out = out.unwrap_or_else(|| PathBuf::from(&app_config.output.archive_name));
            std::fs::write(&out, &bundle.archive)
                .with_context(|| format!("Failed to write archive: {:?}", out))?;

            info!(
                "Wrote {} ({} layers, {} points)",
                out.display(),
                bundle.layers.len(),
                bundle.point_count
            );
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_or_default(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}

fn content_type_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "kmz" => Some("application/vnd.google-earth.kmz".to_string()),
        "kml" => Some("application/vnd.google-earth.kml+xml".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_bbox_argument() {
        let bbox = parse_bbox("140,155,-40,-30").unwrap();
        assert_eq!(bbox, BoundingBox { west: 140.0, east: 155.0, south: -40.0, north: -30.0 });
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("155,140,-40,-30").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn export_requires_a_source() {
        assert!(Cli::try_parse_from(["mymaps-export", "export"]).is_err());
        assert!(Cli::try_parse_from(["mymaps-export", "export", "--url", "https://x?mid=1"]).is_ok());
    }

    #[test]
    fn bbox_and_all_conflict() {
        let args = ["mymaps-export", "export", "-i", "a.kml", "--bbox", "0,1,0,1", "--all"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(
            content_type_for(Path::new("x.KMZ")).as_deref(),
            Some("application/vnd.google-earth.kmz")
        );
        assert_eq!(content_type_for(Path::new("x.txt")), None);
    }
}
