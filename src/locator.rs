use crate::config::FetchConfig;
use crate::error::{ExportError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Pull the `mid=` map identifier out of a My Maps share URL.
pub fn extract_map_id(input: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"mid=([^&]+)").expect("static regex"));
    re.captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|id| !id.is_empty())
}

pub fn require_map_id(input: &str) -> Result<&str> {
    extract_map_id(input).ok_or_else(|| {
        ExportError::Input("couldn't extract map ID (expected a URL containing mid=...)".to_string())
    })
}

/// Download URL for a map identifier, e.g.
/// `https://www.google.com/maps/d/kml?mid=<id>`.
pub fn download_url(config: &FetchConfig, map_id: &str) -> String {
    let mut url = format!("{}?mid={}", config.endpoint, map_id);
    if config.force_kml {
        url.push_str("&forcekml=1");
    }
    url
}
