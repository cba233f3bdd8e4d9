//! Download of raw map bytes. One request, no retry.

use crate::config::FetchConfig;
use crate::error::{ExportError, Result};
use crate::locator::download_url;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Bytes returned by the download endpoint along with the declared type.
pub struct RawMap {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub struct Retriever {
    client: Client,
    config: FetchConfig,
}

impl Retriever {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub async fn fetch(&self, map_id: &str) -> Result<RawMap> {
        let url = download_url(&self.config, map_id);
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        check_status(resp.status())?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = resp.bytes().await?.to_vec();
        info!("Downloaded {} bytes for map {}", bytes.len(), map_id);

        Ok(RawMap { bytes, content_type })
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let hint = match status.as_u16() {
        401 | 403 | 404 => ", check that the map is shared publicly",
        _ => "",
    };
    Err(ExportError::Fetch(format!("HTTP {}{}", status, hint)))
}
