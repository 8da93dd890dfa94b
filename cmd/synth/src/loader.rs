//! Config loading from local files or HTTP(S) URLs.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use synth_model::Config;
use tracing::{debug, info};

/// Largest accepted config body when fetching over HTTP.
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Redirect hop limit for config URLs.
const MAX_REDIRECTS: usize = 5;

/// Loads and parses a config document from a path or `http(s)://` URL.
pub async fn load(source: &str) -> Result<Config> {
    let raw = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(source).await?
    } else {
        fs::read_to_string(Path::new(source))
            .with_context(|| format!("failed to read config file: {source}"))?
    };

    let config =
        Config::from_yaml(&raw).with_context(|| format!("failed to parse config: {source}"))?;
    debug!(
        services = config.services.len(),
        scenarios = config.scenarios.len(),
        "config loaded"
    );
    Ok(config)
}

async fn fetch_url(url: &str) -> Result<String> {
    info!("Fetching config from {url}");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .context("failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch config from {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("config fetch from {url} returned status {status}");
    }

    if let Some(length) = response.content_length() {
        if length > MAX_BODY_BYTES {
            bail!("config body of {length} bytes exceeds the {MAX_BODY_BYTES} byte limit");
        }
    }

    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read config body from {url}"))?;
    if u64::try_from(body.len()).unwrap_or(u64::MAX) > MAX_BODY_BYTES {
        bail!(
            "config body of {} bytes exceeds the {MAX_BODY_BYTES} byte limit",
            body.len()
        );
    }

    String::from_utf8(body.to_vec()).context("config body is not valid UTF-8")
}
