use crate::config::GeographyConfig;
use crate::types::{GeoBoundary, ZipKey};
use anyhow::{anyhow, Context, Result};
use geojson::{FeatureCollection, GeoJson};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// One candidate in the ordered fallback chain. Every candidate yields raw
/// text that passes through the same structural validation, so a bad document
/// is rejected identically whether it came from cache, network, or disk.
#[derive(Debug, Clone)]
enum BoundarySource {
    CachedFile(PathBuf),
    Remote(String),
    Bundled(PathBuf),
}

impl BoundarySource {
    fn describe(&self) -> String {
        match self {
            BoundarySource::CachedFile(p) => format!("cached copy {:?}", p),
            BoundarySource::Remote(url) => format!("remote source {}", url),
            BoundarySource::Bundled(p) => format!("bundled file {:?}", p),
        }
    }
}

/// Resolves the zip-code boundary collection, or returns None when every
/// source fails. Absence is a handled outcome, not an error: the renderer
/// downgrades and the session continues.
pub async fn resolve_geography(config: &GeographyConfig) -> Option<GeoBoundary> {
    let mut sources = vec![BoundarySource::CachedFile(config.cache_path())];
    for url in &config.remote_urls {
        sources.push(BoundarySource::Remote(url.clone()));
    }
    if let Some(path) = &config.bundled_path {
        sources.push(BoundarySource::Bundled(path.clone()));
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
    {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("http client init failed ({}); remote sources will be skipped", e);
            None
        }
    };

    for source in &sources {
        let body = match acquire(client.as_ref(), source, config).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{} unusable: {:#}", source.describe(), e);
                continue;
            }
        };

        match boundary_from_text(&body, config) {
            Ok(boundary) => {
                info!(
                    "using boundary collection from {} ({} features)",
                    source.describe(),
                    boundary.collection.features.len()
                );
                if let BoundarySource::Remote(_) = source {
                    persist_cache(&config.cache_path(), &body);
                }
                return Some(boundary);
            }
            Err(e) => warn!("{} rejected: {:#}", source.describe(), e),
        }
    }

    warn!("all boundary sources failed; continuing without geography");
    None
}

async fn acquire(
    client: Option<&reqwest::Client>,
    source: &BoundarySource,
    config: &GeographyConfig,
) -> Result<String> {
    match source {
        BoundarySource::CachedFile(path) | BoundarySource::Bundled(path) => read_local(path),
        BoundarySource::Remote(url) => {
            let client = client.ok_or_else(|| anyhow!("no http client available"))?;
            let mut last_err = anyhow!("no attempt made");
            for attempt in 0..=config.retries_per_source {
                match fetch_once(client, url).await {
                    Ok(body) => return Ok(body),
                    Err(e) => {
                        if attempt < config.retries_per_source {
                            warn!("fetch attempt {} for {} failed: {:#}", attempt + 1, url, e);
                        }
                        last_err = e;
                    }
                }
            }
            Err(last_err)
        }
    }
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;
    if !response.status().is_success() {
        return Err(anyhow!("{} returned HTTP {}", url, response.status()));
    }
    response
        .text()
        .await
        .with_context(|| format!("could not read body from {}", url))
}

fn read_local(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("{:?} does not exist", path));
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))
}

/// Parses and validates one acquired document, then detects its zip key.
fn boundary_from_text(body: &str, config: &GeographyConfig) -> Result<GeoBoundary> {
    let value: Value = serde_json::from_str(body).context("invalid JSON")?;
    validate_structure(&value)?;

    let collection = match GeoJson::from_json_value(value).context("not parseable as GeoJSON")? {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("document is not a FeatureCollection")),
    };

    let zip_key = detect_zip_key(&collection, config);
    if zip_key == ZipKey::Unrecognized {
        warn!("boundary schema has no known zip-code property; choropleth will be unavailable");
    }
    Ok(GeoBoundary { collection, zip_key })
}

/// Structural gate applied to every source: a mapping with a `type` field and
/// a `features` list. Anything else is rejected before GeoJSON parsing.
fn validate_structure(value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("document is not a JSON object"))?;
    if !obj.contains_key("type") {
        return Err(anyhow!("document has no \"type\" field"));
    }
    match obj.get("features") {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(anyhow!("\"features\" is not a list")),
        None => Err(anyhow!("document has no \"features\" list")),
    }
}

/// Inspects one sample feature and picks the zip-code property key by the
/// configured priority order, then the configured default. Runs once per
/// load; the result travels with the boundary.
fn detect_zip_key(collection: &FeatureCollection, config: &GeographyConfig) -> ZipKey {
    let properties = match collection.features.first().and_then(|f| f.properties.as_ref()) {
        Some(props) => props,
        None => return ZipKey::Unrecognized,
    };

    for key in &config.zip_key_priority {
        if properties.contains_key(key) {
            return ZipKey::Property(key.clone());
        }
    }
    if properties.contains_key(&config.default_zip_key) {
        return ZipKey::Property(config.default_zip_key.clone());
    }
    ZipKey::Unrecognized
}

fn persist_cache(path: &Path, body: &str) {
    // Best-effort only. A failed write never affects the returned boundary.
    match fs::write(path, body) {
        Ok(()) => info!("cached boundary copy at {:?}", path),
        Err(e) => warn!("could not cache boundary copy at {:?}: {}", path, e),
    }
}
