use crate::config::DataConfig;
use crate::types::{HviTable, VulnerabilityRecord};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Writer};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{info, warn};

const LONG_ZIP_HEADER: &str = "ZIP Code Tabulation Area (ZCTA) 2020";
const LONG_HVI_HEADER: &str = "Heat Vulnerability Index (HVI)";

/// Loads the HVI table, trying the primary path, then the configured fallback
/// paths, then the embedded sample. Total: the caller always gets a table.
/// Results are memoized per primary-path identity for the process lifetime;
/// the underlying data is global reference data, so the cache is never keyed
/// by anything session-specific.
pub fn load_table(config: &DataConfig) -> Arc<HviTable> {
    let cache = table_cache();
    if let Some(table) = cache.read().ok().and_then(|c| c.get(&config.csv_path).cloned()) {
        return table;
    }

    let table = Arc::new(load_uncached(config));
    if let Ok(mut c) = cache.write() {
        c.entry(config.csv_path.clone()).or_insert_with(|| table.clone());
    }
    table
}

fn table_cache() -> &'static RwLock<HashMap<PathBuf, Arc<HviTable>>> {
    static CACHE: OnceLock<RwLock<HashMap<PathBuf, Arc<HviTable>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn load_uncached(config: &DataConfig) -> HviTable {
    match read_csv_table(&config.csv_path) {
        Ok(table) => {
            info!("loaded {} HVI records from {:?}", table.records.len(), config.csv_path);
            return table;
        }
        Err(e) => {
            warn!("primary HVI source {:?} unusable: {:#}", config.csv_path, e);
        }
    }

    for path in &config.fallback_paths {
        if !path.exists() {
            continue;
        }
        match read_csv_table(path) {
            Ok(table) => {
                info!("loaded {} HVI records from fallback {:?}", table.records.len(), path);
                return table;
            }
            Err(e) => warn!("fallback HVI source {:?} unusable: {:#}", path, e),
        }
    }

    warn!("no HVI source found; using the embedded sample table");
    sample_table()
}

fn read_csv_table(path: &Path) -> Result<HviTable> {
    let file = File::open(path).with_context(|| format!("failed to open CSV file: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    // Accept either the canonical short schema or the published long one.
    let zip_idx = headers
        .iter()
        .position(|h| h == "zipcode" || h == LONG_ZIP_HEADER)
        .ok_or_else(|| anyhow!("no zip code column in {:?}", path))?;
    let hvi_idx = headers
        .iter()
        .position(|h| h == "hvi" || h == LONG_HVI_HEADER)
        .ok_or_else(|| anyhow!("no HVI column in {:?}", path))?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let zipcode = normalize_zipcode(record.get(zip_idx).unwrap_or(""));
        if zipcode.is_empty() {
            continue;
        }
        let raw_hvi = record.get(hvi_idx).unwrap_or("").trim();
        let hvi = match raw_hvi.parse::<u8>() {
            Ok(v) if (1..=5).contains(&v) => v,
            _ => {
                warn!("skipping zip {} with out-of-range HVI value {:?}", zipcode, raw_hvi);
                continue;
            }
        };
        records.push(VulnerabilityRecord { zipcode, hvi });
    }

    if records.is_empty() {
        return Err(anyhow!("no usable rows in {:?}", path));
    }
    Ok(HviTable::new(records))
}

/// Zip codes are opaque identifiers. Sources that stored them numerically can
/// surface float-coerced values like "10001.0"; strip that tail rather than
/// letting it leak into join keys.
pub fn normalize_zipcode(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(head) = trimmed.strip_suffix(".0") {
        if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
            return head.to_string();
        }
    }
    trimmed.to_string()
}

/// The fixed demonstration table used when every real source fails. Matches
/// the published sample: twelve Manhattan zips, 10008 does not exist.
pub fn sample_table() -> HviTable {
    const SAMPLE: [(&str, u8); 12] = [
        ("10001", 5),
        ("10002", 3),
        ("10003", 2),
        ("10004", 4),
        ("10005", 1),
        ("10006", 5),
        ("10007", 2),
        ("10009", 3),
        ("10010", 4),
        ("10011", 5),
        ("10012", 1),
        ("10013", 2),
    ];
    HviTable::new(
        SAMPLE
            .iter()
            .map(|(z, h)| VulnerabilityRecord {
                zipcode: z.to_string(),
                hvi: *h,
            })
            .collect(),
    )
}

/// Serializes a table as `zipcode,hvi` CSV, header included. This is the
/// download surface for the currently filtered table, so its structure must
/// match the in-memory rows exactly.
pub fn table_to_csv(table: &HviTable) -> Result<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["zipcode", "hvi"])?;
    for record in &table.records {
        wtr.write_record([record.zipcode.as_str(), &record.hvi.to_string()])?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow!("failed to flush CSV writer: {}", e))
}
