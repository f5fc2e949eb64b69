use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub geography: GeographyConfig,
    pub map: MapConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Primary HVI rankings CSV.
    pub csv_path: PathBuf,
    /// Tried in order when the primary path is unreadable.
    pub fallback_paths: Vec<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        let name = "Heat_Vulnerability_Index_Rankings_20250406.csv";
        DataConfig {
            csv_path: PathBuf::from(name),
            fallback_paths: vec![
                PathBuf::from(format!("./{}", name)),
                PathBuf::from(format!("../{}", name)),
                PathBuf::from(format!("/app/{}", name)),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeographyConfig {
    /// Remote GeoJSON sources, tried in order until one validates.
    pub remote_urls: Vec<String>,
    /// Optional GeoJSON shipped alongside the binary, the last resort.
    pub bundled_path: Option<PathBuf>,
    /// File name of the cached copy under the system temp directory.
    pub cache_file_name: String,
    /// Zip-code property keys checked against a sample feature, in priority
    /// order, before the default key.
    pub zip_key_priority: Vec<String>,
    pub default_zip_key: String,
    pub request_timeout_secs: u64,
    /// Extra attempts per remote source after the first failure.
    pub retries_per_source: u32,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        GeographyConfig {
            remote_urls: vec![
                "https://raw.githubusercontent.com/fedhere/PUI2015_EC/master/mam1612_EC/nyc-zip-code-tabulation-areas-polygons.geojson".to_string(),
                "https://raw.githubusercontent.com/ndrezn/zip-code-geojson/master/ny_new_york_zip_codes_geo.min.json".to_string(),
                "https://raw.githubusercontent.com/OpenDataDE/State-zip-code-GeoJSON/master/ny_new_york_zip_codes_geo.min.json".to_string(),
            ],
            bundled_path: None,
            cache_file_name: "nyc_zipcodes.geojson".to_string(),
            zip_key_priority: vec![
                "postalCode".to_string(),
                "ZIPCODE".to_string(),
                "ZIP".to_string(),
            ],
            default_zip_key: "ZCTA5CE10".to_string(),
            request_timeout_secs: 20,
            retries_per_source: 1,
        }
    }
}

impl GeographyConfig {
    pub fn cache_path(&self) -> PathBuf {
        env::temp_dir().join(&self.cache_file_name)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// City reference point used for grid layout and as the centroid fallback.
    pub center_lat: f64,
    pub center_lon: f64,
    /// Degrees between adjacent synthesized grid positions.
    pub grid_spacing: f64,
    /// Standard deviation, in degrees, of the density jitter.
    pub jitter_sigma: f64,
    pub jitter_seed: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            center_lat: 40.7128,
            center_lon: -74.0060,
            grid_spacing: 0.01,
            jitter_sigma: 0.05,
            jitter_seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory served at the site root for the dashboard page assets.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8080,
            static_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Loads the TOML config, falling back to built-in defaults when the file
    /// is missing or malformed. Rendering must stay possible without any
    /// on-disk configuration.
    pub fn load_from_file(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("config file {:?} not readable ({}); using defaults", path, e);
                return AppConfig::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("config file {:?} failed to parse ({}); using defaults", path, e);
                AppConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from_file(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.geography.remote_urls.len(), 3);
        assert_eq!(config.map.jitter_seed, 42);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.map.grid_spacing, 0.01);
        assert_eq!(config.geography.default_zip_key, "ZCTA5CE10");
    }

    #[test]
    fn key_priority_defaults_match_known_schemas() {
        let g = GeographyConfig::default();
        assert_eq!(g.zip_key_priority, vec!["postalCode", "ZIPCODE", "ZIP"]);
    }
}
