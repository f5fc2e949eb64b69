use crate::centroids;
use crate::config::MapConfig;
use crate::types::{
    ColorRange, ColorScale, GeoBoundary, HviTable, RenderOutcome, RenderSpec, VizMode,
    WeightedPoint, ZipKey,
};
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// One user interaction's worth of render parameters.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub mode: VizMode,
    pub color_scale: ColorScale,
    /// Inclusive hvi filter bounds; default to the table's observed range.
    pub low: Option<u8>,
    pub high: Option<u8>,
}

/// Turns the table, the optional boundary, and the request into a render
/// spec. Pure apart from the fixed jitter seed, and total: a mode that cannot
/// be built as asked downgrades with an advisory instead of failing.
pub fn select(
    table: &HviTable,
    boundary: Option<&Arc<GeoBoundary>>,
    request: &RenderRequest,
    map: &MapConfig,
) -> RenderOutcome {
    // Color bounds come from the unfiltered table so color meaning is stable
    // across filter changes and mode switches.
    let range = ColorRange {
        min: 1,
        max: table.max_hvi().unwrap_or(5),
    };

    let low = request.low.unwrap_or_else(|| table.min_hvi().unwrap_or(1));
    let high = request.high.unwrap_or_else(|| table.max_hvi().unwrap_or(5));
    let filtered = table.filter(low, high);

    let mut advisories = Vec::new();

    if request.mode == VizMode::Choropleth {
        match boundary {
            Some(b) => match build_choropleth(b, &filtered, request.color_scale, range) {
                Ok(spec) => return RenderOutcome { spec, advisories },
                Err(e) => {
                    warn!("choropleth construction failed: {:#}", e);
                    advisories.push(format!(
                        "Choropleth unavailable ({}); showing scatter points instead.",
                        e
                    ));
                }
            },
            None => {
                advisories.push(
                    "Boundary data could not be loaded; showing scatter points instead of a choropleth."
                        .to_string(),
                );
            }
        }
    }

    let spec = match request.mode {
        VizMode::DensityField => RenderSpec::DensityField {
            points: density_points(&filtered, map),
            color_scale: request.color_scale,
            range,
        },
        // Choropleth falls through to the scatter path on downgrade.
        VizMode::ScatterPoints | VizMode::Choropleth => RenderSpec::ScatterPoints {
            points: grid_points(&filtered, map),
            color_scale: request.color_scale,
            range,
        },
    };

    RenderOutcome { spec, advisories }
}

fn build_choropleth(
    boundary: &Arc<GeoBoundary>,
    filtered: &HviTable,
    color_scale: ColorScale,
    range: ColorRange,
) -> Result<RenderSpec> {
    let key = match &boundary.zip_key {
        ZipKey::Property(key) => key,
        ZipKey::Unrecognized => {
            return Err(anyhow!("boundary schema has no recognizable zip-code property"))
        }
    };
    Ok(RenderSpec::Choropleth {
        boundary: boundary.clone(),
        feature_key: format!("properties.{}", key),
        rows: filtered.records.clone(),
        color_scale,
        range,
    })
}

/// Lays the unique zip codes of the filtered table on a square grid centered
/// on the city reference point. A stable placeholder layout, reproducible for
/// identical input ordering; explicitly not geography.
fn grid_points(filtered: &HviTable, map: &MapConfig) -> Vec<WeightedPoint> {
    let mut seen = HashSet::new();
    let unique: Vec<_> = filtered
        .records
        .iter()
        .filter(|r| seen.insert(r.zipcode.as_str()))
        .collect();

    let side = (unique.len() as f64).sqrt().ceil() as usize;
    if side == 0 {
        return Vec::new();
    }
    let half = side as f64 / 2.0;

    unique
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let row = (i / side) as f64;
            let col = (i % side) as f64;
            WeightedPoint {
                zipcode: record.zipcode.clone(),
                lat: map.center_lat + (row - half) * map.grid_spacing,
                lon: map.center_lon + (col - half) * map.grid_spacing,
                hvi: record.hvi,
            }
        })
        .collect()
}

/// Expands each record into `max(5, hvi * 3)` jittered replicates around its
/// centroid, each weighted by the record's hvi. More replicates at higher hvi
/// bias the rendered density toward high-vulnerability areas. The fixed seed
/// makes the field reproducible for a fixed input table.
fn density_points(filtered: &HviTable, map: &MapConfig) -> Vec<WeightedPoint> {
    let mut rng = StdRng::seed_from_u64(map.jitter_seed);
    let sigma = if map.jitter_sigma.is_finite() && map.jitter_sigma > 0.0 {
        map.jitter_sigma
    } else {
        0.05
    };
    let normal = Normal::new(0.0, sigma).expect("sigma is positive and finite");

    let mut points = Vec::new();
    for record in &filtered.records {
        let (lat, lon) = centroids::lookup(&record.zipcode);
        let replicates = replicate_count(record.hvi);
        for _ in 0..replicates {
            points.push(WeightedPoint {
                zipcode: record.zipcode.clone(),
                lat: lat + rng.sample(normal),
                lon: lon + rng.sample(normal),
                hvi: record.hvi,
            });
        }
    }
    points
}

pub fn replicate_count(hvi: u8) -> usize {
    (hvi as usize * 3).max(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VulnerabilityRecord;
    use geojson::{FeatureCollection, GeoJson};
    use serde_json::json;

    fn table(values: &[(&str, u8)]) -> HviTable {
        HviTable::new(
            values
                .iter()
                .map(|(z, h)| VulnerabilityRecord {
                    zipcode: z.to_string(),
                    hvi: *h,
                })
                .collect(),
        )
    }

    fn boundary_with_key(zip_key: ZipKey) -> Arc<GeoBoundary> {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"postalCode": "10001"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-74.0, 40.7], [-73.9, 40.7], [-73.9, 40.8], [-74.0, 40.7]]]
                }
            }]
        });
        let collection: FeatureCollection = match GeoJson::from_json_value(value).unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            _ => unreachable!(),
        };
        Arc::new(GeoBoundary { collection, zip_key })
    }

    fn request(mode: VizMode) -> RenderRequest {
        RenderRequest {
            mode,
            color_scale: ColorScale::Reds,
            low: None,
            high: None,
        }
    }

    #[test]
    fn choropleth_with_boundary_uses_detected_key() {
        let t = table(&[("10001", 5), ("10002", 3)]);
        let b = boundary_with_key(ZipKey::Property("postalCode".into()));
        let outcome = select(&t, Some(&b), &request(VizMode::Choropleth), &MapConfig::default());
        assert!(outcome.advisories.is_empty());
        match outcome.spec {
            RenderSpec::Choropleth { feature_key, rows, range, .. } => {
                assert_eq!(feature_key, "properties.postalCode");
                assert_eq!(rows.len(), 2);
                assert_eq!(range, ColorRange { min: 1, max: 5 });
            }
            other => panic!("expected choropleth, got {:?}", other),
        }
    }

    #[test]
    fn missing_boundary_downgrades_to_scatter_with_advisory() {
        let t = table(&[("10001", 5), ("10002", 3)]);
        let outcome = select(&t, None, &request(VizMode::Choropleth), &MapConfig::default());
        assert_eq!(outcome.advisories.len(), 1);
        match outcome.spec {
            RenderSpec::ScatterPoints { points, .. } => assert_eq!(points.len(), 2),
            other => panic!("expected scatter downgrade, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_schema_downgrades_to_scatter() {
        let t = table(&[("10001", 5)]);
        let b = boundary_with_key(ZipKey::Unrecognized);
        let outcome = select(&t, Some(&b), &request(VizMode::Choropleth), &MapConfig::default());
        assert_eq!(outcome.advisories.len(), 1);
        assert!(matches!(outcome.spec, RenderSpec::ScatterPoints { .. }));
    }

    #[test]
    fn density_replicate_counts() {
        assert_eq!(replicate_count(5), 15);
        assert_eq!(replicate_count(1), 5);
        assert_eq!(replicate_count(2), 6);

        let t = table(&[("10001", 5)]);
        let outcome = select(&t, None, &request(VizMode::DensityField), &MapConfig::default());
        match outcome.spec {
            RenderSpec::DensityField { points, .. } => {
                assert_eq!(points.len(), 15);
                assert!(points.iter().all(|p| p.hvi == 5));
            }
            other => panic!("expected density field, got {:?}", other),
        }
    }

    #[test]
    fn density_is_reproducible_for_fixed_input() {
        let t = table(&[("10001", 5), ("99999", 2)]);
        let map = MapConfig::default();
        let a = density_points(&t, &map);
        let b = density_points(&t, &map);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_zip_density_centers_on_city_fallback() {
        let t = table(&[("99999", 1)]);
        let map = MapConfig::default();
        let points = density_points(&t, &map);
        assert_eq!(points.len(), 5);
        for p in points {
            assert!((p.lat - crate::centroids::CITY_CENTER.0).abs() < 1.0);
            assert!((p.lon - crate::centroids::CITY_CENTER.1).abs() < 1.0);
        }
    }

    #[test]
    fn color_domain_ignores_the_active_filter() {
        let t = table(&[("10001", 1), ("10002", 3), ("10003", 5)]);
        let req = RenderRequest {
            mode: VizMode::ScatterPoints,
            color_scale: ColorScale::YlOrRd,
            low: Some(4),
            high: Some(5),
        };
        let outcome = select(&t, None, &req, &MapConfig::default());
        match outcome.spec {
            RenderSpec::ScatterPoints { points, range, .. } => {
                assert_eq!(points.len(), 1);
                assert_eq!(range, ColorRange { min: 1, max: 5 });
            }
            other => panic!("expected scatter, got {:?}", other),
        }
    }

    #[test]
    fn grid_layout_is_deterministic_and_square() {
        let t = table(&[("10001", 1), ("10002", 2), ("10003", 3), ("10004", 4)]);
        let map = MapConfig::default();
        let a = grid_points(&t, &map);
        let b = grid_points(&t, &map);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);

        // Four unique zips sit on a 2x2 grid around the city center.
        assert!((a[0].lat - (map.center_lat + (0.0 - 1.0) * map.grid_spacing)).abs() < 1e-12);
        assert!((a[0].lon - (map.center_lon + (0.0 - 1.0) * map.grid_spacing)).abs() < 1e-12);
        assert!((a[3].lat - (map.center_lat + (1.0 - 1.0) * map.grid_spacing)).abs() < 1e-12);
    }

    #[test]
    fn grid_deduplicates_zip_codes() {
        let t = table(&[("10001", 5), ("10001", 5), ("10002", 3)]);
        let points = grid_points(&t, &MapConfig::default());
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn empty_table_renders_empty_specs() {
        let t = HviTable::new(vec![]);
        let outcome = select(&t, None, &request(VizMode::ScatterPoints), &MapConfig::default());
        match outcome.spec {
            RenderSpec::ScatterPoints { points, range, .. } => {
                assert!(points.is_empty());
                assert_eq!(range.max, 5);
            }
            other => panic!("expected scatter, got {:?}", other),
        }
    }
}
