use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One row of the HVI table. The zip code is an opaque identifier, never a
/// number, even when the source file stored it numerically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub zipcode: String,
    pub hvi: u8,
}

/// The loaded HVI table. Immutable once built for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HviTable {
    pub records: Vec<VulnerabilityRecord>,
}

impl HviTable {
    pub fn new(records: Vec<VulnerabilityRecord>) -> Self {
        HviTable { records }
    }

    pub fn min_hvi(&self) -> Option<u8> {
        self.records.iter().map(|r| r.hvi).min()
    }

    pub fn max_hvi(&self) -> Option<u8> {
        self.records.iter().map(|r| r.hvi).max()
    }

    /// Inclusive range filter over hvi. Idempotent for fixed bounds.
    pub fn filter(&self, low: u8, high: u8) -> HviTable {
        HviTable {
            records: self
                .records
                .iter()
                .filter(|r| r.hvi >= low && r.hvi <= high)
                .cloned()
                .collect(),
        }
    }
}

/// Which feature property carries the zip code for a loaded boundary
/// collection. Detected once per load from a sample feature; a schema where
/// none of the known keys appear is its own degraded state rather than a
/// silent default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipKey {
    Property(String),
    Unrecognized,
}

/// A validated boundary collection plus its detected zip-code property key.
#[derive(Debug, Clone)]
pub struct GeoBoundary {
    pub collection: FeatureCollection,
    pub zip_key: ZipKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VizMode {
    Choropleth,
    ScatterPoints,
    DensityField,
}

impl FromStr for VizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "choropleth" => Ok(VizMode::Choropleth),
            "scatter" | "scatter_points" => Ok(VizMode::ScatterPoints),
            "density" | "density_field" => Ok(VizMode::DensityField),
            other => Err(format!("unknown visualization mode: {}", other)),
        }
    }
}

/// The fixed set of color scales the dashboard offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorScale {
    #[serde(rename = "Reds")]
    Reds,
    #[serde(rename = "RdYlGn_r")]
    RdYlGnRev,
    #[serde(rename = "Oranges")]
    Oranges,
    #[serde(rename = "YlOrRd")]
    YlOrRd,
    #[serde(rename = "inferno")]
    Inferno,
}

impl ColorScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScale::Reds => "Reds",
            ColorScale::RdYlGnRev => "RdYlGn_r",
            ColorScale::Oranges => "Oranges",
            ColorScale::YlOrRd => "YlOrRd",
            ColorScale::Inferno => "inferno",
        }
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reds" => Ok(ColorScale::Reds),
            "RdYlGn_r" => Ok(ColorScale::RdYlGnRev),
            "Oranges" => Ok(ColorScale::Oranges),
            "YlOrRd" => Ok(ColorScale::YlOrRd),
            "inferno" => Ok(ColorScale::Inferno),
            other => Err(format!("unknown color scale: {}", other)),
        }
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color domain shared by all three modes so color meaning survives mode
/// switches and filter changes. Min is pinned at 1; max is the unfiltered
/// table's observed maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorRange {
    pub min: u8,
    pub max: u8,
}

/// A point carrying an hvi value, used by the scatter and density specs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedPoint {
    pub zipcode: String,
    pub lat: f64,
    pub lon: f64,
    pub hvi: u8,
}

/// The output of render selection. Built fresh per interaction, never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderSpec {
    Choropleth {
        #[serde(serialize_with = "serialize_boundary")]
        boundary: Arc<GeoBoundary>,
        /// Dotted feature path, e.g. "properties.postalCode".
        feature_key: String,
        rows: Vec<VulnerabilityRecord>,
        color_scale: ColorScale,
        range: ColorRange,
    },
    ScatterPoints {
        points: Vec<WeightedPoint>,
        color_scale: ColorScale,
        range: ColorRange,
    },
    DensityField {
        points: Vec<WeightedPoint>,
        color_scale: ColorScale,
        range: ColorRange,
    },
}

fn serialize_boundary<S>(boundary: &Arc<GeoBoundary>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    boundary.collection.serialize(serializer)
}

/// A render spec plus the advisories explaining any downgrade that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub spec: RenderSpec,
    pub advisories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn filter_is_inclusive_and_idempotent() {
        let t = table(&[("10001", 1), ("10002", 3), ("10003", 5)]);
        let once = t.filter(3, 5);
        assert_eq!(once.records.len(), 2);
        assert!(once.records.iter().all(|r| r.hvi >= 3 && r.hvi <= 5));
        let twice = once.filter(3, 5);
        assert_eq!(once, twice);
    }

    #[test]
    fn observed_bounds() {
        let t = table(&[("10001", 2), ("10002", 4)]);
        assert_eq!(t.min_hvi(), Some(2));
        assert_eq!(t.max_hvi(), Some(4));
        assert_eq!(HviTable::new(vec![]).max_hvi(), None);
    }

    #[test]
    fn mode_and_scale_parse() {
        assert_eq!("choropleth".parse::<VizMode>(), Ok(VizMode::Choropleth));
        assert_eq!("scatter".parse::<VizMode>(), Ok(VizMode::ScatterPoints));
        assert_eq!("density".parse::<VizMode>(), Ok(VizMode::DensityField));
        assert!("heatmap3d".parse::<VizMode>().is_err());

        assert_eq!("RdYlGn_r".parse::<ColorScale>(), Ok(ColorScale::RdYlGnRev));
        assert_eq!(ColorScale::Inferno.as_str(), "inferno");
        assert!("viridis".parse::<ColorScale>().is_err());
    }
}
