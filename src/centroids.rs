//! Approximate zip-code centroids used by the density path when no boundary
//! polygons are available. Coarse by design; zips missing from the table
//! resolve to the city reference point.

/// Manhattan reference point, also the fallback for unknown zips.
pub const CITY_CENTER: (f64, f64) = (40.7128, -74.0060);

/// (zipcode, lat, lon), approximate centroids for NYC zip code tabulation
/// areas covered by the HVI rankings sample.
const CENTROIDS: &[(&str, f64, f64)] = &[
    ("10001", 40.7506, -73.9971),
    ("10002", 40.7157, -73.9860),
    ("10003", 40.7318, -73.9890),
    ("10004", 40.6885, -74.0180),
    ("10005", 40.7061, -74.0087),
    ("10006", 40.7089, -74.0132),
    ("10007", 40.7135, -74.0080),
    ("10009", 40.7264, -73.9786),
    ("10010", 40.7390, -73.9826),
    ("10011", 40.7416, -74.0000),
    ("10012", 40.7255, -73.9983),
    ("10013", 40.7200, -74.0049),
    ("10014", 40.7340, -74.0054),
    ("10016", 40.7454, -73.9781),
    ("10017", 40.7523, -73.9724),
    ("10018", 40.7551, -73.9933),
    ("10019", 40.7655, -73.9851),
    ("10021", 40.7693, -73.9588),
    ("10022", 40.7583, -73.9679),
    ("10023", 40.7769, -73.9826),
    ("10024", 40.7864, -73.9764),
    ("10025", 40.7987, -73.9667),
    ("10026", 40.8027, -73.9527),
    ("10027", 40.8114, -73.9533),
    ("10028", 40.7764, -73.9535),
    ("10029", 40.7918, -73.9440),
    ("10030", 40.8183, -73.9426),
    ("10031", 40.8250, -73.9500),
    ("10032", 40.8388, -73.9426),
    ("10033", 40.8501, -73.9339),
    ("10034", 40.8672, -73.9212),
    ("10035", 40.7957, -73.9296),
    ("10036", 40.7595, -73.9898),
    ("10037", 40.8129, -73.9374),
    ("10038", 40.7093, -74.0025),
    ("10039", 40.8265, -73.9383),
    ("10040", 40.8584, -73.9304),
];

/// Returns the known centroid for a zip, or the city center when the zip is
/// absent from the table.
pub fn lookup(zipcode: &str) -> (f64, f64) {
    CENTROIDS
        .iter()
        .find(|(z, _, _)| *z == zipcode)
        .map(|(_, lat, lon)| (*lat, *lon))
        .unwrap_or(CITY_CENTER)
}
