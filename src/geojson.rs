//! Point-feature collection handed to the map/clustering layer.

use serde::Serialize;

use crate::models::Site;

// ---

#[derive(Debug, Serialize)]
pub struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Feature<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: u32,
    pub geometry: Point,
    /// Flat property bag: every field of the live site.
    pub properties: &'a Site,
}

#[derive(Debug, Serialize)]
pub struct Point {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

/// Wrap live sites as a GeoJSON `FeatureCollection`.
pub fn feature_collection(sites: &[Site]) -> FeatureCollection<'_> {
    // ---
    FeatureCollection {
        kind: "FeatureCollection",
        features: sites
            .iter()
            .map(|site| Feature {
                kind: "Feature",
                id: site.id,
                geometry: Point {
                    kind: "Point",
                    coordinates: site.coordinates,
                },
                properties: site,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::engine::aging::Metrics;
    use crate::engine::risk::RiskThresholds;
    use crate::models::SiteRecord;

    #[test]
    fn test_feature_collection_shape() {
        // ---
        let site = Site::new(
            SiteRecord {
                id: 12,
                name: "Kidd Creek".into(),
                location: "Timmins".into(),
                county: "Cochrane".into(),
                status: "Active".into(),
                coordinates: [-81.1, 48.7],
            },
            0.0,
            Metrics::trend_at(0.0),
            &RiskThresholds::default(),
        );
        let sites = vec![site];
        let json = serde_json::to_value(feature_collection(&sites)).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        let feature = &json["features"][0];
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["id"], 12);
        assert_eq!(feature["geometry"]["type"], "Point");
        assert_eq!(feature["geometry"]["coordinates"][0], -81.1);
        assert_eq!(feature["properties"]["name"], "Kidd Creek");
        assert_eq!(feature["properties"]["ph"], 7.0);
        assert_eq!(feature["properties"]["color"], "#4caf50");
    }
}
