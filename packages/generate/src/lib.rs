#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Choropleth export.
//!
//! Writes the classified region fragments as a `GeoJSON`
//! `FeatureCollection` that any map renderer can style by the
//! `incidence_bin` property. The collection carries a `legend` foreign
//! member listing the effective classes in ascending order, so renderers do
//! not need to recompute breaks. Unclassified fragments are written with a
//! `null` bin and must be drawn distinctly.

use std::io::{BufWriter, Write as _};
use std::path::Path;

use covid_map_analytics_models::{Classification, ClassificationSummary};
use covid_map_config::paths;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while writing the choropleth.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// I/O error (file write or rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Builds the choropleth `FeatureCollection`.
///
/// One feature per fragment, in classification order, with properties
/// `region_id`, `region_code`, `incidence`, `incidence_bin` and
/// `bin_index`.
#[must_use]
pub fn build_choropleth(classification: &Classification) -> FeatureCollection {
    let features = classification
        .regions
        .iter()
        .map(|region| {
            let attrs = &region.attributes;
            let mut properties = JsonObject::new();
            properties.insert("region_id".to_string(), json!(attrs.region_id));
            properties.insert("region_code".to_string(), json!(attrs.region_code));
            properties.insert("incidence".to_string(), json!(attrs.incidence));
            properties.insert("incidence_bin".to_string(), json!(attrs.incidence_bin));
            properties.insert("bin_index".to_string(), json!(attrs.bin_index));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let summary = covid_map_analytics::summarize(classification);

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("legend".to_string(), legend(&summary));
    foreign_members.insert(
        "breaks".to_string(),
        json!(classification.breaks.as_ref().map(|b| b.values().to_vec())),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

fn legend(summary: &ClassificationSummary) -> JsonValue {
    let classes: Vec<JsonValue> = summary
        .classes
        .iter()
        .map(|class| {
            json!({
                "bin_index": class.bin.index,
                "label": class.bin.label,
                "lower": class.bin.lower,
                "upper": class.bin.upper,
                "fragments": class.fragments,
                "regions": class.regions,
            })
        })
        .collect();

    json!({
        "classes": classes,
        "unclassified_fragments": summary.unclassified_fragments,
    })
}

/// Writes the choropleth to `path`, replacing any existing file atomically.
///
/// # Errors
///
/// Returns [`GenerateError`] if the directory, temporary file, or rename
/// fails, or if serialization fails. On failure the temporary file is
/// removed and any existing choropleth is left untouched.
pub fn write_choropleth(path: &Path, classification: &Classification) -> Result<(), GenerateError> {
    let collection = build_choropleth(classification);

    paths::write_atomic(path, |tmp| {
        let mut writer = BufWriter::new(std::fs::File::create(tmp)?);
        serde_json::to_writer(&mut writer, &collection)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok::<_, GenerateError>(())
    })?;

    log::info!(
        "Exported {} choropleth features",
        collection.features.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use covid_map_analytics_models::{BreakBasis, ClassifiedRegion};
    use covid_map_geography_models::{GeoRecord, RegionIncidence};
    use geo::{LineString, MultiPolygon, Polygon};

    use super::*;

    fn square(offset: f64) -> MultiPolygon<f64> {
        let exterior = LineString::from(vec![
            (offset, 0.0),
            (offset + 1.0, 0.0),
            (offset + 1.0, 1.0),
            (offset, 1.0),
            (offset, 0.0),
        ]);
        MultiPolygon(vec![Polygon::new(exterior, vec![])])
    }

    fn region(id: i64, code: Option<&str>, incidence: Option<f64>) -> GeoRecord<RegionIncidence> {
        #[allow(clippy::cast_precision_loss)]
        let offset = id as f64;
        GeoRecord::new(
            square(offset),
            RegionIncidence {
                region_id: id,
                region_code: code.map(str::to_string),
                incidence,
            },
        )
    }

    fn classification() -> Classification {
        covid_map_analytics::classify(
            vec![
                region(1, Some("ZH"), Some(100.0)),
                region(2, Some("BE"), Some(200.0)),
                region(2, Some("BE"), Some(200.0)),
                region(3, Some("LU"), Some(300.0)),
                region(4, Some("NW"), None),
            ],
            2,
            BreakBasis::Regions,
        )
    }

    #[test]
    fn features_carry_bin_properties() {
        let collection = build_choropleth(&classification());
        assert_eq!(collection.features.len(), 5);

        let first = &collection.features[0];
        assert_eq!(first.property("region_code"), Some(&json!("ZH")));
        assert_eq!(first.property("incidence_bin"), Some(&json!("100-200")));
        assert_eq!(first.property("bin_index"), Some(&json!(0)));
        assert!(first.geometry.is_some());

        let missing = &collection.features[4];
        assert_eq!(missing.property("incidence"), Some(&JsonValue::Null));
        assert_eq!(missing.property("incidence_bin"), Some(&JsonValue::Null));
        assert_eq!(missing.property("bin_index"), Some(&JsonValue::Null));
    }

    #[test]
    fn legend_lists_effective_classes() {
        let collection = build_choropleth(&classification());
        let legend = &collection.foreign_members.as_ref().unwrap()["legend"];

        let labels: Vec<_> = legend["classes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["100-200", "200-300"]);
        assert_eq!(legend["classes"][0]["fragments"], json!(3));
        assert_eq!(legend["classes"][0]["regions"], json!(2));
        assert_eq!(legend["unclassified_fragments"], json!(1));
    }

    #[test]
    fn no_breaks_writes_null_breaks_and_empty_legend() {
        let classification = Classification {
            breaks: None,
            regions: vec![GeoRecord::new(
                square(0.0),
                ClassifiedRegion {
                    region_id: 1,
                    region_code: None,
                    incidence: None,
                    bin_index: None,
                    incidence_bin: None,
                },
            )],
        };

        let collection = build_choropleth(&classification);
        let members = collection.foreign_members.unwrap();
        assert_eq!(members["breaks"], JsonValue::Null);
        assert_eq!(members["legend"]["classes"], json!([]));
        assert_eq!(members["legend"]["unclassified_fragments"], json!(1));
    }

    #[test]
    fn writes_parseable_geojson_atomically() {
        let dir = std::env::temp_dir().join("covid_map_generate_write");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("generated").join("choropleth.geojson");

        write_choropleth(&path, &classification()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: geojson::GeoJson = text.parse().unwrap();
        let geojson::GeoJson::FeatureCollection(collection) = parsed else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 5);
        assert!(!paths::tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_write_keeps_no_tmp() {
        let dir = std::env::temp_dir().join("covid_map_generate_failed_write");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("choropleth.geojson");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let err = write_choropleth(&path, &classification()).unwrap_err();
        assert!(matches!(err, GenerateError::Io(_)));
        assert!(path.is_dir());
        assert!(!paths::tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
