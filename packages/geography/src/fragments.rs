//! `GeoJSON` region fragment loading.

use std::path::Path;

use covid_map_geography_models::{GeoRecord, RegionFragment};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde_json::Value;

use crate::GeoError;

/// Loads every feature of a `GeoJSON` `FeatureCollection` as a region
/// fragment.
///
/// Each feature must carry a `Polygon` or `MultiPolygon` geometry and a
/// numeric region id in the `id_field` property (integer, integral float,
/// or numeric string). Other properties are discarded. Several features may
/// share an id when a region consists of separate pieces.
///
/// # Errors
///
/// Returns [`GeoError::FileNotFound`] if `path` does not exist,
/// [`GeoError::GeoJson`] if it is not valid `GeoJSON`, and
/// [`GeoError::Conversion`] if the document is not a `FeatureCollection` or
/// a feature lacks a usable geometry or id.
pub fn load_fragments(
    path: &Path,
    id_field: &str,
) -> Result<Vec<GeoRecord<RegionFragment>>, GeoError> {
    if !path.is_file() {
        return Err(GeoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path)?;
    let fragments = parse_fragments(&contents, id_field)?;

    log::info!(
        "Loaded {} region fragments from {}",
        fragments.len(),
        path.display()
    );

    Ok(fragments)
}

/// Parses a `GeoJSON` document into region fragments.
///
/// # Errors
///
/// See [`load_fragments`].
pub fn parse_fragments(
    contents: &str,
    id_field: &str,
) -> Result<Vec<GeoRecord<RegionFragment>>, GeoError> {
    let GeoJson::FeatureCollection(collection) = contents.parse::<GeoJson>()? else {
        return Err(GeoError::Conversion {
            index: 0,
            message: "expected a FeatureCollection".to_string(),
        });
    };

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| parse_feature(index, feature, id_field))
        .collect()
}

fn parse_feature(
    index: usize,
    feature: Feature,
    id_field: &str,
) -> Result<GeoRecord<RegionFragment>, GeoError> {
    let conversion = |message: String| GeoError::Conversion { index, message };

    let region_id = feature
        .property(id_field)
        .ok_or_else(|| conversion(format!("missing '{id_field}' property")))
        .and_then(|value| {
            parse_region_id(value)
                .ok_or_else(|| conversion(format!("'{id_field}' value {value} is not an integer")))
        })?;

    let geometry = feature
        .geometry
        .ok_or_else(|| conversion("missing geometry".to_string()))?;

    let geometry = match geo::Geometry::<f64>::try_from(geometry)? {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        other => {
            return Err(conversion(format!(
                "unsupported geometry type {}",
                geometry_name(&other)
            )));
        }
    };

    Ok(GeoRecord::new(geometry, RegionFragment { region_id }))
}

/// Reads a region id from a JSON integer, integral float, or numeric
/// string.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_region_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() <= i64::MAX as f64).then(|| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                let f = s.parse::<f64>().ok()?;
                (f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                    .then(|| f as i64)
            })
        }
        _ => None,
    }
}

const fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
