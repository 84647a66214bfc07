// src/gis/features.rs

use serde_json::{json, Value};
use tracing::warn;

/// A polygon feature tagged with the travel time (minutes) it represents.
/// `contour` is `None` when the feature carries no usable contour property.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedFeature {
    pub contour: Option<f64>,
    pub geometry: Value,
}

/// Pulls the feature list out of the shapes providers and files use:
/// a FeatureCollection, any object with `features`, an array wrapping a
/// collection, or a bare array of features.
pub fn feature_list(doc: &Value) -> Vec<Value> {
    match doc {
        Value::Object(obj) => match obj.get("features").and_then(Value::as_array) {
            Some(features) => features.clone(),
            None => {
                warn!("document has no features array");
                Vec::new()
            }
        },
        Value::Array(items) => match items.first().and_then(|f| f.get("features")) {
            Some(Value::Array(features)) => features.clone(),
            Some(_) => {
                warn!("wrapped collection has a non-array features member");
                Vec::new()
            }
            None => items.clone(),
        },
        _ => {
            warn!("feature document is neither an object nor an array");
            Vec::new()
        }
    }
}

/// Reads `properties.contour` (number or numeric string) and the geometry.
/// Features without a geometry object are dropped here.
pub fn tagged_features(doc: &Value) -> Vec<TaggedFeature> {
    feature_list(doc)
        .into_iter()
        .filter_map(|feature| {
            let contour = feature
                .get("properties")
                .and_then(|p| p.get("contour"))
                .and_then(|c| match c {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                })
                .filter(|c| c.is_finite());

            match feature.get("geometry") {
                Some(geometry) if geometry.is_object() => Some(TaggedFeature {
                    contour,
                    geometry: geometry.clone(),
                }),
                _ => {
                    warn!("skipping feature without geometry");
                    None
                }
            }
        })
        .collect()
}

/// Builds a GeoJSON Feature with the given properties.
pub fn feature(geometry: Value, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
