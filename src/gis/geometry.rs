// src/gis/geometry.rs

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;

/// A zone outline in WGS84, always held as a multi-polygon so simple
/// and multi-part zones share one containment path.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneGeometry(MultiPolygon<f64>);

impl ZoneGeometry {
    /// Parses a GeoJSON `Polygon` or `MultiPolygon` geometry object.
    pub fn from_geojson(geometry: &Value) -> Result<Self, String> {
        let kind = geometry
            .get("type")
            .and_then(Value::as_str)
            .ok_or("geometry has no type")?;
        let coords = geometry
            .get("coordinates")
            .ok_or("geometry has no coordinates")?;

        let polygons = match kind {
            "Polygon" => vec![parse_polygon(coords)?],
            "MultiPolygon" => coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array")?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(format!("unsupported geometry type '{other}'")),
        };

        if polygons.is_empty() {
            return Err("geometry has no polygons".into());
        }
        Ok(ZoneGeometry(MultiPolygon::new(polygons)))
    }

    /// Strict containment: points on the boundary are outside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.0.contains(&Point::new(lon, lat))
    }
}

fn parse_polygon(rings: &Value) -> Result<Polygon<f64>, String> {
    let rings = rings.as_array().ok_or("polygon must be an array of rings")?;
    let mut parsed = rings.iter().map(parse_ring);

    let exterior = parsed.next().ok_or("polygon has no exterior ring")??;
    let interiors = parsed.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>, String> {
    let positions = ring.as_array().ok_or("ring must be an array of positions")?;
    if positions.len() < 3 {
        return Err(format!("ring has {} positions, need at least 3", positions.len()));
    }

    let coords = positions
        .iter()
        .map(|p| -> Result<Coord<f64>, String> {
            let pair = p.as_array().filter(|a| a.len() >= 2).ok_or("position must be [lon, lat]")?;
            let x = pair[0].as_f64().filter(|v| v.is_finite()).ok_or("longitude is not a number")?;
            let y = pair[1].as_f64().filter(|v| v.is_finite()).ok_or("latitude is not a number")?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(LineString::new(coords))
}

#[cfg(test)]
pub(crate) fn square(min_lon: f64, min_lat: f64, size: f64) -> Value {
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lon, min_lat],
            [min_lon + size, min_lat],
            [min_lon + size, min_lat + size],
            [min_lon, min_lat + size],
            [min_lon, min_lat]
        ]]
    })
}
