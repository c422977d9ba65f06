use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{GeometrySet, Polygon};
use crate::epsg::Crs;
use crate::math::{vec2f, Vec2f};
use crate::Error;

type Position = Vec<f64>;
type PolygonCoordinates = Vec<Vec<Position>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: PolygonCoordinates,
    },
    MultiPolygon {
        coordinates: Vec<PolygonCoordinates>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
    #[serde(other)]
    Unsupported,
}

fn to_ring(positions: Vec<Position>) -> Result<Vec<Vec2f>, Error> {
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(vec2f(*x, *y)),
            _ => Err(Error::InvalidGeometry(format!(
                "position needs at least 2 coordinates, got {:?}",
                p
            ))),
        })
        .collect()
}

fn to_polygon(coordinates: PolygonCoordinates) -> Result<Polygon, Error> {
    let mut rings = coordinates.into_iter();
    let exterior = match rings.next() {
        Some(ring) => to_ring(ring)?,
        None => return Err(Error::InvalidGeometry("polygon without rings".to_string())),
    };
    let interiors = rings.map(to_ring).collect::<Result<Vec<_>, Error>>()?;
    Polygon::new(exterior, interiors)
}

fn collect_geometry(geometry: Geometry, polygons: &mut Vec<Polygon>) -> Result<(), Error> {
    match geometry {
        Geometry::Polygon { coordinates } => polygons.push(to_polygon(coordinates)?),
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                polygons.push(to_polygon(polygon)?);
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for g in geometries {
                collect_geometry(g, polygons)?;
            }
        }
        Geometry::Unsupported => {
            return Err(Error::InvalidGeometry(
                "only Polygon and MultiPolygon geometries can be used as masks".to_string(),
            ))
        }
    }
    Ok(())
}

// FeatureCollection and Feature wrap geometries, anything else must be a geometry object
fn collect_object(object: Value, polygons: &mut Vec<Polygon>) -> Result<(), Error> {
    match object.get("type").and_then(|t| t.as_str()) {
        Some("FeatureCollection") => {
            let features = match object.get("features").and_then(|f| f.as_array()) {
                Some(features) => features,
                None => {
                    return Err(Error::InvalidGeometry(
                        "FeatureCollection without features".to_string(),
                    ))
                }
            };
            for feature in features {
                collect_object(feature.clone(), polygons)?;
            }
        }
        Some("Feature") => match object.get("geometry") {
            // Features with a null geometry are skipped
            None | Some(Value::Null) => {}
            Some(geometry) => {
                collect_geometry(serde_json::from_value(geometry.clone())?, polygons)?
            }
        },
        _ => collect_geometry(serde_json::from_value(object)?, polygons)?,
    }
    Ok(())
}

// The "crs" member was dropped from RFC 7946 but is still written by GDAL and QGIS
fn legacy_crs(root: &Value) -> Result<Option<Crs>, Error> {
    let name = match root.pointer("/crs/properties/name").and_then(|v| v.as_str()) {
        Some(name) => name,
        None => return Ok(None),
    };
    match Crs::from_name(name) {
        Some(crs) => Ok(Some(crs)),
        None => Err(Error::UnsupportedProjection(format!(
            "unrecognized GeoJSON crs {:?}",
            name
        ))),
    }
}

/// Parses the polygons of a GeoJSON document. The CRS is only known when the document
/// carries a legacy named `crs` member
pub fn parse_geojson(text: &str) -> Result<GeometrySet, Error> {
    let root: Value = serde_json::from_str(text)?;
    let crs = legacy_crs(&root)?;
    let mut polygons = vec![];
    collect_object(root, &mut polygons)?;
    Ok(GeometrySet::new(polygons, crs))
}

pub fn read_geojson(path: &Path) -> Result<GeometrySet, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidGeometry(format!("failed to read {:?}: {}", path, e)))?;
    parse_geojson(&text)
}
