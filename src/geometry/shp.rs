use std::path::Path;

use shapefile::{PolygonRing, Shape};
use tracing::warn;

use super::{GeometrySet, Polygon};
use crate::epsg::Crs;
use crate::math::{vec2f, Vec2f};
use crate::Error;

// Outer rings start a new polygon, inner rings are holes of the last one. The shapefile
// crate already classifies rings by winding order
fn push_rings<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Vec2f,
    polygons: &mut Vec<Polygon>,
) -> Result<(), Error> {
    let mut current: Option<(Vec<Vec2f>, Vec<Vec<Vec2f>>)> = None;
    for ring in rings {
        let points: Vec<Vec2f> = ring.points().iter().map(&xy).collect();
        match ring {
            PolygonRing::Outer(_) => {
                if let Some((exterior, interiors)) = current.take() {
                    polygons.push(Polygon::new(exterior, interiors)?);
                }
                current = Some((points, vec![]));
            }
            PolygonRing::Inner(_) => match current.as_mut() {
                Some((_, interiors)) => interiors.push(points),
                None => {
                    return Err(Error::InvalidGeometry(
                        "inner ring before any outer ring".to_string(),
                    ))
                }
            },
        }
    }
    if let Some((exterior, interiors)) = current {
        polygons.push(Polygon::new(exterior, interiors)?);
    }
    Ok(())
}

/// Reads all polygons of a shapefile. The CRS comes from the sibling `.prj`, if any
pub fn read_shapefile(path: &Path) -> Result<GeometrySet, Error> {
    let shapes = shapefile::read_shapes(path)?;
    let mut polygons = vec![];
    for shape in shapes {
        match shape {
            Shape::Polygon(p) => push_rings(p.rings(), |pt| vec2f(pt.x, pt.y), &mut polygons)?,
            Shape::PolygonM(p) => push_rings(p.rings(), |pt| vec2f(pt.x, pt.y), &mut polygons)?,
            Shape::PolygonZ(p) => push_rings(p.rings(), |pt| vec2f(pt.x, pt.y), &mut polygons)?,
            Shape::NullShape => continue,
            other => {
                return Err(Error::InvalidGeometry(format!(
                    "unsupported shape type {:?}, expected polygons",
                    other.shapetype()
                )))
            }
        }
    }

    let prj_path = path.with_extension("prj");
    let crs = match std::fs::read_to_string(&prj_path) {
        Ok(wkt) => {
            let crs = crs_from_wkt(&wkt);
            if crs.is_none() {
                warn!("could not identify an EPSG code in {:?}", prj_path);
            }
            crs
        }
        Err(_) => None,
    };
    Ok(GeometrySet::new(polygons, crs))
}

// Content of the AUTHORITY[...] (WKT1) or ID[...] (WKT2) node directly under the root node
fn root_authority(wkt: &str) -> Option<&str> {
    let mut depth = 0;
    let mut in_quote = false;
    let mut keyword_start = 0;
    let mut node: Option<usize> = None;
    for (i, c) in wkt.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '[' | '(' => {
                let keyword = wkt[keyword_start..i].trim().to_ascii_uppercase();
                depth += 1;
                if depth == 2 && (keyword == "AUTHORITY" || keyword == "ID") {
                    node = Some(i + 1);
                }
            }
            ']' | ')' => {
                if depth == 2 {
                    if let Some(start) = node {
                        return Some(&wkt[start..i]);
                    }
                }
                depth -= 1;
            }
            ',' => keyword_start = i + 1,
            _ => {}
        }
        if c == '[' || c == '(' {
            keyword_start = i + 1;
        }
    }
    None
}

// ESRI flavoured .prj files usually carry no authority, recognize the most common names
fn crs_from_esri_name(wkt: &str) -> Option<Crs> {
    let name = wkt.split('"').nth(1)?;
    if wkt.trim_start().starts_with("GEOGCS") && name == "GCS_WGS_1984" {
        return Some(Crs::Wgs84);
    }
    if name == "WGS_1984_Web_Mercator_Auxiliary_Sphere" {
        return Some(Crs::PseudoMercator);
    }
    let zone = name.strip_prefix("WGS_1984_UTM_Zone_")?;
    let (number, hemisphere) = zone.split_at(zone.len().checked_sub(1)?);
    let number: u8 = number.parse().ok()?;
    if !(1..=60).contains(&number) {
        return None;
    }
    match hemisphere {
        "N" => Some(Crs::UtmNorth(number)),
        "S" => Some(Crs::UtmSouth(number)),
        _ => None,
    }
}

/// Best effort EPSG identification of a WKT CRS definition
pub fn crs_from_wkt(wkt: &str) -> Option<Crs> {
    if let Some(authority) = root_authority(wkt) {
        let mut parts = authority.split(',').map(|p| p.trim().trim_matches('"'));
        if let (Some(name), Some(code)) = (parts.next(), parts.next()) {
            if name.eq_ignore_ascii_case("EPSG") {
                return code.parse::<u16>().ok().map(Crs::decode);
            }
        }
    }
    crs_from_esri_name(wkt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::{Point, Polygon as ShpPolygon, ShapeWriter};

    const UTM36N_WKT: &str = r#"PROJCS["WGS 84 / UTM zone 36N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",33],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","32636"]]"#;

    #[test]
    fn test_crs_from_wkt_root_authority() {
        assert_eq!(crs_from_wkt(UTM36N_WKT), Some(Crs::UtmNorth(36)));
    }

    #[test]
    fn test_crs_from_wkt_ignores_nested_authority() {
        // No root authority: the unit's EPSG 9001 must not be picked up
        let wkt = r#"PROJCS["custom",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],UNIT["metre",1,AUTHORITY["EPSG","9001"]]]"#;
        assert_eq!(crs_from_wkt(wkt), None);
    }

    #[test]
    fn test_crs_from_wkt2_id() {
        let wkt = r#"GEOGCRS["WGS 84",DATUM["World Geodetic System 1984",ELLIPSOID["WGS 84",6378137,298.257223563]],CS[ellipsoidal,2],ID["EPSG",4326]]"#;
        assert_eq!(crs_from_wkt(wkt), Some(Crs::Wgs84));
    }

    #[test]
    fn test_crs_from_esri_wkt() {
        let wkt = r#"PROJCS["WGS_1984_UTM_Zone_36S",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],UNIT["Meter",1.0]]"#;
        assert_eq!(crs_from_wkt(wkt), Some(Crs::UtmSouth(36)));
        let wkt = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(crs_from_wkt(wkt), Some(Crs::Wgs84));
    }

    fn square(x: f64, y: f64, size: f64, clockwise: bool) -> Vec<Point> {
        let mut pts = vec![
            Point::new(x, y),
            Point::new(x, y + size),
            Point::new(x + size, y + size),
            Point::new(x + size, y),
            Point::new(x, y),
        ];
        if !clockwise {
            pts.reverse();
        }
        pts
    }

    #[test]
    fn test_read_shapefile_with_hole_and_prj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.shp");
        {
            let mut writer = ShapeWriter::from_path(&path).unwrap();
            let field = ShpPolygon::with_rings(vec![
                PolygonRing::Outer(square(0.0, 0.0, 10.0, true)),
                PolygonRing::Inner(square(4.0, 4.0, 2.0, false)),
            ]);
            let other = ShpPolygon::new(PolygonRing::Outer(square(20.0, 0.0, 5.0, true)));
            writer.write_shape(&field).unwrap();
            writer.write_shape(&other).unwrap();
        }
        std::fs::write(dir.path().join("fields.prj"), UTM36N_WKT).unwrap();

        let set = GeometrySet::from_path(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.crs(), Some(Crs::UtmNorth(36)));
        let field = &set.polygons()[0];
        assert_eq!(field.interiors().len(), 1);
        assert!(field.contains(vec2f(1.0, 1.0)));
        assert!(!field.contains(vec2f(5.0, 5.0)));
        assert!(set.polygons()[1].contains(vec2f(22.0, 2.0)));
    }

    #[test]
    fn test_read_missing_shapefile() {
        let res = GeometrySet::from_path("/nonexistent/fields.shp");
        assert!(matches!(res, Err(Error::InvalidGeometry(_))));
    }
}
