//! Polygon geometries used to mask rasters, and their loading from vector files
use std::path::Path;

use tracing::debug;

use crate::bbox::BoundingBox;
use crate::epsg::Crs;
use crate::math::Vec2f;
use crate::Error;

#[cfg(feature = "json")]
pub mod geojson;
pub mod rasterize;
pub mod shp;

// True if some part of the segment a-b of positive length lies strictly inside `bbox`.
// Liang-Barsky clipping, then the clipped part's midpoint rules out segments running
// along the box boundary
fn segment_enters(a: Vec2f, b: Vec2f, bbox: &BoundingBox) -> bool {
    let d = b - a;
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [
        (-d.x, a.x - bbox.xmin),
        (d.x, bbox.xmax - a.x),
        (-d.y, a.y - bbox.ymin),
        (d.y, bbox.ymax - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    if t0 >= t1 {
        return false;
    }
    let t = (t0 + t1) / 2.0;
    let (x, y) = (a.x + t * d.x, a.y + t * d.y);
    bbox.xmin < x && x < bbox.xmax && bbox.ymin < y && y < bbox.ymax
}

/// Twice the signed area of a ring (shoelace formula)
fn doubled_area(ring: &[Vec2f]) -> f64 {
    let origin = ring[0];
    ring.windows(2)
        .map(|w| (w[0] - origin).cross(&(w[1] - origin)))
        .sum()
}

// Drops the closing vertex if the ring is explicitly closed, and rejects rings that
// can't enclose anything
fn clean_ring(mut ring: Vec<Vec2f>) -> Result<Vec<Vec2f>, Error> {
    if let Some(p) = ring.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::InvalidGeometry(format!(
            "non finite vertex {:?}",
            p
        )));
    }
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 || doubled_area(&ring) == 0.0 {
        return Err(Error::InvalidGeometry(format!(
            "degenerate ring with {} distinct vertices",
            ring.len()
        )));
    }
    Ok(ring)
}

/// A polygon with an exterior ring and zero or more holes. Rings are stored open (the
/// first vertex is not repeated at the end), orientation doesn't matter
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<Vec2f>,
    interiors: Vec<Vec<Vec2f>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Vec2f>, interiors: Vec<Vec<Vec2f>>) -> Result<Polygon, Error> {
        Ok(Polygon {
            exterior: clean_ring(exterior)?,
            interiors: interiors
                .into_iter()
                .map(clean_ring)
                .collect::<Result<Vec<_>, Error>>()?,
        })
    }

    pub fn exterior(&self) -> &[Vec2f] {
        &self.exterior
    }

    pub fn interiors(&self) -> &[Vec<Vec2f>] {
        &self.interiors
    }

    /// The exterior ring then the holes
    pub fn rings(&self) -> impl Iterator<Item = &[Vec2f]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(|r| r.as_slice()))
    }

    /// Edges of all rings, including the closing one
    pub fn edges(&self) -> impl Iterator<Item = (Vec2f, Vec2f)> + '_ {
        self.rings().flat_map(|ring| {
            (0..ring.len()).map(move |k| (ring[k], ring[(k + 1) % ring.len()]))
        })
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.exterior)
    }

    /// Even-odd ray casting over all rings, so points in holes are outside
    pub fn contains(&self, p: Vec2f) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if x > p.x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// True if the polygon's interior overlaps the interior of `bbox`. Touching only the
    /// box boundary doesn't count, neither does a box lying entirely in a hole
    pub fn intersects_bbox(&self, bbox: &BoundingBox) -> bool {
        if !self.bounds().intersects(bbox) {
            return false;
        }
        if self.edges().any(|(a, b)| segment_enters(a, b, bbox)) {
            return true;
        }
        // No edge enters the box, so it is either fully inside or fully outside
        let centre = Vec2f {
            x: (bbox.xmin + bbox.xmax) / 2.0,
            y: (bbox.ymin + bbox.ymax) / 2.0,
        };
        self.contains(centre)
    }
}

/// The polygons a raster gets masked with, and the CRS their coordinates are in if known
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    polygons: Vec<Polygon>,
    crs: Option<Crs>,
}

impl GeometrySet {
    pub fn new(polygons: Vec<Polygon>, crs: Option<Crs>) -> GeometrySet {
        GeometrySet { polygons, crs }
    }

    /// Loads polygons from a shapefile (`.shp`) or GeoJSON (`.geojson`, `.json`) file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<GeometrySet, Error> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let set = match extension.as_deref() {
            Some("shp") => shp::read_shapefile(path)?,
            #[cfg(feature = "json")]
            Some("geojson") | Some("json") => geojson::read_geojson(path)?,
            _ => {
                return Err(Error::InvalidGeometry(format!(
                    "unsupported vector file {:?}",
                    path
                )))
            }
        };
        debug!(
            "loaded {} polygons from {:?}, crs={:?}",
            set.len(),
            path,
            set.crs
        );
        Ok(set)
    }

    /// Overrides the CRS, e.g. for files without CRS information
    pub fn with_crs(mut self, crs: Crs) -> GeometrySet {
        self.crs = Some(crs);
        self
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Bounds of the union of all polygons, None for an empty set
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.polygons
            .iter()
            .map(|p| p.bounds())
            .reduce(|a, b| a.union(&b))
    }
}
