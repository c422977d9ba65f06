//! Burns polygons into a boolean grid aligned on a raster's pixels.
//!
//! Two inclusion rules are supported:
//! - by default a pixel is inside when its centre is inside a polygon (even-odd rule, so
//!   holes are excluded)
//! - with `all_touched`, pixels whose interior is crossed by a polygon edge are added
use ndarray::Array2;

use super::Polygon;
use crate::math::Vec2f;
use crate::tiff::georef::Geotransform;

fn clamp_index(v: f64, len: usize) -> usize {
    if v <= 0.0 {
        0
    } else if v >= len as f64 {
        len
    } else {
        v as usize
    }
}

// Polygon rings in (col, row) pixel space
fn to_pixel_rings(polygon: &Polygon, transform: &Geotransform) -> Vec<Vec<Vec2f>> {
    polygon
        .rings()
        .map(|ring| {
            ring.iter()
                .map(|p| transform.world_to_pixel(p.x, p.y))
                .collect()
        })
        .collect()
}

fn ring_edges(rings: &[Vec<Vec2f>]) -> impl Iterator<Item = (Vec2f, Vec2f)> + '_ {
    rings
        .iter()
        .flat_map(|ring| (0..ring.len()).map(move |k| (ring[k], ring[(k + 1) % ring.len()])))
}

// Marks pixels whose centre is inside the rings, one scanline per pixel row
fn fill_centres(rings: &[Vec<Vec2f>], mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    let (ymin, ymax) = ring_edges(rings).fold((f64::INFINITY, f64::NEG_INFINITY), |acc, (a, _)| {
        (acc.0.min(a.y), acc.1.max(a.y))
    });
    let first_row = clamp_index((ymin - 0.5).ceil(), rows);
    let last_row = clamp_index((ymax - 0.5).ceil(), rows);

    let mut crossings = vec![];
    for row in first_row..last_row {
        let y = row as f64 + 0.5;
        crossings.clear();
        for (a, b) in ring_edges(rings) {
            if (a.y > y) != (b.y > y) {
                crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        // Centres in [x0, x1) of each pair of crossings are inside
        for span in crossings.chunks_exact(2) {
            let from = clamp_index((span[0] - 0.5).ceil(), cols);
            let to = clamp_index((span[1] - 0.5).ceil(), cols);
            for col in from..to {
                mask[(row, col)] = true;
            }
        }
    }
}

// Marks the pixels each edge passes through. Edges running exactly along pixel boundaries
// don't mark the pixels on either side
fn fill_edges(rings: &[Vec<Vec2f>], mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    for (a, b) in ring_edges(rings) {
        let (lo, hi) = if a.y <= b.y { (a, b) } else { (b, a) };
        if lo.y == hi.y {
            if lo.y.fract() == 0.0 || lo.y < 0.0 || lo.y >= rows as f64 {
                continue;
            }
            let row = lo.y as usize;
            let from = clamp_index(lo.x.min(hi.x).floor(), cols);
            let to = clamp_index(lo.x.max(hi.x).ceil(), cols);
            for col in from..to {
                mask[(row, col)] = true;
            }
            continue;
        }
        let first_row = clamp_index(lo.y.floor(), rows);
        let last_row = clamp_index(hi.y.ceil(), rows);
        let x_at = |y: f64| lo.x + (y - lo.y) * (hi.x - lo.x) / (hi.y - lo.y);
        for row in first_row..last_row {
            let y0 = lo.y.max(row as f64);
            let y1 = hi.y.min(row as f64 + 1.0);
            if y0 >= y1 {
                continue;
            }
            let (x0, x1) = (x_at(y0), x_at(y1));
            let (xlo, xhi) = (x0.min(x1), x0.max(x1));
            let from = clamp_index(xlo.floor(), cols);
            let to = clamp_index(xhi.ceil(), cols);
            for col in from..to {
                mask[(row, col)] = true;
            }
        }
    }
}

/// Returns a `shape` (rows, cols) grid where pixels covered by any of the polygons are true.
/// `transform` maps the grid's pixels to the polygons' coordinates
pub fn rasterize(
    polygons: &[Polygon],
    transform: &Geotransform,
    shape: (usize, usize),
    all_touched: bool,
) -> Array2<bool> {
    let mut mask = Array2::from_elem(shape, false);
    if shape.0 == 0 || shape.1 == 0 {
        return mask;
    }
    for polygon in polygons {
        let rings = to_pixel_rings(polygon, transform);
        fill_centres(&rings, &mut mask);
        if all_touched {
            fill_edges(&rings, &mut mask);
        }
    }
    mask
}
