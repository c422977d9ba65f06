use crate::math::Vec2f;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[Vec2f]) -> BoundingBox {
        let mut mins: [f64; 2] = [f64::INFINITY, f64::INFINITY];
        let mut maxs: [f64; 2] = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        for p in points {
            mins[0] = f64::min(mins[0], p.x);
            mins[1] = f64::min(mins[1], p.y);
            maxs[0] = f64::max(maxs[0], p.x);
            maxs[1] = f64::max(maxs[1], p.y);
        }
        BoundingBox {
            xmin: mins[0],
            ymin: mins[1],
            xmax: maxs[0],
            ymax: maxs[1],
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xmin: self.xmin.min(other.xmin),
            xmax: self.xmax.max(other.xmax),
            ymin: self.ymin.min(other.ymin),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// True if the interiors overlap. Boxes sharing only an edge or a corner don't
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vec2f;

    fn bbox(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BoundingBox {
        BoundingBox {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    #[test]
    fn test_from_points() {
        let b = BoundingBox::from_points(&[vec2f(3.0, -1.0), vec2f(-2.0, 4.0), vec2f(1.0, 1.0)]);
        assert_eq!(b, bbox(-2.0, -1.0, 3.0, 4.0));
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.height(), 5.0);
    }

    #[test]
    fn test_intersects() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&bbox(5.0, 5.0, 15.0, 15.0)));
        assert!(a.intersects(&bbox(2.0, 2.0, 3.0, 3.0)));
        assert!(!a.intersects(&bbox(11.0, 0.0, 12.0, 10.0)));
        // Touching edges only
        assert!(!a.intersects(&bbox(10.0, 0.0, 12.0, 10.0)));
    }

    #[test]
    fn test_union() {
        let u = bbox(0.0, 0.0, 1.0, 1.0).union(&bbox(-1.0, 0.5, 0.5, 3.0));
        assert_eq!(u, bbox(-1.0, 0.0, 1.0, 3.0));
    }
}
