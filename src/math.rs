#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

pub type Vec2f = Vec2<f64>;

pub fn vec2f(x: f64, y: f64) -> Vec2f {
    Vec2 { x, y }
}

impl<T> From<(T, T)> for Vec2<T> {
    fn from(value: (T, T)) -> Self {
        Vec2 {
            x: value.0,
            y: value.1,
        }
    }
}

impl<T: std::ops::Sub<Output = T> + std::marker::Copy> std::ops::Sub for Vec2<T> {
    type Output = Self;

    fn sub(self, rhs: Vec2<T>) -> Self::Output {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Vec2f {
    /// z component of the cross product of two 2D vectors
    pub fn cross(&self, other: &Vec2f) -> f64 {
        self.x * other.y - self.y * other.x
    }
}
