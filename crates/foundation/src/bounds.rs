use crate::math::Vec2;

/// Axis-aligned planar extent, `[min_x, min_y, max_x, max_y]` in map units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extent {
    pub min: Vec2,
    pub max: Vec2,
}

impl Extent {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Extent { min, max }
    }

    /// An inverted extent that any `extend` call replaces.
    pub const fn empty() -> Self {
        Extent {
            min: Vec2::new(f64::INFINITY, f64::INFINITY),
            max: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Self {
        let mut extent = Self::empty();
        for p in points {
            extent.extend(*p);
        }
        extent
    }

    pub fn extend(&mut self, p: Vec2) {
        if !p.is_finite() {
            return;
        }
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.x - self.min.x }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.y - self.min.y }
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Extent;
    use crate::math::Vec2;

    #[test]
    fn extent_from_points() {
        let pts = [Vec2::new(1.0, 5.0), Vec2::new(-2.0, 3.0), Vec2::new(4.0, 4.0)];
        let e = Extent::from_points(&pts);
        assert_eq!(e.min, Vec2::new(-2.0, 3.0));
        assert_eq!(e.max, Vec2::new(4.0, 5.0));
        assert_eq!(e.width(), 6.0);
        assert_eq!(e.height(), 2.0);
    }

    #[test]
    fn empty_extent_has_zero_size() {
        let e = Extent::empty();
        assert!(e.is_empty());
        assert_eq!(e.width(), 0.0);
        assert_eq!(e.height(), 0.0);
    }
}
