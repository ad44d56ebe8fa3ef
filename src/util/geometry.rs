//! Geometry primitives shared by the collision sweep, the aim solver, and the
//! behavior-tree math nodes.

use crate::util::vec2::Vec2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rectangle {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rectangle {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle centered on `center` extending `half_extents` in each direction.
    pub fn centered(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Rectangle) -> bool {
        box_box_intersect(self.min, self.max, other.min, other.max)
    }

    /// Same extents, recentered on `center`.
    pub fn moved_to(&self, center: Vec2) -> Self {
        Self::centered(center, self.half_extents())
    }
}

/// AABB overlap test.
#[inline]
pub fn box_box_intersect(min_a: Vec2, max_a: Vec2, min_b: Vec2, max_b: Vec2) -> bool {
    min_a.x < max_b.x && max_a.x > min_b.x && min_a.y < max_b.y && max_a.y > min_b.y
}

/// Origin plus unit direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ray {
    pub origin: Vec2,
    pub direction: Vec2,
}

impl Ray {
    pub fn new(origin: Vec2, direction: Vec2) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Slab test against a rectangle. Returns the entry distance when the ray
    /// hits, None otherwise. A ray starting inside reports distance zero.
    pub fn intersect_rect(&self, rect: &Rectangle) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..2 {
            let dir = self.direction[axis];
            let origin = self.origin[axis];

            if dir.abs() < 1e-8 {
                if origin < rect.min[axis] || origin > rect.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (rect.min[axis] - origin) * inv;
            let mut t1 = (rect.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some(t_min.max(0.0))
    }
}

/// Two endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineSegment {
    pub a: Vec2,
    pub b: Vec2,
}

impl LineSegment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rectangle::centered(Vec2::new(5.0, 5.0), Vec2::new(2.0, 2.0));
        assert!(rect.contains(Vec2::new(5.0, 5.0)));
        assert!(rect.contains(Vec2::new(3.0, 7.0)));
        assert!(!rect.contains(Vec2::new(8.0, 5.0)));
    }

    #[test]
    fn test_rect_overlap() {
        let a = Rectangle::new(Vec2::ZERO, Vec2::new(2.0, 2.0));
        let b = Rectangle::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = Rectangle::new(Vec2::new(5.0, 5.0), Vec2::new(6.0, 6.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_rect_moved_to() {
        let rect = Rectangle::centered(Vec2::ZERO, Vec2::new(1.5, 2.5));
        let moved = rect.moved_to(Vec2::new(10.0, 10.0));
        assert_eq!(moved.center(), Vec2::new(10.0, 10.0));
        assert_eq!(moved.half_extents(), Vec2::new(1.5, 2.5));
    }

    #[test]
    fn test_ray_hits_rect() {
        let ray = Ray::new(Vec2::ZERO, Vec2::new(1.0, 0.0));
        let rect = Rectangle::new(Vec2::new(5.0, -1.0), Vec2::new(7.0, 1.0));
        let hit = ray.intersect_rect(&rect);
        assert!(hit.is_some());
        assert!((hit.unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_misses_rect() {
        let ray = Ray::new(Vec2::ZERO, Vec2::new(0.0, 1.0));
        let rect = Rectangle::new(Vec2::new(5.0, -1.0), Vec2::new(7.0, 1.0));
        assert!(ray.intersect_rect(&rect).is_none());
    }

    #[test]
    fn test_ray_behind_rect() {
        let ray = Ray::new(Vec2::new(10.0, 0.0), Vec2::new(1.0, 0.0));
        let rect = Rectangle::new(Vec2::new(5.0, -1.0), Vec2::new(7.0, 1.0));
        assert!(ray.intersect_rect(&rect).is_none());
    }

    #[test]
    fn test_ray_starting_inside() {
        let ray = Ray::new(Vec2::new(6.0, 0.0), Vec2::new(1.0, 0.0));
        let rect = Rectangle::new(Vec2::new(5.0, -1.0), Vec2::new(7.0, 1.0));
        assert_eq!(ray.intersect_rect(&rect), Some(0.0));
    }
}
