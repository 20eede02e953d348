//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Smallest outward padding applied by [`Aabb::inflated`], so bounds at or
/// near zero and flat extents still strictly contain their points
pub const MIN_INFLATION_PAD: f32 = 1e-4;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around a point set; `None` when the set is empty
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Tightest box around a set of boxes; `None` when the set is empty
    pub fn union_all<'a, I: IntoIterator<Item = &'a Aabb>>(boxes: I) -> Option<Self> {
        boxes.into_iter().fold(None, |acc: Option<Aabb>, b| {
            Some(match acc {
                Some(a) => a.merged(b),
                None => *b,
            })
        })
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if point is inside AABB
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if point is inside AABB and off every face
    pub fn strictly_contains_point(&self, p: Vec3) -> bool {
        p.x > self.min.x && p.x < self.max.x &&
        p.y > self.min.y && p.y < self.max.y &&
        p.z > self.min.z && p.z < self.max.z
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Push every bound outward by `factor - 1` of its own magnitude.
    ///
    /// Sign-aware: a negative min moves to `min * factor`, a positive min to
    /// `min * (2 - factor)`, and likewise for max. Each bound moves by at least
    /// [`MIN_INFLATION_PAD`].
    pub fn inflated(&self, factor: f32) -> Aabb {
        let grow = factor - 1.0;
        let pad = |v: Vec3| (v.abs() * grow).max(Vec3::splat(MIN_INFLATION_PAD));
        Aabb {
            min: self.min - pad(self.min),
            max: self.max + pad(self.max),
        }
    }
}
