use std::collections::HashMap;
use std::ops::Range;

use glam::Vec3;

use crate::object::ObjectId;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(a: Vec3, b: Vec3) -> Self {
        Aabb {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Aabb::new(center - half_extents, center + half_extents)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Squared gap between the two boxes, 0 when they touch or overlap.
    pub fn distance_sq(&self, other: &Aabb) -> f32 {
        let gap = (other.min - self.max)
            .max(self.min - other.max)
            .max(Vec3::ZERO);
        gap.length_squared()
    }

    fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }
}

/// One body as the physics world reports it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub object: ObjectId,
    pub bounds: Aabb,
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Aabb,
    /// Index of the first of two adjacent children, 0 for a leaf.
    children: usize,
    colliders: Range<usize>,
}

impl Node {
    fn new(colliders: &[Collider], range: Range<usize>) -> Self {
        let bounds = colliders
            .iter()
            .fold(Aabb::EMPTY, |acc, c| acc.union(&c.bounds));

        Node {
            bounds,
            children: 0,
            colliders: range,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children == 0
    }
}

/// Immutable bounding-volume hierarchy over one frame's colliders.
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
    colliders: Vec<Collider>,
    leaves: HashMap<ObjectId, usize>,
}

impl Bvh {
    pub const ROOT: usize = 0;
    pub const LEAF_SIZE: usize = 4;

    /// Top-down build, splitting each node at the median of its longest axis.
    pub fn build(mut colliders: Vec<Collider>) -> Self {
        let mut nodes = Vec::with_capacity(2 * colliders.len() / Self::LEAF_SIZE + 1);

        if !colliders.is_empty() {
            nodes.push(Node::new(&colliders, 0..colliders.len()));

            let mut stack = vec![Self::ROOT];
            while let Some(node) = stack.pop() {
                let range = nodes[node].colliders.clone();
                if range.len() <= Self::LEAF_SIZE {
                    continue;
                }

                let axis = nodes[node].bounds.longest_axis();
                let half = range.len() / 2;
                colliders[range.clone()].select_nth_unstable_by(half, |a, b| {
                    a.bounds.center()[axis].total_cmp(&b.bounds.center()[axis])
                });

                let mid = range.start + half;
                let left = nodes.len();
                nodes.push(Node::new(&colliders[range.start..mid], range.start..mid));
                nodes.push(Node::new(&colliders[mid..range.end], mid..range.end));
                nodes[node].children = left;

                stack.push(left);
                stack.push(left + 1);
            }
        }

        let leaves = colliders
            .iter()
            .enumerate()
            .map(|(i, c)| (c.object, i))
            .collect();

        Bvh {
            nodes,
            colliders,
            leaves,
        }
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Cached position of `object` among this snapshot's colliders.
    pub fn leaf_index(&self, object: ObjectId) -> Option<usize> {
        self.leaves.get(&object).copied()
    }

    pub fn bounds_of(&self, object: ObjectId) -> Option<Aabb> {
        self.leaf_index(object).map(|i| self.colliders[i].bounds)
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Closest body to `query` within `max_distance`, skipping `exclude`.
    /// Returns the body and its distance.
    pub fn nearest(&self, query: &Aabb, max_distance: f32, exclude: ObjectId) -> Option<(ObjectId, f32)> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best: Option<(ObjectId, f32)> = None;
        let mut limit = max_distance * max_distance;

        let mut stack = vec![Self::ROOT];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if node.bounds.distance_sq(query) > limit {
                continue;
            }

            if !node.is_leaf() {
                stack.push(node.children);
                stack.push(node.children + 1);
                continue;
            }

            for collider in &self.colliders[node.colliders.clone()] {
                if collider.object == exclude {
                    continue;
                }

                let d = collider.bounds.distance_sq(query);
                if d <= limit && best.is_none_or(|(_, b)| d < b) {
                    best = Some((collider.object, d));
                    limit = d;
                }
            }
        }

        best.map(|(object, d)| (object, d.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(object: u32, x: f32) -> Collider {
        Collider {
            object: ObjectId::new(object, 1),
            bounds: Aabb::from_center(Vec3::new(x, 0.0, 0.0), Vec3::splat(0.5)),
        }
    }

    #[test]
    fn test_distance_sq() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(4.0, 1.0, 1.0));
        assert_eq!(a.distance_sq(&b), 4.0);
        assert_eq!(b.distance_sq(&a), 4.0);
        assert_eq!(a.distance_sq(&a.expanded(1.0)), 0.0);
    }

    #[test]
    fn test_union_and_center() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(3.0));
        assert_eq!(u.center(), Vec3::splat(1.5));
        assert_eq!(Aabb::EMPTY.union(&a), a);
    }

    #[test]
    fn test_build_indexes_every_collider() {
        let colliders: Vec<Collider> = (0..50).map(|i| unit_box(i, i as f32 * 3.0)).collect();
        let bvh = Bvh::build(colliders);

        assert_eq!(bvh.len(), 50);
        assert!(bvh.node_count() > 1);
        for i in 0..50 {
            let object = ObjectId::new(i, 1);
            let bounds = bvh.bounds_of(object).unwrap();
            assert_eq!(bounds.center().x, i as f32 * 3.0);
        }
        assert!(bvh.leaf_index(ObjectId::new(77, 1)).is_none());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let colliders: Vec<Collider> = (0..40)
            .map(|i| unit_box(i, ((i * 37) % 101) as f32))
            .collect();
        let bvh = Bvh::build(colliders.clone());

        let query = Aabb::from_center(Vec3::new(50.2, 0.0, 0.0), Vec3::splat(0.1));
        let expected = colliders
            .iter()
            .map(|c| (c.object, c.bounds.distance_sq(&query)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();

        let (object, distance) = bvh.nearest(&query, 1000.0, ObjectId::none()).unwrap();
        assert_eq!(object, expected.0);
        assert!((distance * distance - expected.1).abs() < 1e-4);
    }

    #[test]
    fn test_nearest_respects_exclude_and_limit() {
        let bvh = Bvh::build(vec![unit_box(1, 0.0), unit_box(2, 5.0)]);
        let query = bvh.bounds_of(ObjectId::new(1, 1)).unwrap();

        assert_eq!(
            bvh.nearest(&query, 10.0, ObjectId::new(1, 1)).map(|(o, _)| o),
            Some(ObjectId::new(2, 1))
        );
        assert!(bvh.nearest(&query, 3.0, ObjectId::new(1, 1)).is_none());
    }

    #[test]
    fn test_empty() {
        let bvh = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert!(bvh.nearest(&Aabb::EMPTY, 1.0, ObjectId::none()).is_none());
    }
}
