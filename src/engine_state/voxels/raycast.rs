//! # Raycast Module
//!
//! Block picking. A ray is marched through the voxel grid one cell at a time
//! (Amanatides & Woo traversal); every solid cell it visits is confirmed with a
//! ray/AABB slab test, which also yields the face the ray entered through.
//!
//! The traversal does not know about chunks. It asks a caller-supplied
//! predicate whether a cell is solid, so the world can answer from resident
//! chunks only.

use cgmath::{InnerSpace, Point3, Vector3};

use super::block::block_side::BlockSide;

/// An axis-aligned box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// The unit cube occupied by the block at `block`.
    pub fn block(block: Point3<i32>) -> Self {
        let min = block.cast::<f32>().unwrap_or(Point3::new(0.0, 0.0, 0.0));
        Aabb {
            min,
            max: min + Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// A half-line starting at `origin`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

/// The first solid block struck by a ray.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RaycastHit {
    pub block: Point3<i32>,
    pub face: BlockSide,
    /// Distance from the ray origin to the entry point, in blocks
    pub distance: f32,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Ray { origin, direction }
    }

    /// Intersects the ray with `aabb`.
    ///
    /// # Returns
    /// The distance along the (normalised) direction to the entry point and the
    /// face entered through. An origin inside the box reports distance `0`.
    /// `None` if the ray misses or the direction is degenerate.
    pub fn cast(&self, aabb: &Aabb) -> Option<(f32, BlockSide)> {
        let direction = normalized(self.direction)?;
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        let mut face = None;

        for axis in 0..3 {
            let origin = self.origin[axis];
            let d = direction[axis];
            let (min, max) = (aabb.min[axis], aabb.max[axis]);

            if d == 0.0 {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let t1 = (min - origin) / d;
            let t2 = (max - origin) / d;
            let (entry, exit) = if t1 < t2 { (t1, t2) } else { (t2, t1) };

            if entry > t_near {
                t_near = entry;
                face = Some(entry_face(axis, d));
            }
            t_far = t_far.min(exit);
        }

        if t_far < t_near.max(0.0) {
            return None;
        }
        face.map(|face| (t_near.max(0.0), face))
    }
}

/// Walks the ray cell by cell and returns the first solid block within `max_distance`.
///
/// `is_solid` is asked about every visited cell, starting with the one
/// containing the origin.
pub fn traverse<F>(ray: &Ray, max_distance: f32, mut is_solid: F) -> Option<RaycastHit>
where
    F: FnMut(Point3<i32>) -> bool,
{
    let direction = normalized(ray.direction)?;
    let origin = ray.origin;

    let mut cell = Point3::new(
        origin.x.floor() as i32,
        origin.y.floor() as i32,
        origin.z.floor() as i32,
    );
    let mut step = [0i32; 3];
    let mut t_max = [f32::INFINITY; 3];
    let mut t_delta = [f32::INFINITY; 3];

    for axis in 0..3 {
        let d = direction[axis];
        if d > 0.0 {
            step[axis] = 1;
            t_delta[axis] = 1.0 / d;
            t_max[axis] = (cell[axis] as f32 + 1.0 - origin[axis]) / d;
        } else if d < 0.0 {
            step[axis] = -1;
            t_delta[axis] = -1.0 / d;
            t_max[axis] = (origin[axis] - cell[axis] as f32) / -d;
        }
    }

    loop {
        if is_solid(cell) {
            if let Some((distance, face)) = ray.cast(&Aabb::block(cell)) {
                if distance <= max_distance {
                    return Some(RaycastHit {
                        block: cell,
                        face,
                        distance,
                    });
                }
            }
        }

        let axis = if t_max[0] <= t_max[1] && t_max[0] <= t_max[2] {
            0
        } else if t_max[1] <= t_max[2] {
            1
        } else {
            2
        };
        if !t_max[axis].is_finite() || t_max[axis] > max_distance {
            return None;
        }
        cell[axis] = cell[axis].checked_add(step[axis])?;
        t_max[axis] += t_delta[axis];
    }
}

fn normalized(direction: Vector3<f32>) -> Option<Vector3<f32>> {
    let length = direction.magnitude();
    if length == 0.0 || !length.is_finite() {
        return None;
    }
    Some(direction / length)
}

/// The face a ray enters through when crossing the slab of `axis` in direction `d`.
fn entry_face(axis: usize, d: f32) -> BlockSide {
    match (axis, d > 0.0) {
        (0, true) => BlockSide::LEFT,
        (0, false) => BlockSide::RIGHT,
        (1, true) => BlockSide::BOTTOM,
        (1, false) => BlockSide::TOP,
        (_, true) => BlockSide::FRONT,
        (_, false) => BlockSide::BACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_block(target: Point3<i32>) -> impl FnMut(Point3<i32>) -> bool {
        move |cell| cell == target
    }

    #[test]
    fn ray_leaving_the_block_range_misses() {
        let ray = Ray::new(Point3::new(1.0e12, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0));
        assert!(traverse(&ray, 64.0, |_| false).is_none());
    }

    #[test]
    fn ray_along_z_hits_front_face() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        let hit = traverse(&ray, 64.0, single_block(Point3::new(0, 0, 0))).expect("hit");
        assert_eq!(hit.block, Point3::new(0, 0, 0));
        assert_eq!(hit.face, BlockSide::FRONT);
        assert!((hit.distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn downward_ray_hits_top_face_of_floor() {
        let ray = Ray::new(Point3::new(0.5, 10.5, 0.5), Vector3::new(0.0, -1.0, 0.0));
        let hit = traverse(&ray, 64.0, |cell| cell.y <= 3).expect("hit");
        assert_eq!(hit.block, Point3::new(0, 3, 0));
        assert_eq!(hit.face, BlockSide::TOP);
        assert!((hit.distance - 6.5).abs() < 1e-5);
    }

    #[test]
    fn negative_x_ray_hits_right_face() {
        let ray = Ray::new(Point3::new(5.5, 0.5, 0.5), Vector3::new(-2.0, 0.0, 0.0));
        let hit = traverse(&ray, 64.0, single_block(Point3::new(-3, 0, 0))).expect("hit");
        assert_eq!(hit.block, Point3::new(-3, 0, 0));
        assert_eq!(hit.face, BlockSide::RIGHT);
    }

    #[test]
    fn diagonal_ray_reports_entry_face() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(1.0, 0.2, 0.0));
        let hit = traverse(&ray, 64.0, single_block(Point3::new(4, 1, 0))).expect("hit");
        assert_eq!(hit.block, Point3::new(4, 1, 0));
        assert_eq!(hit.face, BlockSide::LEFT);
    }

    #[test]
    fn nearest_block_wins() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 1.0));
        let hit = traverse(&ray, 64.0, |cell| cell.z == 3 || cell.z == 7).expect("hit");
        assert_eq!(hit.block.z, 3);
    }

    #[test]
    fn hits_beyond_max_distance_are_ignored() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 1.0));
        assert!(traverse(&ray, 8.0, single_block(Point3::new(0, 0, 20))).is_none());
        assert!(traverse(&ray, 8.0, |_| false).is_none());
    }

    #[test]
    fn zero_direction_never_hits() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 0.0));
        assert!(traverse(&ray, 8.0, |_| true).is_none());
    }

    #[test]
    fn origin_inside_block_hits_at_zero() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 1.0));
        let hit = traverse(&ray, 8.0, single_block(Point3::new(0, 0, 0))).expect("hit");
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn slab_test_misses_offset_box() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.cast(&Aabb::block(Point3::new(2, 0, 0))).is_none());
        assert!(ray.cast(&Aabb::block(Point3::new(0, 0, -10))).is_none());
    }
}
