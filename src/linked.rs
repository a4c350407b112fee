//! Linked-particle state and the plane maths behind splitting and
//! transparency sorting.
//!
//! Two planes matter here: the split plane through two of a particle's
//! neighbours (deciding which links follow the child), and the camera's view
//! plane (deciding draw order for back-to-front alpha compositing).

use glam::Vec3;

/// State carried by each linked particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkedState {
    /// Ticks the particle has been alive. Drives optional particle death.
    pub life: u32,
    /// Fed particles are pulled towards the cluster centre until the food
    /// wears off.
    pub food: bool,
    /// Ticks since this particle was last fed.
    pub food_life: u32,
}

/// Signed distance of `test_point` from the plane through `plane_point`
/// with normal `normal` (not required to be unit length).
///
/// Positive means the point lies on the side the normal points to. Used to
/// partition a splitting particle's links between parent and child.
pub fn plane_side(normal: Vec3, plane_point: Vec3, test_point: Vec3) -> f32 {
    normal.dot(test_point) - normal.dot(plane_point)
}

/// Depth of `position` along the camera view axis: distance from the eye
/// projected onto `forward`. Larger means farther from the camera.
pub fn view_depth(eye: Vec3, forward: Vec3, position: Vec3) -> f32 {
    (position - eye).dot(forward)
}

/// Back-to-front ordering of `positions` relative to the camera.
///
/// Returns indices sorted by descending view depth. The sort is stable, so
/// exactly-equal depths keep their existing relative order; starting from
/// the natural 0..n order that means ties resolve to ascending index.
pub fn sort_back_to_front(positions: &[Vec3], eye: Vec3, forward: Vec3) -> Vec<u32> {
    let mut order: Vec<u32> = (0..positions.len() as u32).collect();
    order.sort_by(|&a, &b| {
        let da = view_depth(eye, forward, positions[a as usize]);
        let db = view_depth(eye, forward, positions[b as usize]);
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_side_signs() {
        let normal = Vec3::Z;
        let plane_point = Vec3::ZERO;
        assert!(plane_side(normal, plane_point, Vec3::new(0.0, 0.0, 1.0)) > 0.0);
        assert!(plane_side(normal, plane_point, Vec3::new(0.0, 0.0, -1.0)) < 0.0);
        assert_eq!(plane_side(normal, plane_point, Vec3::new(5.0, -2.0, 0.0)), 0.0);
    }

    #[test]
    fn plane_side_offset_plane() {
        // Plane z = 2.
        let d = plane_side(Vec3::Z, Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 3.5));
        assert!((d - 1.5).abs() < 1e-6);
    }

    #[test]
    fn sort_is_back_to_front() {
        let eye = Vec3::new(0.0, 0.0, 10.0);
        let forward = Vec3::NEG_Z;
        let positions = vec![
            Vec3::new(0.0, 0.0, 5.0),  // depth 5
            Vec3::new(0.0, 0.0, -3.0), // depth 13, farthest
            Vec3::new(0.0, 0.0, 8.0),  // depth 2, nearest
        ];
        let order = sort_back_to_front(&positions, eye, forward);
        assert_eq!(order, vec![1, 0, 2]);

        // Depths along the resulting order never increase.
        let depths: Vec<f32> = order
            .iter()
            .map(|&i| view_depth(eye, forward, positions[i as usize]))
            .collect();
        for pair in depths.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn equal_depths_keep_index_order() {
        let eye = Vec3::new(0.0, 0.0, 10.0);
        let forward = Vec3::NEG_Z;
        // All at the same depth, spread sideways.
        let positions = vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-2.0, 0.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
        ];
        let order = sort_back_to_front(&positions, eye, forward);
        assert_eq!(order, vec![0, 1, 2]);
    }
}
