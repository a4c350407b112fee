//! Branch-direction sampling and collision maths for the growth variant.
//!
//! Growth particles form a tree: each new particle buds off its parent in a
//! roughly light-seeking direction, and a candidate bud is rejected when it
//! would land inside an existing limb. The tree walk itself lives on
//! [`ParticleSystem`](crate::system::ParticleSystem); this module holds the
//! pure geometry.

use glam::Vec3;
use rand::Rng;

/// Unit direction from `from` towards a point sampled between `from` and
/// `light`, axis by axis. Every component of the result points the same way
/// as the light does (or is zero), so branches drift lightwards without all
/// aiming at exactly the same spot.
pub fn branch_direction(rng: &mut impl Rng, from: Vec3, light: Vec3) -> Vec3 {
    let sample = Vec3::new(
        sample_between(rng, from.x, light.x),
        sample_between(rng, from.y, light.y),
        sample_between(rng, from.z, light.z),
    );
    match (sample - from).try_normalize() {
        Some(dir) => dir,
        // Light sits on the particle; grow anywhere.
        None => random_direction(rng),
    }
}

/// Uniformly random unit direction.
pub fn random_direction(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
        );
        if v.length_squared() > 1.0 {
            continue;
        }
        if let Some(dir) = v.try_normalize() {
            return dir;
        }
    }
}

/// Whether a candidate bud position lands inside the particle at
/// `position`. Branches may touch but not overlap deeply, so the test uses
/// half the particle size.
pub fn overlaps(candidate: Vec3, position: Vec3, size: f32) -> bool {
    candidate.distance(position) <= size / 2.0
}

fn sample_between(rng: &mut impl Rng, a: f32, b: f32) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo <= f32::EPSILON {
        return a;
    }
    rng.gen_range(lo..hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn branch_direction_heads_towards_the_light() {
        let mut rng = StdRng::seed_from_u64(9);
        let from = Vec3::new(1.0, 1.0, 1.0);
        let light = Vec3::new(6.0, 8.0, 5.0);
        for _ in 0..50 {
            let dir = branch_direction(&mut rng, from, light);
            assert!((dir.length() - 1.0).abs() < 1e-5);
            // Sampled axis by axis between particle and light, so no
            // component may point away from the light.
            assert!(dir.x >= 0.0 && dir.y >= 0.0 && dir.z >= 0.0, "{:?}", dir);
        }
    }

    #[test]
    fn branch_direction_with_light_on_the_particle_still_grows() {
        let mut rng = StdRng::seed_from_u64(9);
        let pos = Vec3::new(2.0, -1.0, 0.5);
        let dir = branch_direction(&mut rng, pos, pos);
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn random_direction_is_unit_length() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert!((random_direction(&mut rng).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn overlap_uses_half_the_particle_size() {
        let centre = Vec3::ZERO;
        assert!(overlaps(Vec3::new(0.1, 0.0, 0.0), centre, 1.0));
        assert!(overlaps(Vec3::new(0.5, 0.0, 0.0), centre, 1.0));
        assert!(!overlaps(Vec3::new(0.6, 0.0, 0.0), centre, 1.0));
    }
}
