//! Seed enumeration from a mask.

use crate::volume::SeedMask;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed positions for one voxel. The first seed is the voxel centre; the
/// remaining `sampling - 1` are jittered uniformly inside the voxel by an RNG
/// derived from `jitter_seed` and the voxel's linear index, so results do not
/// depend on how voxels are distributed over threads.
pub fn voxel_seeds(voxel: [usize; 3], linear: usize, sampling: usize, jitter_seed: u64) -> Vec<Point3<f64>> {
    let center = Point3::new(voxel[0] as f64, voxel[1] as f64, voxel[2] as f64);
    let mut seeds = Vec::with_capacity(sampling.max(1));
    seeds.push(center);
    if sampling <= 1 {
        return seeds;
    }

    let mut rng = StdRng::seed_from_u64(jitter_seed ^ (linear as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    for _ in 1..sampling {
        let jitter = [
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
        ];
        seeds.push(Point3::new(
            center.x + jitter[0],
            center.y + jitter[1],
            center.z + jitter[2],
        ));
    }
    seeds
}

pub fn count_seed_voxels(mask: &SeedMask) -> usize {
    mask.data().iter().filter(|&&v| v > 0).count()
}
