#![allow(dead_code)]

use dipmerge::{ClusterState, Points, nearest_points_to_centers};
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

// pi * 100_000
const RANDOM_SEED: u64 = 314159;

pub fn rng() -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(RANDOM_SEED)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn normal_sample(rng: &mut Xoshiro256PlusPlus, mean: f64, std_dev: f64, n: usize) -> Vec<f64> {
    let normal = Normal::new(mean, std_dev).unwrap();
    (0..n).map(|_| normal.sample(rng)).collect()
}

/// Gaussian blobs with two raw views and centers snapped to data points.
pub struct Blobs {
    pub views: Vec<DMatrix<f64>>,
    pub embedded: DMatrix<f64>,
    pub state: ClusterState,
}

impl Blobs {
    pub fn points(&self) -> Points<'_> {
        Points::new(&self.views, &self.embedded).unwrap()
    }
}

pub fn blobs(
    rng: &mut Xoshiro256PlusPlus,
    means: &[[f64; 2]],
    sizes: &[usize],
    std_dev: f64,
) -> Blobs {
    assert_eq!(means.len(), sizes.len());
    let normal = Normal::new(0.0, std_dev).unwrap();

    let mut coords = Vec::new();
    let mut labels = Vec::new();
    for (c, (mean, &size)) in means.iter().zip(sizes).enumerate() {
        for _ in 0..size {
            coords.push([mean[0] + normal.sample(rng), mean[1] + normal.sample(rng)]);
            labels.push(c);
        }
    }

    let n = coords.len();
    let embedded = DMatrix::from_fn(n, 2, |r, c| coords[r][c]);
    // Raw views: a lifted copy of the embedding and a scaled one
    let views = vec![
        DMatrix::from_fn(n, 4, |r, c| match c {
            0 | 1 => coords[r][c],
            2 => coords[r][0] * coords[r][1],
            _ => 1.0,
        }),
        DMatrix::from_fn(n, 2, |r, c| 10.0 * coords[r][c]),
    ];

    let optimal = DMatrix::from_fn(means.len(), 2, |r, c| means[r][c]);
    let points = Points::new(&views, &embedded).unwrap();
    let nearest = nearest_points_to_centers(&points, &optimal).unwrap();

    let state = ClusterState {
        labels,
        centers: nearest.centers,
        embedded_centers: nearest.embedded_centers,
        n_clusters: means.len(),
    };

    Blobs {
        views,
        embedded,
        state,
    }
}
