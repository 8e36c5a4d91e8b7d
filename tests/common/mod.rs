//! 통합 테스트 공용 도구
#![allow(dead_code)]

use ndarray::{Array2, Array3, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn random_path(seed: u64, batch: usize, stream: usize, channels: usize) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((batch, stream, channels), |_| rng.gen_range(-1.0..1.0))
}

/// 레벨별 텐서 (levels[0]은 스칼라)
type Levels = Vec<Vec<f64>>;

fn tensor(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().flat_map(|&x| b.iter().map(move |&y| x * y)).collect()
}

fn exp(z: &[f64], depth: usize) -> Levels {
    let mut levels = vec![vec![1.0]];
    for k in 1..=depth {
        let next = tensor(&levels[k - 1], z).into_iter().map(|v| v / k as f64).collect();
        levels.push(next);
    }
    levels
}

fn product(a: &Levels, b: &Levels, depth: usize) -> Levels {
    (0..=depth)
        .map(|n| {
            let mut out = vec![0.0; a[n].len()];
            for i in 0..=n {
                for (o, v) in out.iter_mut().zip(tensor(&a[i], &b[n - i])) {
                    *o += v;
                }
            }
            out
        })
        .collect()
}

/// 증분 지수의 곱으로 직접 계산한 시그니처
pub fn naive_signature(points: ArrayView2<f64>, depth: usize) -> Vec<f64> {
    let channels = points.ncols();
    let mut acc = exp(&vec![0.0; channels], depth);
    for i in 1..points.nrows() {
        let z: Vec<f64> = points
            .row(i)
            .iter()
            .zip(points.row(i - 1).iter())
            .map(|(b, a)| b - a)
            .collect();
        acc = product(&acc, &exp(&z, depth), depth);
    }
    acc.into_iter().skip(1).flatten().collect()
}

pub fn naive_batch_signature(path: &Array3<f64>, depth: usize) -> Array2<f64> {
    let rows: Vec<Vec<f64>> = path.outer_iter().map(|e| naive_signature(e, depth)).collect();
    let width = rows[0].len();
    Array2::from_shape_vec((rows.len(), width), rows.concat()).unwrap()
}

pub fn max_abs_diff<'a>(a: impl IntoIterator<Item = &'a f64>, b: impl IntoIterator<Item = &'a f64>) -> f64 {
    a.into_iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
