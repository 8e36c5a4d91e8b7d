//! 테스트 공용 도구
//!
//! 커널과 독립적으로 작성한 단순 시그니처 계산과 유한 차분 그래디언트 검사.

use anyhow::Result;
use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis, Dimension};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::autograd::Variable;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// [-1, 1) 균등분포 경로 (batch, stream, channels)
pub(crate) fn random_path(seed: u64, batch: usize, stream: usize, channels: usize) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((batch, stream, channels), |_| rng.gen_range(-1.0..1.0))
}

pub(crate) fn random_array(seed: u64, shape: &[usize]) -> ArrayD<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    ArrayD::from_shape_fn(shape.to_vec(), |_| rng.gen_range(-1.0..1.0))
}

fn tensor_product(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for &x in a {
        for &y in b {
            out.push(x * y);
        }
    }
    out
}

/// levels[0]은 스칼라 1
fn exp_levels(z: &[f64], depth: usize) -> Vec<Vec<f64>> {
    let mut levels = vec![vec![1.0]];
    for k in 1..=depth {
        let next = tensor_product(&levels[k - 1], z)
            .into_iter()
            .map(|v| v / k as f64)
            .collect();
        levels.push(next);
    }
    levels
}

fn product_levels(a: &[Vec<f64>], b: &[Vec<f64>], depth: usize) -> Vec<Vec<f64>> {
    (0..=depth)
        .map(|n| {
            let mut out = vec![0.0; a[n].len()];
            for i in 0..=n {
                for (o, v) in out.iter_mut().zip(tensor_product(&a[i], &b[n - i])) {
                    *o += v;
                }
            }
            out
        })
        .collect()
}

/// 점 목록 (stream, channels)의 시그니처를 레벨 순으로 펼친 값
pub(crate) fn naive_signature(points: ArrayView2<f64>, depth: usize) -> Vec<f64> {
    let channels = points.ncols();
    let mut acc = exp_levels(&vec![0.0; channels], depth);
    for window in 1..points.nrows() {
        let z: Vec<f64> = points
            .row(window)
            .iter()
            .zip(points.row(window - 1).iter())
            .map(|(b, a)| b - a)
            .collect();
        acc = product_levels(&acc, &exp_levels(&z, depth), depth);
    }
    acc.into_iter().skip(1).flatten().collect()
}

/// 배치 전체의 단순 시그니처 (batch, signature_channels)
pub(crate) fn naive_batch_signature(path: &Array3<f64>, depth: usize) -> Array2<f64> {
    let rows: Vec<Vec<f64>> = path
        .outer_iter()
        .map(|element| naive_signature(element, depth))
        .collect();
    let width = rows.first().map_or(0, Vec::len);
    Array2::from_shape_vec((rows.len(), width), rows.into_iter().flatten().collect())
        .expect("행 길이가 모두 같아야 함")
}

/// 스트림 방향으로 뒤집은 경로
pub(crate) fn reversed(path: &Array3<f64>) -> Array3<f64> {
    let mut out = path.clone();
    out.invert_axis(Axis(1));
    out.as_standard_layout().into_owned()
}

/// 결과와 고정 가중치의 내적을 손실로 한 중앙 차분 검사
///
/// 모든 입력 원소에 대해 |수치 - 해석| <= 1e-5 + 1e-4 |수치| 를 요구한다.
pub(crate) fn gradcheck(inputs: &[ArrayD<f64>], f: impl Fn(&[Variable]) -> Result<Variable>) {
    let leaves: Vec<Variable> = inputs.iter().cloned().map(Variable::leaf).collect();
    let output = f(&leaves).expect("순전파 실패");
    let weights = ArrayD::from_shape_fn(output.shape().to_vec(), |index| {
        let flat: usize = index.slice().iter().enumerate().map(|(i, v)| (i + 1) * (v + 1)).sum();
        ((flat as f64) * 0.731).sin()
    });
    let grads = output.backward(weights.clone()).expect("역전파 실패");

    let loss = |values: &[ArrayD<f64>]| -> f64 {
        let constants: Vec<Variable> = values.iter().cloned().map(Variable::new).collect();
        let out = f(&constants).expect("순전파 실패");
        (out.data() * &weights).sum()
    };

    let h = 1e-6;
    for (which, leaf) in leaves.iter().enumerate() {
        let analytic = grads.get_or_zeros(leaf);
        let mut probe: Vec<ArrayD<f64>> = inputs.to_vec();
        for (position, &expected) in analytic.iter().enumerate() {
            let original = probe[which].as_slice().expect("표준 레이아웃")[position];
            probe[which].as_slice_mut().expect("표준 레이아웃")[position] = original + h;
            let plus = loss(&probe);
            probe[which].as_slice_mut().expect("표준 레이아웃")[position] = original - h;
            let minus = loss(&probe);
            probe[which].as_slice_mut().expect("표준 레이아웃")[position] = original;

            let numeric = (plus - minus) / (2.0 * h);
            assert!(
                (numeric - expected).abs() <= 1e-5 + 1e-4 * numeric.abs(),
                "입력 {} 원소 {}: 수치 {} vs 해석 {}",
                which,
                position,
                numeric,
                expected
            );
        }
    }
}
