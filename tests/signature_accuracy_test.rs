mod common;

use common::*;
use ndarray::{array, s, Array3, Axis};
use sigpath::{
    logsignature, logsignature_channels, signature, signature_channels, signature_combine, LogSignatureMode,
    SignatureConfig, Variable,
};

#[test]
fn 시그니처_정확도_테스트() {
    for (channels, depth) in [(1, 4), (2, 3), (3, 3), (4, 2)] {
        let path = random_path(11, 3, 6, channels);
        let sig = signature(&Variable::new(path.clone()), depth, &SignatureConfig::default()).unwrap();
        let expected = naive_batch_signature(&path, depth);

        assert_eq!(sig.shape(), &[3, signature_channels(channels, depth)]);
        let error = max_abs_diff(sig.data().iter(), expected.iter());
        println!("channels={}, depth={}: 최대 오차 {:.3e}", channels, depth, error);
        assert!(error < 1e-10);
    }
}

#[test]
fn 스트림_출력은_접두_시그니처_테스트() {
    let depth = 3;
    let path = random_path(12, 2, 5, 2);
    let sig = signature(
        &Variable::new(path.clone()),
        depth,
        &SignatureConfig::default().stream(true),
    )
    .unwrap();
    assert_eq!(sig.shape(), &[2, 4, 14]);

    for step in 0..4 {
        let prefix = path.slice(s![.., ..step + 2, ..]).to_owned();
        let expected = naive_batch_signature(&prefix, depth);
        let actual = sig.data().index_axis(Axis(1), step).to_owned();
        assert!(max_abs_diff(actual.iter(), expected.iter()) < 1e-10);
    }
}

#[test]
fn 첸_곱_테스트() {
    let depth = 4;
    let path = random_path(13, 2, 7, 2);
    let left = path.slice(s![.., ..4, ..]).to_owned();
    let right = path.slice(s![.., 3.., ..]).to_owned();

    let config = SignatureConfig::default();
    let a = signature(&Variable::new(left), depth, &config).unwrap();
    let b = signature(&Variable::new(right), depth, &config).unwrap();
    let joined = signature_combine(&a, &b, 2, depth).unwrap();
    let whole = signature(&Variable::new(path), depth, &config).unwrap();

    assert!(max_abs_diff(joined.data().iter(), whole.data().iter()) < 1e-10);
}

#[test]
fn 직선의_로그시그니처는_증분_테스트() {
    let path: Array3<f64> = array![[[0.0, 0.0], [0.5, -1.0], [1.0, -2.0], [2.0, -4.0]]];
    for mode in [LogSignatureMode::Brackets, LogSignatureMode::Words] {
        let logsig = logsignature(&Variable::new(path.clone()), 3, &SignatureConfig::default(), mode).unwrap();
        assert_eq!(logsig.shape(), &[1, logsignature_channels(2, 3)]);

        let values = logsig.data().iter().copied().collect::<Vec<_>>();
        assert!((values[0] - 2.0).abs() < 1e-12);
        assert!((values[1] + 4.0).abs() < 1e-12);
        assert!(values[2..].iter().all(|v| v.abs() < 1e-12), "{:?}", values);
    }
}

#[test]
fn 경로_그래디언트_유한차분_테스트() {
    let depth = 3;
    let path = random_path(14, 1, 4, 2);
    let leaf = Variable::leaf(path.clone());
    let sig = signature(&leaf, depth, &SignatureConfig::default()).unwrap();
    let weights = ndarray::ArrayD::from_elem(sig.shape().to_vec(), 1.0);
    let grad = sig.backward(weights).unwrap().get_or_zeros(&leaf);

    let loss = |p: &Array3<f64>| naive_batch_signature(p, depth).sum();
    let h = 1e-6;
    for ((b, t, c), &analytic) in grad.clone().into_dimensionality::<ndarray::Ix3>().unwrap().indexed_iter() {
        let mut plus = path.clone();
        plus[[b, t, c]] += h;
        let mut minus = path.clone();
        minus[[b, t, c]] -= h;
        let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
        assert!((numeric - analytic).abs() < 1e-6, "{} vs {}", numeric, analytic);
    }
}
