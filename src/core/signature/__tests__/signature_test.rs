use crate::core::__tests__::reference::*;
use crate::core::autograd::Variable;
use crate::core::config::{KernelConfig, SignatureConfig};
use crate::core::error::SignatureError;
use crate::core::signature::*;
use approx::assert_abs_diff_eq;
use ndarray::{concatenate, s, Array2, Array3, ArrayD, Axis, Ix2, Ix3};

fn assert_close(actual: &ArrayD<f64>, expected: &ArrayD<f64>) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, e, epsilon = 1e-10);
    }
}

fn error_of(result: anyhow::Result<Variable>) -> SignatureError {
    result
        .unwrap_err()
        .downcast::<SignatureError>()
        .expect("SignatureError 여야 함")
}

#[test]
fn 시그니처_채널수_테스트() {
    assert_eq!(signature_channels(2, 1), 2);
    assert_eq!(signature_channels(2, 3), 14);
    assert_eq!(signature_channels(3, 2), 12);
    assert_eq!(signature_channels(1, 5), 5);
}

#[test]
fn 단순계산과_일치_테스트() {
    init_logger();
    for channels in 1..=3 {
        for depth in 1..=4 {
            let path = random_path(channels as u64 * 10 + depth as u64, 3, 5, channels);
            let sig = signature(&Variable::new(path.clone()), depth, &SignatureConfig::default()).unwrap();
            let expected = naive_batch_signature(&path, depth).into_dyn();
            assert_close(sig.data(), &expected);
        }
    }
}

#[test]
fn 스트림_출력_테스트() {
    let path = random_path(1, 2, 6, 2);
    let depth = 3;
    let sig = signature(
        &Variable::new(path.clone()),
        depth,
        &SignatureConfig::default().stream(true),
    )
    .unwrap();
    assert_eq!(sig.shape(), &[2, 5, signature_channels(2, depth)]);

    let streamed = sig.data().view().into_dimensionality::<Ix3>().unwrap();
    for step in 0..5 {
        let prefix = path.slice(s![.., ..step + 2, ..]).to_owned();
        let expected = naive_batch_signature(&prefix, depth);
        for (a, e) in streamed.index_axis(Axis(1), step).iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-10);
        }
    }
}

#[test]
fn 기준점은_앞에_붙는_점_테스트() {
    let path = random_path(2, 2, 4, 3);
    let basepoint = random_array(3, &[2, 3]).into_dimensionality::<Ix2>().unwrap();
    let depth = 3;

    let sig = signature(
        &Variable::new(path.clone()),
        depth,
        &SignatureConfig::default().basepoint(Variable::new(basepoint.clone())),
    )
    .unwrap();

    let extended = concatenate(Axis(1), &[basepoint.view().insert_axis(Axis(1)), path.view()]).unwrap();
    assert_close(sig.data(), &naive_batch_signature(&extended, depth).into_dyn());

    // 영 기준점
    let sig = signature(&Variable::new(path.clone()), depth, &SignatureConfig::default().basepoint(true)).unwrap();
    let zeros = Array2::<f64>::zeros((2, 3));
    let extended = concatenate(Axis(1), &[zeros.view().insert_axis(Axis(1)), path.view()]).unwrap();
    assert_close(sig.data(), &naive_batch_signature(&extended, depth).into_dyn());
}

#[test]
fn 기준점이면_한점_경로_허용_테스트() {
    let path = random_path(4, 1, 1, 2);
    let sig = signature(&Variable::new(path), 2, &SignatureConfig::default().basepoint(true)).unwrap();
    assert_eq!(sig.shape(), &[1, 6]);
}

#[test]
fn 역원은_뒤집은_경로_테스트() {
    let path = random_path(5, 2, 5, 2);
    let depth = 4;
    let inverse = signature(&Variable::new(path.clone()), depth, &SignatureConfig::default().inverse(true)).unwrap();
    let expected = naive_batch_signature(&reversed(&path), depth).into_dyn();
    assert_close(inverse.data(), &expected);
}

#[test]
fn 초기값으로_이어붙이기_테스트() {
    let depth = 3;
    let path = random_path(6, 2, 7, 2);
    let first = path.slice(s![.., ..4, ..]).to_owned();
    let second = path.slice(s![.., 4.., ..]).to_owned();

    let head = signature(&Variable::new(first.clone()), depth, &SignatureConfig::default()).unwrap();
    let last_point = first.index_axis(Axis(1), 3).to_owned();
    let whole = signature(
        &Variable::new(second.clone()),
        depth,
        &SignatureConfig::default()
            .basepoint(Variable::new(last_point.clone()))
            .initial(Some(head.detach())),
    )
    .unwrap();
    assert_close(whole.data(), &naive_batch_signature(&path, depth).into_dyn());

    // 역원 쪽은 S(second)^{-1} ⊗ S(first)^{-1}
    let head_inverse = signature(&Variable::new(first), depth, &SignatureConfig::default().inverse(true)).unwrap();
    let whole_inverse = signature(
        &Variable::new(second),
        depth,
        &SignatureConfig::default()
            .basepoint(Variable::new(last_point))
            .inverse(true)
            .initial(Some(head_inverse.detach())),
    )
    .unwrap();
    assert_close(whole_inverse.data(), &naive_batch_signature(&reversed(&path), depth).into_dyn());
}

#[test]
fn 병렬_커널_일치_테스트() {
    let path = random_path(7, 6, 5, 3);
    let sequential = SignatureConfig::default().stream(true).kernel(KernelConfig::sequential());
    let parallel = SignatureConfig::default()
        .stream(true)
        .kernel(KernelConfig { parallel_threshold: 0 });

    let a = signature(&Variable::new(path.clone()), 3, &sequential).unwrap();
    let b = signature(&Variable::new(path.clone()), 3, &parallel).unwrap();
    assert_close(a.data(), b.data());

    let weights = ArrayD::from_elem(a.shape().to_vec(), 0.5);
    let la = Variable::leaf(path.clone());
    let lb = Variable::leaf(path);
    let ga = signature(&la, 3, &sequential).unwrap().backward(weights.clone()).unwrap();
    let gb = signature(&lb, 3, &parallel).unwrap().backward(weights).unwrap();
    assert_close(&ga.get_or_zeros(&la), &gb.get_or_zeros(&lb));
}

#[test]
fn 경로_그래디언트_수치미분_테스트() {
    for depth in 1..=3 {
        for stream in [false, true] {
            for inverse in [false, true] {
                let path = random_path(depth as u64, 2, 4, 2).into_dyn();
                gradcheck(&[path], |vars| {
                    signature(
                        &vars[0],
                        depth,
                        &SignatureConfig::default().stream(stream).inverse(inverse),
                    )
                });
            }
        }
    }
}

#[test]
fn 기준점_초기값_그래디언트_수치미분_테스트() {
    let depth = 3;
    let path = random_path(21, 2, 3, 2).into_dyn();
    let basepoint = random_array(22, &[2, 2]);
    let initial = random_array(23, &[2, signature_channels(2, depth)]).mapv(|v| v * 0.3);

    for stream in [false, true] {
        for inverse in [false, true] {
            gradcheck(&[path.clone(), basepoint.clone(), initial.clone()], |vars| {
                signature(
                    &vars[0],
                    depth,
                    &SignatureConfig::default()
                        .stream(stream)
                        .inverse(inverse)
                        .basepoint(&vars[1])
                        .initial(Some(vars[2].clone())),
                )
            });
        }
    }
}

#[test]
fn 잘못된_인자_테스트() {
    let config = SignatureConfig::default();

    let flat = Variable::new(Array2::<f64>::zeros((3, 2)));
    assert!(matches!(error_of(signature(&flat, 2, &config)), SignatureError::InvalidPath(_)));

    let short = Variable::new(Array3::<f64>::zeros((1, 1, 2)));
    assert!(matches!(error_of(signature(&short, 2, &config)), SignatureError::InvalidPath(_)));

    let empty = Variable::new(Array3::<f64>::zeros((0, 3, 2)));
    assert!(matches!(error_of(signature(&empty, 2, &config)), SignatureError::InvalidPath(_)));

    let path = Variable::new(Array3::<f64>::zeros((2, 3, 2)));
    assert_eq!(error_of(signature(&path, 0, &config)), SignatureError::InvalidDepth(0));

    let bad_basepoint = SignatureConfig::default().basepoint(Variable::new(Array2::<f64>::zeros((2, 3))));
    assert!(matches!(
        error_of(signature(&path, 2, &bad_basepoint)),
        SignatureError::InvalidBasepoint(_)
    ));

    let bad_initial = SignatureConfig::default().initial(Some(Variable::new(Array2::<f64>::zeros((2, 5)))));
    assert!(matches!(
        error_of(signature(&path, 2, &bad_initial)),
        SignatureError::InvalidInitial(_)
    ));
}

#[test]
fn 기준점_해석_테스트() {
    assert!(interpret_basepoint(&Basepoint::Absent, 2, 3).unwrap().is_none());
    assert!(interpret_basepoint(&false.into(), 2, 3).unwrap().is_none());

    let zero = interpret_basepoint(&true.into(), 2, 3).unwrap().unwrap();
    assert_eq!(zero.shape(), &[2, 3]);
    assert!(zero.data().iter().all(|&v| v == 0.0));
    assert!(!zero.requires_grad());

    let value = Variable::leaf(Array2::<f64>::ones((2, 3)));
    let resolved = interpret_basepoint(&Basepoint::from(&value), 2, 3).unwrap().unwrap();
    assert_eq!(resolved.id(), value.id());

    let err = interpret_basepoint(&Basepoint::from(&value), 4, 3).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SignatureError>(),
        Some(SignatureError::InvalidBasepoint(_))
    ));
}
