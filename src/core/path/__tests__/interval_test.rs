use crate::core::error::SignatureError;
use crate::core::path::*;

#[test]
fn 청크_위치찾기_테스트() {
    let lengths = [3, 5, 9];
    assert_eq!(locate(&lengths, 0), (0, 0));
    assert_eq!(locate(&lengths, 2), (0, 2));
    // 경계는 다음 청크의 시작
    assert_eq!(locate(&lengths, 3), (1, 0));
    assert_eq!(locate(&lengths, 4), (1, 1));
    assert_eq!(locate(&lengths, 8), (2, 3));
    // 끝을 넘으면 청크 수
    assert_eq!(locate(&lengths, 9), (3, 0));
}

#[test]
fn 구간_정규화_테스트() {
    assert_eq!(normalise_interval(None, None, 5).unwrap(), (0, 5));
    assert_eq!(normalise_interval(Some(0), None, 5).unwrap(), (0, 5));
    assert_eq!(normalise_interval(Some(-3), None, 5).unwrap(), (2, 5));
    assert_eq!(normalise_interval(Some(1), Some(-1), 5).unwrap(), (1, 4));
    // 범위 밖은 잘라냄
    assert_eq!(normalise_interval(Some(-100), Some(100), 5).unwrap(), (0, 5));
    assert_eq!(normalise_interval(Some(2), Some(9), 5).unwrap(), (2, 5));
}

#[test]
fn 한점_구간_오류_테스트() {
    let err = normalise_interval(Some(3), Some(4), 5).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a single point is insufficient to define a path"), "{}", message);
    assert!(message.contains("start=3, end=4"), "{}", message);
    assert_eq!(
        err.downcast_ref::<SignatureError>(),
        Some(&SignatureError::SinglePointInterval {
            start: Some(3),
            end: Some(4),
            norm_start: 3,
            norm_end: 4,
            length: 5,
        })
    );

    // 정규화 후 길이 1
    let err = normalise_interval(Some(-1), None, 5).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SignatureError>(),
        Some(SignatureError::SinglePointInterval { norm_start: 4, norm_end: 5, .. })
    ));
    assert!(err.to_string().contains("start=-1, end=None"));
}

#[test]
fn 빈_구간_오류_테스트() {
    for (start, end) in [(Some(5), Some(5)), (Some(4), Some(2)), (Some(7), None)] {
        let err = normalise_interval(start, end, 5).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("does not describe a valid interval"), "{}", message);
        assert!(!message.contains("single point"), "{}", message);
        assert!(matches!(
            err.downcast_ref::<SignatureError>(),
            Some(SignatureError::InvalidInterval { .. })
        ));
    }
}
