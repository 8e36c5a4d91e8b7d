//! 시그니처 연산 오류 타입
//!
//! 호출자가 구분해야 하는 구조적 오류만 여기에 모은다. 나머지는 `anyhow::bail!`로 올린다.
//! 모든 변형은 `anyhow::Error`로 감싸져 전파되므로 `downcast_ref::<SignatureError>()`로 꺼낼 수 있다.

use thiserror::Error;

/// 슬라이스 인자 표시용 (`None`은 그대로 "None")
fn show_bound(bound: &Option<isize>) -> String {
    match bound {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// update로 들어온 청크의 배치 크기가 다름
    #[error("Cannot append a path with different number of batch elements to what has already been used (batch dimension: expected {expected}, got {got}).")]
    BatchMismatch { expected: usize, got: usize },

    /// update로 들어온 청크의 채널 수가 다름
    #[error("Cannot append a path with different number of channels to what has already been used (channel dimension: expected {expected}, got {got}).")]
    ChannelMismatch { expected: usize, got: usize },

    /// 정규화 후 구간 길이가 정확히 1
    #[error(
        "start={}, end={} is interpreted as {norm_start}, {norm_end} for path of length {length}, which does not describe a valid interval. The given start and end differ by only one, but a single point is insufficient to define a path.",
        show_bound(.start),
        show_bound(.end)
    )]
    SinglePointInterval {
        start: Option<isize>,
        end: Option<isize>,
        norm_start: usize,
        norm_end: usize,
        length: usize,
    },

    /// 정규화 후 구간 길이가 0 이하
    #[error(
        "start={}, end={} is interpreted as {norm_start}, {norm_end} for path of length {length}, which does not describe a valid interval.",
        show_bound(.start),
        show_bound(.end)
    )]
    InvalidInterval {
        start: Option<isize>,
        end: Option<isize>,
        norm_start: usize,
        norm_end: usize,
        length: usize,
    },

    #[error("Argument 'path' is invalid: {0}")]
    InvalidPath(String),

    #[error("Argument 'depth' must be an integer greater than or equal to one (got {0}).")]
    InvalidDepth(usize),

    #[error("Argument 'basepoint' is invalid: {0}")]
    InvalidBasepoint(String),

    #[error("Argument 'initial' is invalid: {0}")]
    InvalidInitial(String),

    #[error("Signature tensor is invalid: {0}")]
    InvalidSignature(String),

    /// 1회 미분 전용 노드를 거쳐 2차 미분을 요청
    #[error("{0} is once-differentiable: double backward through it is not supported")]
    DoubleBackward(&'static str),

    /// 역전파 노드가 입력과 모양이 다른 그래디언트를 돌려줌
    #[error("{node} produced a gradient of shape {got:?}, expected {expected:?}")]
    GradientShape {
        node: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}
