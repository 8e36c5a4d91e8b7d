//! sigpath: 경로 시그니처 라이브러리
//!
//! 이산 경로 (batch, stream, channels)의 잘린 시그니처와 로그 시그니처를 계산하고,
//! 자동미분 그래프를 통해 경로/기준점/초기값에 대한 그래디언트를 돌려준다.
//! [`Path`]는 청크 단위로 덧붙여지는 경로 위에서 임의 구간의 (로그) 시그니처를
//! 구간 길이와 무관한 비용으로 질의한다.

pub mod core;

// 핵심 모듈들 재수출
pub use core::{
    // 자동미분
    BackwardFunction, BackwardOptions, Gradients, Variable,
    // 구성 및 오류
    KernelConfig, SignatureConfig, SignatureError, DEFAULT_PARALLEL_THRESHOLD,
    // 시그니처
    multi_signature_combine, signature, signature_channels, signature_combine, Basepoint,
    // 로그 시그니처
    logsignature, logsignature_channels, LogSignatureMode, SignatureToLogSignature,
    // 구간 누적기
    Path,
};
