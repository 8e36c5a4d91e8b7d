//! # sigpath 핵심 모듈
//!
//! 잘린 텐서 대수 커널, 자동미분 그래프, 시그니처/로그 시그니처 연산, 구간 누적기

pub mod autograd;
pub mod config;
pub mod error;
pub mod math;
pub mod signature;
pub mod logsignature;
pub mod path;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 주요 타입들 재수출
pub use autograd::{BackwardFunction, BackwardOptions, Gradients, Variable};
pub use config::{KernelConfig, SignatureConfig, DEFAULT_PARALLEL_THRESHOLD};
pub use error::SignatureError;
pub use signature::{
    multi_signature_combine, signature, signature_channels, signature_combine, Basepoint,
};
pub use logsignature::{logsignature, logsignature_channels, LogSignatureMode, SignatureToLogSignature};
pub use path::Path;
