//! # 로그 시그니처
//!
//! 시그니처의 잘린 텐서 로그와 그 압축 표현 (Lyndon 단어 / Lyndon 괄호 기저).

pub mod lyndon;
pub mod mode;
pub mod transform;


// 재수출
pub use lyndon::{logsignature_channels, lyndon_words, LyndonBasis};
pub use mode::LogSignatureMode;
pub use transform::SignatureToLogSignature;

use anyhow::Result;

use crate::core::autograd::Variable;
use crate::core::config::SignatureConfig;
use crate::core::signature::signature;

/// 경로의 로그 시그니처 (`signature` 다음 변환)
pub fn logsignature(
    path: &Variable,
    depth: usize,
    config: &SignatureConfig,
    mode: LogSignatureMode,
) -> Result<Variable> {
    let sig = signature(path, depth, config)?;
    let channels = path.shape()[2];
    SignatureToLogSignature::new(channels, depth, config.stream, mode)?.apply(&sig)
}
