//! # 시그니처 연산
//!
//! 경로 증분의 지수를 잘린 텐서 대수에서 곱해 나가는 시그니처 계산과 그 역전파,
//! 그리고 시그니처끼리의 Chen 곱.

pub mod backward;
pub mod basepoint;
pub mod combine;
pub mod forward;
pub mod function;
pub mod increments;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 재수출
pub use backward::signature_backward;
pub use basepoint::{interpret_basepoint, Basepoint};
pub use combine::{multi_signature_combine, signature_combine};
pub use forward::signature_forward;
pub use function::signature;
pub use increments::{compute_path_increments, compute_path_increments_backward};

use crate::core::math::tensor_algebra::TermLayout;

/// depth까지 잘린 시그니처의 채널 수 `c + c^2 + ... + c^depth`
pub fn signature_channels(channels: usize, depth: usize) -> usize {
    TermLayout::new(channels, depth).total()
}
