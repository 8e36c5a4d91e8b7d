//! # 구간 시그니처 누적기
//!
//! 경로를 청크 단위로 덧붙이면서 임의 구간의 시그니처/로그 시그니처를
//! O(log 청크 수 + 구간 길이)에 돌려준다.

pub mod accumulator;
pub mod interval;
pub mod shortcut;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 재수출
pub use accumulator::Path;
pub use interval::{locate, normalise_interval};
pub use shortcut::backward_shortcut;
