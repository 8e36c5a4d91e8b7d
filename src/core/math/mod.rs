//! # 수치 커널
//!
//! 시그니처 연산이 쓰는 잘린 텐서 대수 원시 연산들

pub mod tensor_algebra;


// 재수출
pub use tensor_algebra::{reciprocals, FusedScratch, TermLayout};
