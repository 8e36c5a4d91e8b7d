//! # 자동미분 그래프
//!
//! 연산 결과마다 역전파 노드를 달아 두고, 출력에서 시작해 역방향 위상 순서로
//! 그래디언트를 누적하는 reverse-mode 엔진. 노드는 모두 1회 미분 전용이다.

pub mod variable;
pub mod engine;
pub mod ops;


pub use variable::{BackwardFunction, NodeId, Variable};
pub use engine::{BackwardOptions, Gradients};
pub use ops::{narrow_stream, select_stream, unsqueeze_stream};
