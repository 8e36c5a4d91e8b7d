//! 커널/시그니처 호출 구성

use serde::{Deserialize, Serialize};

use crate::core::autograd::Variable;
use crate::core::signature::Basepoint;

/// 배치 병렬화 기준 (batch * stream * signature_channels)
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1_392_640;

/// 텐서 대수 커널 구성
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 이 크기 이상의 문제에서만 배치 원소를 rayon으로 병렬 처리
    pub parallel_threshold: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl KernelConfig {
    /// 항상 순차 처리
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
        }
    }

    pub fn should_parallelise(&self, batch: usize, stream: usize, channels: usize) -> bool {
        batch > 1 && batch.saturating_mul(stream).saturating_mul(channels) >= self.parallel_threshold
    }
}

/// `signature` 함수 호출 옵션
#[derive(Debug, Clone, Default)]
pub struct SignatureConfig {
    /// 스트림의 모든 중간 시그니처를 반환
    pub stream: bool,
    /// 경로 앞에 붙는 가상의 첫 점
    pub basepoint: Basepoint,
    /// 시그니처 대신 군 역원을 계산
    pub inverse: bool,
    /// 누적을 시작할 시그니처 값 (batch, signature_channels)
    pub initial: Option<Variable>,
    pub kernel: KernelConfig,
}

impl SignatureConfig {
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn basepoint(mut self, basepoint: impl Into<Basepoint>) -> Self {
        self.basepoint = basepoint.into();
        self
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn initial(mut self, initial: Option<Variable>) -> Self {
        self.initial = initial;
        self
    }

    pub fn kernel(mut self, kernel: KernelConfig) -> Self {
        self.kernel = kernel;
        self
    }
}
