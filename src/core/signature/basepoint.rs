//! 경로 앞에 붙는 가상의 첫 점

use anyhow::{bail, Result};
use ndarray::Array2;

use crate::core::autograd::Variable;
use crate::core::error::SignatureError;

/// 기준점 인자
///
/// `false`/`true`/텐서 세 가지 입력을 하나의 타입으로 받는다.
#[derive(Debug, Clone, Default)]
pub enum Basepoint {
    /// 기준점 없음
    #[default]
    Absent,
    /// 원점을 기준점으로 사용
    Zero,
    /// (batch, channels) 모양의 명시적 기준점
    Value(Variable),
}

impl From<bool> for Basepoint {
    fn from(value: bool) -> Self {
        if value {
            Basepoint::Zero
        } else {
            Basepoint::Absent
        }
    }
}

impl From<Variable> for Basepoint {
    fn from(value: Variable) -> Self {
        Basepoint::Value(value)
    }
}

impl From<&Variable> for Basepoint {
    fn from(value: &Variable) -> Self {
        Basepoint::Value(value.clone())
    }
}

impl Basepoint {
    pub fn is_absent(&self) -> bool {
        matches!(self, Basepoint::Absent)
    }
}

/// 기준점 인자를 실제 텐서로 풀어낸다
///
/// `Some`이면 기준점을 사용한다는 뜻. `Zero`는 (batch, channels) 영텐서 상수가 된다.
pub fn interpret_basepoint(basepoint: &Basepoint, batch: usize, channels: usize) -> Result<Option<Variable>> {
    match basepoint {
        Basepoint::Absent => Ok(None),
        Basepoint::Zero => Ok(Some(Variable::new(Array2::<f64>::zeros((batch, channels))))),
        Basepoint::Value(value) => {
            if value.ndim() != 2 {
                bail!(SignatureError::InvalidBasepoint(format!(
                    "must be a 2-dimensional tensor, corresponding to (batch, channel) respectively (got shape {:?})",
                    value.shape()
                )));
            }
            if value.shape() != &[batch, channels][..] {
                bail!(SignatureError::InvalidBasepoint(format!(
                    "must have the same batch and channel sizes as 'path' (expected [{}, {}], got {:?})",
                    batch,
                    channels,
                    value.shape()
                )));
            }
            Ok(Some(value.clone()))
        }
    }
}
