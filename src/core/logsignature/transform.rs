//! 시그니처 -> 로그 시그니처 변환

use anyhow::{anyhow, bail, Result};
use log::debug;
use ndarray::ArrayD;
use std::rc::Rc;

use super::lyndon::{logsignature_channels, LyndonBasis};
use super::mode::LogSignatureMode;
use crate::core::autograd::{BackwardFunction, Variable};
use crate::core::error::SignatureError;
use crate::core::math::tensor_algebra::{log, log_backward, TermLayout};

#[derive(Debug)]
struct Basis {
    layout: TermLayout,
    lyndon: LyndonBasis,
    /// Lyndon 단어별 평탄 시그니처 인덱스
    indices: Vec<usize>,
    /// Brackets 모드의 삼각 소거 항
    triangle: Vec<Vec<(usize, f64)>>,
}

/// 시그니처 텐서를 로그 시그니처로 바꾸는 변환
///
/// 생성 비용(Lyndon 단어와 괄호 전개)이 있으므로 만들어 두고 재사용한다. 복제는 싸다.
#[derive(Debug, Clone)]
pub struct SignatureToLogSignature {
    channels: usize,
    depth: usize,
    stream: bool,
    mode: LogSignatureMode,
    basis: Rc<Basis>,
}

impl SignatureToLogSignature {
    pub fn new(channels: usize, depth: usize, stream: bool, mode: LogSignatureMode) -> Result<Self> {
        if depth == 0 {
            bail!(SignatureError::InvalidDepth(depth));
        }
        if channels == 0 {
            bail!("the number of input channels must be positive");
        }
        debug!(
            "로그 시그니처 변환 생성: channels={}, depth={}, stream={}, mode={}",
            channels, depth, stream, mode
        );

        let layout = TermLayout::new(channels, depth);
        let lyndon = match mode {
            LogSignatureMode::Expand => LyndonBasis::new(0, 0),
            _ => LyndonBasis::new(channels, depth),
        };
        let indices = lyndon
            .words()
            .iter()
            .enumerate()
            .map(|(i, word)| layout.offset(word.len() - 1) + lyndon.position(i))
            .collect();
        let triangle = match mode {
            LogSignatureMode::Brackets => lyndon.triangle(),
            _ => Vec::new(),
        };

        Ok(Self {
            channels,
            depth,
            stream,
            mode,
            basis: Rc::new(Basis {
                layout,
                lyndon,
                indices,
                triangle,
            }),
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stream(&self) -> bool {
        self.stream
    }

    pub fn mode(&self) -> LogSignatureMode {
        self.mode
    }

    pub fn signature_channels(&self) -> usize {
        self.basis.layout.total()
    }

    pub fn output_channels(&self) -> usize {
        match self.mode {
            LogSignatureMode::Expand => self.signature_channels(),
            _ => logsignature_channels(self.channels, self.depth),
        }
    }

    /// Brackets 모드의 괄호 전개 (테스트 검증용)
    pub(crate) fn lyndon_basis(&self) -> &LyndonBasis {
        &self.basis.lyndon
    }

    /// (batch, signature_channels) 또는 stream이면 (batch, stream, signature_channels)
    pub fn apply(&self, signature: &Variable) -> Result<Variable> {
        let expected_ndim = if self.stream { 3 } else { 2 };
        if signature.ndim() != expected_ndim {
            bail!(SignatureError::InvalidSignature(format!(
                "expected a {}-dimensional signature tensor, got shape {:?}",
                expected_ndim,
                signature.shape()
            )));
        }
        let signature_channels = self.signature_channels();
        let last = signature.shape()[expected_ndim - 1];
        if last != signature_channels {
            bail!(SignatureError::InvalidSignature(format!(
                "expected {} signature channels for {} channels at depth {}, got {}",
                signature_channels, self.channels, self.depth, last
            )));
        }

        let output_channels = self.output_channels();
        let input = signature.as_slice()?;
        let mut output = vec![0.0; input.len() / signature_channels * output_channels];
        let mut full = vec![0.0; signature_channels];
        for (row, out) in input
            .chunks(signature_channels)
            .zip(output.chunks_mut(output_channels))
        {
            log(&self.basis.layout, row, &mut full);
            self.compress(&full, out);
        }

        let mut shape = signature.shape().to_vec();
        shape[expected_ndim - 1] = output_channels;
        let output = ArrayD::from_shape_vec(shape, output)?;
        Ok(Variable::from_op(
            output,
            Box::new(LogSignatureBackward {
                input: signature.clone(),
                transform: self.clone(),
            }),
        ))
    }

    /// 텐서 로그 한 행을 출력 표현으로
    fn compress(&self, full: &[f64], out: &mut [f64]) {
        match self.mode {
            LogSignatureMode::Expand => out.copy_from_slice(full),
            LogSignatureMode::Words => {
                for (o, &index) in out.iter_mut().zip(&self.basis.indices) {
                    *o = full[index];
                }
            }
            LogSignatureMode::Brackets => {
                for (o, &index) in out.iter_mut().zip(&self.basis.indices) {
                    *o = full[index];
                }
                for (v, row) in self.basis.triangle.iter().enumerate() {
                    let coefficient = out[v];
                    for &(w, entry) in row {
                        out[w] -= coefficient * entry;
                    }
                }
            }
        }
    }

    /// `compress`의 전치
    fn compress_backward(&self, grad: &[f64], grad_full: &mut [f64]) {
        match self.mode {
            LogSignatureMode::Expand => grad_full.copy_from_slice(grad),
            LogSignatureMode::Words => {
                grad_full.fill(0.0);
                for (&g, &index) in grad.iter().zip(&self.basis.indices) {
                    grad_full[index] = g;
                }
            }
            LogSignatureMode::Brackets => {
                let mut grad = grad.to_vec();
                for (v, row) in self.basis.triangle.iter().enumerate().rev() {
                    let correction: f64 = row.iter().map(|&(w, entry)| entry * grad[w]).sum();
                    grad[v] -= correction;
                }
                grad_full.fill(0.0);
                for (&g, &index) in grad.iter().zip(&self.basis.indices) {
                    grad_full[index] = g;
                }
            }
        }
    }
}

#[derive(Debug)]
struct LogSignatureBackward {
    input: Variable,
    transform: SignatureToLogSignature,
}

impl BackwardFunction for LogSignatureBackward {
    fn name(&self) -> &'static str {
        "LogSignatureBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        vec![self.input]
    }

    fn inputs(&self) -> Vec<Variable> {
        vec![self.input.clone()]
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let transform = &self.transform;
        let signature_channels = transform.signature_channels();
        let output_channels = transform.output_channels();
        let input = self.input.as_slice()?;
        let grad_output = grad_output.as_standard_layout();
        let grad_flat = grad_output
            .as_slice()
            .ok_or_else(|| anyhow!("log-signature gradient is not contiguous"))?;

        let mut grad_input = vec![0.0; input.len()];
        let mut grad_full = vec![0.0; signature_channels];
        for ((row, grad), grad_row) in input
            .chunks(signature_channels)
            .zip(grad_flat.chunks(output_channels))
            .zip(grad_input.chunks_mut(signature_channels))
        {
            transform.compress_backward(grad, &mut grad_full);
            log_backward(&transform.basis.layout, &grad_full, row, grad_row);
        }

        let grad_input = ArrayD::from_shape_vec(self.input.shape().to_vec(), grad_input)?;
        Ok(vec![Some(grad_input)])
    }
}
