//! 미분 가능한 시그니처 연산

use anyhow::{bail, Result};
use ndarray::{Array3, ArrayD};
use std::rc::Rc;

use super::backward::signature_backward;
use super::basepoint::{interpret_basepoint, Basepoint};
use super::forward::signature_forward;
use super::increments::compute_path_increments;
use super::signature_channels;
use crate::core::autograd::{BackwardFunction, Variable};
use crate::core::config::{KernelConfig, SignatureConfig};
use crate::core::error::SignatureError;

/// (batch, stream, channels) 경로의 depth까지 잘린 시그니처
///
/// - `config.stream`이면 (batch, out_stream, signature_channels), 아니면 (batch, signature_channels)
/// - out_stream은 기준점이 있으면 stream, 없으면 stream - 1
/// - `config.initial`이 있으면 `initial ⊗ S(path)`, 역원 모드면 `S(path)^{-1} ⊗ initial`
pub fn signature(path: &Variable, depth: usize, config: &SignatureConfig) -> Result<Variable> {
    let (batch, _, channels) = check_path(path, depth, &config.basepoint)?;
    let basepoint = interpret_basepoint(&config.basepoint, batch, channels)?;
    let signature_channels = signature_channels(channels, depth);

    if let Some(initial) = &config.initial {
        if initial.ndim() != 2 {
            bail!(SignatureError::InvalidInitial(format!(
                "must be a 2-dimensional tensor, corresponding to (batch, signature_channels) respectively (got shape {:?})",
                initial.shape()
            )));
        }
        if initial.shape() != &[batch, signature_channels][..] {
            bail!(SignatureError::InvalidInitial(format!(
                "must have correctly sized batch and channel dimensions (expected [{}, {}], got {:?})",
                batch,
                signature_channels,
                initial.shape()
            )));
        }
    }

    let basepoint_view = match &basepoint {
        Some(value) => Some(value.view2()?),
        None => None,
    };
    let increments = compute_path_increments(path.view3()?, basepoint_view, config.inverse);
    let initial = match &config.initial {
        Some(value) => Some(value.view2()?.to_owned()),
        None => None,
    };
    let output = signature_forward(
        &increments,
        depth,
        config.stream,
        config.inverse,
        initial.as_ref(),
        &config.kernel,
    )?;

    let output = Rc::new(output);
    Ok(Variable::from_shared(
        Rc::clone(&output),
        Box::new(SignatureBackward {
            path: path.clone(),
            basepoint,
            initial: config.initial.clone(),
            increments,
            output,
            depth,
            stream: config.stream,
            inverse: config.inverse,
            kernel: config.kernel,
        }),
    ))
}

/// 경로 인자 검사, (batch, stream, channels) 반환
fn check_path(path: &Variable, depth: usize, basepoint: &Basepoint) -> Result<(usize, usize, usize)> {
    if path.ndim() == 2 {
        bail!(SignatureError::InvalidPath(
            "must be a 3-dimensional tensor, with dimensions corresponding to (batch, stream, channel) \
             respectively. A single path should be given a batch dimension of size one."
                .to_string()
        ));
    }
    if path.ndim() != 3 {
        bail!(SignatureError::InvalidPath(format!(
            "must be a 3-dimensional tensor, with dimensions corresponding to (batch, stream, channel) \
             respectively (got shape {:?})",
            path.shape()
        )));
    }
    let (batch, stream, channels) = (path.shape()[0], path.shape()[1], path.shape()[2]);
    if batch == 0 || stream == 0 || channels == 0 {
        bail!(SignatureError::InvalidPath("cannot have dimensions of size zero".to_string()));
    }
    if basepoint.is_absent() && stream == 1 {
        bail!(SignatureError::InvalidPath(
            "must have stream dimension of size at least 2 (need at least this many points to define a path)"
                .to_string()
        ));
    }
    if depth == 0 {
        bail!(SignatureError::InvalidDepth(depth));
    }
    Ok((batch, stream, channels))
}

#[derive(Debug)]
struct SignatureBackward {
    path: Variable,
    basepoint: Option<Variable>,
    initial: Option<Variable>,
    increments: Array3<f64>,
    output: Rc<ArrayD<f64>>,
    depth: usize,
    stream: bool,
    inverse: bool,
    kernel: KernelConfig,
}

impl BackwardFunction for SignatureBackward {
    fn name(&self) -> &'static str {
        "SignatureBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        let node = *self;
        let mut inputs = vec![node.path];
        inputs.extend(node.basepoint);
        inputs.extend(node.initial);
        inputs
    }

    fn inputs(&self) -> Vec<Variable> {
        let mut inputs = vec![self.path.clone()];
        inputs.extend(self.basepoint.iter().cloned());
        inputs.extend(self.initial.iter().cloned());
        inputs
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let (grad_path, grad_basepoint, grad_initial) = signature_backward(
            grad_output,
            &self.output,
            &self.increments,
            self.depth,
            self.stream,
            self.basepoint.is_some(),
            self.inverse,
            self.initial.is_some(),
            &self.kernel,
        )?;

        let mut grads = vec![Some(grad_path.into_dyn())];
        if self.basepoint.is_some() {
            grads.push(grad_basepoint.map(|grad| grad.into_dyn()));
        }
        if self.initial.is_some() {
            grads.push(grad_initial.map(|grad| grad.into_dyn()));
        }
        Ok(grads)
    }
}
