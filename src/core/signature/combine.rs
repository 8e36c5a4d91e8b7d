//! 시그니처 결합 (Chen 곱)

use anyhow::{anyhow, bail, Result};
use ndarray::{Array2, ArrayD};

use crate::core::autograd::{BackwardFunction, Variable};
use crate::core::error::SignatureError;
use crate::core::math::tensor_algebra::{mult, mult_backward, TermLayout};

/// 두 경로를 이어 붙인 경로의 시그니처 `a ⊗ b`
pub fn signature_combine(a: &Variable, b: &Variable, channels: usize, depth: usize) -> Result<Variable> {
    multi_signature_combine(&[a.clone(), b.clone()], channels, depth)
}

/// `s_1 ⊗ s_2 ⊗ ... ⊗ s_n`
///
/// 모든 입력은 (batch, signature_channels)이고 배치 크기가 같아야 한다.
pub fn multi_signature_combine(signatures: &[Variable], channels: usize, depth: usize) -> Result<Variable> {
    if depth == 0 {
        bail!(SignatureError::InvalidDepth(depth));
    }
    if channels == 0 {
        bail!(SignatureError::InvalidSignature(
            "the number of input channels must be positive".to_string()
        ));
    }
    let Some(first) = signatures.first() else {
        bail!(SignatureError::InvalidSignature(
            "at least one signature is needed to combine".to_string()
        ));
    };
    let layout = TermLayout::new(channels, depth);
    let signature_channels = layout.total();

    let batch = check_signature(first, signature_channels)?;
    for other in &signatures[1..] {
        let other_batch = check_signature(other, signature_channels)?;
        if other_batch != batch {
            bail!(SignatureError::InvalidSignature(format!(
                "signatures do not have the same number of batch elements ({} and {})",
                batch, other_batch
            )));
        }
    }
    if signatures.len() == 1 {
        return Ok(first.clone());
    }

    let mut current = first.view2()?.to_owned();
    let mut prefixes = Vec::with_capacity(signatures.len() - 1);
    for other in &signatures[1..] {
        prefixes.push(current.clone());
        let current_flat = current
            .as_slice_mut()
            .ok_or_else(|| anyhow!("signature buffer is not contiguous"))?;
        for (row, factor) in current_flat
            .chunks_mut(signature_channels)
            .zip(other.as_slice()?.chunks(signature_channels))
        {
            mult(&layout, row, factor);
        }
    }

    Ok(Variable::from_op(
        current,
        Box::new(CombineBackward {
            inputs: signatures.to_vec(),
            prefixes,
            layout,
        }),
    ))
}

fn check_signature(signature: &Variable, signature_channels: usize) -> Result<usize> {
    if signature.ndim() != 2 {
        bail!(SignatureError::InvalidSignature(format!(
            "should be 2-dimensional, corresponding to (batch, signature_channels) (got shape {:?})",
            signature.shape()
        )));
    }
    if signature.shape()[1] != signature_channels {
        bail!(SignatureError::InvalidSignature(format!(
            "did not have the expected number of channels (expected {}, got {})",
            signature_channels,
            signature.shape()[1]
        )));
    }
    Ok(signature.shape()[0])
}

#[derive(Debug)]
struct CombineBackward {
    inputs: Vec<Variable>,
    /// prefixes[k] = inputs[0] ⊗ ... ⊗ inputs[k]
    prefixes: Vec<Array2<f64>>,
    layout: TermLayout,
}

impl BackwardFunction for CombineBackward {
    fn name(&self) -> &'static str {
        "CombineBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        self.inputs
    }

    fn inputs(&self) -> Vec<Variable> {
        self.inputs.clone()
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let signature_channels = self.layout.total();
        let batch = self.inputs[0].shape()[0];
        let mut grads: Vec<Option<ArrayD<f64>>> = vec![None; self.inputs.len()];

        let mut grad_current: Vec<f64> = grad_output.iter().copied().collect();
        for k in (1..self.inputs.len()).rev() {
            let prefix = self.prefixes[k - 1]
                .as_slice()
                .ok_or_else(|| anyhow!("saved prefix is not contiguous"))?;
            let factor = self.inputs[k].as_slice()?;
            let mut grad_prefix = vec![0.0; batch * signature_channels];
            let mut grad_factor = vec![0.0; batch * signature_channels];

            for ((((g, p), f), gp), gf) in grad_current
                .chunks(signature_channels)
                .zip(prefix.chunks(signature_channels))
                .zip(factor.chunks(signature_channels))
                .zip(grad_prefix.chunks_mut(signature_channels))
                .zip(grad_factor.chunks_mut(signature_channels))
            {
                mult_backward(&self.layout, g, p, f, gp, gf);
            }

            grads[k] = Some(Array2::from_shape_vec((batch, signature_channels), grad_factor)?.into_dyn());
            grad_current = grad_prefix;
        }
        grads[0] = Some(Array2::from_shape_vec((batch, signature_channels), grad_current)?.into_dyn());
        Ok(grads)
    }
}
