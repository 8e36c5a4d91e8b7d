//! 시그니처 역전파 커널
//!
//! 중간 시그니처를 저장하지 않는다. 스트림 출력이 아니면 가역성
//! `A_{k-1} = A_k ⊗ exp(-z_k)` (역원이면 `exp(-z_k) ⊗ A_k`)로 거꾸로 복원한다.

use anyhow::{anyhow, bail, Result};
use ndarray::{Array2, Array3, ArrayD};
use rayon::prelude::*;

use super::increments::compute_path_increments_backward;
use crate::core::config::KernelConfig;
use crate::core::error::SignatureError;
use crate::core::math::tensor_algebra::{
    mult_fused_restricted_exp, mult_fused_restricted_exp_backward, reciprocals, FusedScratch, TermLayout,
};

/// 시그니처 출력 그래디언트를 경로/기준점/초기값 그래디언트로
///
/// `increments`는 순전파에 쓰인 증분 (역원이면 이미 부호가 뒤집힌 값).
/// `signature`는 순전파 출력 그대로.
#[allow(clippy::too_many_arguments)]
pub fn signature_backward(
    grad_output: &ArrayD<f64>,
    signature: &ArrayD<f64>,
    increments: &Array3<f64>,
    depth: usize,
    stream: bool,
    use_basepoint: bool,
    inverse: bool,
    use_initial: bool,
    kernel: &KernelConfig,
) -> Result<(Array3<f64>, Option<Array2<f64>>, Option<Array2<f64>>)> {
    let (batch, steps, channels) = increments.dim();
    let layout = TermLayout::new(channels, depth);
    let signature_channels = layout.total();
    let recip = reciprocals(depth);

    let expected: Vec<usize> = if stream {
        vec![batch, steps, signature_channels]
    } else {
        vec![batch, signature_channels]
    };
    if grad_output.shape() != expected.as_slice() {
        bail!(SignatureError::GradientShape {
            node: "SignatureBackward",
            expected,
            got: grad_output.shape().to_vec(),
        });
    }
    if signature.shape() != expected.as_slice() {
        bail!(SignatureError::InvalidSignature(format!(
            "saved signature has shape {:?}, expected {:?}",
            signature.shape(),
            expected
        )));
    }

    let grad_output = grad_output.as_standard_layout();
    let grad_flat = grad_output
        .as_slice()
        .ok_or_else(|| anyhow!("signature gradient is not contiguous"))?;
    let signature = signature.as_standard_layout();
    let signature_flat = signature
        .as_slice()
        .ok_or_else(|| anyhow!("saved signature is not contiguous"))?;
    let increments_std = increments.as_standard_layout();
    let increments_flat = increments_std
        .as_slice()
        .ok_or_else(|| anyhow!("path increments are not contiguous"))?;

    let per_element = if stream { steps * signature_channels } else { signature_channels };
    let mut grad_increments = vec![0.0; batch * steps * channels];
    let mut grad_initial = vec![0.0; batch * signature_channels];

    let run = |(index, (grad_z, grad_seed)): (usize, (&mut [f64], &mut [f64]))| {
        let mut scratch = FusedScratch::new(&layout);
        backward_element(
            &layout,
            &recip,
            &increments_flat[index * steps * channels..(index + 1) * steps * channels],
            &grad_flat[index * per_element..(index + 1) * per_element],
            &signature_flat[index * per_element..(index + 1) * per_element],
            stream,
            inverse,
            &mut scratch,
            grad_z,
            grad_seed,
        );
    };

    if kernel.should_parallelise(batch, steps, signature_channels) {
        grad_increments
            .par_chunks_mut(steps * channels)
            .zip(grad_initial.par_chunks_mut(signature_channels))
            .enumerate()
            .for_each(&run);
    } else {
        grad_increments
            .chunks_mut(steps * channels)
            .zip(grad_initial.chunks_mut(signature_channels))
            .enumerate()
            .for_each(&run);
    }

    let grad_increments = Array3::from_shape_vec((batch, steps, channels), grad_increments)?;
    let (grad_path, grad_basepoint) = compute_path_increments_backward(grad_increments.view(), use_basepoint, inverse);
    let grad_initial = if use_initial {
        Some(Array2::from_shape_vec((batch, signature_channels), grad_initial)?)
    } else {
        None
    };
    Ok((grad_path, grad_basepoint, grad_initial))
}

#[allow(clippy::too_many_arguments)]
fn backward_element(
    layout: &TermLayout,
    recip: &[f64],
    increments: &[f64],
    grad_output: &[f64],
    signature: &[f64],
    stream: bool,
    inverse: bool,
    scratch: &mut FusedScratch,
    grad_increments: &mut [f64],
    grad_initial: &mut [f64],
) {
    let channels = layout.channels();
    let signature_channels = layout.total();
    let steps = increments.len() / channels;

    // current = A_{k+1}, previous = A_k
    let (mut current, mut grad_current) = if stream {
        (
            signature[(steps - 1) * signature_channels..].to_vec(),
            vec![0.0; signature_channels],
        )
    } else {
        (signature.to_vec(), grad_output.to_vec())
    };
    let mut previous = vec![0.0; signature_channels];
    let mut negated = vec![0.0; channels];

    for k in (0..steps).rev() {
        let z = &increments[k * channels..(k + 1) * channels];
        if stream {
            for (g, &o) in grad_current
                .iter_mut()
                .zip(&grad_output[k * signature_channels..(k + 1) * signature_channels])
            {
                *g += o;
            }
        }

        if stream && k > 0 {
            previous.copy_from_slice(&signature[(k - 1) * signature_channels..k * signature_channels]);
        } else {
            for (n, &v) in negated.iter_mut().zip(z) {
                *n = -v;
            }
            previous.copy_from_slice(&current);
            mult_fused_restricted_exp(layout, &negated, &mut previous, inverse, recip, scratch);
        }

        let mut grad_previous = vec![0.0; signature_channels];
        mult_fused_restricted_exp_backward(
            layout,
            &grad_current,
            z,
            &previous,
            inverse,
            recip,
            scratch,
            &mut grad_previous,
            &mut grad_increments[k * channels..(k + 1) * channels],
        );
        grad_current = grad_previous;
        std::mem::swap(&mut current, &mut previous);
    }

    grad_initial.copy_from_slice(&grad_current);
}
