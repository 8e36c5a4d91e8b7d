//! 시그니처 순전파 커널
//!
//! 배치 원소마다 `A <- A ⊗ exp(z_k)`를 누적한다 (역원이면 왼쪽에서 곱함).
//! 문제 크기가 `KernelConfig::parallel_threshold` 이상이면 배치를 rayon으로 나눠 처리한다.

use anyhow::{anyhow, Result};
use log::debug;
use ndarray::{Array2, Array3, ArrayD, IxDyn};
use rayon::prelude::*;

use crate::core::config::KernelConfig;
use crate::core::math::tensor_algebra::{mult_fused_restricted_exp, reciprocals, FusedScratch, TermLayout};

/// 증분 (batch, steps, channels)로부터 시그니처를 계산
///
/// 반환 모양은 `stream`이면 (batch, steps, signature_channels), 아니면 (batch, signature_channels).
/// `initial`은 (batch, signature_channels)이며 누적의 시작 값이 된다.
pub fn signature_forward(
    increments: &Array3<f64>,
    depth: usize,
    stream: bool,
    inverse: bool,
    initial: Option<&Array2<f64>>,
    kernel: &KernelConfig,
) -> Result<ArrayD<f64>> {
    let (batch, steps, channels) = increments.dim();
    let layout = TermLayout::new(channels, depth);
    let signature_channels = layout.total();
    let recip = reciprocals(depth);

    let increments = increments.as_standard_layout();
    let flat = increments
        .as_slice()
        .ok_or_else(|| anyhow!("path increments are not contiguous"))?;
    let initial = initial.map(|value| value.as_standard_layout());
    let initial_flat = match &initial {
        Some(value) => Some(
            value
                .as_slice()
                .ok_or_else(|| anyhow!("initial signature is not contiguous"))?,
        ),
        None => None,
    };

    let per_element = if stream { steps * signature_channels } else { signature_channels };
    let mut output = vec![0.0; batch * per_element];

    let run = |(index, out): (usize, &mut [f64])| {
        let mut scratch = FusedScratch::new(&layout);
        let element = &flat[index * steps * channels..(index + 1) * steps * channels];
        let seed = initial_flat.map(|value| &value[index * signature_channels..(index + 1) * signature_channels]);
        accumulate_element(&layout, element, seed, out, stream, inverse, &recip, &mut scratch);
    };

    if kernel.should_parallelise(batch, steps, signature_channels) {
        debug!(
            "병렬 시그니처 커널: batch={}, steps={}, signature_channels={}",
            batch, steps, signature_channels
        );
        output.par_chunks_mut(per_element).enumerate().for_each(&run);
    } else {
        output.chunks_mut(per_element).enumerate().for_each(&run);
    }

    let shape = if stream {
        vec![batch, steps, signature_channels]
    } else {
        vec![batch, signature_channels]
    };
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), output)?)
}

#[allow(clippy::too_many_arguments)]
fn accumulate_element(
    layout: &TermLayout,
    increments: &[f64],
    initial: Option<&[f64]>,
    out: &mut [f64],
    stream: bool,
    inverse: bool,
    recip: &[f64],
    scratch: &mut FusedScratch,
) {
    let signature_channels = layout.total();
    // 스칼라 항을 저장하지 않으므로 항등원은 영벡터
    let mut current = match initial {
        Some(seed) => seed.to_vec(),
        None => vec![0.0; signature_channels],
    };
    for (step, z) in increments.chunks_exact(layout.channels()).enumerate() {
        mult_fused_restricted_exp(layout, z, &mut current, inverse, recip, scratch);
        if stream {
            out[step * signature_channels..(step + 1) * signature_channels].copy_from_slice(&current);
        }
    }
    if !stream {
        out.copy_from_slice(&current);
    }
}
