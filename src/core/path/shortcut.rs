//! 구간 시그니처의 역전파 지름길
//!
//! `inverse(prefix[:start]) ⊗ signature(prefix[:end])`를 그대로 미분하면 [0, end) 전체를 거친다.
//! 이 노드는 이미 계산된 값을 내보내고, 역전파는 [start, end) 조각들의 증분만으로 다시 계산한다.
//! 구간 밖 경로의 그래디언트는 정확히 0이 된다.

use anyhow::{bail, Result};
use ndarray::{s, Array3, ArrayD, ArrayView2, Axis, Zip};

use crate::core::autograd::{BackwardFunction, Variable};
use crate::core::config::KernelConfig;
use crate::core::error::SignatureError;
use crate::core::signature::signature_backward;

/// `signature`의 값을 그대로 돌려주되 그래디언트는 `pieces`로 보낸다
///
/// `pieces`는 스트림 방향으로 이어 붙이면 `signature`를 갖는 경로가 되어야 한다.
pub fn backward_shortcut(
    signature: &Variable,
    pieces: &[Variable],
    depth: usize,
    kernel: KernelConfig,
) -> Result<Variable> {
    if pieces.is_empty() {
        bail!(SignatureError::InvalidPath("path pieces must have nonzero length".to_string()));
    }
    let first = pieces[0].view3()?;
    let (batch, _, channels) = first.dim();
    let mut points = 0;
    for piece in pieces {
        let (piece_batch, length, piece_channels) = piece.view3()?.dim();
        if piece_batch != batch || piece_channels != channels {
            bail!(SignatureError::InvalidPath(format!(
                "path pieces disagree on batch or channel size ({:?} and {:?})",
                pieces[0].shape(),
                piece.shape()
            )));
        }
        points += length;
    }
    if points < 2 {
        bail!(SignatureError::InvalidPath(format!(
            "path pieces cover {} point(s), at least 2 are needed to define a path",
            points
        )));
    }

    let value = signature.detach();
    Ok(Variable::from_shared(
        value.shared_data(),
        Box::new(ShortcutBackward {
            signature: value,
            pieces: pieces.to_vec(),
            depth,
            kernel,
        }),
    ))
}

#[derive(Debug)]
struct ShortcutBackward {
    signature: Variable,
    pieces: Vec<Variable>,
    depth: usize,
    kernel: KernelConfig,
}

impl ShortcutBackward {
    /// 이어 붙이지 않고 조각별로 증분을 채운다
    fn increments(&self) -> Result<Array3<f64>> {
        let (batch, _, channels) = self.pieces[0].view3()?.dim();
        let points: usize = self.pieces.iter().map(|piece| piece.shape()[1]).sum();
        let mut increments = Array3::<f64>::zeros((batch, points - 1, channels));

        let mut cursor = 0;
        let mut previous: Option<ArrayView2<'_, f64>> = None;
        for piece in &self.pieces {
            let view = piece.view3()?;
            let length = view.len_of(Axis(1));
            if length == 0 {
                continue;
            }
            // 앞 조각의 마지막 점과 이 조각의 첫 점 사이
            if let Some(last) = previous {
                Zip::from(increments.index_axis_mut(Axis(1), cursor - 1))
                    .and(view.index_axis(Axis(1), 0))
                    .and(last)
                    .for_each(|out, &next, &prev| *out = next - prev);
            }
            Zip::from(increments.slice_mut(s![.., cursor..cursor + length - 1, ..]))
                .and(view.slice(s![.., 1.., ..]))
                .and(view.slice(s![.., ..length - 1, ..]))
                .for_each(|out, &next, &prev| *out = next - prev);

            previous = Some(view.index_axis_move(Axis(1), length - 1));
            cursor += length;
        }
        Ok(increments)
    }
}

impl BackwardFunction for ShortcutBackward {
    fn name(&self) -> &'static str {
        "BackwardShortcut"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        let node = *self;
        let mut inputs = node.pieces;
        inputs.push(node.signature);
        inputs
    }

    fn inputs(&self) -> Vec<Variable> {
        let mut inputs = Vec::with_capacity(self.pieces.len() + 1);
        inputs.push(self.signature.clone());
        inputs.extend(self.pieces.iter().cloned());
        inputs
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let increments = self.increments()?;
        let (grad_path, _, _) = signature_backward(
            grad_output,
            self.signature.data(),
            &increments,
            self.depth,
            false,
            false,
            false,
            false,
            &self.kernel,
        )?;

        // 시그니처 값 자체는 그래디언트를 받지 않는다
        let mut grads = Vec::with_capacity(self.pieces.len() + 1);
        grads.push(None);
        let mut start = 0;
        for piece in &self.pieces {
            let length = piece.shape()[1];
            grads.push(Some(
                grad_path.slice(s![.., start..start + length, ..]).to_owned().into_dyn(),
            ));
            start += length;
        }
        Ok(grads)
    }
}
