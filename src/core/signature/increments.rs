//! 경로 증분과 그 역전파

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

/// (batch, stream, channels) 경로의 증분 (batch, out_stream, channels)
///
/// 기준점이 있으면 첫 증분은 `x_0 - basepoint`, out_stream = stream.
/// 없으면 out_stream = stream - 1. `inverse`면 부호를 뒤집는다.
/// stream은 호출 전에 검증되어 있어야 한다.
pub fn compute_path_increments(path: ArrayView3<f64>, basepoint: Option<ArrayView2<f64>>, inverse: bool) -> Array3<f64> {
    let (batch, stream, channels) = path.dim();
    let offset = usize::from(basepoint.is_some());
    let mut increments = Array3::<f64>::zeros((batch, stream - 1 + offset, channels));

    {
        let mut body = increments.slice_mut(s![.., offset.., ..]);
        body.assign(&path.slice(s![.., 1.., ..]));
        body -= &path.slice(s![.., ..stream - 1, ..]);
    }

    if let Some(basepoint) = basepoint {
        let mut first = increments.index_axis_mut(Axis(1), 0);
        first.assign(&path.index_axis(Axis(1), 0));
        first -= &basepoint;
    }

    if inverse {
        increments.mapv_inplace(|v| -v);
    }
    increments
}

/// 증분 그래디언트를 경로(와 기준점) 그래디언트로
pub fn compute_path_increments_backward(
    grad_increments: ArrayView3<f64>,
    use_basepoint: bool,
    inverse: bool,
) -> (Array3<f64>, Option<Array2<f64>>) {
    let (batch, out_stream, channels) = grad_increments.dim();
    let offset = usize::from(use_basepoint);
    let stream = out_stream + 1 - offset;
    let grad = if inverse {
        grad_increments.mapv(|v| -v)
    } else {
        grad_increments.to_owned()
    };

    let mut grad_path = Array3::<f64>::zeros((batch, stream, channels));
    let body = grad.slice(s![.., offset.., ..]);
    {
        let mut later = grad_path.slice_mut(s![.., 1.., ..]);
        later += &body;
    }
    {
        let mut earlier = grad_path.slice_mut(s![.., ..stream - 1, ..]);
        earlier -= &body;
    }

    let grad_basepoint = if use_basepoint {
        let first = grad.index_axis(Axis(1), 0);
        let mut head = grad_path.index_axis_mut(Axis(1), 0);
        head += &first;
        Some(first.mapv(|v| -v))
    } else {
        None
    };

    (grad_path, grad_basepoint)
}
