//! 스트림 축(1번 축) 구조 연산과 역전파

use anyhow::{bail, Result};
use ndarray::{s, Array3, ArrayD, Axis};

use super::variable::{BackwardFunction, Variable};

/// (batch, stream, channels)에서 한 스트림 위치를 골라 (batch, channels)로
pub fn select_stream(input: &Variable, index: usize) -> Result<Variable> {
    let view = input.view3()?;
    let stream = view.len_of(Axis(1));
    if index >= stream {
        bail!("stream index {} out of range for stream of length {}", index, stream);
    }
    let output = view.index_axis(Axis(1), index).to_owned();
    Ok(Variable::from_op(
        output,
        Box::new(SelectStreamBackward {
            input: input.clone(),
            index,
        }),
    ))
}

/// 스트림 구간 [start, start + len)
///
/// 전체 구간이면 새 노드 없이 입력을 그대로 돌려준다.
pub fn narrow_stream(input: &Variable, start: usize, len: usize) -> Result<Variable> {
    let view = input.view3()?;
    let stream = view.len_of(Axis(1));
    if start + len > stream {
        bail!(
            "stream range {}..{} out of range for stream of length {}",
            start,
            start + len,
            stream
        );
    }
    if start == 0 && len == stream {
        return Ok(input.clone());
    }
    let output = view.slice(s![.., start..start + len, ..]).to_owned();
    Ok(Variable::from_op(
        output,
        Box::new(NarrowStreamBackward {
            input: input.clone(),
            start,
            len,
        }),
    ))
}

/// (batch, channels) -> (batch, 1, channels)
pub fn unsqueeze_stream(input: &Variable) -> Result<Variable> {
    let view = input.view2()?;
    let output = view.insert_axis(Axis(1)).to_owned();
    Ok(Variable::from_op(
        output,
        Box::new(UnsqueezeStreamBackward { input: input.clone() }),
    ))
}

#[derive(Debug)]
struct SelectStreamBackward {
    input: Variable,
    index: usize,
}

impl BackwardFunction for SelectStreamBackward {
    fn name(&self) -> &'static str {
        "SelectStreamBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        vec![self.input]
    }

    fn inputs(&self) -> Vec<Variable> {
        vec![self.input.clone()]
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let shape = self.input.view3()?.dim();
        let mut grad = Array3::<f64>::zeros(shape);
        grad.index_axis_mut(Axis(1), self.index).assign(grad_output);
        Ok(vec![Some(grad.into_dyn())])
    }
}

#[derive(Debug)]
struct NarrowStreamBackward {
    input: Variable,
    start: usize,
    len: usize,
}

impl BackwardFunction for NarrowStreamBackward {
    fn name(&self) -> &'static str {
        "NarrowStreamBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        vec![self.input]
    }

    fn inputs(&self) -> Vec<Variable> {
        vec![self.input.clone()]
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        let shape = self.input.view3()?.dim();
        let mut grad = Array3::<f64>::zeros(shape);
        grad.slice_mut(s![.., self.start..self.start + self.len, ..])
            .assign(grad_output);
        Ok(vec![Some(grad.into_dyn())])
    }
}

#[derive(Debug)]
struct UnsqueezeStreamBackward {
    input: Variable,
}

impl BackwardFunction for UnsqueezeStreamBackward {
    fn name(&self) -> &'static str {
        "UnsqueezeStreamBackward"
    }

    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        vec![self.input]
    }

    fn inputs(&self) -> Vec<Variable> {
        vec![self.input.clone()]
    }

    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>> {
        Ok(vec![Some(grad_output.index_axis(Axis(1), 0).to_owned())])
    }
}
