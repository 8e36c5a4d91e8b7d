use anyhow::{bail, Result};
use log::trace;
use ndarray::ArrayD;
use std::collections::{HashMap, HashSet};

use super::variable::{NodeId, Variable};
use crate::core::error::SignatureError;

/// 역전파 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct BackwardOptions {
    /// 역전파 과정 자체를 그래프로 기록 (2차 미분용)
    pub create_graph: bool,
}

/// 리프 변수별 누적 그래디언트
#[derive(Debug, Default)]
pub struct Gradients {
    grads: HashMap<NodeId, ArrayD<f64>>,
}

impl Gradients {
    /// 그래프에서 도달하지 않은 변수는 `None` (그래디언트 0과 같다)
    pub fn get(&self, variable: &Variable) -> Option<&ArrayD<f64>> {
        self.grads.get(&variable.id())
    }

    pub fn get_or_zeros(&self, variable: &Variable) -> ArrayD<f64> {
        self.get(variable)
            .cloned()
            .unwrap_or_else(|| ArrayD::zeros(variable.shape()))
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }
}

impl Variable {
    /// 이 변수에서 시작하는 역전파
    pub fn backward(&self, grad_output: ArrayD<f64>) -> Result<Gradients> {
        self.backward_with(grad_output, BackwardOptions::default())
    }

    pub fn backward_with(&self, grad_output: ArrayD<f64>, options: BackwardOptions) -> Result<Gradients> {
        if grad_output.shape() != self.shape() {
            bail!(SignatureError::GradientShape {
                node: "backward",
                expected: self.shape().to_vec(),
                got: grad_output.shape().to_vec(),
            });
        }

        let mut result = Gradients::default();
        if !self.requires_grad() {
            return Ok(result);
        }

        let order = topological_order(self);

        if options.create_graph {
            let once_differentiable = order
                .iter()
                .rev()
                .filter_map(Variable::grad_fn)
                .find(|node| !node.supports_double_backward());
            if let Some(node) = once_differentiable {
                bail!(SignatureError::DoubleBackward(node.name()));
            }
        }

        let mut pending: HashMap<NodeId, ArrayD<f64>> = HashMap::new();
        pending.insert(self.id(), grad_output);

        // 출력 쪽에서부터
        for variable in order.iter().rev() {
            let Some(grad) = pending.remove(&variable.id()) else {
                continue;
            };

            let Some(node) = variable.grad_fn() else {
                accumulate(&mut result.grads, variable.id(), grad);
                continue;
            };

            trace!("역전파 노드 {} (id={})", node.name(), variable.id());
            let inputs = node.inputs();
            let input_grads = node.apply(&grad)?;
            if input_grads.len() != inputs.len() {
                bail!(
                    "{} returned {} gradients for {} inputs",
                    node.name(),
                    input_grads.len(),
                    inputs.len()
                );
            }

            for (input, input_grad) in inputs.iter().zip(input_grads) {
                let Some(input_grad) = input_grad else {
                    continue;
                };
                if !input.requires_grad() {
                    continue;
                }
                if input_grad.shape() != input.shape() {
                    bail!(SignatureError::GradientShape {
                        node: node.name(),
                        expected: input.shape().to_vec(),
                        got: input_grad.shape().to_vec(),
                    });
                }
                accumulate(&mut pending, input.id(), input_grad);
            }
        }

        Ok(result)
    }
}

fn accumulate(store: &mut HashMap<NodeId, ArrayD<f64>>, id: NodeId, grad: ArrayD<f64>) {
    match store.get_mut(&id) {
        Some(existing) => *existing += &grad,
        None => {
            store.insert(id, grad);
        }
    }
}

/// 입력이 출력보다 앞에 오는 순서 (그래디언트가 필요한 변수만)
fn topological_order(root: &Variable) -> Vec<Variable> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<(Variable, bool)> = vec![(root.clone(), false)];

    while let Some((variable, expanded)) = stack.pop() {
        if expanded {
            order.push(variable);
            continue;
        }
        if !visited.insert(variable.id()) {
            continue;
        }
        let inputs = variable.grad_fn().map(|node| node.inputs()).unwrap_or_default();
        stack.push((variable, true));
        for input in inputs {
            if input.requires_grad() && !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }

    order
}
