use anyhow::{anyhow, Result};
use ndarray::{Array, ArrayD, ArrayView2, ArrayView3, Dimension, Ix2, Ix3};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 자동미분 그래프 노드 ID
pub type NodeId = usize;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

fn next_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// 역전파 함수 트레이트
///
/// `apply`는 `inputs()`와 같은 순서로 입력별 그래디언트를 돌려준다.
/// 미분 불가능한 입력 자리에는 `None`.
pub trait BackwardFunction: fmt::Debug {
    fn name(&self) -> &'static str;
    fn inputs(&self) -> Vec<Variable>;
    fn apply(&self, grad_output: &ArrayD<f64>) -> Result<Vec<Option<ArrayD<f64>>>>;

    /// 역전파 자체를 다시 미분할 수 있는지 여부
    fn supports_double_backward(&self) -> bool {
        false
    }

    /// 노드를 해체하며 붙잡고 있던 입력 변수를 넘겨준다
    ///
    /// 긴 그래프를 해제할 때 재귀 없이 풀기 위해 쓰인다. 기본 구현은 입력을 그 자리에서 해제한다.
    fn release_inputs(self: Box<Self>) -> Vec<Variable> {
        Vec::new()
    }
}

struct VariableInner {
    id: NodeId,
    data: Rc<ArrayD<f64>>,
    requires_grad: bool,
    grad_fn: Option<Box<dyn BackwardFunction>>,
}

// 기본 Drop은 입력 사슬을 따라 재귀하므로 그래프 길이만큼 스택을 쓴다.
// 마지막 참조가 끊긴 노드만 명시적 스택으로 옮겨 차례로 푼다.
impl Drop for VariableInner {
    fn drop(&mut self) {
        let Some(node) = self.grad_fn.take() else {
            return;
        };
        let mut stack = node.release_inputs();
        while let Some(variable) = stack.pop() {
            if let Ok(mut inner) = Rc::try_unwrap(variable.inner) {
                if let Some(node) = inner.grad_fn.take() {
                    stack.extend(node.release_inputs());
                }
            }
        }
    }
}

/// 연산 그래프에 참여하는 불변 텐서
///
/// 값은 생성 이후 바뀌지 않는다. 복제는 참조 카운트만 늘린다.
#[derive(Clone)]
pub struct Variable {
    inner: Rc<VariableInner>,
}

impl Variable {
    /// 그래디언트가 필요 없는 상수
    pub fn new<D: Dimension>(data: Array<f64, D>) -> Self {
        Self::build(Rc::new(standard(data)), false, None)
    }

    /// 그래디언트를 받는 리프
    pub fn leaf<D: Dimension>(data: Array<f64, D>) -> Self {
        Self::build(Rc::new(standard(data)), true, None)
    }

    /// 연산 결과 (입력 중 하나라도 그래디언트가 필요할 때만 노드를 유지)
    pub(crate) fn from_op<D: Dimension>(data: Array<f64, D>, grad_fn: Box<dyn BackwardFunction>) -> Self {
        Self::from_shared(Rc::new(standard(data)), grad_fn)
    }

    /// 역전파 노드가 출력 값을 함께 보관해야 할 때 사용
    pub(crate) fn from_shared(data: Rc<ArrayD<f64>>, grad_fn: Box<dyn BackwardFunction>) -> Self {
        let requires_grad = grad_fn.inputs().iter().any(Variable::requires_grad);
        let grad_fn = if requires_grad { Some(grad_fn) } else { None };
        Self::build(data, requires_grad, grad_fn)
    }

    fn build(data: Rc<ArrayD<f64>>, requires_grad: bool, grad_fn: Option<Box<dyn BackwardFunction>>) -> Self {
        Self {
            inner: Rc::new(VariableInner {
                id: next_node_id(),
                data,
                requires_grad,
                grad_fn,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.inner.data
    }

    pub(crate) fn shared_data(&self) -> Rc<ArrayD<f64>> {
        Rc::clone(&self.inner.data)
    }

    pub fn shape(&self) -> &[usize] {
        self.inner.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.inner.data.ndim()
    }

    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.grad_fn.is_none()
    }

    pub fn grad_fn(&self) -> Option<&dyn BackwardFunction> {
        self.inner.grad_fn.as_deref()
    }

    /// 같은 값을 공유하되 그래프에서 떨어진 상수
    pub fn detach(&self) -> Variable {
        Self::build(self.shared_data(), false, None)
    }

    pub fn view2(&self) -> Result<ArrayView2<'_, f64>> {
        self.inner
            .data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| anyhow!("expected a 2-dimensional tensor, got shape {:?}", self.shape()))
    }

    pub fn view3(&self) -> Result<ArrayView3<'_, f64>> {
        self.inner
            .data
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| anyhow!("expected a 3-dimensional tensor, got shape {:?}", self.shape()))
    }

    /// 표준 레이아웃 연속 메모리
    pub(crate) fn as_slice(&self) -> Result<&[f64]> {
        self.inner
            .data
            .as_slice()
            .ok_or_else(|| anyhow!("tensor of shape {:?} is not contiguous", self.shape()))
    }
}

fn standard<D: Dimension>(data: Array<f64, D>) -> ArrayD<f64> {
    let data = data.into_dyn();
    if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.inner.id)
            .field("shape", &self.shape())
            .field("requires_grad", &self.inner.requires_grad)
            .field("grad_fn", &self.grad_fn().map(|node| node.name()))
            .finish()
    }
}
