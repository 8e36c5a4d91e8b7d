//! 잘린 텐서 대수 연산
//!
//! 배치 원소 하나의 텐서 대수 원소를 레벨별로 이어 붙인 평탄한 `[f64]`로 다룬다.
//! 레벨 k(1부터)는 `c^k`개의 계수를 행 우선 단어 순서로 가진다.
//! 스칼라 항은 저장하지 않는다 (군 원소는 항상 1, 로그 쪽은 항상 0).
//!
//! `*_backward` 함수들은 모두 그래디언트를 출력 버퍼에 **누적**한다.

/// 레벨별 오프셋/크기
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermLayout {
    channels: usize,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
}

impl TermLayout {
    pub fn new(channels: usize, depth: usize) -> Self {
        let mut offsets = Vec::with_capacity(depth);
        let mut sizes = Vec::with_capacity(depth);
        let mut offset = 0;
        let mut size = channels;
        for _ in 0..depth {
            offsets.push(offset);
            sizes.push(size);
            offset += size;
            size *= channels;
        }
        Self {
            channels,
            offsets,
            sizes,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn depth(&self) -> usize {
        self.sizes.len()
    }

    /// 시그니처 채널 수
    pub fn total(&self) -> usize {
        match (self.offsets.last(), self.sizes.last()) {
            (Some(offset), Some(size)) => offset + size,
            _ => 0,
        }
    }

    pub fn offset(&self, level: usize) -> usize {
        self.offsets[level]
    }

    pub fn size(&self, level: usize) -> usize {
        self.sizes[level]
    }

    pub fn term<'a>(&self, tensor: &'a [f64], level: usize) -> &'a [f64] {
        &tensor[self.offsets[level]..self.offsets[level] + self.sizes[level]]
    }

    pub fn term_mut<'a>(&self, tensor: &'a mut [f64], level: usize) -> &'a mut [f64] {
        &mut tensor[self.offsets[level]..self.offsets[level] + self.sizes[level]]
    }
}

/// [1/2, 1/3, ..., 1/depth]
pub fn reciprocals(depth: usize) -> Vec<f64> {
    (2..=depth).map(|k| 1.0 / k as f64).collect()
}

#[inline]
fn add_assign(target: &mut [f64], source: &[f64]) {
    for (t, &s) in target.iter_mut().zip(source) {
        *t += s;
    }
}

#[inline]
fn add_scaled(target: &mut [f64], source: &[f64], scale: f64) {
    for (t, &s) in target.iter_mut().zip(source) {
        *t += scale * s;
    }
}

/// out += left ⊗ right
#[inline]
fn outer_add(out: &mut [f64], left: &[f64], right: &[f64]) {
    let width = right.len();
    for (row, &l) in out.chunks_exact_mut(width).zip(left) {
        for (o, &r) in row.iter_mut().zip(right) {
            *o += l * r;
        }
    }
}

#[inline]
fn outer_backward(grad: &[f64], left: &[f64], right: &[f64], grad_left: &mut [f64], grad_right: &mut [f64]) {
    let width = right.len();
    for ((row, &l), gl) in grad.chunks_exact(width).zip(left).zip(grad_left.iter_mut()) {
        let mut acc = 0.0;
        for ((&g, &r), gr) in row.iter().zip(right).zip(grad_right.iter_mut()) {
            acc += g * r;
            *gr += g * l;
        }
        *gl += acc;
    }
}

/// a <- a ⊗ b (스칼라 항 1 포함)
///
/// 높은 레벨부터 갱신하므로 낮은 레벨의 원래 값을 그대로 읽을 수 있다.
pub fn mult(layout: &TermLayout, a: &mut [f64], b: &[f64]) {
    for level in (0..layout.depth()).rev() {
        let (lower, upper) = a.split_at_mut(layout.offset(level));
        let target = &mut upper[..layout.size(level)];
        add_assign(target, layout.term(b, level));
        for j in 0..level {
            outer_add(target, layout.term(lower, j), layout.term(b, level - 1 - j));
        }
    }
}

/// `mult`의 역전파. a, b는 곱하기 전 값.
pub fn mult_backward(
    layout: &TermLayout,
    grad_out: &[f64],
    a: &[f64],
    b: &[f64],
    grad_a: &mut [f64],
    grad_b: &mut [f64],
) {
    for level in 0..layout.depth() {
        let grad = layout.term(grad_out, level);
        add_assign(layout.term_mut(grad_a, level), grad);
        add_assign(layout.term_mut(grad_b, level), grad);
        for j in 0..level {
            let k = level - 1 - j;
            outer_backward(
                grad,
                layout.term(a, j),
                layout.term(b, k),
                layout.term_mut(grad_a, j),
                layout.term_mut(grad_b, k),
            );
        }
    }
}

/// out <- a ⊗ b, 두 인자 모두 스칼라 항이 0이라고 본다
pub fn mult_partial(layout: &TermLayout, a: &[f64], b: &[f64], out: &mut [f64]) {
    out.fill(0.0);
    for level in 1..layout.depth() {
        let target = layout.term_mut(out, level);
        for j in 0..level {
            outer_add(target, layout.term(a, j), layout.term(b, level - 1 - j));
        }
    }
}

pub fn mult_partial_backward(
    layout: &TermLayout,
    grad_out: &[f64],
    a: &[f64],
    b: &[f64],
    grad_a: &mut [f64],
    grad_b: &mut [f64],
) {
    for level in 1..layout.depth() {
        let grad = layout.term(grad_out, level);
        for j in 0..level {
            let k = level - 1 - j;
            outer_backward(
                grad,
                layout.term(a, j),
                layout.term(b, k),
                layout.term_mut(grad_a, j),
                layout.term_mut(grad_b, k),
            );
        }
    }
}

/// out <- exp(x), x는 레벨 1 원소 (길이 channels)
pub fn restricted_exp(layout: &TermLayout, x: &[f64], out: &mut [f64], reciprocals: &[f64]) {
    let channels = layout.channels();
    layout.term_mut(out, 0).copy_from_slice(x);
    for level in 1..layout.depth() {
        let scale = reciprocals[level - 1];
        let (lower, upper) = out.split_at_mut(layout.offset(level));
        let target = &mut upper[..layout.size(level)];
        let prev = layout.term(lower, level - 1);
        for (row, &p) in target.chunks_exact_mut(channels).zip(prev) {
            for (t, &xv) in row.iter_mut().zip(x) {
                *t = p * xv * scale;
            }
        }
    }
}

/// `restricted_exp`의 역전파. out은 순전파 결과.
pub fn restricted_exp_backward(
    layout: &TermLayout,
    grad_out: &[f64],
    x: &[f64],
    out: &[f64],
    reciprocals: &[f64],
    grad_x: &mut [f64],
) {
    let channels = layout.channels();
    let mut grad = grad_out.to_vec();
    for level in (1..layout.depth()).rev() {
        let scale = reciprocals[level - 1];
        let (lower, upper) = grad.split_at_mut(layout.offset(level));
        let grad_level = &upper[..layout.size(level)];
        let grad_prev = layout.term_mut(lower, level - 1);
        let prev = layout.term(out, level - 1);
        for ((row, &p), gp) in grad_level.chunks_exact(channels).zip(prev).zip(grad_prev.iter_mut()) {
            let mut acc = 0.0;
            for ((&g, &xv), gx) in row.iter().zip(x).zip(grad_x.iter_mut()) {
                let g = g * scale;
                acc += g * xv;
                *gx += g * p;
            }
            *gp += acc;
        }
    }
    add_assign(grad_x, layout.term(&grad, 0));
}

/// 융합 연산용 작업 버퍼
#[derive(Debug, Clone)]
pub struct FusedScratch {
    exp: Vec<f64>,
    product: Vec<f64>,
}

impl FusedScratch {
    pub fn new(layout: &TermLayout) -> Self {
        Self {
            exp: vec![0.0; layout.total()],
            product: vec![0.0; layout.total()],
        }
    }
}

/// a <- a ⊗ exp(z), inverse면 a <- exp(z) ⊗ a
pub fn mult_fused_restricted_exp(
    layout: &TermLayout,
    z: &[f64],
    a: &mut [f64],
    inverse: bool,
    reciprocals: &[f64],
    scratch: &mut FusedScratch,
) {
    restricted_exp(layout, z, &mut scratch.exp, reciprocals);
    if inverse {
        scratch.product.copy_from_slice(&scratch.exp);
        mult(layout, &mut scratch.product, a);
        a.copy_from_slice(&scratch.product);
    } else {
        mult(layout, a, &scratch.exp);
    }
}

/// `mult_fused_restricted_exp`의 역전파. prev는 곱하기 전 a.
#[allow(clippy::too_many_arguments)]
pub fn mult_fused_restricted_exp_backward(
    layout: &TermLayout,
    grad_out: &[f64],
    z: &[f64],
    prev: &[f64],
    inverse: bool,
    reciprocals: &[f64],
    scratch: &mut FusedScratch,
    grad_prev: &mut [f64],
    grad_z: &mut [f64],
) {
    restricted_exp(layout, z, &mut scratch.exp, reciprocals);
    scratch.product.fill(0.0);
    if inverse {
        mult_backward(layout, grad_out, &scratch.exp, prev, &mut scratch.product, grad_prev);
    } else {
        mult_backward(layout, grad_out, prev, &scratch.exp, grad_prev, &mut scratch.product);
    }
    restricted_exp_backward(layout, &scratch.product, z, &scratch.exp, reciprocals, grad_z);
}

/// log 멱급수의 n차 계수 (-1)^(n+1) / n
fn log_coefficient(n: usize) -> f64 {
    let value = 1.0 / n as f64;
    if n % 2 == 1 {
        value
    } else {
        -value
    }
}

/// out <- log(1 + a)
///
/// Horner 형태: y_d = c_d a, y_n = c_n a + y_{n+1} ⊗ a, 결과는 y_1
pub fn log(layout: &TermLayout, a: &[f64], out: &mut [f64]) {
    let depth = layout.depth();
    let leading = log_coefficient(depth);
    for (o, &v) in out.iter_mut().zip(a) {
        *o = leading * v;
    }
    let mut product = vec![0.0; layout.total()];
    for n in (1..depth).rev() {
        mult_partial(layout, out, a, &mut product);
        let coefficient = log_coefficient(n);
        for ((o, &p), &v) in out.iter_mut().zip(&product).zip(a) {
            *o = coefficient * v + p;
        }
    }
}

/// `log`의 역전파
pub fn log_backward(layout: &TermLayout, grad_out: &[f64], a: &[f64], grad_a: &mut [f64]) {
    let depth = layout.depth();
    let total = layout.total();

    // 순전파를 다시 돌리며 y_{n+1}을 기록
    let mut records: Vec<Vec<f64>> = Vec::with_capacity(depth.saturating_sub(1));
    let mut current: Vec<f64> = a.iter().map(|&v| log_coefficient(depth) * v).collect();
    let mut product = vec![0.0; total];
    for n in (1..depth).rev() {
        mult_partial(layout, &current, a, &mut product);
        let coefficient = log_coefficient(n);
        let next: Vec<f64> = product
            .iter()
            .zip(a)
            .map(|(&p, &v)| coefficient * v + p)
            .collect();
        records.push(std::mem::replace(&mut current, next));
    }

    let mut grad = grad_out.to_vec();
    for n in 1..depth {
        add_scaled(grad_a, &grad, log_coefficient(n));
        let previous = &records[depth - 1 - n];
        let mut grad_previous = vec![0.0; total];
        mult_partial_backward(layout, &grad, previous, a, &mut grad_previous, grad_a);
        grad = grad_previous;
    }
    add_scaled(grad_a, &grad, log_coefficient(depth));
}
