//! 구간 시그니처 누적기

use anyhow::{bail, Result};
use log::{debug, trace};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::interval::{locate, normalise_interval};
use super::shortcut::backward_shortcut;
use crate::core::autograd::{narrow_stream, select_stream, unsqueeze_stream, Variable};
use crate::core::config::{KernelConfig, SignatureConfig};
use crate::core::error::SignatureError;
use crate::core::logsignature::{logsignature_channels, LogSignatureMode, SignatureToLogSignature};
use crate::core::signature::{interpret_basepoint, multi_signature_combine, signature, signature_channels, Basepoint};

/// 로그 시그니처 변환 캐시 키 (channels, depth, mode)
type TransformKey = (usize, usize, LogSignatureMode);

/// 덧붙여 나가는 경로와 그 위의 임의 구간 시그니처
///
/// 청크마다 스트림 시그니처와 스트림 역원 시그니처를 저장해 두고,
/// 구간 [start, end)의 시그니처를 `inverse(prefix[:start]) ⊗ prefix[:end]`로 조합한다.
/// 역전파는 구간 안의 원본 경로 조각으로만 흐른다.
///
/// 덧붙인 청크의 값은 이후 바뀌지 않는다고 가정한다 (`Variable`은 불변이다).
/// `Rc` 기반 그래프를 공유하므로 스레드 간 이동은 불가능하다.
#[derive(Debug)]
pub struct Path {
    depth: usize,
    kernel: KernelConfig,

    /// 원본 청크 (기준점이 있으면 첫 원소는 길이 1의 기준점 청크)
    path: Vec<Variable>,
    /// 청크별 (batch, steps, signature_channels)
    signature: Vec<Variable>,
    inverse_signature: Vec<Variable>,

    length: usize,
    signature_length: usize,
    lengths: Vec<usize>,
    signature_lengths: Vec<usize>,

    batch_size: usize,
    channels: usize,
    signature_channels: usize,
    logsignature_channels: usize,

    logsignature_transforms: HashMap<TransformKey, SignatureToLogSignature>,
}

impl Path {
    /// (batch, stream, channels) 경로로 누적기 생성
    pub fn new(path: &Variable, depth: usize, basepoint: impl Into<Basepoint>) -> Result<Self> {
        Self::with_config(path, depth, basepoint, KernelConfig::default())
    }

    pub fn with_config(
        path: &Variable,
        depth: usize,
        basepoint: impl Into<Basepoint>,
        kernel: KernelConfig,
    ) -> Result<Self> {
        let (batch_size, _, channels) = chunk_dims(path)?;
        let basepoint = interpret_basepoint(&basepoint.into(), batch_size, channels)?;

        let mut accumulator = Self {
            depth,
            kernel,
            path: Vec::new(),
            signature: Vec::new(),
            inverse_signature: Vec::new(),
            length: 0,
            signature_length: 0,
            lengths: Vec::new(),
            signature_lengths: Vec::new(),
            batch_size,
            channels,
            signature_channels: signature_channels(channels, depth),
            logsignature_channels: logsignature_channels(channels, depth),
            logsignature_transforms: HashMap::new(),
        };

        let seed = match &basepoint {
            Some(value) => Basepoint::Value(value.clone()),
            None => Basepoint::Absent,
        };
        let (sig, inverse_sig) = accumulator.chunk_signatures(path, seed, None, None)?;

        if let Some(value) = &basepoint {
            accumulator.path.push(unsqueeze_stream(value)?);
            accumulator.length += 1;
            accumulator.lengths.push(accumulator.length);
        }
        accumulator.append(path, sig, inverse_sig);

        debug!(
            "Path 생성: batch={}, length={}, channels={}, depth={}, basepoint={}",
            accumulator.batch_size,
            accumulator.length,
            accumulator.channels,
            accumulator.depth,
            basepoint.is_some()
        );
        Ok(accumulator)
    }

    /// 새 청크를 이어 붙인다
    ///
    /// 직전 청크의 마지막 점, 마지막 시그니처, 마지막 역원 시그니처에서 이어서
    /// 새 청크의 표만 계산한다. 실패하면 상태는 그대로 남는다.
    pub fn update(&mut self, path: &Variable) -> Result<()> {
        let (batch, _, channels) = chunk_dims(path)?;
        if batch != self.batch_size {
            bail!(SignatureError::BatchMismatch {
                expected: self.batch_size,
                got: batch,
            });
        }
        if channels != self.channels {
            bail!(SignatureError::ChannelMismatch {
                expected: self.channels,
                got: channels,
            });
        }

        let basepoint = last_entry(&self.path)?;
        let initial = last_entry(&self.signature)?;
        let inverse_initial = last_entry(&self.inverse_signature)?;
        let (sig, inverse_sig) =
            self.chunk_signatures(path, Basepoint::Value(basepoint), Some(initial), Some(inverse_initial))?;

        self.append(path, sig, inverse_sig);
        debug!(
            "청크 추가: 청크 수={}, length={}, signature_length={}",
            self.path.len(),
            self.length,
            self.signature_length
        );
        Ok(())
    }

    /// 청크 하나의 스트림 시그니처와 스트림 역원 시그니처
    fn chunk_signatures(
        &self,
        path: &Variable,
        basepoint: Basepoint,
        initial: Option<Variable>,
        inverse_initial: Option<Variable>,
    ) -> Result<(Variable, Variable)> {
        let config = SignatureConfig::default()
            .stream(true)
            .basepoint(basepoint)
            .kernel(self.kernel);
        let sig = signature(path, self.depth, &config.clone().initial(initial))?;
        let inverse_sig = signature(path, self.depth, &config.inverse(true).initial(inverse_initial))?;
        Ok((sig, inverse_sig))
    }

    fn append(&mut self, path: &Variable, sig: Variable, inverse_sig: Variable) {
        self.length += path.shape()[1];
        self.signature_length += sig.shape()[1];
        self.lengths.push(self.length);
        self.signature_lengths.push(self.signature_length);

        self.path.push(path.clone());
        self.signature.push(sig);
        self.inverse_signature.push(inverse_sig);
    }

    /// 구간 [start, end)의 시그니처 (batch, signature_channels)
    ///
    /// 인자는 슬라이스 규칙을 따른다. 모든 청크를 이어 붙인 경로 `p`에 대해
    /// `signature(p[start:end])`와 같은 값을 돌려준다.
    pub fn signature(&self, start: Option<isize>, end: Option<isize>) -> Result<Variable> {
        let (start, end) = normalise_interval(start, end, self.length)?;
        trace!("구간 시그니처 [{}, {}) / length {}", start, end, self.length);

        let (index_sig_end, local_sig_end) = locate(&self.signature_lengths, end - 2);
        let sig_at_end = select_stream(&self.signature[index_sig_end], local_sig_end)?;
        if start == 0 {
            return Ok(sig_at_end);
        }

        let (index_sig_start, local_sig_start) = locate(&self.signature_lengths, start - 1);
        let inverse_at_start = select_stream(&self.inverse_signature[index_sig_start], local_sig_start)?;
        let combined = multi_signature_combine(
            &[inverse_at_start.detach(), sig_at_end.detach()],
            self.channels,
            self.depth,
        )?;

        let pieces = self.path_pieces(start, end)?;
        backward_shortcut(&combined, &pieces, self.depth, self.kernel)
    }

    /// 원본 경로 [start, end)를 청크 경계로 나눈 조각들
    fn path_pieces(&self, start: usize, end: usize) -> Result<Vec<Variable>> {
        let (index_start, local_start) = locate(&self.lengths, start);
        let (index_end, local_end) = locate(&self.lengths, end);

        if index_start == index_end {
            return Ok(vec![narrow_stream(
                &self.path[index_start],
                local_start,
                local_end - local_start,
            )?]);
        }

        let first = &self.path[index_start];
        let mut pieces = vec![narrow_stream(first, local_start, first.shape()[1] - local_start)?];
        pieces.extend(self.path[index_start + 1..index_end].iter().cloned());
        // end가 청크 경계면 마지막 조각은 비어 있음
        if local_end != 0 {
            pieces.push(narrow_stream(&self.path[index_end], 0, local_end)?);
        }
        Ok(pieces)
    }

    /// 구간 [start, end)의 로그 시그니처
    ///
    /// 변환 객체는 (channels, depth, mode)별로 한 번 만들어 계속 재사용한다.
    pub fn logsignature(
        &mut self,
        start: Option<isize>,
        end: Option<isize>,
        mode: LogSignatureMode,
    ) -> Result<Variable> {
        let signature = self.signature(start, end)?;
        let transform = match self.logsignature_transforms.entry((self.channels, self.depth, mode)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("로그 시그니처 변환 캐시 미스: mode={}", mode);
                entry.insert(SignatureToLogSignature::new(
                    self.channels,
                    self.depth,
                    false,
                    mode,
                )?)
            }
        };
        transform.apply(&signature)
    }

    /// 지금까지 받은 원본 청크 (기준점 청크 포함)
    pub fn path(&self) -> &[Variable] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn kernel(&self) -> KernelConfig {
        self.kernel
    }

    /// [batch, length, channels]
    pub fn shape(&self) -> [usize; 3] {
        [self.batch_size, self.length, self.channels]
    }

    /// `shape()[index]`, 음수는 끝에서부터
    pub fn size(&self, index: isize) -> Option<usize> {
        pick(self.shape(), index)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// [batch, signature_length, signature_channels]
    pub fn signature_shape(&self) -> [usize; 3] {
        [self.batch_size, self.signature_length, self.signature_channels]
    }

    pub fn signature_size(&self, index: isize) -> Option<usize> {
        pick(self.signature_shape(), index)
    }

    pub fn signature_channels(&self) -> usize {
        self.signature_channels
    }

    /// [batch, signature_length, logsignature_channels]
    pub fn logsignature_shape(&self) -> [usize; 3] {
        [self.batch_size, self.signature_length, self.logsignature_channels]
    }

    pub fn logsignature_size(&self, index: isize) -> Option<usize> {
        pick(self.logsignature_shape(), index)
    }

    pub fn logsignature_channels(&self) -> usize {
        self.logsignature_channels
    }

    #[cfg(test)]
    pub(crate) fn signature_table(&self) -> &[Variable] {
        &self.signature
    }

    #[cfg(test)]
    pub(crate) fn inverse_signature_table(&self) -> &[Variable] {
        &self.inverse_signature
    }

    #[cfg(test)]
    pub(crate) fn logsignature_cache_len(&self) -> usize {
        self.logsignature_transforms.len()
    }
}

/// (batch, stream, channels)
fn chunk_dims(path: &Variable) -> Result<(usize, usize, usize)> {
    if path.ndim() != 3 {
        bail!(SignatureError::InvalidPath(format!(
            "must be a 3-dimensional tensor, with dimensions corresponding to (batch, stream, channel) \
             respectively (got shape {:?})",
            path.shape()
        )));
    }
    Ok((path.shape()[0], path.shape()[1], path.shape()[2]))
}

/// 마지막 청크의 마지막 스트림 원소 (미분 가능)
fn last_entry(table: &[Variable]) -> Result<Variable> {
    let Some(last) = table.last() else {
        bail!("path accumulator holds no chunks");
    };
    let steps = last.shape()[1];
    if steps == 0 {
        bail!("last chunk of the path accumulator is empty");
    }
    select_stream(last, steps - 1)
}

fn pick(shape: [usize; 3], index: isize) -> Option<usize> {
    let position = if index < 0 { 3 + index } else { index };
    usize::try_from(position).ok().and_then(|i| shape.get(i).copied())
}
