//! 전역 스트림 위치 <-> (청크, 청크 내 위치)

use anyhow::{bail, Result};

use crate::core::error::SignatureError;

/// 누적 길이표에서 전역 위치가 속한 청크와 청크 안 위치
///
/// `cumulative[chunk] > index`인 가장 작은 chunk를 고른다. 경계값과 같은 위치는 다음 청크의 0번이 된다.
/// 모든 청크 뒤를 가리키면 (청크 수, index - 전체 길이)를 돌려준다.
pub fn locate(cumulative: &[usize], index: usize) -> (usize, usize) {
    let chunk = cumulative.partition_point(|&length| length <= index);
    let local = match chunk {
        0 => index,
        _ => index - cumulative[chunk - 1],
    };
    (chunk, local)
}

/// 파이썬 슬라이스 규칙으로 start/end 정규화
///
/// None은 0/length, 음수는 끝에서부터, 범위 밖은 [-length, length]로 자른 뒤 음수를 옮긴다.
/// 정규화 후 점이 2개 미만이면 오류.
pub fn normalise_interval(start: Option<isize>, end: Option<isize>, length: usize) -> Result<(usize, usize)> {
    let norm_start = normalise_bound(start, 0, length);
    let norm_end = normalise_bound(end, length, length);
    let span = norm_end as isize - norm_start as isize;

    if span == 1 {
        bail!(SignatureError::SinglePointInterval {
            start,
            end,
            norm_start,
            norm_end,
            length,
        });
    }
    if span < 2 {
        bail!(SignatureError::InvalidInterval {
            start,
            end,
            norm_start,
            norm_end,
            length,
        });
    }
    Ok((norm_start, norm_end))
}

fn normalise_bound(bound: Option<isize>, default: usize, length: usize) -> usize {
    let length = length as isize;
    let value = bound.unwrap_or(default as isize).clamp(-length, length);
    if value < 0 {
        (value + length) as usize
    } else {
        value as usize
    }
}
