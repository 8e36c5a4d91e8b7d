//! Lyndon 단어와 표준 괄호
//!
//! 단어는 길이 순, 같은 길이 안에서는 사전 순으로 나열한다.

use std::collections::{HashMap, HashSet};

/// 뫼비우스 함수
fn mobius(mut n: usize) -> i64 {
    let mut result = 1;
    let mut p = 2;
    while p * p <= n {
        if n % p == 0 {
            n /= p;
            if n % p == 0 {
                return 0;
            }
            result = -result;
        }
        p += 1;
    }
    if n > 1 {
        result = -result;
    }
    result
}

/// 길이 1..=depth인 Lyndon 단어 수 (Witt 공식)
///
/// 자유 Lie 대수의 차원이므로 로그 시그니처의 채널 수와 같다.
pub fn logsignature_channels(channels: usize, depth: usize) -> usize {
    let channels = channels as i64;
    (1..=depth)
        .map(|k| {
            let total: i64 = (1..=k)
                .filter(|d| k % d == 0)
                .map(|d| mobius(d) * channels.pow((k / d) as u32))
                .sum();
            (total / k as i64) as usize
        })
        .sum()
}

/// Duval 알고리즘으로 길이 depth 이하의 Lyndon 단어 생성
pub fn lyndon_words(channels: usize, depth: usize) -> Vec<Vec<usize>> {
    let mut words = Vec::new();
    if channels == 0 || depth == 0 {
        return words;
    }
    let mut word = vec![0usize];
    while !word.is_empty() {
        words.push(word.clone());
        let period = word.len();
        while word.len() < depth {
            word.push(word[word.len() - period]);
        }
        while word.last() == Some(&(channels - 1)) {
            word.pop();
        }
        if let Some(last) = word.last_mut() {
            *last += 1;
        }
    }
    words.sort_by_key(Vec::len);
    words
}

/// 레벨 안에서 단어의 행 우선 위치
pub fn word_index(word: &[usize], channels: usize) -> usize {
    word.iter().fold(0, |acc, &letter| acc * channels + letter)
}

fn commutator(left: &[f64], right: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for &l in left {
        for &r in right {
            out.push(l * r);
        }
    }
    for (i, &r) in right.iter().enumerate() {
        for (j, &l) in left.iter().enumerate() {
            out[i * left.len() + j] -= r * l;
        }
    }
    out
}

/// Lyndon 단어 목록과 그 괄호 전개
#[derive(Debug, Clone)]
pub struct LyndonBasis {
    channels: usize,
    words: Vec<Vec<usize>>,
    /// 단어별 레벨 안 위치
    positions: Vec<usize>,
    /// 단어별 표준 괄호의 전개 (해당 레벨 크기의 밀집 벡터)
    expansions: Vec<Vec<f64>>,
}

impl LyndonBasis {
    pub fn new(channels: usize, depth: usize) -> Self {
        let words = lyndon_words(channels, depth);
        let positions = words.iter().map(|word| word_index(word, channels)).collect();
        let lookup: HashSet<&[usize]> = words.iter().map(Vec::as_slice).collect();

        let mut memo: HashMap<&[usize], Vec<f64>> = HashMap::new();
        for word in &words {
            let expansion = if word.len() == 1 {
                let mut unit = vec![0.0; channels];
                unit[word[0]] = 1.0;
                unit
            } else {
                // 가장 긴 Lyndon 진접미사
                let split = (1..word.len())
                    .find(|&start| lookup.contains(&word[start..]))
                    .unwrap_or(word.len() - 1);
                let left = memo.get(&word[..split]);
                let right = memo.get(&word[split..]);
                match (left, right) {
                    (Some(left), Some(right)) => commutator(left, right),
                    _ => vec![0.0; channels.pow(word.len() as u32)],
                }
            };
            memo.insert(word.as_slice(), expansion);
        }
        let expansions = words
            .iter()
            .map(|word| memo.remove(word.as_slice()).unwrap_or_default())
            .collect();

        Self {
            channels,
            words,
            positions,
            expansions,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[Vec<usize>] {
        &self.words
    }

    pub fn position(&self, index: usize) -> usize {
        self.positions[index]
    }

    pub fn expansion(&self, index: usize) -> &[f64] {
        &self.expansions[index]
    }

    /// 같은 길이의 다른 Lyndon 단어 위치에서 괄호 전개가 0이 아닌 항
    ///
    /// 표준 괄호 P_v는 v에서 계수 1이고 v보다 큰 단어에만 다른 항을 가지므로
    /// 결과는 (더 큰 단어 번호, 계수) 목록이 된다.
    pub fn triangle(&self) -> Vec<Vec<(usize, f64)>> {
        (0..self.words.len())
            .map(|v| {
                let length = self.words[v].len();
                ((v + 1)..self.words.len())
                    .filter(|&w| self.words[w].len() == length)
                    .filter_map(|w| {
                        let coefficient = self.expansions[v][self.positions[w]];
                        (coefficient != 0.0).then_some((w, coefficient))
                    })
                    .collect()
            })
            .collect()
    }
}
