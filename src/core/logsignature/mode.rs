use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 로그 시그니처 표현 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSignatureMode {
    /// 텐서 로그 전체 (signature_channels개)
    Expand,
    /// Lyndon 괄호 기저의 계수
    Brackets,
    /// Lyndon 단어 위치의 텐서 로그 계수
    #[default]
    Words,
}

impl LogSignatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSignatureMode::Expand => "expand",
            LogSignatureMode::Brackets => "brackets",
            LogSignatureMode::Words => "words",
        }
    }
}

impl fmt::Display for LogSignatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSignatureMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expand" => Ok(LogSignatureMode::Expand),
            "brackets" => Ok(LogSignatureMode::Brackets),
            "words" => Ok(LogSignatureMode::Words),
            other => anyhow::bail!(
                "Invalid values for argument 'mode': expected one of 'expand', 'brackets' or 'words', got '{}'",
                other
            ),
        }
    }
}
