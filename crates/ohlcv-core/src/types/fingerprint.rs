//! 원본 데이터 식별 토큰.

use serde::{Deserialize, Serialize};
use std::fmt;

const UNKNOWN_TOKEN: &str = "unknown";

/// 원본 크기와 수정 시간에서 파생한 토큰.
///
/// 암호학적 보장은 없습니다. 크기와 수정 시간을 유지한 채 내용이 바뀌면 감지하지 못합니다.
/// 메타데이터를 읽지 못하면 `Unknown`이 되며, `Unknown`은 어떤 토큰과도 일치하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fingerprint {
    Known(String),
    Unknown,
}

impl Fingerprint {
    pub fn known(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() || token == UNKNOWN_TOKEN {
            Fingerprint::Unknown
        } else {
            Fingerprint::Known(token)
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Fingerprint::Known(_))
    }

    /// 두 토큰이 같은 원본을 가리키는지 확인합니다.
    ///
    /// 어느 한쪽이라도 `Unknown`이면 "변경됨"으로 간주해 `false`를 반환합니다.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (self, other) {
            (Fingerprint::Known(a), Fingerprint::Known(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Fingerprint::Known(token) => token,
            Fingerprint::Unknown => UNKNOWN_TOKEN,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint::known(s)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.as_str().to_string()
    }
}
