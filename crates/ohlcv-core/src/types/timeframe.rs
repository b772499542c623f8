//! 캔들스틱 데이터를 위한 타임프레임 정의.
//!
//! 원본 소스는 1분봉이며, 나머지 타임프레임은 모두 1분봉을 집계해서 만듭니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// 지원하는 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1분봉 (원본 해상도)
    #[serde(rename = "1min")]
    M1,
    /// 5분봉
    #[serde(rename = "5min")]
    M5,
    /// 15분봉
    #[serde(rename = "15min")]
    M15,
    /// 30분봉
    #[serde(rename = "30min")]
    M30,
    /// 1시간봉
    #[serde(rename = "1hour")]
    H1,
}

impl Timeframe {
    /// 지원하는 모든 타임프레임 (짧은 것부터).
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
    ];

    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 원본 해상도(집계 불필요)인지 확인합니다.
    pub fn is_native(&self) -> bool {
        matches!(self, Timeframe::M1)
    }

    /// 캐시 키와 API에서 사용하는 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1min",
            Timeframe::M5 => "5min",
            Timeframe::M15 => "15min",
            Timeframe::M30 => "30min",
            Timeframe::H1 => "1hour",
        }
    }

    /// 화면 표시용 이름.
    pub fn display_name(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1 Minute",
            Timeframe::M5 => "5 Minutes",
            Timeframe::M15 => "15 Minutes",
            Timeframe::M30 => "30 Minutes",
            Timeframe::H1 => "1 Hour",
        }
    }

    /// 코드 문자열에서 파싱합니다.
    pub fn from_code(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.code() == s)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| CoreError::InvalidTimeframe(s.to_string()))
    }
}
