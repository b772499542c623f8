//! 시계열 타입.
//!
//! - `SeriesId` - 원본 데이터셋 식별자 (예: 파일 이름)
//! - `Series` - 시간 오름차순, 중복 없는 캔들 목록

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{Candle, DateRange};

/// 원본 데이터셋 식별자.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeriesId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SeriesId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 정렬된 캔들 시계열.
///
/// 타임스탬프는 엄격하게 증가하며 중복이 없습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    /// 빈 시계열.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 임의 순서의 캔들로 시계열을 만듭니다.
    ///
    /// 같은 타임스탬프가 여러 번 나오면 마지막 캔들이 남습니다.
    pub fn from_unsorted(candles: impl IntoIterator<Item = Candle>) -> Self {
        let mut by_time: BTreeMap<NaiveDateTime, Candle> = BTreeMap::new();
        for candle in candles {
            by_time.insert(candle.timestamp, candle);
        }
        Self {
            candles: by_time.into_values().collect(),
        }
    }

    /// 이미 정렬된 캔들로 시계열을 만듭니다.
    ///
    /// 오름차순이 아니면 `from_unsorted`로 정규화합니다.
    pub fn from_sorted(candles: Vec<Candle>) -> Self {
        let strictly_increasing = candles
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp);
        if strictly_increasing {
            Self { candles }
        } else {
            Self::from_unsorted(candles)
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.candles.last().map(|c| c.timestamp)
    }

    /// 날짜 범위로 잘라낸 새 시계열을 반환합니다.
    ///
    /// `start 00:00:00` 이상, `end` 다음 날 자정 미만인 캔들을 포함합니다.
    pub fn slice(&self, range: &DateRange) -> Series {
        let lower = range.lower_bound();
        let upper = range.upper_bound_exclusive();
        let from = self.candles.partition_point(|c| c.timestamp < lower);
        let to = self.candles.partition_point(|c| c.timestamp < upper);
        Series {
            candles: self.candles[from..to.max(from)].to_vec(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
