//! 달력 기준 날짜 범위.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// 양 끝을 포함하는 달력 날짜 범위.
///
/// `end`는 해당 날짜의 마지막 순간까지 포함합니다. 하루짜리 범위 `[d, d]`는
/// `d 00:00:00`부터 다음 날 자정 직전까지의 모든 캔들을 포함합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 새 범위를 생성합니다.
    ///
    /// `start > end`이거나 `end` 다음 날을 표현할 수 없으면 거부합니다.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidRange(format!("{} > {}", start, end)));
        }
        if end.succ_opt().is_none() {
            return Err(CoreError::InvalidRange(format!("end date out of range: {}", end)));
        }
        Ok(Self { start, end })
    }

    /// `other`가 이 범위 안에 완전히 들어가는지 확인합니다.
    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// 범위가 포함하는 일수.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// 포함 하한 (`start 00:00:00`).
    pub fn lower_bound(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// 제외 상한 (`end` 다음 날 `00:00:00`).
    ///
    /// 역직렬화로 만들어진 범위는 `new`를 거치지 않으므로 마지막 날짜에서는 `NaiveDateTime::MAX`.
    pub fn upper_bound_exclusive(&self) -> NaiveDateTime {
        self.end
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// 타임스탬프가 범위 안에 있는지 확인합니다.
    pub fn includes(&self, ts: NaiveDateTime) -> bool {
        ts >= self.lower_bound() && ts < self.upper_bound_exclusive()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// `Display` 형식(`start:end`)을 파싱합니다.
impl std::str::FromStr for DateRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidRange(s.to_string()))?;
        let parse = |v: &str| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .map_err(|e| CoreError::InvalidRange(format!("{}: {}", s, e)))
        };
        DateRange::new(parse(start)?, parse(end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(DateRange::new(d(2025, 1, 5), d(2025, 1, 1)).is_err());
        assert!(DateRange::new(d(2025, 1, 1), d(2025, 1, 1)).is_ok());
    }

    #[test]
    fn test_rejects_end_without_successor() {
        assert!(matches!(
            DateRange::new(d(2025, 1, 1), NaiveDate::MAX),
            Err(CoreError::InvalidRange(_))
        ));
        assert!(DateRange::new(NaiveDate::MIN, d(2025, 1, 1)).is_ok());

        // new를 거치지 않은 범위도 상한 계산에서 패닉하지 않음
        let unchecked = DateRange {
            start: d(2025, 1, 1),
            end: NaiveDate::MAX,
        };
        assert_eq!(unchecked.upper_bound_exclusive(), NaiveDateTime::MAX);
        assert!(unchecked.includes(d(2025, 6, 1).and_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn test_containment() {
        let parent = DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).unwrap();
        let child = DateRange::new(d(2025, 1, 3), d(2025, 1, 5)).unwrap();
        assert!(parent.contains(&child));
        assert!(parent.contains(&parent));
        assert!(!child.contains(&parent));

        let overlapping = DateRange::new(d(2024, 12, 30), d(2025, 1, 5)).unwrap();
        assert!(!parent.contains(&overlapping));
    }

    #[test]
    fn test_parse_display_form() {
        let range: DateRange = "2025-01-01:2025-01-10".parse().unwrap();
        assert_eq!(range, DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).unwrap());
        assert_eq!(range.to_string().parse::<DateRange>().unwrap(), range);
        assert!("2025-01-10:2025-01-01".parse::<DateRange>().is_err());
        assert!("garbage".parse::<DateRange>().is_err());
    }

    #[test]
    fn test_single_day_bounds() {
        let day = DateRange::new(d(2025, 1, 2), d(2025, 1, 2)).unwrap();
        assert_eq!(day.days(), 1);
        assert!(day.includes(d(2025, 1, 2).and_hms_opt(0, 0, 0).unwrap()));
        assert!(day.includes(d(2025, 1, 2).and_hms_opt(23, 59, 59).unwrap()));
        assert!(day.includes(d(2025, 1, 2).and_hms_milli_opt(23, 59, 59, 500).unwrap()));
        assert!(!day.includes(d(2025, 1, 3).and_hms_opt(0, 0, 0).unwrap()));
        assert!(!day.includes(d(2025, 1, 1).and_hms_opt(23, 59, 59).unwrap()));
    }
}
