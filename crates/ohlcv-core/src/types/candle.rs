//! OHLCV 캔들 데이터.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들스틱 한 개.
///
/// 가격과 거래량은 `Decimal`로 보관해서 집계 합계가 정확하게 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub timestamp: NaiveDateTime,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: NaiveDateTime,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// OHLC 불변식을 만족하는지 확인합니다.
    ///
    /// `low <= open <= high`, `low <= close <= high`, 거래량은 음수가 아니어야 합니다.
    pub fn is_valid(&self) -> bool {
        self.low <= self.high
            && self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
            && !self.volume.is_sign_negative()
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_valid_candle() {
        let c = Candle::new(ts(), dec!(10), dec!(10.5), dec!(9.8), dec!(10.2), dec!(100));
        assert!(c.is_valid());
        assert_eq!(c.range(), dec!(0.7));
    }

    #[test]
    fn test_invalid_candles() {
        // 고가보다 높은 시가
        let c = Candle::new(ts(), dec!(11), dec!(10.5), dec!(9.8), dec!(10.2), dec!(100));
        assert!(!c.is_valid());

        // 저가보다 낮은 종가
        let c = Candle::new(ts(), dec!(10), dec!(10.5), dec!(9.8), dec!(9.7), dec!(100));
        assert!(!c.is_valid());

        // 음수 거래량
        let c = Candle::new(ts(), dec!(10), dec!(10.5), dec!(9.8), dec!(10.2), dec!(-1));
        assert!(!c.is_valid());
    }
}
