//! 타임프레임 리샘플링.
//!
//! 1분봉 시계열을 고정 폭 버킷으로 묶어 상위 타임프레임 캔들을 만듭니다.
//! 버킷 경계는 유닉스 에포크 기준으로 정렬되므로 5분봉은 정시에, 1시간봉은 정시에 맞춰집니다.

use chrono::{DateTime, NaiveDateTime};
use ohlcv_core::{Candle, Series, Timeframe};
use rust_decimal::Decimal;

/// 시계열을 주어진 타임프레임으로 집계합니다.
///
/// # 집계 규칙
///
/// * `open` - 버킷 첫 캔들의 시가
/// * `high` - 버킷 최고가
/// * `low` - 버킷 최저가
/// * `close` - 버킷 마지막 캔들의 종가
/// * `volume` - 시간 순 거래량 합계 (`Decimal::MAX`에서 포화)
///
/// 캔들이 없는 버킷은 만들지 않습니다.
pub fn aggregate(series: &Series, timeframe: Timeframe) -> Series {
    if timeframe.is_native() || series.is_empty() {
        return series.clone();
    }

    let width = timeframe.as_secs() as i64;
    let mut aggregated: Vec<Candle> = Vec::new();
    let mut current: Option<Candle> = None;

    for candle in series {
        let bucket = bucket_start(candle.timestamp, width);

        match current.as_mut() {
            Some(agg) if agg.timestamp == bucket => {
                agg.high = agg.high.max(candle.high);
                agg.low = agg.low.min(candle.low);
                agg.close = candle.close;
                // Decimal 범위를 넘는 합계는 최댓값으로 고정
                agg.volume = agg
                    .volume
                    .checked_add(candle.volume)
                    .unwrap_or(Decimal::MAX);
            }
            _ => {
                if let Some(done) = current.take() {
                    aggregated.push(done);
                }
                current = Some(Candle::new(
                    bucket,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                ));
            }
        }
    }

    // 마지막 버킷
    if let Some(done) = current {
        aggregated.push(done);
    }

    Series::from_sorted(aggregated)
}

/// 타임스탬프가 속한 버킷의 시작 시각.
fn bucket_start(ts: NaiveDateTime, width: i64) -> NaiveDateTime {
    let secs = ts.and_utc().timestamp();
    let start = secs.div_euclid(width) * width;
    DateTime::from_timestamp(start, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}
