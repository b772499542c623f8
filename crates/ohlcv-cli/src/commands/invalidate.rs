//! 캐시 무효화 명령.

use anyhow::Result;
use ohlcv_core::SeriesId;
use ohlcv_data::RangeEngine;
use tracing::info;

/// 시계열의 모든 캐시 항목을 삭제하고 삭제 수를 반환합니다.
pub async fn run_invalidate(engine: &RangeEngine, series: &str) -> Result<usize> {
    let removed = engine.invalidate(&SeriesId::new(series)).await;
    info!(series = series, removed = removed, "캐시 무효화 완료");
    println!("{}: {} 항목 삭제", series, removed);
    Ok(removed)
}
