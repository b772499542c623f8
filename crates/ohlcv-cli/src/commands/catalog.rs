//! 카탈로그 조회 명령.

use anyhow::{Context, Result};
use ohlcv_data::RangeEngine;

/// 사용 가능한 시계열 목록 출력.
pub async fn list_series(engine: &RangeEngine) -> Result<usize> {
    let ids = engine
        .list_series()
        .await
        .context("시계열 목록 조회 실패")?;

    if ids.is_empty() {
        println!("사용 가능한 시계열이 없습니다.");
    }
    for id in &ids {
        println!("{}", id);
    }
    Ok(ids.len())
}

/// 지원 타임프레임 목록 출력.
pub fn list_timeframes(engine: &RangeEngine) {
    println!("{:<8}  {}", "code", "name");
    for (code, name) in engine.list_timeframes() {
        println!("{:<8}  {}", code, name);
    }
}
