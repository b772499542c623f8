//! 범위 조회 명령.

use anyhow::Result;
use chrono::NaiveDate;
use ohlcv_data::RangeEngine;
use tracing::info;

use super::output::{render_rows, write_output, OutputFormat};

/// 조회 설정.
#[derive(Debug)]
pub struct FetchConfig {
    /// 시계열 ID (CSV 파일 이름)
    pub series: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// 타임프레임 코드 (1min, 5min, 15min, 30min, 1hour)
    pub timeframe: String,
    pub format: OutputFormat,
    /// 출력 파일 경로 (없으면 stdout)
    pub output: Option<String>,
    /// 조회 후 엔진 통계 출력
    pub show_stats: bool,
}

/// 범위를 조회해 출력하고 행 수를 반환합니다.
pub async fn run_fetch(engine: &RangeEngine, config: FetchConfig) -> Result<usize> {
    let outcome = engine
        .fetch_str(&config.series, config.from, config.to, &config.timeframe)
        .await?;

    info!(
        series = %config.series,
        rows = outcome.rows.len(),
        served_from = ?outcome.served_from,
        "조회 완료"
    );

    if let Some(reason) = &outcome.reason {
        eprintln!("결과 없음: {}", reason);
    }

    if !outcome.is_empty() {
        let content = render_rows(&outcome.rows, config.format)?;
        write_output(&content, config.output.as_deref())?;
    }

    if config.show_stats {
        eprintln!("{}", serde_json::to_string_pretty(&engine.stats())?);
    }

    Ok(outcome.rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohlcv_core::EngineConfig;
    use ohlcv_data::{CsvSource, TieredStore};
    use std::sync::Arc;

    const CSV: &str = "datetime,open,high,low,close,volume\n\
        2025-01-02 09:30:00,10,10.5,9.8,10.2,100\n\
        2025-01-02 09:31:00,10.2,10.3,10.1,10.25,50\n\
        2025-01-02 09:32:00,10.25,10.6,10.2,10.5,70\n\
        2025-01-02 09:33:00,10.5,10.55,10.3,10.4,30\n\
        2025-01-02 09:34:00,10.4,10.45,10.35,10.42,20\n";

    fn engine(data_dir: &std::path::Path) -> RangeEngine {
        RangeEngine::new(
            Arc::new(CsvSource::new(data_dir)),
            Arc::new(TieredStore::memory_only()),
            EngineConfig::default(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_csv_file() {
        let data = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("TEST.csv"), CSV).unwrap();
        let out = data.path().join("out.csv");

        let rows = run_fetch(
            &engine(data.path()),
            FetchConfig {
                series: "TEST.csv".to_string(),
                from: day(),
                to: day(),
                timeframe: "5min".to_string(),
                format: OutputFormat::Csv,
                output: Some(out.to_string_lossy().into_owned()),
                show_stats: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(rows, 1);
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.ends_with("2025-01-02 09:30:00,10,10.6,9.8,10.42,270\n"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_timeframe() {
        let data = tempfile::tempdir().unwrap();
        let result = run_fetch(
            &engine(data.path()),
            FetchConfig {
                series: "TEST.csv".to_string(),
                from: day(),
                to: day(),
                timeframe: "7min".to_string(),
                format: OutputFormat::Table,
                output: None,
                show_stats: false,
            },
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_series_is_zero_rows() {
        let data = tempfile::tempdir().unwrap();
        let out = data.path().join("never.csv");
        let rows = run_fetch(
            &engine(data.path()),
            FetchConfig {
                series: "NOPE.csv".to_string(),
                from: day(),
                to: day(),
                timeframe: "1min".to_string(),
                format: OutputFormat::Csv,
                output: Some(out.to_string_lossy().into_owned()),
                show_stats: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(rows, 0);
        assert!(!out.exists());
    }
}
