//! OHLCV 범위 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 5분봉 범위 조회
//! ohlcv fetch -s AAPL.csv -f 2025-01-01 -t 2025-01-10 -i 5min
//!
//! # JSON으로 저장
//! ohlcv fetch -s AAPL.csv -f 2025-01-03 -t 2025-01-03 --format json -o out.json
//!
//! # 카탈로그
//! ohlcv list
//! ohlcv timeframes
//!
//! # 캐시 무효화
//! ohlcv invalidate -s AAPL.csv
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ohlcv_cli::commands::{
    catalog::{list_series, list_timeframes},
    fetch::{run_fetch, FetchConfig},
    invalidate::run_invalidate,
    OutputFormat,
};
use ohlcv_core::{init_logging, AppConfig, LogConfig};
use ohlcv_data::RangeEngine;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ohlcv")]
#[command(about = "OHLCV range engine CLI - 다계층 캐시 기반 범위 조회", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (TOML). 환경 변수 OHLCV__* 가 우선합니다
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 날짜 범위/타임프레임으로 시계열 조회
    Fetch {
        /// 시계열 ID (CSV 파일 이름, 예: AAPL.csv)
        #[arg(short, long)]
        series: String,

        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(short = 'f', long)]
        from: NaiveDate,

        /// 종료 날짜 (YYYY-MM-DD, 해당 날짜 전체 포함)
        #[arg(short, long)]
        to: NaiveDate,

        /// 타임프레임 (1min, 5min, 15min, 30min, 1hour)
        #[arg(short, long, default_value = "1min")]
        interval: String,

        /// 출력 형식 (table, csv, json)
        #[arg(long, default_value = "table")]
        format: String,

        /// 출력 파일 경로 (지정하지 않으면 stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// 엔진 통계를 stderr로 출력
        #[arg(long)]
        stats: bool,
    },

    /// 사용 가능한 시계열 목록
    List,

    /// 지원 타임프레임 목록
    Timeframes,

    /// 시계열의 모든 캐시 항목 삭제
    Invalidate {
        /// 시계열 ID
        #[arg(short, long)]
        series: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;
    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    info!(
        data_dir = %config.data_dir.display(),
        cache_dir = %config.cache_dir.display(),
        "OHLCV CLI 시작"
    );

    let engine = RangeEngine::from_config(&config).await;

    match cli.command {
        Commands::Fetch {
            series,
            from,
            to,
            interval,
            format,
            output,
            stats,
        } => {
            let fetch = FetchConfig {
                series,
                from,
                to,
                timeframe: interval,
                format: OutputFormat::parse(&format)?,
                output,
                show_stats: stats,
            };

            match run_fetch(&engine, fetch).await {
                Ok(count) => info!(rows = count, "fetch 완료"),
                Err(e) => {
                    error!("Fetch failed: {}", e);
                    return Err(e);
                }
            }
        }

        Commands::List => {
            list_series(&engine).await?;
        }

        Commands::Timeframes => {
            list_timeframes(&engine);
        }

        Commands::Invalidate { series } => {
            run_invalidate(&engine, &series).await?;
        }
    }

    Ok(())
}
