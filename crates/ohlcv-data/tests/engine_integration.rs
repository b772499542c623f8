//! RangeEngine 통합 테스트.
//!
//! 임시 디렉토리의 CSV 원본과 메모리/디스크 계층, 연결 불가 Redis 계층으로
//! 엔진의 public API를 검증합니다.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use ohlcv_core::{AppConfig, EngineConfig, Fingerprint, Series, SeriesId, Timeframe};
use ohlcv_data::{
    CacheTier, CsvSource, DataError, DiskTier, EmptyReason, MemoryTier, RangeEngine, RedisTier,
    SeriesSource, ServedFrom, TierKind, TieredStore, TtlPolicy,
};
use rust_decimal_macros::dec;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// 테스트 헬퍼
// ============================================================================

const HEADER: &str = "date,time,open,high,low,close,volume";

/// 로드 횟수를 세는 CSV 원본.
struct CountingSource {
    inner: CsvSource,
    loads: AtomicUsize,
}

impl CountingSource {
    fn new(dir: &Path) -> Self {
        Self {
            inner: CsvSource::new(dir),
            loads: AtomicUsize::new(0),
        }
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeriesSource for CountingSource {
    async fn load(&self, series_id: &SeriesId) -> ohlcv_data::Result<Series> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(series_id).await
    }

    async fn fingerprint(&self, series_id: &SeriesId) -> Fingerprint {
        self.inner.fingerprint(series_id).await
    }

    async fn list_series(&self) -> ohlcv_data::Result<Vec<SeriesId>> {
        self.inner.list_series().await
    }
}

struct Fixture {
    data: TempDir,
    cache: TempDir,
    source: Arc<CountingSource>,
    engine: Arc<RangeEngine>,
}

impl Fixture {
    fn new(strict: bool) -> Self {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource::new(data.path()));
        let engine = Arc::new(build_engine(source.clone(), cache.path(), strict));
        Self {
            data,
            cache,
            source,
            engine,
        }
    }

    fn write(&self, name: &str, rows: &[String]) {
        let mut body = String::from(HEADER);
        for row in rows {
            body.push('\n');
            body.push_str(row);
        }
        body.push('\n');
        std::fs::write(self.data.path().join(name), body).unwrap();
    }

    fn append(&self, name: &str, row: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(self.data.path().join(name))
            .unwrap();
        writeln!(file, "{}", row).unwrap();
    }
}

fn build_engine(source: Arc<CountingSource>, cache_dir: &Path, strict: bool) -> RangeEngine {
    let remote = ohlcv_core::RemoteConfig::default();
    let tiers: Vec<Arc<dyn CacheTier>> = vec![
        Arc::new(MemoryTier::new()),
        Arc::new(DiskTier::new(cache_dir)),
        Arc::new(RedisTier::unavailable(&remote)),
    ];
    let store = Arc::new(TieredStore::new(tiers, TtlPolicy::from(&remote)));
    RangeEngine::new(
        source,
        store,
        EngineConfig {
            strict_freshness: strict,
        },
    )
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    d(day).and_hms_opt(h, m, s).unwrap()
}

/// 하루 세 개(자정, 09:30, 23:59:59)의 1분봉.
fn daily_rows(days: std::ops::RangeInclusive<u32>) -> Vec<String> {
    days.flat_map(|day| {
        ["00:00:00", "09:30:00", "23:59:59"]
            .into_iter()
            .map(move |time| format!("2025-01-{:02},{},10,11,9,10.5,100", day, time))
    })
    .collect()
}

fn id(name: &str) -> SeriesId {
    SeriesId::new(name)
}

// ============================================================================
// 테스트
// ============================================================================

#[tokio::test]
async fn test_containment_reuse_does_not_reload_source() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=15));

    let parent = fx.engine.fetch(&id("AAPL.csv"), d(1), d(10), Timeframe::M1).await.unwrap();
    assert_eq!(parent.served_from, ServedFrom::Source);
    assert_eq!(parent.rows.len(), 30);

    let child = fx.engine.fetch(&id("AAPL.csv"), d(3), d(5), Timeframe::M1).await.unwrap();
    assert_eq!(child.served_from, ServedFrom::ContainingRange);

    let expected: Vec<_> = parent
        .rows
        .candles()
        .iter()
        .filter(|c| c.timestamp >= at(3, 0, 0, 0) && c.timestamp < at(6, 0, 0, 0))
        .cloned()
        .collect();
    assert_eq!(child.rows.candles(), expected.as_slice());
    assert_eq!(fx.source.loads(), 1);
}

#[tokio::test]
async fn test_single_day_range_is_inclusive_of_whole_day() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=5));

    let day = fx.engine.fetch(&id("AAPL.csv"), d(3), d(3), Timeframe::M1).await.unwrap();
    let stamps: Vec<_> = day.rows.candles().iter().map(|c| c.timestamp).collect();
    assert_eq!(stamps, vec![at(3, 0, 0, 0), at(3, 9, 30, 0), at(3, 23, 59, 59)]);
}

#[tokio::test]
async fn test_five_minute_aggregation_through_engine() {
    let fx = Fixture::new(false);
    fx.write(
        "SPY.csv",
        &[
            "2025-01-02,09:30:00,10,10.5,9.8,10.2,100".to_string(),
            "2025-01-02,09:31:00,10.2,10.3,10.1,10.25,50".to_string(),
            "2025-01-02,09:32:00,10.25,10.6,10.2,10.5,70".to_string(),
            "2025-01-02,09:33:00,10.5,10.55,10.3,10.4,30".to_string(),
            "2025-01-02,09:34:00,10.4,10.45,10.35,10.42,20".to_string(),
        ],
    );

    let out = fx.engine.fetch_str("SPY.csv", d(2), d(2), "5min").await.unwrap();
    assert_eq!(out.rows.len(), 1);
    let bar = &out.rows.candles()[0];
    assert_eq!(bar.timestamp, at(2, 9, 30, 0));
    assert_eq!(bar.open, dec!(10));
    assert_eq!(bar.high, dec!(10.6));
    assert_eq!(bar.low, dec!(9.8));
    assert_eq!(bar.close, dec!(10.42));
    assert_eq!(bar.volume, dec!(270));
}

#[tokio::test]
async fn test_source_change_forces_fresh_build() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=10));
    let series = id("AAPL.csv");

    fx.engine.fetch(&series, d(1), d(10), Timeframe::M1).await.unwrap();
    fx.engine.fetch(&series, d(2), d(4), Timeframe::M1).await.unwrap();
    assert_eq!(fx.source.loads(), 1);

    fx.append("AAPL.csv", "2025-01-11,09:30:00,20,21,19,20.5,5");

    let rebuilt = fx.engine.fetch(&series, d(1), d(11), Timeframe::M1).await.unwrap();
    assert_eq!(rebuilt.served_from, ServedFrom::Source);
    assert_eq!(rebuilt.rows.len(), 31);
    assert_eq!(fx.source.loads(), 2);

    // 이전 범위 항목은 삭제되어 새 전체 시계열 기반 범위에서 다시 슬라이스됨
    let child = fx.engine.fetch(&series, d(2), d(4), Timeframe::M1).await.unwrap();
    assert_eq!(child.served_from, ServedFrom::ContainingRange);
    assert!(fx.engine.stats().invalidations >= 1);

    // 디스크 항목도 새 지문으로 교체됨
    let sidecar = std::fs::read_to_string(fx.cache.path().join("AAPL.csv").join("1min.fingerprint")).unwrap();
    assert_eq!(sidecar, fx.source.fingerprint(&series).await.as_str());
}

#[tokio::test]
async fn test_strict_mode_rejects_stale_exact_hit() {
    let fx = Fixture::new(true);
    fx.write("AAPL.csv", &daily_rows(1..=10));
    let series = id("AAPL.csv");

    fx.engine.fetch(&series, d(1), d(10), Timeframe::M1).await.unwrap();
    fx.append("AAPL.csv", "2025-01-05,12:00:00,20,21,19,20.5,5");

    let fresh = fx.engine.fetch(&series, d(1), d(10), Timeframe::M1).await.unwrap();
    assert_eq!(fresh.served_from, ServedFrom::Source);
    assert_eq!(fresh.rows.len(), 31);
}

#[tokio::test]
async fn test_repeated_query_is_byte_identical() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=10));
    let series = id("AAPL.csv");

    let first = fx.engine.fetch(&series, d(2), d(8), Timeframe::M15).await.unwrap();
    let second = fx.engine.fetch(&series, d(2), d(8), Timeframe::M15).await.unwrap();
    assert_eq!(second.served_from, ServedFrom::ExactRange);
    assert_eq!(
        serde_json::to_vec(&first.rows).unwrap(),
        serde_json::to_vec(&second.rows).unwrap()
    );
}

#[tokio::test]
async fn test_disk_tier_survives_new_engine() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=10));
    let series = id("AAPL.csv");

    let first = fx.engine.fetch(&series, d(1), d(10), Timeframe::H1).await.unwrap();

    // 같은 캐시 디렉토리, 새 메모리 계층
    let source = Arc::new(CountingSource::new(fx.data.path()));
    let restarted = build_engine(source.clone(), fx.cache.path(), false);

    let second = restarted.fetch(&series, d(1), d(10), Timeframe::H1).await.unwrap();
    assert_eq!(second.served_from, ServedFrom::FullSeries);
    assert_eq!(second.rows, first.rows);
    assert_eq!(source.loads(), 0);
}

#[tokio::test]
async fn test_unreachable_remote_tier_degrades_gracefully() {
    let data = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("AAPL.csv"),
        format!("{}\n{}\n", HEADER, daily_rows(1..=3).join("\n")),
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.data_dir = data.path().to_path_buf();
    config.cache_dir = cache.path().to_path_buf();
    config.remote.url = Some("redis://127.0.0.1:1/0".to_string());
    config.remote.connect_timeout_ms = 300;

    let engine = RangeEngine::from_config(&config).await;
    assert_eq!(
        engine.store().available_tiers(),
        vec![TierKind::Memory, TierKind::Disk]
    );

    for timeframe in Timeframe::ALL {
        let out = engine
            .fetch(&id("AAPL.csv"), d(1), d(3), timeframe)
            .await
            .unwrap();
        assert!(!out.is_empty());
        let again = engine
            .fetch(&id("AAPL.csv"), d(2), d(2), timeframe)
            .await
            .unwrap();
        assert_eq!(again.served_from, ServedFrom::ContainingRange);
    }
    assert_eq!(engine.stats().store.tier_errors, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_misses_load_once() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=10));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = fx.engine.clone();
            tokio::spawn(async move {
                engine
                    .fetch(&SeriesId::new("AAPL.csv"), d(1), d(10), Timeframe::M5)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }

    assert_eq!(fx.source.loads(), 1);
    assert!(results.windows(2).all(|w| w[0].rows == w[1].rows));
}

#[tokio::test]
async fn test_invalid_timeframe_is_rejected_before_any_tier() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=2));

    let result = fx.engine.fetch_str("AAPL.csv", d(1), d(2), "7min").await;
    assert!(matches!(result, Err(DataError::InvalidTimeframe(_))));

    let stats = fx.engine.stats();
    assert_eq!(stats.store.hits + stats.store.misses, 0);
    assert_eq!(fx.source.loads(), 0);
}

#[tokio::test]
async fn test_missing_and_malformed_sources_yield_empty_with_reason() {
    let fx = Fixture::new(false);
    std::fs::write(fx.data.path().join("BROKEN.csv"), "date,time,open,close\n2025-01-01,09:30:00,1,1\n").unwrap();

    let missing = fx.engine.fetch(&id("NOPE.csv"), d(1), d(2), Timeframe::M1).await.unwrap();
    assert!(missing.is_empty());
    assert!(matches!(missing.reason, Some(EmptyReason::SourceNotFound(_))));

    let broken = fx.engine.fetch(&id("BROKEN.csv"), d(1), d(2), Timeframe::M1).await.unwrap();
    assert!(broken.is_empty());
    assert!(matches!(broken.reason, Some(EmptyReason::SourceMalformed(_))));
}

#[tokio::test]
async fn test_catalog_lists_csv_files() {
    let fx = Fixture::new(false);
    fx.write("MSFT.csv", &daily_rows(1..=1));
    fx.write("AAPL.csv", &daily_rows(1..=1));

    let ids = fx.engine.list_series().await.unwrap();
    assert_eq!(ids, vec![id("AAPL.csv"), id("MSFT.csv")]);
    assert_eq!(fx.engine.list_timeframes().len(), Timeframe::ALL.len());
}

#[tokio::test]
async fn test_explicit_invalidate_clears_all_tiers() {
    let fx = Fixture::new(false);
    fx.write("AAPL.csv", &daily_rows(1..=3));
    let series = id("AAPL.csv");

    fx.engine.fetch(&series, d(1), d(3), Timeframe::M1).await.unwrap();
    assert!(fx.engine.invalidate(&series).await > 0);
    assert!(!fx.cache.path().join("AAPL.csv").exists());

    let again = fx.engine.fetch(&series, d(1), d(3), Timeframe::M1).await.unwrap();
    assert_eq!(again.served_from, ServedFrom::Source);
    assert_eq!(fx.source.loads(), 2);
}
