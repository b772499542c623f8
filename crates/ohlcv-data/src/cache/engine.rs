//! 범위 조회 엔진.
//!
//! `(series, timeframe, start, end)` 요청을 캐시된 범위와 전체 시계열로 해결합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (series, timeframe, start, end)
//!         │
//!         ▼
//! ┌─────────────────────┐
//! │ 1. 정확한 범위 조회   │ ── 적중 ──▶ 반환
//! └─────────┬───────────┘
//!           │ 미스
//! ┌─────────▼───────────┐
//! │ 2. 포함 범위 조회     │ ── 적중 ──▶ 슬라이스 저장 후 반환
//! └─────────┬───────────┘
//!           │ 미스
//! ┌─────────▼───────────┐
//! │ 3. 동시성 Lock 획득   │ ← 같은 시계열+TF는 하나만 빌드
//! └─────────┬───────────┘
//! ┌─────────▼───────────┐
//! │ 4. 지문 확인/무효화   │
//! └─────────┬───────────┘
//!     ┌─────┴──────┐
//!     │ 전체 캐시?  │
//!     └─────┬──────┘
//!       YES │ NO ──▶ 원본 로드 + 집계 + 저장
//!           ▼
//! ┌─────────────────────┐
//! │ 5. 슬라이스 저장/반환 │
//! └─────────────────────┘
//! ```

use chrono::NaiveDate;
use ohlcv_core::{AppConfig, DateRange, EngineConfig, Fingerprint, Series, SeriesId, Timeframe};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::invalidator::Invalidator;
use crate::aggregate::aggregate;
use crate::error::{EmptyReason, Result};
use crate::provider::{CsvSource, SeriesSource};
use crate::storage::{CacheEntry, CacheKey, StoreStats, TierKind, TieredStore};

/// 시계열+타임프레임별 빌드 Lock 맵
type FetchLockMap = Arc<RwLock<HashMap<(SeriesId, Timeframe), Arc<RwLock<()>>>>>;

/// 전체 시계열을 기록하는 계층
const FULL_TIERS: &[TierKind] = &[TierKind::Memory, TierKind::Disk, TierKind::Remote];
/// 범위 항목을 기록하는 계층
const RANGE_TIERS: &[TierKind] = &[TierKind::Memory, TierKind::Remote];

/// 결과를 만든 경로.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    /// 같은 범위의 캐시 항목
    ExactRange,
    /// 더 넓은 캐시 범위를 슬라이스
    ContainingRange,
    /// 캐시된 전체 시계열을 슬라이스
    FullSeries,
    /// 원본을 새로 로드
    Source,
}

/// 조회 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub rows: Series,
    pub served_from: ServedFrom,
    /// 결과가 비어 있을 때의 사유
    pub reason: Option<EmptyReason>,
}

impl FetchOutcome {
    fn served(rows: Series, served_from: ServedFrom) -> Self {
        let reason = rows.is_empty().then_some(EmptyReason::NoDataInRange);
        Self {
            rows,
            served_from,
            reason,
        }
    }

    fn unavailable(reason: EmptyReason) -> Self {
        Self {
            rows: Series::empty(),
            served_from: ServedFrom::Source,
            reason: Some(reason),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 엔진 통계.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EngineStats {
    pub exact_hits: u64,
    pub containment_hits: u64,
    pub full_series_hits: u64,
    pub source_loads: u64,
    pub invalidations: u64,
    pub store: StoreStats,
}

#[derive(Debug, Default)]
struct EngineCounters {
    exact_hits: AtomicU64,
    containment_hits: AtomicU64,
    full_series_hits: AtomicU64,
    source_loads: AtomicU64,
}

/// 범위 조회 엔진.
pub struct RangeEngine {
    source: Arc<dyn SeriesSource>,
    store: Arc<TieredStore>,
    invalidator: Invalidator,
    config: EngineConfig,
    /// 동시 요청 중복 방지용 Lock (series+timeframe별)
    fetch_locks: FetchLockMap,
    counters: EngineCounters,
}

impl RangeEngine {
    pub fn new(source: Arc<dyn SeriesSource>, store: Arc<TieredStore>, config: EngineConfig) -> Self {
        let invalidator = Invalidator::new(source.clone(), store.clone());
        Self {
            source,
            store,
            invalidator,
            config,
            fetch_locks: Arc::new(RwLock::new(HashMap::new())),
            counters: EngineCounters::default(),
        }
    }

    /// 설정으로 CSV 원본과 계층형 저장소를 구성합니다.
    pub async fn from_config(config: &AppConfig) -> Self {
        let source: Arc<dyn SeriesSource> = Arc::new(CsvSource::new(&config.data_dir));
        let store = Arc::new(TieredStore::from_config(config).await);
        Self::new(source, store, config.engine.clone())
    }

    pub fn store(&self) -> &Arc<TieredStore> {
        &self.store
    }

    // =========================================================================
    // 조회
    // =========================================================================

    /// 날짜 범위와 타임프레임으로 시계열을 조회합니다.
    ///
    /// `Err`는 잘못된 범위처럼 호출자 계약 위반에만 반환합니다.
    /// 원본이 없거나 깨진 경우는 빈 결과와 사유로 돌려줍니다.
    #[instrument(skip(self), fields(series = %series_id, timeframe = %timeframe))]
    pub async fn fetch(
        &self,
        series_id: &SeriesId,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<FetchOutcome> {
        let range = DateRange::new(start, end)?;
        let range_key = CacheKey::range(series_id, timeframe, range);

        // 1. 정확한 범위
        if let Some((entry, tier)) = self.store.get(&range_key).await {
            if self.trust_hit(series_id, &entry).await {
                self.counters.exact_hits.fetch_add(1, Ordering::Relaxed);
                debug!(tier = %tier, rows = entry.series.len(), "범위 캐시 적중");
                return Ok(FetchOutcome::served(entry.series, ServedFrom::ExactRange));
            }
        }

        // 2. 포함 범위
        if let Some(outcome) = self
            .serve_from_parent(series_id, timeframe, range, &range_key)
            .await
        {
            return Ok(outcome);
        }

        // 3. 전체 시계열
        Ok(self
            .serve_from_full(series_id, timeframe, range, &range_key)
            .await)
    }

    /// 타임프레임 코드 문자열로 조회합니다. 알 수 없는 코드는 즉시 거부합니다.
    pub async fn fetch_str(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: &str,
    ) -> Result<FetchOutcome> {
        let timeframe: Timeframe = timeframe.parse()?;
        self.fetch(&SeriesId::new(series_id), start, end, timeframe)
            .await
    }

    /// 캐시된 범위 중 요청을 포함하는 가장 작은 범위를 슬라이스합니다.
    async fn serve_from_parent(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
        range: DateRange,
        range_key: &CacheKey,
    ) -> Option<FetchOutcome> {
        let mut parents: Vec<DateRange> = self
            .store
            .list_ranges(series_id, timeframe)
            .await
            .into_iter()
            .filter(|candidate| *candidate != range && candidate.contains(&range))
            .collect();
        parents.sort_by_key(|parent| (parent.days(), *parent));

        for parent in parents {
            let parent_key = CacheKey::range(series_id, timeframe, parent);
            // 인덱스에는 남아 있지만 만료된 항목
            let Some((entry, tier)) = self.store.get(&parent_key).await else {
                continue;
            };
            if !self.trust_hit(series_id, &entry).await {
                return None;
            }

            let slice = CacheEntry::new(entry.series.slice(&range), entry.fingerprint);
            self.store.put(range_key, &slice, RANGE_TIERS).await;

            self.counters.containment_hits.fetch_add(1, Ordering::Relaxed);
            debug!(parent = %parent, tier = %tier, rows = slice.series.len(), "포함 범위에서 슬라이스");
            return Some(FetchOutcome::served(slice.series, ServedFrom::ContainingRange));
        }

        None
    }

    /// 전체 시계열(캐시 또는 원본)을 슬라이스합니다.
    async fn serve_from_full(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
        range: DateRange,
        range_key: &CacheKey,
    ) -> FetchOutcome {
        let lock = self.get_or_create_lock(series_id, timeframe).await;
        let outcome = {
            let _guard = lock.write().await;
            self.slice_full(series_id, timeframe, range, range_key).await
        };
        drop(lock);
        self.release_lock(series_id, timeframe).await;
        outcome
    }

    /// Lock을 잡은 상태에서 전체 시계열을 확보하고 범위를 잘라 기록합니다.
    async fn slice_full(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
        range: DateRange,
        range_key: &CacheKey,
    ) -> FetchOutcome {
        let current = self.invalidator.ensure_fresh(series_id).await;
        let full_key = CacheKey::full(series_id, timeframe);

        let (full, served_from) = match self.store.get(&full_key).await {
            Some((entry, tier)) if entry.fingerprint.matches(&current) => {
                self.counters.full_series_hits.fetch_add(1, Ordering::Relaxed);

                // 하위 계층 적중은 상위 계층으로 올려 기록
                let upper: Vec<TierKind> = FULL_TIERS
                    .iter()
                    .copied()
                    .filter(|kind| *kind < tier)
                    .collect();
                if !upper.is_empty() {
                    self.store.put(&full_key, &entry, &upper).await;
                }
                (entry, ServedFrom::FullSeries)
            }
            stale => {
                if let Some((entry, tier)) = stale {
                    debug!(
                        tier = %tier,
                        cached = %entry.fingerprint,
                        current = %current,
                        "지문 불일치 - 전체 시계열 재빌드"
                    );
                }
                match self.build_full(series_id, timeframe, &full_key, current).await {
                    Ok(entry) => (entry, ServedFrom::Source),
                    Err(reason) => return FetchOutcome::unavailable(reason),
                }
            }
        };

        let slice = CacheEntry::new(full.series.slice(&range), full.fingerprint);
        self.store.put(range_key, &slice, RANGE_TIERS).await;

        FetchOutcome::served(slice.series, served_from)
    }

    /// 원본을 로드하고 집계하여 전체 시계열 항목을 만들고 기록합니다.
    async fn build_full(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
        full_key: &CacheKey,
        fingerprint: Fingerprint,
    ) -> std::result::Result<CacheEntry, EmptyReason> {
        self.counters.source_loads.fetch_add(1, Ordering::Relaxed);

        let raw = self.source.load(series_id).await.map_err(|e| {
            warn!(series = %series_id, error = %e, "원본 로드 실패 - 빈 결과 반환");
            EmptyReason::from_load_error(&e)
        })?;

        let aggregated = aggregate(&raw, timeframe);
        info!(
            series = %series_id,
            timeframe = %timeframe,
            source_rows = raw.len(),
            rows = aggregated.len(),
            "전체 시계열 빌드 완료"
        );

        let entry = CacheEntry::new(aggregated, fingerprint);
        self.store.put(full_key, &entry, FULL_TIERS).await;
        if entry.fingerprint.is_known() {
            self.store
                .record_fingerprint(series_id, &entry.fingerprint)
                .await;
        }

        Ok(entry)
    }

    /// 엄격 모드에서는 캐시 적중도 현재 원본 지문으로 검증합니다.
    async fn trust_hit(&self, series_id: &SeriesId, entry: &CacheEntry) -> bool {
        if !self.config.strict_freshness {
            return true;
        }

        let current = self.invalidator.current(series_id).await;
        if entry.fingerprint.matches(&current) {
            return true;
        }

        self.invalidator
            .purge(series_id, "stale cached range")
            .await;
        false
    }

    /// series+timeframe별 Lock 획득 (없으면 생성).
    async fn get_or_create_lock(&self, series_id: &SeriesId, timeframe: Timeframe) -> Arc<RwLock<()>> {
        let key = (series_id.clone(), timeframe);

        let locks = self.fetch_locks.read().await;
        if let Some(lock) = locks.get(&key) {
            return lock.clone();
        }
        drop(locks);

        let mut locks = self.fetch_locks.write().await;
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// 다른 대기자가 없으면 Lock 항목을 맵에서 제거합니다.
    async fn release_lock(&self, series_id: &SeriesId, timeframe: Timeframe) {
        let key = (series_id.clone(), timeframe);
        let mut locks = self.fetch_locks.write().await;
        if locks
            .get(&key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&key);
        }
    }

    // =========================================================================
    // 카탈로그
    // =========================================================================

    /// 사용 가능한 시계열 목록.
    pub async fn list_series(&self) -> Result<Vec<SeriesId>> {
        self.source.list_series().await
    }

    /// 지원 타임프레임 목록 `(코드, 표시 이름)`.
    pub fn list_timeframes(&self) -> Vec<(&'static str, &'static str)> {
        Timeframe::ALL
            .iter()
            .map(|tf| (tf.code(), tf.display_name()))
            .collect()
    }

    // =========================================================================
    // 관리
    // =========================================================================

    /// 시계열의 모든 캐시 항목을 명시적으로 삭제합니다.
    pub async fn invalidate(&self, series_id: &SeriesId) -> usize {
        self.invalidator.purge(series_id, "explicit").await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            exact_hits: self.counters.exact_hits.load(Ordering::Relaxed),
            containment_hits: self.counters.containment_hits.load(Ordering::Relaxed),
            full_series_hits: self.counters.full_series_hits.load(Ordering::Relaxed),
            source_loads: self.counters.source_loads.load(Ordering::Relaxed),
            invalidations: self.invalidator.purge_count(),
            store: self.store.stats(),
        }
    }
}
