//! 계층형 캐시 저장소.
//!
//! ```text
//! get ──▶ Memory ──miss──▶ Disk ──miss──▶ Remote ──miss──▶ None
//!           │hit             │hit            │hit
//!           ▼                ▼               ▼
//!        반환 (상위 계층으로 자동 승격하지 않음)
//! ```
//!
//! 개별 계층의 실패는 여기서 흡수되어 경고 로그만 남습니다.
//! 사용 불가로 시작한 계층은 모든 작업에서 조용히 건너뜁니다.

use futures::future::join_all;
use ohlcv_core::{AppConfig, DateRange, Fingerprint, RemoteConfig, SeriesId, Timeframe};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{CacheEntry, CacheKey, CacheTier, DiskTier, MemoryTier, RedisTier, TierKind};

/// 키 종류별 TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub full: Duration,
    pub range: Duration,
    pub fingerprint: Duration,
}

impl TtlPolicy {
    pub fn for_key(&self, key: &CacheKey) -> Duration {
        if key.is_full() {
            self.full
        } else {
            self.range
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for TtlPolicy {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            full: config.full_ttl(),
            range: config.range_ttl(),
            fingerprint: config.fingerprint_ttl(),
        }
    }
}

/// 저장소 통계.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// 흡수된 계층 오류 수
    pub tier_errors: u64,
}

/// 우선순위 순서로 묶인 캐시 계층.
pub struct TieredStore {
    tiers: Vec<Arc<dyn CacheTier>>,
    ttl: TtlPolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    tier_errors: AtomicU64,
}

impl std::fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore")
            .field("tiers", &self.tier_kinds())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TieredStore {
    /// 계층 목록으로 저장소를 만듭니다. 계층은 `TierKind` 순서로 정렬됩니다.
    pub fn new(mut tiers: Vec<Arc<dyn CacheTier>>, ttl: TtlPolicy) -> Self {
        tiers.sort_by_key(|tier| tier.kind());
        Self {
            tiers,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            tier_errors: AtomicU64::new(0),
        }
    }

    /// 메모리 계층만 가진 저장소.
    pub fn memory_only() -> Self {
        let memory: Arc<dyn CacheTier> = Arc::new(MemoryTier::new());
        Self::new(vec![memory], TtlPolicy::default())
    }

    /// 설정에 따라 계층을 구성합니다.
    ///
    /// 원격 계층 연결은 여기서 한 번만 시도합니다.
    pub async fn from_config(config: &AppConfig) -> Self {
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();

        if config.memory.enabled {
            tiers.push(Arc::new(MemoryTier::new()));
        }
        if config.disk.enabled {
            tiers.push(Arc::new(DiskTier::new(&config.cache_dir)));
        }
        tiers.push(Arc::new(RedisTier::connect(&config.remote).await));

        let store = Self::new(tiers, TtlPolicy::from(&config.remote));
        info!(
            tiers = ?store.tier_kinds(),
            available = ?store.available_tiers(),
            "캐시 저장소 구성 완료"
        );
        store
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|tier| tier.kind()).collect()
    }

    pub fn available_tiers(&self) -> Vec<TierKind> {
        self.available().map(|tier| tier.kind()).collect()
    }

    fn available(&self) -> impl Iterator<Item = &Arc<dyn CacheTier>> {
        self.tiers.iter().filter(|tier| tier.is_available())
    }

    fn record_error(&self, tier: TierKind, op: &str, error: &crate::error::DataError) {
        self.tier_errors.fetch_add(1, Ordering::Relaxed);
        warn!(tier = %tier, op = op, error = %error, "캐시 계층 오류 - 무시하고 계속");
    }

    // =========================================================================
    // 항목
    // =========================================================================

    /// 우선순위 순서로 조회하여 첫 적중을 반환합니다.
    pub async fn get(&self, key: &CacheKey) -> Option<(CacheEntry, TierKind)> {
        for tier in self.available() {
            match tier.get(key).await {
                Ok(Some(entry)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, tier = %tier.kind(), "캐시 적중");
                    return Some((entry, tier.kind()));
                }
                Ok(None) => {}
                Err(e) => self.record_error(tier.kind(), "get", &e),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "캐시 미스");
        None
    }

    /// 지정한 계층에 동시에 기록합니다. 계층별 실패는 서로에게 영향을 주지 않습니다.
    #[instrument(skip(self, key, entry), fields(key = %key))]
    pub async fn put(&self, key: &CacheKey, entry: &CacheEntry, targets: &[TierKind]) {
        let ttl = self.ttl.for_key(key);
        let writes = self
            .available()
            .filter(|tier| targets.contains(&tier.kind()))
            .map(|tier| async move { (tier.kind(), tier.put(key, entry, ttl).await) });

        for (kind, result) in join_all(writes).await {
            if let Err(e) = result {
                self.record_error(kind, "put", &e);
            }
        }
    }

    /// 모든 계층이 알고 있는 범위 항목 (중복 제거, 정렬).
    pub async fn list_ranges(&self, series_id: &SeriesId, timeframe: Timeframe) -> Vec<DateRange> {
        let mut ranges = BTreeSet::new();
        for tier in self.available() {
            match tier.list_ranges(series_id, timeframe).await {
                Ok(found) => ranges.extend(found),
                Err(e) => self.record_error(tier.kind(), "list_ranges", &e),
            }
        }
        ranges.into_iter().collect()
    }

    // =========================================================================
    // 지문
    // =========================================================================

    /// 기록된 원본 지문 (첫 적중).
    pub async fn recorded_fingerprint(&self, series_id: &SeriesId) -> Option<Fingerprint> {
        for tier in self.available() {
            match tier.get_fingerprint(series_id).await {
                Ok(Some(fingerprint)) => return Some(fingerprint),
                Ok(None) => {}
                Err(e) => self.record_error(tier.kind(), "get_fingerprint", &e),
            }
        }
        None
    }

    /// 원본 지문을 모든 계층에 기록합니다.
    pub async fn record_fingerprint(&self, series_id: &SeriesId, fingerprint: &Fingerprint) {
        let ttl = self.ttl.fingerprint;
        let writes = self.available().map(|tier| async move {
            (
                tier.kind(),
                tier.put_fingerprint(series_id, fingerprint, ttl).await,
            )
        });

        for (kind, result) in join_all(writes).await {
            if let Err(e) = result {
                self.record_error(kind, "put_fingerprint", &e);
            }
        }
    }

    // =========================================================================
    // 무효화
    // =========================================================================

    /// 시계열의 모든 항목을 모든 계층에서 삭제하고 총 삭제 수를 반환합니다.
    #[instrument(skip(self), fields(series = %series_id))]
    pub async fn invalidate(&self, series_id: &SeriesId) -> usize {
        let mut total = 0;
        for tier in self.available() {
            match tier.invalidate(series_id).await {
                Ok(count) => {
                    debug!(tier = %tier.kind(), count = count, "계층 무효화");
                    total += count;
                }
                Err(e) => self.record_error(tier.kind(), "invalidate", &e),
            }
        }
        total
    }

    // =========================================================================
    // 통계
    // =========================================================================

    pub fn stats(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        StoreStats {
            hits,
            misses,
            hit_rate,
            tier_errors: self.tier_errors.load(Ordering::Relaxed),
        }
    }
}
