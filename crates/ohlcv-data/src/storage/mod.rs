//! 캐시 계층 모듈.
//!
//! - `MemoryTier`: 프로세스 메모리 (가장 빠름, 재시작 시 소멸)
//! - `DiskTier`: 로컬 디스크 (전체 시계열만, 지문 사이드카로 검증)
//! - `RedisTier`: 원격 Redis (명시적 TTL, 연결 불가일 수 있음)
//! - `TieredStore`: 위 계층을 우선순위 순서로 묶은 저장소

pub mod disk;
pub mod memory;
pub mod redis;
pub mod tiered;

pub use disk::DiskTier;
pub use memory::MemoryTier;
pub use self::redis::RedisTier;
pub use tiered::{StoreStats, TieredStore, TtlPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ohlcv_core::{DateRange, Fingerprint, Series, SeriesId, Timeframe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// 계층 종류. 선언 순서가 조회 우선순위입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Memory,
    Disk,
    Remote,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Memory => write!(f, "memory"),
            TierKind::Disk => write!(f, "disk"),
            TierKind::Remote => write!(f, "remote"),
        }
    }
}

/// 구조화된 캐시 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// 집계된 전체 시계열
    Full {
        series_id: SeriesId,
        timeframe: Timeframe,
    },
    /// 날짜 범위로 잘라낸 시계열
    Range {
        series_id: SeriesId,
        timeframe: Timeframe,
        range: DateRange,
    },
}

impl CacheKey {
    pub fn full(series_id: &SeriesId, timeframe: Timeframe) -> Self {
        CacheKey::Full {
            series_id: series_id.clone(),
            timeframe,
        }
    }

    pub fn range(series_id: &SeriesId, timeframe: Timeframe, range: DateRange) -> Self {
        CacheKey::Range {
            series_id: series_id.clone(),
            timeframe,
            range,
        }
    }

    pub fn series_id(&self) -> &SeriesId {
        match self {
            CacheKey::Full { series_id, .. } | CacheKey::Range { series_id, .. } => series_id,
        }
    }

    pub fn date_range(&self) -> Option<DateRange> {
        match self {
            CacheKey::Full { .. } => None,
            CacheKey::Range { range, .. } => Some(*range),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, CacheKey::Full { .. })
    }

    /// 네임스페이스가 붙은 Redis 키.
    pub fn redis_key(&self, namespace: &str) -> String {
        format!("{}:{}", namespace, self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Full {
                series_id,
                timeframe,
            } => write!(f, "full:{}:{}", series_id, timeframe),
            CacheKey::Range {
                series_id,
                timeframe,
                range,
            } => write!(f, "range:{}:{}:{}", series_id, timeframe, range),
        }
    }
}

/// 캐시 항목.
///
/// 모든 항목은 자신을 만든 원본의 지문을 함께 보관합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub series: Series,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(series: Series, fingerprint: Fingerprint) -> Self {
        Self {
            series,
            fingerprint,
            created_at: Utc::now(),
        }
    }
}

/// 캐시 계층.
///
/// 오류는 `TieredStore`가 흡수하므로 구현체는 실패를 그대로 반환하면 됩니다.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// 시작 시 결정되는 가용성. 사용 불가 계층은 모든 작업에서 건너뜁니다.
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    async fn put(&self, key: &CacheKey, entry: &CacheEntry, ttl: Duration) -> Result<()>;

    /// 마지막으로 기록된 원본 지문.
    async fn get_fingerprint(&self, _series_id: &SeriesId) -> Result<Option<Fingerprint>> {
        Ok(None)
    }

    async fn put_fingerprint(
        &self,
        _series_id: &SeriesId,
        _fingerprint: &Fingerprint,
        _ttl: Duration,
    ) -> Result<()> {
        Ok(())
    }

    /// 이 계층이 알고 있는 범위 항목 목록.
    async fn list_ranges(
        &self,
        _series_id: &SeriesId,
        _timeframe: Timeframe,
    ) -> Result<Vec<DateRange>> {
        Ok(Vec::new())
    }

    /// 시계열에 연관된 모든 항목을 삭제하고 삭제 개수를 반환합니다.
    async fn invalidate(&self, series_id: &SeriesId) -> Result<usize>;
}
