//! OHLCV 범위 조회 및 다계층 캐시.
//!
//! 이 crate는 다음을 제공합니다:
//! - 원본 지문 계산 및 CSV 원본 로더
//! - 타임프레임 리샘플링
//! - 메모리/디스크/Redis 캐시 계층과 계층형 저장소
//! - 포함 범위 재사용과 무효화를 지원하는 범위 조회 엔진

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod provider;
pub mod storage;

pub use aggregate::aggregate;
pub use error::{DataError, EmptyReason, Result};
pub use fingerprint::{fingerprint_path, fingerprint_token};

// 엔진 재내보내기
pub use cache::{EngineStats, FetchOutcome, Invalidator, RangeEngine, ServedFrom};

// 원본 Provider 재내보내기
pub use provider::{CsvSource, SeriesSource};

// 저장소 타입 재내보내기
pub use storage::{
    CacheEntry, CacheKey, CacheTier, DiskTier, MemoryTier, RedisTier, StoreStats, TierKind,
    TieredStore, TtlPolicy,
};
