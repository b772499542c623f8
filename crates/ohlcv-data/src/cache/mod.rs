//! 캐싱 레이어.
//!
//! - Range 엔진: 정확한 범위 → 포함 범위 → 전체 시계열 → 원본 순서로 조회
//! - Invalidator: 원본 지문 비교 후 시계열 단위 무효화

pub mod engine;
pub mod invalidator;

pub use engine::{EngineStats, FetchOutcome, RangeEngine, ServedFrom};
pub use invalidator::Invalidator;
