//! # OHLCV Core
//!
//! OHLCV 범위 엔진의 핵심 도메인 타입을 제공합니다:
//! - 타임프레임, 캔들, 시계열, 날짜 범위
//! - 원본 지문(fingerprint)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
