//! OHLCV 범위 엔진 CLI.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 날짜 범위/타임프레임 조회 및 출력 (table, csv, json)
//! - 시계열/타임프레임 카탈로그 조회
//! - 시계열 캐시 무효화

pub mod commands;
