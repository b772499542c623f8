//! 데이터 모듈 오류 타입.

use ohlcv_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 원본 데이터셋을 찾을 수 없음
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// 필수 필드 누락 등 원본 구조 오류
    #[error("Source malformed: {0}")]
    SourceMalformed(String),

    /// 캐시 계층 일시 장애 (호출 단위)
    #[error("Tier unavailable: {0}")]
    TierUnavailable(String),

    /// 시작 시 연결 실패로 영구 비활성화된 계층
    #[error("Tier unreachable for process lifetime: {0}")]
    TierUnreachablePermanent(String),

    /// 지원하지 않는 타임프레임
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    /// 잘못된 날짜 범위
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl DataError {
    /// 호출자 계약 위반 여부.
    ///
    /// 엔진 경계 밖으로 `Err`로 전달되는 것은 이 종류뿐입니다.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, DataError::InvalidTimeframe(_) | DataError::InvalidRange(_))
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTimeframe(s) => DataError::InvalidTimeframe(s),
            CoreError::InvalidRange(s) => DataError::InvalidRange(s),
            CoreError::Config(s) => DataError::ConfigError(s),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

/// 빈 결과의 사유.
///
/// 엔진은 원본 오류를 `Err`로 올리지 않고 빈 시계열과 함께 이 사유를 돌려줍니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EmptyReason {
    /// 원본 데이터셋 없음
    SourceNotFound(String),
    /// 필수 필드 누락
    SourceMalformed(String),
    /// 원본을 읽는 중 입출력/파싱 오류
    SourceUnreadable(String),
    /// 요청 구간에 데이터 없음
    NoDataInRange,
}

impl EmptyReason {
    /// 원본 로드 오류를 사유로 변환합니다.
    pub fn from_load_error(err: &DataError) -> Self {
        match err {
            DataError::SourceNotFound(s) => EmptyReason::SourceNotFound(s.clone()),
            DataError::SourceMalformed(s) => EmptyReason::SourceMalformed(s.clone()),
            other => EmptyReason::SourceUnreadable(other.to_string()),
        }
    }
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::SourceNotFound(s) => write!(f, "source not found: {}", s),
            EmptyReason::SourceMalformed(s) => write!(f, "source is missing required fields: {}", s),
            EmptyReason::SourceUnreadable(s) => write!(f, "source could not be read: {}", s),
            EmptyReason::NoDataInRange => write!(f, "no data in the requested range"),
        }
    }
}
