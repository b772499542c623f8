//! 코어 도메인 에러 타입.
//!
//! 타입 파싱, 날짜 범위 검증, 설정 로딩에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 코어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 지원하지 않는 타임프레임 코드
    #[error("잘못된 타임프레임: {0}")]
    InvalidTimeframe(String),

    /// 시작일이 종료일보다 늦은 범위
    #[error("잘못된 날짜 범위: {0}")]
    InvalidRange(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 코어 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 호출자 계약 위반인지 확인합니다.
    ///
    /// 계약 위반은 캐시 계층에 접근하기 전에 즉시 거부됩니다.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTimeframe(_) | CoreError::InvalidRange(_)
        )
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
