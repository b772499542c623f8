//! 원본 데이터 Provider 모듈.
//!
//! 엔진은 `SeriesSource` trait을 통해서만 원본에 접근합니다.
//!
//! ## CSV
//! - `CsvSource`: 데이터 디렉토리의 `.csv` 파일을 시계열로 파싱

pub mod csv;

pub use self::csv::{parse_csv, parse_datetime, CsvSource};

use async_trait::async_trait;
use ohlcv_core::{Fingerprint, Series, SeriesId};

use crate::error::Result;

/// 원본 시계열 Provider.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// 원본을 읽어 정규화된 1분봉 시계열을 반환합니다.
    ///
    /// 원본이 없으면 `SourceNotFound`, 필수 필드가 없으면 `SourceMalformed`.
    async fn load(&self, series_id: &SeriesId) -> Result<Series>;

    /// 원본의 현재 지문. 메타데이터를 읽을 수 없으면 `Fingerprint::Unknown`.
    async fn fingerprint(&self, series_id: &SeriesId) -> Fingerprint;

    /// 사용 가능한 시계열 목록 (정렬됨).
    async fn list_series(&self) -> Result<Vec<SeriesId>>;
}
