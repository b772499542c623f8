//! CSV 원본 로더.
//!
//! 헤더 이름은 대소문자를 구분하지 않습니다. 타임스탬프는 다음 순서로 찾습니다:
//! - `datetime` 컬럼
//! - `date` + `time` 컬럼
//! - `date` 컬럼 (자정으로 간주)
//! - `timestamp` 컬럼 (유닉스 초 또는 밀리초)
//!
//! `open/high/low/close`는 필수이며 `volume`이 없으면 0으로 채웁니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use ohlcv_core::{Candle, Fingerprint, Series, SeriesId};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::SeriesSource;
use crate::error::{DataError, Result};
use crate::fingerprint::fingerprint_path;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y%m%d %H:%M:%S",
    "%Y%m%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// 데이터 디렉토리 기반 CSV Provider.
#[derive(Debug, Clone)]
pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// 시계열 ID를 파일 경로로 변환합니다.
    ///
    /// 디렉토리 탈출을 막기 위해 단일 파일 이름만 허용합니다.
    fn resolve(&self, series_id: &SeriesId) -> Option<PathBuf> {
        let mut components = Path::new(series_id.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.data_dir.join(name)),
            _ => None,
        }
    }
}

#[async_trait]
impl SeriesSource for CsvSource {
    #[instrument(skip(self), fields(series = %series_id))]
    async fn load(&self, series_id: &SeriesId) -> Result<Series> {
        let path = self
            .resolve(series_id)
            .ok_or_else(|| DataError::SourceNotFound(series_id.to_string()))?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(DataError::SourceNotFound(path.display().to_string()));
        }

        let label = series_id.to_string();
        let series = tokio::task::spawn_blocking(move || -> Result<Series> {
            let file = std::fs::File::open(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DataError::SourceNotFound(path.display().to_string())
                }
                _ => DataError::Io(e.to_string()),
            })?;
            parse_csv(file, &label)
        })
        .await
        .map_err(|e| DataError::Io(format!("CSV 파싱 작업 실패: {}", e)))??;

        info!(
            series = %series_id,
            rows = series.len(),
            first = ?series.first_timestamp(),
            last = ?series.last_timestamp(),
            "CSV 원본 로드 완료"
        );

        Ok(series)
    }

    async fn fingerprint(&self, series_id: &SeriesId) -> Fingerprint {
        match self.resolve(series_id) {
            Some(path) => fingerprint_path(&path).await,
            None => Fingerprint::Unknown,
        }
    }

    async fn list_series(&self) -> Result<Vec<SeriesId>> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.data_dir.display(), error = %e, "데이터 디렉토리 없음");
                return Ok(Vec::new());
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if !is_csv || !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(SeriesId::new(name));
            }
        }
        ids.sort();

        debug!(dir = %self.data_dir.display(), count = ids.len(), "CSV 파일 목록 조회");
        Ok(ids)
    }
}

/// 타임스탬프를 만드는 컬럼 구성.
#[derive(Debug, Clone, Copy)]
enum TimestampColumns {
    DateTime(usize),
    DateAndTime(usize, usize),
    Date(usize),
    Unix(usize),
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    timestamp: TimestampColumns,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn detect(headers: &csv::StringRecord, source: &str) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|h| h == name);

        let timestamp = match (find("datetime"), find("date"), find("time"), find("timestamp")) {
            (Some(dt), _, _, _) => TimestampColumns::DateTime(dt),
            (None, Some(date), Some(time), _) => TimestampColumns::DateAndTime(date, time),
            (None, Some(date), None, _) => TimestampColumns::Date(date),
            (None, None, _, Some(ts)) => TimestampColumns::Unix(ts),
            _ => {
                return Err(DataError::SourceMalformed(format!(
                    "{}: no date/time columns in {:?}",
                    source, names
                )))
            }
        };

        let required = ["open", "high", "low", "close"];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DataError::SourceMalformed(format!(
                "{}: missing columns {:?}",
                source, missing
            )));
        }

        Ok(Self {
            timestamp,
            open: find("open").unwrap_or_default(),
            high: find("high").unwrap_or_default(),
            low: find("low").unwrap_or_default(),
            close: find("close").unwrap_or_default(),
            volume: find("volume"),
        })
    }

    fn timestamp(&self, record: &csv::StringRecord) -> Option<NaiveDateTime> {
        match self.timestamp {
            TimestampColumns::DateTime(i) => parse_datetime(record.get(i)?),
            TimestampColumns::DateAndTime(d, t) => {
                let date = record.get(d)?.trim();
                let time = record.get(t)?.trim();
                parse_datetime(&format!("{} {}", date, time))
            }
            TimestampColumns::Date(i) => parse_datetime(record.get(i)?),
            TimestampColumns::Unix(i) => parse_unix(record.get(i)?),
        }
    }

    fn candle(&self, record: &csv::StringRecord) -> Option<Candle> {
        let field = |i: usize| record.get(i).and_then(parse_decimal);
        let volume = match self.volume {
            Some(i) => field(i)?,
            None => Decimal::ZERO,
        };
        Some(Candle::new(
            self.timestamp(record)?,
            field(self.open)?,
            field(self.high)?,
            field(self.low)?,
            field(self.close)?,
            volume,
        ))
    }
}

/// CSV 스트림을 정규화된 시계열로 파싱합니다.
///
/// 파싱할 수 없거나 OHLC 불변식을 어기는 행은 버립니다.
/// 같은 타임스탬프가 반복되면 마지막 행을 사용합니다.
pub fn parse_csv<R: Read>(reader: R, source: &str) -> Result<Series> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = Columns::detect(&headers, source)?;

    let mut candles = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(_) => {
                dropped += 1;
                continue;
            }
        };
        match columns.candle(&record) {
            Some(candle) if candle.is_valid() => candles.push(candle),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(source = source, dropped = dropped, kept = candles.len(), "파싱 불가 행 제외");
    }

    Ok(Series::from_unsorted(candles))
}

/// 날짜-시간 문자열을 파싱합니다. 날짜만 있으면 자정으로 간주합니다.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// 유닉스 타임스탬프 (초 또는 밀리초).
fn parse_unix(s: &str) -> Option<NaiveDateTime> {
    let value: f64 = s.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    // 13자리 이상은 밀리초
    let millis = if value.abs() > 1e12 { value } else { value * 1000.0 };
    DateTime::from_timestamp_millis(millis.round() as i64).map(|dt| dt.naive_utc())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}
