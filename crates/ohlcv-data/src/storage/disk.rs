//! 로컬 디스크 계층.
//!
//! 전체 시계열 항목만 보관합니다. 파일 배치:
//!
//! ```text
//! {cache_dir}/{series_id}/{timeframe}.json         ← 항목 본문 (JSON)
//! {cache_dir}/{series_id}/{timeframe}.fingerprint  ← 지문 토큰
//! ```
//!
//! 쓰기는 임시 파일에 기록한 뒤 rename으로 게시하며 본문, 사이드카 순서로 진행합니다.
//! 읽기는 사이드카 내용이 본문의 지문과 바이트 단위로 같을 때만 적중으로 처리합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ohlcv_core::{Fingerprint, Series, SeriesId, Timeframe};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{CacheEntry, CacheKey, CacheTier, TierKind};
use crate::error::{DataError, Result};

const PAYLOAD_EXT: &str = "json";
const SIDECAR_EXT: &str = "fingerprint";

/// 디스크에 기록되는 항목 형식.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEnvelope {
    series_id: SeriesId,
    timeframe: Timeframe,
    fingerprint: Fingerprint,
    created_at: DateTime<Utc>,
    rows: Series,
}

/// 디스크 계층.
#[derive(Debug, Clone)]
pub struct DiskTier {
    root: PathBuf,
}

impl DiskTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 시계열 디렉토리. 단일 파일 이름이 아닌 ID는 거부합니다.
    fn series_dir(&self, series_id: &SeriesId) -> Option<PathBuf> {
        let mut components = Path::new(series_id.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }

    fn paths(&self, series_id: &SeriesId, timeframe: Timeframe) -> Option<(PathBuf, PathBuf)> {
        let dir = self.series_dir(series_id)?;
        Some((
            dir.join(format!("{}.{}", timeframe.code(), PAYLOAD_EXT)),
            dir.join(format!("{}.{}", timeframe.code(), SIDECAR_EXT)),
        ))
    }
}

/// 임시 파일에 기록한 뒤 rename으로 게시합니다.
async fn publish(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DataError::Io(format!("invalid cache path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// 파일이 없으면 `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheTier for DiskTier {
    fn kind(&self) -> TierKind {
        TierKind::Disk
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let CacheKey::Full {
            series_id,
            timeframe,
        } = key
        else {
            return Ok(None);
        };
        let Some((payload_path, sidecar_path)) = self.paths(series_id, *timeframe) else {
            return Ok(None);
        };

        let Some(sidecar) = read_optional(&sidecar_path).await? else {
            return Ok(None);
        };
        let Some(payload) = read_optional(&payload_path).await? else {
            return Ok(None);
        };

        let envelope: DiskEnvelope = serde_json::from_slice(&payload)?;

        if sidecar != envelope.fingerprint.as_str().as_bytes() {
            debug!(key = %key, "디스크 항목과 사이드카 불일치 - 미스 처리");
            return Ok(None);
        }
        if &envelope.series_id != series_id || envelope.timeframe != *timeframe {
            debug!(key = %key, "디스크 항목 키 불일치 - 미스 처리");
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            series: envelope.rows,
            fingerprint: envelope.fingerprint,
            created_at: envelope.created_at,
        }))
    }

    #[instrument(skip(self, key, entry, _ttl), fields(key = %key, rows = entry.series.len()))]
    async fn put(&self, key: &CacheKey, entry: &CacheEntry, _ttl: Duration) -> Result<()> {
        let CacheKey::Full {
            series_id,
            timeframe,
        } = key
        else {
            return Ok(());
        };
        let (payload_path, sidecar_path) = self
            .paths(series_id, *timeframe)
            .ok_or_else(|| DataError::Io(format!("invalid series id for disk tier: {}", series_id)))?;

        if let Some(dir) = payload_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let envelope = DiskEnvelope {
            series_id: series_id.clone(),
            timeframe: *timeframe,
            fingerprint: entry.fingerprint.clone(),
            created_at: entry.created_at,
            rows: entry.series.clone(),
        };
        let payload = serde_json::to_vec(&envelope)?;

        publish(&payload_path, &payload).await?;
        publish(&sidecar_path, entry.fingerprint.as_str().as_bytes()).await?;

        debug!("디스크 항목 저장 완료");
        Ok(())
    }

    async fn invalidate(&self, series_id: &SeriesId) -> Result<usize> {
        let Some(dir) = self.series_dir(series_id) else {
            return Ok(0);
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(PAYLOAD_EXT) {
                count += 1;
            }
        }

        tokio::fs::remove_dir_all(&dir).await?;
        Ok(count)
    }
}
