//! 원본 파일 지문 계산.
//!
//! 파일 내용이 아닌 크기와 수정 시간만 사용하므로 저렴하지만,
//! 크기와 수정 시간을 보존하는 내용 변경은 감지하지 못합니다.

use ohlcv_core::Fingerprint;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tracing::debug;

/// 토큰 길이 (바이트). hex 인코딩 후 두 배 길이가 됩니다.
const TOKEN_BYTES: usize = 8;

/// 크기와 수정 시간에서 토큰을 계산합니다.
pub fn fingerprint_token(size: u64, modified: Duration) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}.{:09}_{}",
        modified.as_secs(),
        modified.subsec_nanos(),
        size
    ));
    hex::encode(&hasher.finalize()[..TOKEN_BYTES])
}

/// 파일의 현재 지문을 계산합니다.
///
/// 메타데이터를 읽을 수 없으면 `Fingerprint::Unknown`을 반환합니다.
pub async fn fingerprint_path(path: &Path) -> Fingerprint {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "지문 계산 실패: 메타데이터 없음");
            return Fingerprint::Unknown;
        }
    };

    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok());

    match modified {
        Some(modified) => Fingerprint::known(fingerprint_token(meta.len(), modified)),
        None => {
            debug!(path = %path.display(), "지문 계산 실패: 수정 시간 없음");
            Fingerprint::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_token_is_deterministic() {
        let a = fingerprint_token(1024, Duration::new(1_700_000_000, 5));
        let b = fingerprint_token(1024, Duration::new(1_700_000_000, 5));
        assert_eq!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);

        assert_ne!(a, fingerprint_token(1025, Duration::new(1_700_000_000, 5)));
        assert_ne!(a, fingerprint_token(1024, Duration::new(1_700_000_000, 6)));
    }

    #[tokio::test]
    async fn test_missing_file_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let fp = fingerprint_path(&dir.path().join("missing.csv")).await;
        assert_eq!(fp, Fingerprint::Unknown);
    }

    #[tokio::test]
    async fn test_size_change_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAPL.csv");
        std::fs::write(&path, "date,time,open,high,low,close,volume\n").unwrap();

        let before = fingerprint_path(&path).await;
        assert!(before.is_known());
        assert!(before.matches(&fingerprint_path(&path).await));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "2025-01-02,09:30:00,10,10.5,9.8,10.2,100").unwrap();
        drop(file);

        assert!(!before.matches(&fingerprint_path(&path).await));
    }
}
