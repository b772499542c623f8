//! 원본 변경 감지 및 캐시 무효화.

use ohlcv_core::{Fingerprint, SeriesId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::provider::SeriesSource;
use crate::storage::TieredStore;

/// 원본 지문을 비교하여 오래된 캐시 항목을 정리합니다.
pub struct Invalidator {
    source: Arc<dyn SeriesSource>,
    store: Arc<TieredStore>,
    purges: AtomicU64,
}

impl Invalidator {
    pub fn new(source: Arc<dyn SeriesSource>, store: Arc<TieredStore>) -> Self {
        Self {
            source,
            store,
            purges: AtomicU64::new(0),
        }
    }

    /// 현재 원본 지문을 계산하고, 기록된 지문과 다르면 시계열 전체를 무효화합니다.
    ///
    /// 지문을 계산할 수 없으면(`Unknown`) 변경된 것으로 간주합니다.
    #[instrument(skip(self), fields(series = %series_id))]
    pub async fn ensure_fresh(&self, series_id: &SeriesId) -> Fingerprint {
        let current = self.source.fingerprint(series_id).await;

        if !current.is_known() {
            self.purge(series_id, "fingerprint unknown").await;
            return current;
        }

        match self.store.recorded_fingerprint(series_id).await {
            Some(recorded) if !recorded.matches(&current) => {
                info!(recorded = %recorded, current = %current, "원본 변경 감지");
                self.purge(series_id, "source changed").await;
            }
            Some(_) => debug!(fingerprint = %current, "원본 변경 없음"),
            None => debug!(fingerprint = %current, "기록된 지문 없음"),
        }

        current
    }

    /// 현재 원본 지문.
    pub async fn current(&self, series_id: &SeriesId) -> Fingerprint {
        self.source.fingerprint(series_id).await
    }

    /// 시계열의 모든 항목을 모든 계층에서 삭제합니다.
    pub async fn purge(&self, series_id: &SeriesId, reason: &str) -> usize {
        let removed = self.store.invalidate(series_id).await;
        if removed > 0 {
            self.purges.fetch_add(1, Ordering::Relaxed);
            info!(series = %series_id, removed = removed, reason = reason, "캐시 무효화");
        }
        removed
    }

    /// 실제로 항목을 삭제한 무효화 횟수.
    pub fn purge_count(&self) -> u64 {
        self.purges.load(Ordering::Relaxed)
    }
}
