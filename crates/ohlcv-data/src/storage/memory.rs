//! 프로세스 메모리 계층.

use async_trait::async_trait;
use ohlcv_core::{DateRange, Fingerprint, SeriesId, Timeframe};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{CacheEntry, CacheKey, CacheTier, TierKind};
use crate::error::Result;

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(entry: CacheEntry, ttl: Duration) -> Self {
        Self {
            entry,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// 시계열 하나에 속한 항목들.
#[derive(Debug, Default)]
struct SeriesSlot {
    full: HashMap<Timeframe, StoredEntry>,
    ranges: HashMap<(Timeframe, DateRange), StoredEntry>,
    fingerprint: Option<Fingerprint>,
}

impl SeriesSlot {
    fn entry_count(&self) -> usize {
        self.full.len() + self.ranges.len() + usize::from(self.fingerprint.is_some())
    }

    /// 만료된 항목을 제거합니다.
    fn prune(&mut self, now: Instant) {
        self.full.retain(|_, stored| !stored.is_expired(now));
        self.ranges.retain(|_, stored| !stored.is_expired(now));
    }
}

/// 메모리 계층.
///
/// 시계열별 슬롯으로 나누어 보관하므로 무효화는 해당 시계열 항목 수에 비례합니다.
/// TTL은 조회 시점에 확인하고, 만료 항목은 같은 시계열에 쓰기가 들어올 때 정리합니다.
#[derive(Debug, Default)]
pub struct MemoryTier {
    slots: RwLock<HashMap<SeriesId, SeriesSlot>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 보관 중인 항목 수 (만료 포함).
    pub async fn len(&self) -> usize {
        self.slots.read().await.values().map(SeriesSlot::entry_count).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let slots = self.slots.read().await;
        let Some(slot) = slots.get(key.series_id()) else {
            return Ok(None);
        };

        let stored = match key {
            CacheKey::Full { timeframe, .. } => slot.full.get(timeframe),
            CacheKey::Range {
                timeframe, range, ..
            } => slot.ranges.get(&(*timeframe, *range)),
        };

        match stored {
            Some(stored) if stored.is_expired(Instant::now()) => {
                debug!(key = %key, "메모리 항목 만료");
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.entry.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(key.series_id().clone()).or_default();
        // 만료 항목은 같은 시계열에 쓰기가 들어올 때 정리
        slot.prune(Instant::now());
        let stored = StoredEntry::new(entry.clone(), ttl);

        match key {
            CacheKey::Full { timeframe, .. } => {
                slot.full.insert(*timeframe, stored);
            }
            CacheKey::Range {
                timeframe, range, ..
            } => {
                slot.ranges.insert((*timeframe, *range), stored);
            }
        }
        Ok(())
    }

    async fn get_fingerprint(&self, series_id: &SeriesId) -> Result<Option<Fingerprint>> {
        let slots = self.slots.read().await;
        Ok(slots.get(series_id).and_then(|slot| slot.fingerprint.clone()))
    }

    async fn put_fingerprint(
        &self,
        series_id: &SeriesId,
        fingerprint: &Fingerprint,
        _ttl: Duration,
    ) -> Result<()> {
        let mut slots = self.slots.write().await;
        slots.entry(series_id.clone()).or_default().fingerprint = Some(fingerprint.clone());
        Ok(())
    }

    async fn list_ranges(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
    ) -> Result<Vec<DateRange>> {
        let slots = self.slots.read().await;
        let now = Instant::now();
        let ranges: Vec<DateRange> = slots
            .get(series_id)
            .map(|slot| {
                slot.ranges
                    .iter()
                    .filter(|((tf, _), stored)| *tf == timeframe && !stored.is_expired(now))
                    .map(|((_, range), _)| *range)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ranges)
    }

    async fn invalidate(&self, series_id: &SeriesId) -> Result<usize> {
        let mut slots = self.slots.write().await;
        Ok(slots
            .remove(series_id)
            .map(|slot| slot.entry_count())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ohlcv_core::Series;

    fn range(a: u32, b: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, a).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, b).unwrap(),
        )
        .unwrap()
    }

    fn entry(token: &str) -> CacheEntry {
        CacheEntry::new(Series::empty(), Fingerprint::known(token))
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_put_get_and_list_ranges() {
        let tier = MemoryTier::new();
        let id = SeriesId::new("AAPL.csv");

        let key = CacheKey::range(&id, Timeframe::M5, range(1, 10));
        tier.put(&key, &entry("a"), HOUR).await.unwrap();
        tier.put(&CacheKey::range(&id, Timeframe::M15, range(2, 3)), &entry("a"), HOUR)
            .await
            .unwrap();

        assert_eq!(tier.get(&key).await.unwrap().unwrap().fingerprint, Fingerprint::known("a"));
        assert!(tier.get(&CacheKey::full(&id, Timeframe::M5)).await.unwrap().is_none());
        assert_eq!(tier.list_ranges(&id, Timeframe::M5).await.unwrap(), vec![range(1, 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_checked_lazily() {
        let tier = MemoryTier::new();
        let id = SeriesId::new("AAPL.csv");
        let key = CacheKey::range(&id, Timeframe::M5, range(1, 2));

        tier.put(&key, &entry("a"), Duration::from_secs(60)).await.unwrap();
        assert!(tier.get(&key).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(tier.get(&key).await.unwrap().is_none());
        assert!(tier.list_ranges(&id, Timeframe::M5).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_pruned_on_write() {
        let tier = MemoryTier::new();
        let id = SeriesId::new("AAPL.csv");

        for day in 1..=20 {
            let key = CacheKey::range(&id, Timeframe::M5, range(day, day));
            tier.put(&key, &entry("a"), Duration::from_secs(60)).await.unwrap();
        }
        tier.put(&CacheKey::full(&id, Timeframe::M5), &entry("a"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(tier.len().await, 21);

        tokio::time::advance(Duration::from_secs(61)).await;
        tier.put(&CacheKey::range(&id, Timeframe::M5, range(21, 21)), &entry("a"), HOUR)
            .await
            .unwrap();

        assert_eq!(tier.len().await, 1);
        assert_eq!(tier.list_ranges(&id, Timeframe::M5).await.unwrap(), vec![range(21, 21)]);
    }

    #[tokio::test]
    async fn test_invalidate_drops_only_that_series() {
        let tier = MemoryTier::new();
        let aapl = SeriesId::new("AAPL.csv");
        let msft = SeriesId::new("MSFT.csv");

        tier.put(&CacheKey::full(&aapl, Timeframe::M1), &entry("a"), HOUR).await.unwrap();
        tier.put(&CacheKey::range(&aapl, Timeframe::M1, range(1, 2)), &entry("a"), HOUR)
            .await
            .unwrap();
        tier.put_fingerprint(&aapl, &Fingerprint::known("a"), HOUR).await.unwrap();
        tier.put(&CacheKey::full(&msft, Timeframe::M1), &entry("m"), HOUR).await.unwrap();

        assert_eq!(tier.invalidate(&aapl).await.unwrap(), 3);
        assert_eq!(tier.invalidate(&aapl).await.unwrap(), 0);
        assert!(tier.get_fingerprint(&aapl).await.unwrap().is_none());
        assert_eq!(tier.len().await, 1);
    }
}
