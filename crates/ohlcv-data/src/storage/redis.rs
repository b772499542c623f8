//! Redis 원격 계층.
//!
//! 여러 엔진 인스턴스가 공유하는 캐시 계층입니다. 키 체계:
//!
//! ```text
//! {ns}:full:{series}:{tf}                  ← 전체 시계열 (긴 TTL)
//! {ns}:range:{series}:{tf}:{start}:{end}   ← 범위 항목 (짧은 TTL)
//! {ns}:fingerprint:{series}                ← 마지막 빌드 시 원본 지문
//! {ns}:ranges:{series}:{tf}                ← 범위 인덱스 (SET of "start:end")
//! {ns}:keys:{series}                       ← 시계열의 모든 키 인덱스 (SET)
//! ```
//!
//! 인덱스 덕분에 무효화와 포함 범위 검색에서 키 공간 전체를 스캔하지 않습니다.

use async_trait::async_trait;
use ohlcv_core::{DateRange, Fingerprint, RemoteConfig, SeriesId, Timeframe};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{CacheEntry, CacheKey, CacheTier, TierKind};
use crate::error::{DataError, Result};

/// Redis 계층.
///
/// 연결은 시작 시 한 번만 시도합니다. 실패하면 프로세스 수명 동안 사용 불가 상태로 남습니다.
#[derive(Clone)]
pub struct RedisTier {
    connection: Option<MultiplexedConnection>,
    namespace: String,
    op_timeout: Duration,
    index_ttl: Duration,
}

impl std::fmt::Debug for RedisTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTier")
            .field("connected", &self.connection.is_some())
            .field("namespace", &self.namespace)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisTier {
    /// Redis에 연결합니다.
    ///
    /// URL이 없거나 연결에 실패하면 사용 불가 계층을 반환합니다. 오류를 반환하지 않습니다.
    pub async fn connect(config: &RemoteConfig) -> Self {
        let Some(url) = config.url.as_deref() else {
            info!("원격 캐시 URL 미설정 - 원격 계층 비활성화");
            return Self::unavailable(config);
        };

        info!(namespace = %config.namespace, "Connecting to Redis...");

        match Self::try_connect(url, config.connect_timeout()).await {
            Ok(connection) => {
                info!("Redis connection established");
                Self {
                    connection: Some(connection),
                    ..Self::unavailable(config)
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis 연결 실패 - 원격 계층 없이 계속 진행");
                Self::unavailable(config)
            }
        }
    }

    /// 연결 없이 사용 불가 상태로 생성합니다.
    pub fn unavailable(config: &RemoteConfig) -> Self {
        Self {
            connection: None,
            namespace: config.namespace.clone(),
            op_timeout: config.op_timeout(),
            index_ttl: config.fingerprint_ttl(),
        }
    }

    async fn try_connect(url: &str, timeout: Duration) -> Result<MultiplexedConnection> {
        let client = Client::open(url)?;

        let connect = async {
            let mut connection = client.get_multiplexed_async_connection().await?;
            let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
            RedisResult::Ok((connection, pong))
        };

        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok((connection, pong))) if pong == "PONG" => Ok(connection),
            Ok(Ok((_, pong))) => Err(DataError::CacheError(format!(
                "unexpected PING reply: {}",
                pong
            ))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DataError::Timeout(format!(
                "redis connect exceeded {:?}",
                timeout
            ))),
        }
    }

    // =========================================================================
    // 키
    // =========================================================================

    fn fingerprint_key(&self, series_id: &SeriesId) -> String {
        format!("{}:fingerprint:{}", self.namespace, series_id)
    }

    fn ranges_index_key(&self, series_id: &SeriesId, timeframe: Timeframe) -> String {
        format!("{}:ranges:{}:{}", self.namespace, series_id, timeframe)
    }

    fn keys_index_key(&self, series_id: &SeriesId) -> String {
        format!("{}:keys:{}", self.namespace, series_id)
    }

    // =========================================================================
    // 연결 / 타임아웃
    // =========================================================================

    fn conn(&self) -> Result<MultiplexedConnection> {
        self.connection
            .clone()
            .ok_or_else(|| DataError::TierUnreachablePermanent("remote".to_string()))
    }

    /// 명령 하나를 `op_timeout` 안에 실행합니다. 타임아웃은 이번 호출의 미스로만 처리됩니다.
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(DataError::from),
            Err(_) => Err(DataError::Timeout(format!(
                "redis {} exceeded {:?}",
                op, self.op_timeout
            ))),
        }
    }
}

/// Redis TTL은 초 단위이며 0은 허용되지 않음
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheTier for RedisTier {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn()?;
        let redis_key = key.redis_key(&self.namespace);

        let value: Option<String> = self.bounded("GET", conn.get(&redis_key)).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => {
                if let CacheKey::Range {
                    series_id,
                    timeframe,
                    range,
                } = key
                {
                    // 만료된 범위는 인덱스에서도 정리
                    let index = self.ranges_index_key(series_id, *timeframe);
                    let _: i64 = self
                        .bounded("SREM", conn.srem(&index, range.to_string()))
                        .await
                        .unwrap_or(0);
                }
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, key, entry, ttl), fields(key = %key, rows = entry.series.len()))]
    async fn put(&self, key: &CacheKey, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let mut conn = self.conn()?;
        let redis_key = key.redis_key(&self.namespace);
        let json = serde_json::to_string(entry)?;

        let keys_index = self.keys_index_key(key.series_id());
        let index_ttl = ttl_secs(self.index_ttl) as i64;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(&redis_key, json, ttl_secs(ttl))
            .ignore()
            .sadd(&keys_index, &redis_key)
            .ignore()
            .expire(&keys_index, index_ttl)
            .ignore();

        if let CacheKey::Range {
            series_id,
            timeframe,
            range,
        } = key
        {
            let ranges_index = self.ranges_index_key(series_id, *timeframe);
            pipe.sadd(&ranges_index, range.to_string())
                .ignore()
                .sadd(&keys_index, &ranges_index)
                .ignore()
                .expire(&ranges_index, index_ttl)
                .ignore();
        }

        let _: () = self.bounded("SET", pipe.query_async(&mut conn)).await?;
        debug!("Redis 항목 저장 완료");
        Ok(())
    }

    async fn get_fingerprint(&self, series_id: &SeriesId) -> Result<Option<Fingerprint>> {
        let mut conn = self.conn()?;
        let value: Option<String> = self
            .bounded("GET", conn.get(self.fingerprint_key(series_id)))
            .await?;
        Ok(value.map(Fingerprint::known))
    }

    async fn put_fingerprint(
        &self,
        series_id: &SeriesId,
        fingerprint: &Fingerprint,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let key = self.fingerprint_key(series_id);
        let keys_index = self.keys_index_key(series_id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(&key, fingerprint.as_str(), ttl_secs(ttl))
            .ignore()
            .sadd(&keys_index, &key)
            .ignore();

        let _: () = self.bounded("SET", pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn list_ranges(
        &self,
        series_id: &SeriesId,
        timeframe: Timeframe,
    ) -> Result<Vec<DateRange>> {
        let mut conn = self.conn()?;
        let members: Vec<String> = self
            .bounded(
                "SMEMBERS",
                conn.smembers(self.ranges_index_key(series_id, timeframe)),
            )
            .await?;

        Ok(members
            .iter()
            .filter_map(|member| member.parse::<DateRange>().ok())
            .collect())
    }

    #[instrument(skip(self), fields(series = %series_id))]
    async fn invalidate(&self, series_id: &SeriesId) -> Result<usize> {
        let mut conn = self.conn()?;
        let keys_index = self.keys_index_key(series_id);

        let mut keys: Vec<String> = self.bounded("SMEMBERS", conn.smembers(&keys_index)).await?;
        // 인덱스 밖에 남은 키도 삭제
        keys.push(self.fingerprint_key(series_id));
        for timeframe in Timeframe::ALL {
            keys.push(self.ranges_index_key(series_id, timeframe));
            keys.push(CacheKey::full(series_id, timeframe).redis_key(&self.namespace));
        }
        keys.sort();
        keys.dedup();

        let deleted: i64 = self.bounded("DEL", conn.del(&keys)).await?;
        let _: i64 = self.bounded("DEL", conn.del(&keys_index)).await?;

        info!(deleted = deleted, "Redis 항목 무효화");
        Ok(deleted.max(0) as usize)
    }
}
