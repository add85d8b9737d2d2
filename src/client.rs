//! Cache-aside 客户端模块
//! 每个工作线程独占一个缓存连接和一个数据库连接，先查缓存，未命中时回源并回填

use crate::cache::CacheConnection;
use crate::config::messages;
use crate::error::{ErrorContext, Result};
use crate::keys::{Key, Value};
use crate::store::{BackingStore, PointLookup, StoreConnection};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 预热单个Key的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmResult {
    /// 数据库中是否存在该Key
    pub found: bool,
    /// 是否成功写入缓存
    pub cache_write_ok: bool,
}

/// 单次查询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// 缓存命中，`latency` 为 GET 耗时
    Hit { value: Value, latency: Duration },
    /// 缓存未命中，`latency` 覆盖失败的 GET 以及回源查询
    Miss {
        latency: Duration,
        /// 数据库中找到了该Key
        resolved: bool,
        /// 回填缓存成功
        stored: bool,
    },
}

impl LookupOutcome {
    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, LookupOutcome::Hit { .. })
    }

    #[inline]
    pub fn latency(&self) -> Duration {
        match self {
            LookupOutcome::Hit { latency, .. } | LookupOutcome::Miss { latency, .. } => *latency,
        }
    }
}

struct Fallback<D: StoreConnection> {
    conn: D,
    statement: D::Statement,
}

/// 每个工作线程的 cache-aside 门面
pub struct CacheAsideClient<C, D>
where
    C: CacheConnection,
    D: StoreConnection,
{
    cache: C,
    fallback: Option<Fallback<D>>,
    ttl: Option<Duration>,
}

impl<C, D> CacheAsideClient<C, D>
where
    C: CacheConnection,
    D: StoreConnection,
{
    /// 从模板克隆缓存连接；若配置了数据库则建立独占连接并准备点查询。
    /// 任一步失败都视为致命错误。
    pub fn connect<S>(template: &C, store: Option<&S>, lookup: &PointLookup) -> Result<Self>
    where
        S: BackingStore<Conn = D>,
    {
        let cache = template
            .try_clone()
            .with_context(messages::CACHE_CLONE_FAILED)?;

        let fallback = match store {
            Some(store) => {
                let mut conn = store
                    .connect()
                    .with_context(messages::STORE_CONNECT_FAILED)?;
                let statement = conn
                    .prepare(lookup)
                    .with_context(messages::PREPARE_FAILED)?;
                Some(Fallback { conn, statement })
            }
            None => None,
        };

        Ok(Self {
            cache,
            fallback,
            ttl: None,
        })
    }

    /// 设置回填缓存时的过期时间
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// 是否可以回源
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn cache_name(&self) -> &'static str {
        self.cache.name()
    }

    /// 预热：查数据库，找到则写入缓存。只在测量阶段之前使用。
    pub fn warm_one(&mut self, key: &Key) -> WarmResult {
        let Some(value) = self.fetch(key) else {
            warn!(%key, "key not found in backing store during warmup");
            return WarmResult {
                found: false,
                cache_write_ok: false,
            };
        };

        let cache_write_ok = match self.cache.set(key, value, self.ttl) {
            Ok(()) => true,
            Err(e) => {
                warn!(%key, error = %e, "key could not be stored in cache during warmup");
                false
            }
        };
        WarmResult {
            found: true,
            cache_write_ok,
        }
    }

    /// 热路径：GET，未命中则回源并回填。任何部分失败都只体现为统计结果。
    #[inline]
    pub fn lookup(&mut self, key: &Key) -> LookupOutcome {
        let start = Instant::now();
        match self.cache.get(key) {
            Ok(Some(value)) => {
                return LookupOutcome::Hit {
                    value,
                    latency: start.elapsed(),
                };
            }
            Ok(None) => {}
            Err(e) => debug!(%key, error = %e, "cache get failed, treating as miss"),
        }

        let fetched = self.fetch(key);
        let latency = start.elapsed();

        let Some(value) = fetched else {
            return LookupOutcome::Miss {
                latency,
                resolved: false,
                stored: false,
            };
        };

        let stored = match self.cache.set(key, value, self.ttl) {
            Ok(()) => true,
            Err(e) => {
                warn!(%key, error = %e, "key could not be stored in cache");
                false
            }
        };
        LookupOutcome::Miss {
            latency,
            resolved: true,
            stored,
        }
    }

    /// 只查缓存，不回源
    pub fn probe(&mut self, key: &Key) -> bool {
        matches!(self.cache.get(key), Ok(Some(_)))
    }

    fn fetch(&mut self, key: &Key) -> Option<Value> {
        let Fallback { conn, statement } = self.fallback.as_mut()?;
        match conn.execute(statement, key) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                debug!(%key, "key not found in backing store");
                None
            }
            Err(e) => {
                debug!(%key, error = %e, "backing store lookup failed");
                None
            }
        }
    }
}
