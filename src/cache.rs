//! 缓存层抽象模块
//! 定义压测核心依赖的缓存操作接口，以及基于 Mini-Moka 的进程内实现

use crate::error::Result;
use crate::keys::{Key, Value};
use mini_moka::sync::Cache as MokaSyncCache;
use std::time::{Duration, Instant};

/// 缓存连接trait，统一接口
///
/// 每个工作线程持有自己的连接，从Driver配置好的模板连接克隆而来。
/// 返回值只区分成功与失败，核心逻辑不解析具体错误码。
pub trait CacheConnection: Send + Sized {
    /// 获取缓存值，`Ok(None)` 表示未命中
    fn get(&mut self, key: &Key) -> Result<Option<Value>>;

    /// 写入键值对，`ttl` 为 None 表示永不过期
    fn set(&mut self, key: &Key, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// 清空所有条目
    fn flush_all(&mut self) -> Result<()>;

    /// 从模板连接派生一个新连接
    fn try_clone(&self) -> Result<Self>;

    /// 获取缓存名称（用于日志）
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内缓存，所有克隆共享同一份数据，相当于连接同一台缓存服务器
#[derive(Clone)]
pub struct MokaCache {
    inner: MokaSyncCache<Key, Entry>,
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MokaCache {
    /// 创建不限容量的缓存
    pub fn unbounded() -> Self {
        Self {
            inner: MokaSyncCache::builder().build(),
        }
    }

    /// 创建有容量上限的缓存，超出后由 Mini-Moka 负责淘汰
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: MokaSyncCache::builder()
                // 预分配初始容量，减少动态扩容开销
                .initial_capacity((capacity / 2) as usize)
                .max_capacity(capacity)
                .build(),
        }
    }
}

impl CacheConnection for MokaCache {
    #[inline]
    fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        let Some(entry) = self.inner.get(key) else {
            return Ok(None);
        };
        if entry.expires_at.is_some() && entry.is_expired(Instant::now()) {
            self.inner.invalidate(key);
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    #[inline]
    fn set(&mut self, key: &Key, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.inner.insert(key.clone(), Entry { value, expires_at });
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        self.inner.invalidate_all();
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    #[inline]
    fn name(&self) -> &'static str {
        "Mini-Moka Sync"
    }
}
