//! 数据库抽象模块
//! 缓存未命中时回源的权威数据源：连接、准备点查询、按Key执行

use crate::config::{MAX_DELAY_US, MIN_DELAY_US, table};
use crate::error::{AppError, Result};
use crate::keys::{Key, KeyPool, Value, value_for};
use hashlink::LinkedHashMap;
use parking_lot::RwLock;
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// 按单个Key列查询的点查询语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointLookup {
    pub table: String,
    pub key_column: String,
    pub value_column: String,
}

impl Default for PointLookup {
    fn default() -> Self {
        Self {
            table: table::NAME.to_string(),
            key_column: table::KEY_COLUMN.to_string(),
            value_column: table::VALUE_COLUMN.to_string(),
        }
    }
}

impl PointLookup {
    pub fn sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            self.value_column, self.table, self.key_column
        )
    }
}

/// 数据库端点，可在多个工作线程之间共享，每个线程各自建立连接
pub trait BackingStore: Sync {
    type Conn: StoreConnection;

    /// 建立一个独占连接
    fn connect(&self) -> Result<Self::Conn>;

    /// 端点描述（用于日志）
    fn endpoint(&self) -> String;
}

/// 单个数据库连接，不跨线程共享
pub trait StoreConnection {
    type Statement;

    /// 准备点查询语句
    fn prepare(&mut self, lookup: &PointLookup) -> Result<Self::Statement>;

    /// 执行点查询，`Ok(None)` 表示Key不存在
    fn execute(&mut self, statement: &Self::Statement, key: &Key) -> Result<Option<Value>>;
}

struct Shared {
    table: String,
    key_column: String,
    value_column: String,
    rows: RwLock<LinkedHashMap<Key, Value>>,
    available: AtomicBool,
    latency: Option<(Duration, Duration)>,
    queries: AtomicU64,
}

/// 进程内数据库，一张 key/value 表
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 创建空表，无模拟延迟
    pub fn new() -> Self {
        Self::build(None)
    }

    /// 创建带模拟延迟的表，每次查询在 `[min, max]` 内随机休眠
    pub fn with_latency(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self::build(Some((min, max)))
    }

    /// 使用默认延迟范围
    pub fn with_default_latency() -> Self {
        Self::with_latency(
            Duration::from_micros(MIN_DELAY_US),
            Duration::from_micros(MAX_DELAY_US),
        )
    }

    fn build(latency: Option<(Duration, Duration)>) -> Self {
        let defaults = PointLookup::default();
        Self {
            shared: Arc::new(Shared {
                table: defaults.table,
                key_column: defaults.key_column,
                value_column: defaults.value_column,
                rows: RwLock::new(LinkedHashMap::new()),
                available: AtomicBool::new(true),
                latency,
                queries: AtomicU64::new(0),
            }),
        }
    }

    /// 为Key池中每个Key写入 `VALUE_` 行
    pub fn populate(&self, pool: &KeyPool) {
        let mut rows = self.shared.rows.write();
        rows.reserve(pool.len());
        for (i, key) in pool.iter().enumerate() {
            rows.replace(key.clone(), value_for(i));
        }
    }

    pub fn insert(&self, key: Key, value: Value) {
        self.shared.rows.write().replace(key, value);
    }

    pub fn remove(&self, key: &Key) -> Option<Value> {
        self.shared.rows.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.shared.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.rows.read().is_empty()
    }

    /// 模拟端点不可达：之后的连接和查询都会失败
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::Release);
    }

    /// 已执行的点查询次数
    pub fn query_count(&self) -> u64 {
        self.shared.queries.load(Ordering::Relaxed)
    }

    #[inline]
    fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::Acquire)
    }
}

impl BackingStore for MemoryStore {
    type Conn = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        if !self.is_available() {
            return Err(AppError::Connection(format!(
                "{} is unreachable",
                self.endpoint()
            )));
        }
        Ok(MemoryConnection {
            store: self.clone(),
            rng: SmallRng::from_seed(rand::random()),
        })
    }

    fn endpoint(&self) -> String {
        format!("memory://{}", self.shared.table)
    }
}

/// 已准备好的点查询
#[derive(Debug, Clone)]
pub struct MemoryStatement {
    sql: String,
}

impl MemoryStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// 进程内数据库连接，每个连接有自己的延迟随机数生成器
pub struct MemoryConnection {
    store: MemoryStore,
    rng: SmallRng,
}

impl MemoryConnection {
    /// 模拟数据库延迟
    #[inline]
    fn simulate_latency(&mut self) {
        if let Some((min, max)) = self.store.shared.latency {
            let delay_ns = self
                .rng
                .random_range(min.as_nanos() as u64..=max.as_nanos() as u64);
            std::thread::sleep(Duration::from_nanos(delay_ns));
        }
    }
}

impl StoreConnection for MemoryConnection {
    type Statement = MemoryStatement;

    fn prepare(&mut self, lookup: &PointLookup) -> Result<MemoryStatement> {
        let shared = &self.store.shared;
        if lookup.table != shared.table {
            return Err(AppError::Statement(format!(
                "relation \"{}\" does not exist",
                lookup.table
            )));
        }
        for column in [&lookup.key_column, &lookup.value_column] {
            if *column != shared.key_column && *column != shared.value_column {
                return Err(AppError::Statement(format!(
                    "column \"{}\" does not exist",
                    column
                )));
            }
        }
        if lookup.key_column != shared.key_column {
            return Err(AppError::Statement(format!(
                "column \"{}\" is not a key column",
                lookup.key_column
            )));
        }
        Ok(MemoryStatement { sql: lookup.sql() })
    }

    fn execute(&mut self, _statement: &MemoryStatement, key: &Key) -> Result<Option<Value>> {
        if !self.store.is_available() {
            return Err(AppError::Store(format!(
                "{} is unreachable",
                self.store.endpoint()
            )));
        }
        self.simulate_latency();
        self.store.shared.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.shared.rows.read().get(key).cloned())
    }
}
