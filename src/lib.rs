//! Cache-aside 压测库
//!
//! 多个工作线程反复从缓存层读取Key，未命中时回源到数据库并回填缓存，
//! 同时记录命中/未命中次数与延迟。
//!
//! 特性：
//! - 确定性的Key池生成
//! - 按线程分区的缓存预热，每个Key只预热一次
//! - 原子闸门保证所有线程同时开始测量
//! - 每线程独立统计，join 后汇总，无需加锁

pub mod barrier;
pub mod cache;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod keys;
pub mod stats;
pub mod store;
pub mod warmup;
pub mod workload;

pub use cache::{CacheConnection, MokaCache};
pub use client::{CacheAsideClient, LookupOutcome, WarmResult};
pub use config::BenchConfig;
pub use driver::{Driver, PhaseTimings, RunReport};
pub use error::{AppError, Result};
pub use keys::{Key, KeyPool, Value};
pub use stats::{RunSummary, WorkerStats};
pub use store::{BackingStore, MemoryStore, PointLookup, StoreConnection};
pub use workload::KeyDistribution;
