//! 配置模块
//! 定义所有应用级别的常量和运行配置

use crate::error::{AppError, Result};
use crate::store::PointLookup;
use crate::workload::KeyDistribution;
use std::time::Duration;

/// 默认Key数量
pub const DEFAULT_NUM_KEYS: usize = 10_000;

/// 每个线程默认执行的查询次数
pub const DEFAULT_EXECUTE_NUMBER: u64 = 10_000;

/// 默认并发线程数
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Key格式: "KEY_" + 11位补零下标，共15字节
pub const KEY_PREFIX: &str = "KEY_";
pub const KEY_DIGITS: usize = 11;

/// Value格式: "VALUE_" + 25位补零下标，共31字节
pub const VALUE_PREFIX: &str = "VALUE_";
pub const VALUE_DIGITS: usize = 25;

/// Zipf分布默认参数
pub const DEFAULT_ZIPF_S: f64 = 1.1;

/// 模拟数据库延迟范围（微秒）
pub const MIN_DELAY_US: u64 = 1000;
pub const MAX_DELAY_US: u64 = 2000;

/// 数据库表结构
pub mod table {
    pub const NAME: &str = "test";
    pub const KEY_COLUMN: &str = "key";
    pub const VALUE_COLUMN: &str = "value";
}

/// 错误消息常量
pub mod messages {
    pub const CACHE_CLONE_FAILED: &str = "Failed to clone cache connection";
    pub const STORE_CONNECT_FAILED: &str = "Failed to connect to backing store";
    pub const PREPARE_FAILED: &str = "Failed to prepare point lookup";
    pub const FLUSH_FAILED: &str = "Failed to flush cache";
    pub const WORKER_SETUP_FAILED: &str = "Worker setup failed";
    pub const WORKER_PANICKED: &str = "Worker thread panicked";
}

/// 一次压测运行的配置
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// 工作线程数
    pub concurrency: usize,
    /// 每个线程的测量迭代次数
    pub test_count: u64,
    /// Key池大小
    pub num_keys: usize,
    /// 是否在测量前预热缓存
    pub warmup: bool,
    /// 是否在测试前清空缓存
    pub flush: bool,
    /// Key选择分布
    pub distribution: KeyDistribution,
    /// 随机种子，None表示每个线程使用随机熵
    pub seed: Option<u64>,
    /// 缓存写入的过期时间，None表示永不过期
    pub cache_ttl: Option<Duration>,
    /// 数据库点查询语句
    pub lookup: PointLookup,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            test_count: DEFAULT_EXECUTE_NUMBER,
            num_keys: DEFAULT_NUM_KEYS,
            warmup: true,
            flush: false,
            distribution: KeyDistribution::Uniform,
            seed: None,
            cache_ttl: None,
            lookup: PointLookup::default(),
        }
    }
}

impl BenchConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::Config("concurrency must be positive".into()));
        }
        if self.num_keys == 0 {
            return Err(AppError::Config("key pool must not be empty".into()));
        }
        if let KeyDistribution::Zipf { exponent } = self.distribution {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(AppError::Config(format!(
                    "zipf exponent must be positive, got {}",
                    exponent
                )));
            }
        }
        if self.cache_ttl == Some(Duration::ZERO) {
            return Err(AppError::Config("cache ttl must be non-zero if given".into()));
        }
        Ok(())
    }
}
