//! 预热模块
//! 按 `index % workers == worker_id` 把Key池切分给各线程，每个Key只由一个线程预热一次

use crate::cache::CacheConnection;
use crate::client::CacheAsideClient;
use crate::keys::KeyPool;
use crate::store::StoreConnection;
use std::iter::StepBy;
use std::ops::{AddAssign, Range};

/// 预热分区器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    workers: usize,
}

impl Partitioner {
    /// `workers` 为 0 时按 1 处理
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 下标归属的线程
    #[inline]
    pub fn owner(&self, index: usize) -> usize {
        index % self.workers
    }

    /// 线程 `worker_id` 负责的下标，升序
    pub fn indices(&self, worker_id: usize, len: usize) -> StepBy<Range<usize>> {
        let start = if worker_id < self.workers { worker_id } else { len };
        (start.min(len)..len).step_by(self.workers)
    }

    /// 线程 `worker_id` 负责的下标个数
    pub fn share(&self, worker_id: usize, len: usize) -> usize {
        self.indices(worker_id, len).len()
    }
}

/// 单个线程的预热统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// 分配到的Key数
    pub assigned: usize,
    /// 成功写入缓存的Key数
    pub loaded: usize,
    /// 数据库中不存在的Key数
    pub missing: usize,
    /// 写缓存失败的Key数
    pub write_failures: usize,
}

impl AddAssign for WarmupReport {
    fn add_assign(&mut self, rhs: Self) {
        self.assigned += rhs.assigned;
        self.loaded += rhs.loaded;
        self.missing += rhs.missing;
        self.write_failures += rhs.write_failures;
    }
}

/// 顺序预热本线程的分区。缺失的Key和写失败都不会中断预热。
pub fn warm_partition<C, D>(
    client: &mut CacheAsideClient<C, D>,
    pool: &KeyPool,
    partitioner: Partitioner,
    worker_id: usize,
) -> WarmupReport
where
    C: CacheConnection,
    D: StoreConnection,
{
    let mut report = WarmupReport::default();
    for index in partitioner.indices(worker_id, pool.len()) {
        report.assigned += 1;
        let res = client.warm_one(&pool[index]);
        if !res.found {
            report.missing += 1;
        } else if res.cache_write_ok {
            report.loaded += 1;
        } else {
            report.write_failures += 1;
        }
    }
    report
}
