//! 统计模块
//! 线程内独占的计数器，以及所有线程结束后的汇总

use crate::client::LookupOutcome;
use std::time::Duration;

/// 单个线程在测量阶段累计的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub hits: u64,
    pub misses: u64,
    pub retrieved: u64,
    /// 未命中中回源成功的次数
    pub resolved: u64,
    /// 回源成功但回填缓存失败的次数
    pub write_back_failures: u64,
    pub cache_lookup_time: Duration,
    pub db_lookup_time: Duration,
    /// 测量循环总耗时
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    /// 记录一次查询结果。未命中无论是否回源成功都计入 `db_lookup_time`。
    #[inline]
    pub fn record(&mut self, outcome: &LookupOutcome) {
        self.retrieved += 1;
        match *outcome {
            LookupOutcome::Hit { latency, .. } => {
                self.hits += 1;
                self.cache_lookup_time = self.cache_lookup_time.saturating_add(latency);
            }
            LookupOutcome::Miss {
                latency,
                resolved,
                stored,
            } => {
                self.misses += 1;
                self.db_lookup_time = self.db_lookup_time.saturating_add(latency);
                if resolved {
                    self.resolved += 1;
                    if !stored {
                        self.write_back_failures += 1;
                    }
                }
            }
        }
    }

    /// `retrieved == hits + misses`
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.retrieved == self.hits + self.misses
    }

    /// 平均命中延迟，没有命中时为 None
    pub fn avg_cache_latency(&self) -> Option<Duration> {
        mean(self.cache_lookup_time, self.hits)
    }

    /// 平均未命中延迟，没有未命中时为 None
    pub fn avg_db_latency(&self) -> Option<Duration> {
        mean(self.db_lookup_time, self.misses)
    }
}

fn mean(total: Duration, count: u64) -> Option<Duration> {
    if count == 0 {
        return None;
    }
    Some(Duration::from_nanos((total.as_nanos() / count as u128) as u64))
}

/// 对各线程的平均值再取平均，每个线程权重相同
fn mean_of_means(values: impl Iterator<Item = Duration>) -> Option<Duration> {
    let (sum, n) = values.fold((0u128, 0u64), |(sum, n), d| (sum + d.as_nanos(), n + 1));
    if n == 0 {
        return None;
    }
    Some(Duration::from_nanos((sum / n as u128) as u64))
}

/// 一次运行的汇总结果，所有线程 join 之后计算一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_retrieved: u64,
    pub total_resolved: u64,
    pub total_write_back_failures: u64,
    /// 各线程平均命中延迟的平均值
    pub mean_cache_latency: Option<Duration>,
    /// 各线程平均未命中延迟的平均值
    pub mean_db_latency: Option<Duration>,
    /// 测量阶段的墙钟时间
    pub elapsed: Duration,
}

impl RunSummary {
    /// 汇总所有线程的统计
    pub fn aggregate(stats: &[WorkerStats], elapsed: Duration) -> Self {
        let mut summary = Self {
            workers: stats.len(),
            total_hits: 0,
            total_misses: 0,
            total_retrieved: 0,
            total_resolved: 0,
            total_write_back_failures: 0,
            mean_cache_latency: mean_of_means(
                stats.iter().filter_map(WorkerStats::avg_cache_latency),
            ),
            mean_db_latency: mean_of_means(stats.iter().filter_map(WorkerStats::avg_db_latency)),
            elapsed,
        };
        for s in stats {
            summary.total_hits += s.hits;
            summary.total_misses += s.misses;
            summary.total_retrieved += s.retrieved;
            summary.total_resolved += s.resolved;
            summary.total_write_back_failures += s.write_back_failures;
        }
        summary
    }

    /// 命中率（百分比）
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits + self.total_misses;
        if total == 0 {
            0.0
        } else {
            self.total_hits as f64 / total as f64 * 100.0
        }
    }

    /// 每秒查询数
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_retrieved as f64 / secs
        }
    }
}
