//! 压测驱动模块
//! 生成Key池 → 各线程建立连接并分区预热 → 闸门同时放行 → 测量 → 汇总

use crate::barrier::StartBarrier;
use crate::cache::CacheConnection;
use crate::client::CacheAsideClient;
use crate::config::{BenchConfig, messages};
use crate::error::{AppError, ErrorContext, Result};
use crate::keys::KeyPool;
use crate::stats::{RunSummary, WorkerStats};
use crate::store::BackingStore;
use crate::warmup::{Partitioner, WarmupReport, warm_partition};
use crate::workload::KeyChooser;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 各阶段耗时
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// 清空缓存，未启用时为 None
    pub flush: Option<Duration>,
    /// 生成Key池
    pub keygen: Duration,
    /// 启动线程、建立连接并完成预热
    pub warmup: Duration,
    /// 闸门放行到所有线程 join
    pub run: Duration,
    pub total: Duration,
}

/// 一次运行的完整结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// 按线程编号排序的原始统计
    pub workers: Vec<WorkerStats>,
    /// 所有线程预热统计之和
    pub warmup: WarmupReport,
    pub timings: PhaseTimings,
    pub cache_name: &'static str,
}

/// 压测驱动，只负责阶段编排和线程同步
pub struct Driver<'a, C, S> {
    config: BenchConfig,
    cache: &'a C,
    store: Option<&'a S>,
}

struct Worker<'a, C, S> {
    config: &'a BenchConfig,
    cache: &'a C,
    store: Option<&'a S>,
    pool: &'a KeyPool,
    barrier: &'a StartBarrier,
    partitioner: Partitioner,
}

type Prepared<C, S> = (
    CacheAsideClient<C, <S as BackingStore>::Conn>,
    KeyChooser,
    WarmupReport,
);

impl<'a, C, S> Worker<'a, C, S>
where
    C: CacheConnection + Sync,
    S: BackingStore,
{
    fn run(&self, id: usize, ready: Sender<Result<WarmupReport>>) -> Option<WorkerStats> {
        let (mut client, mut chooser) = match self.prepare(id) {
            Ok((client, chooser, report)) => {
                debug!(worker = id, ?report, "worker ready");
                let _ = ready.send(Ok(report));
                (client, chooser)
            }
            Err(e) => {
                error!(worker = id, error = %e, "worker setup failed");
                let _ = ready.send(Err(e));
                return None;
            }
        };
        drop(ready);

        if !self.barrier.wait() {
            debug!(worker = id, "run aborted before start");
            return None;
        }

        let mut stats = WorkerStats::new(id);
        let start = Instant::now();
        for _ in 0..self.config.test_count {
            let index = chooser.next_index();
            let outcome = client.lookup(&self.pool[index]);
            stats.record(&outcome);
        }
        stats.elapsed = start.elapsed();
        debug!(worker = id, hits = stats.hits, misses = stats.misses, "worker finished");
        Some(stats)
    }

    fn prepare(&self, id: usize) -> Result<Prepared<C, S>> {
        let context = format!("worker {}", id);
        let mut client =
            CacheAsideClient::connect(self.cache, self.store, &self.config.lookup)
                .with_context(&context)?
                .with_ttl(self.config.cache_ttl);
        let chooser = KeyChooser::new(
            self.config.distribution,
            self.pool.len(),
            self.config.seed,
            id,
        )?;

        let report = if self.config.warmup && client.has_fallback() {
            warm_partition(&mut client, self.pool, self.partitioner, id)
        } else {
            WarmupReport::default()
        };
        Ok((client, chooser, report))
    }
}

impl<'a, C, S> Driver<'a, C, S>
where
    C: CacheConnection + Sync,
    S: BackingStore,
{
    /// `store` 为 None 时不回源，未命中保持未解决
    pub fn new(config: BenchConfig, cache: &'a C, store: Option<&'a S>) -> Self {
        Self {
            config,
            cache,
            store,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// 执行一次完整的压测。只有启动阶段的错误会返回 Err。
    pub fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let cfg = &self.config;
        let total_start = Instant::now();

        let flush = if cfg.flush {
            let elapsed = self.flush()?;
            info!(?elapsed, "flushed cache");
            Some(elapsed)
        } else {
            None
        };

        let keygen_start = Instant::now();
        let pool = KeyPool::generate(cfg.num_keys);
        let keygen = keygen_start.elapsed();
        info!(keys = pool.len(), elapsed = ?keygen, "generated key pool");

        match self.store {
            Some(store) => info!(endpoint = %store.endpoint(), "backing store configured"),
            None if cfg.warmup => warn!("no backing store configured, skipping warmup"),
            None => {}
        }

        let barrier = StartBarrier::new();
        let worker = Worker {
            config: cfg,
            cache: self.cache,
            store: self.store,
            pool: &pool,
            barrier: &barrier,
            partitioner: Partitioner::new(cfg.concurrency),
        };

        let (warmup, warmup_elapsed, workers, run) = thread::scope(|s| {
            let (ready_tx, ready_rx) = mpsc::channel();
            let warmup_start = Instant::now();

            let mut handles = Vec::with_capacity(cfg.concurrency);
            for id in 0..cfg.concurrency {
                let ready = ready_tx.clone();
                let worker = &worker;
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn_scoped(s, move || worker.run(id, ready));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        barrier.abort();
                        join_all(handles);
                        return Err(AppError::from(e));
                    }
                }
            }
            drop(ready_tx);

            let mut warmup = WarmupReport::default();
            let mut setup_error = None;
            for _ in 0..handles.len() {
                match ready_rx.recv() {
                    Ok(Ok(report)) => warmup += report,
                    Ok(Err(e)) => {
                        setup_error = Some(e);
                        break;
                    }
                    Err(_) => {
                        setup_error =
                            Some(AppError::Worker(messages::WORKER_SETUP_FAILED.to_string()));
                        break;
                    }
                }
            }
            if let Some(e) = setup_error {
                barrier.abort();
                join_all(handles);
                return Err(e);
            }
            let warmup_elapsed = warmup_start.elapsed();
            info!(
                workers = handles.len(),
                loaded = warmup.loaded,
                missing = warmup.missing,
                write_failures = warmup.write_failures,
                elapsed = ?warmup_elapsed,
                "all workers ready"
            );

            let run_start = Instant::now();
            barrier.release();
            let mut stats = Vec::with_capacity(handles.len());
            let mut panicked = false;
            for handle in handles {
                match handle.join() {
                    Ok(Some(s)) => stats.push(s),
                    Ok(None) => {}
                    Err(_) => panicked = true,
                }
            }
            let run = run_start.elapsed();
            if panicked {
                return Err(AppError::Worker(messages::WORKER_PANICKED.to_string()));
            }
            Ok((warmup, warmup_elapsed, stats, run))
        })?;

        for s in &workers {
            if !s.is_consistent() {
                error!(
                    worker = s.worker_id,
                    retrieved = s.retrieved,
                    hits = s.hits,
                    misses = s.misses,
                    "retrieved does not match hits + misses"
                );
            }
        }

        let summary = RunSummary::aggregate(&workers, run);
        info!(
            hits = summary.total_hits,
            misses = summary.total_misses,
            elapsed = ?run,
            "run complete"
        );

        Ok(RunReport {
            summary,
            workers,
            warmup,
            timings: PhaseTimings {
                flush,
                keygen,
                warmup: warmup_elapsed,
                run,
                total: total_start.elapsed(),
            },
            cache_name: self.cache.name(),
        })
    }

    fn flush(&self) -> Result<Duration> {
        let start = Instant::now();
        let mut conn = self
            .cache
            .try_clone()
            .with_context(messages::CACHE_CLONE_FAILED)?;
        conn.flush_all().with_context(messages::FLUSH_FAILED)?;
        Ok(start.elapsed())
    }
}

fn join_all<T>(handles: Vec<thread::ScopedJoinHandle<'_, T>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MokaCache;
    use crate::keys::KeyPool;
    use crate::store::MemoryStore;

    fn config(concurrency: usize, num_keys: usize, test_count: u64) -> BenchConfig {
        BenchConfig {
            concurrency,
            num_keys,
            test_count,
            seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn zero_iterations() {
        let cache = MokaCache::unbounded();
        let report = Driver::new(config(3, 10, 0), &cache, None::<&MemoryStore>)
            .run()
            .unwrap();
        assert_eq!(report.workers.len(), 3);
        assert_eq!(report.summary.total_retrieved, 0);
        assert!(report.workers.iter().all(WorkerStats::is_consistent));
    }

    #[test]
    fn workers_are_ordered_by_id() {
        let cache = MokaCache::unbounded();
        let report = Driver::new(config(4, 10, 5), &cache, None::<&MemoryStore>)
            .run()
            .unwrap();
        let ids: Vec<usize> = report.workers.iter().map(|s| s.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn flush_empties_cache() {
        let mut cache = MokaCache::unbounded();
        let pool = KeyPool::generate(5);
        cache.set(&pool[0], crate::keys::value_for(0), None).unwrap();

        let cfg = BenchConfig {
            flush: true,
            warmup: false,
            ..config(1, 5, 3)
        };
        let report = Driver::new(cfg, &cache, None::<&MemoryStore>).run().unwrap();
        assert!(report.timings.flush.is_some());
        assert_eq!(report.summary.total_hits, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cache = MokaCache::unbounded();
        let err = Driver::new(config(0, 10, 1), &cache, None::<&MemoryStore>)
            .run()
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
