use cache_aside_bench::store::MemoryConnection;
use cache_aside_bench::{
    AppError, BenchConfig, CacheAsideClient, CacheConnection, Driver, Key, KeyPool, MemoryStore,
    MokaCache, PointLookup, Result, Value,
};
use std::time::Duration;

fn config(concurrency: usize, num_keys: usize, test_count: u64) -> BenchConfig {
    BenchConfig {
        concurrency,
        num_keys,
        test_count,
        seed: Some(2024),
        ..Default::default()
    }
}

fn seeded_store(count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store.populate(&KeyPool::generate(count));
    store
}

#[test]
fn warm_cache_serves_every_lookup() {
    let cache = MokaCache::unbounded();
    let store = seeded_store(100);

    let report = Driver::new(config(1, 100, 500), &cache, Some(&store))
        .run()
        .unwrap();

    assert_eq!(report.warmup.assigned, 100);
    assert_eq!(report.warmup.loaded, 100);
    assert_eq!(report.summary.total_hits, 500);
    assert_eq!(report.summary.total_misses, 0);
    assert_eq!(report.summary.total_retrieved, 500);
    assert!(report.summary.mean_cache_latency.is_some());
    assert_eq!(report.summary.mean_db_latency, None);
    // 只有预热阶段访问了数据库
    assert_eq!(store.query_count(), 100);
}

#[test]
fn without_backing_store_every_lookup_misses() {
    let cache = MokaCache::unbounded();

    let report = Driver::new(config(1, 10, 10), &cache, None::<&MemoryStore>)
        .run()
        .unwrap();

    let w = &report.workers[0];
    assert_eq!((w.hits, w.misses, w.retrieved), (0, 10, 10));
    assert_eq!(w.resolved, 0);
    assert_eq!(w.cache_lookup_time, Duration::ZERO);
    assert_eq!(report.warmup.assigned, 0);
    assert!(report.summary.mean_db_latency.is_some());
    assert_eq!(report.summary.mean_cache_latency, None);
}

#[test]
fn partitioned_warmup_loads_each_key_once() {
    let cache = MokaCache::unbounded();
    let store = seeded_store(400);
    let pool = KeyPool::generate(400);

    let report = Driver::new(config(4, 400, 250), &cache, Some(&store))
        .run()
        .unwrap();

    assert_eq!(report.warmup.assigned, 400);
    assert_eq!(report.warmup.loaded, 400);
    assert_eq!(store.query_count(), 400);
    assert_eq!(report.summary.total_hits, 1_000);
    assert_eq!(report.summary.total_misses, 0);

    let mut probe: CacheAsideClient<MokaCache, MemoryConnection> =
        CacheAsideClient::connect(&cache, None::<&MemoryStore>, &PointLookup::default()).unwrap();
    for key in pool.iter() {
        assert!(probe.probe(key), "{} not cached", key);
        assert!(probe.lookup(key).is_hit());
    }
}

#[test]
fn cold_cache_fills_on_miss() {
    let cache = MokaCache::unbounded();
    let store = seeded_store(50);
    let cfg = BenchConfig {
        warmup: false,
        ..config(1, 50, 200)
    };

    let report = Driver::new(cfg, &cache, Some(&store)).run().unwrap();
    let s = &report.summary;

    assert_eq!(s.total_hits + s.total_misses, 200);
    assert!(s.total_misses <= 50);
    assert_eq!(s.total_resolved, s.total_misses);
    assert_eq!(store.query_count(), s.total_misses);
}

#[test]
fn keys_missing_from_store_stay_unresolved() {
    let cache = MokaCache::unbounded();
    let pool = KeyPool::generate(20);
    let store = MemoryStore::new();
    for (i, key) in pool.iter().enumerate().filter(|(i, _)| i % 2 == 0) {
        store.insert(key.clone(), cache_aside_bench::keys::value_for(i));
    }

    let report = Driver::new(config(2, 20, 300), &cache, Some(&store))
        .run()
        .unwrap();

    assert_eq!(report.warmup.loaded, 10);
    assert_eq!(report.warmup.missing, 10);
    let s = &report.summary;
    assert_eq!(s.total_hits + s.total_misses, 600);
    assert_eq!(s.total_resolved, 0);
    for w in &report.workers {
        assert!(w.is_consistent());
    }
}

#[test]
fn run_totals_match_worker_stats() {
    let cache = MokaCache::with_capacity(1_000);
    let store = seeded_store(500);
    let cfg = BenchConfig {
        warmup: false,
        ..config(3, 500, 400)
    };

    let report = Driver::new(cfg, &cache, Some(&store)).run().unwrap();
    let retrieved: u64 = report.workers.iter().map(|w| w.retrieved).sum();
    assert_eq!(
        report.summary.total_hits + report.summary.total_misses,
        retrieved
    );
    assert_eq!(retrieved, 1_200);
    assert!(report.timings.total >= report.timings.run);
}

#[test]
fn unreachable_store_aborts_the_run() {
    let cache = MokaCache::unbounded();
    let store = seeded_store(10);
    store.set_available(false);

    let err = Driver::new(config(3, 10, 100), &cache, Some(&store))
        .run()
        .unwrap_err();
    assert!(matches!(err, AppError::Connection(_)), "{}", err);
    assert_eq!(store.query_count(), 0);
}

#[test]
fn bad_statement_aborts_the_run() {
    let cache = MokaCache::unbounded();
    let store = seeded_store(10);
    let cfg = BenchConfig {
        lookup: PointLookup {
            table: "users".into(),
            ..Default::default()
        },
        ..config(2, 10, 100)
    };

    let err = Driver::new(cfg, &cache, Some(&store)).run().unwrap_err();
    assert!(matches!(err, AppError::Statement(_)), "{}", err);
}

/// 无法清空的缓存
#[derive(Clone, Default)]
struct StuckCache(MokaCache);

impl CacheConnection for StuckCache {
    fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        self.0.get(key)
    }

    fn set(&mut self, key: &Key, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.0.set(key, value, ttl)
    }

    fn flush_all(&mut self) -> Result<()> {
        Err(AppError::Cache("flush_all rejected".into()))
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn name(&self) -> &'static str {
        "stuck"
    }
}

#[test]
fn failed_flush_aborts_the_run() {
    let cache = StuckCache::default();
    let cfg = BenchConfig {
        flush: true,
        ..config(1, 10, 10)
    };

    let err = Driver::new(cfg, &cache, None::<&MemoryStore>)
        .run()
        .unwrap_err();
    assert!(matches!(err, AppError::Cache(_)));
}
