use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use cache_aside_bench::store::MemoryConnection;
use cache_aside_bench::workload::KeyChooser;
use cache_aside_bench::{
    BenchConfig, CacheAsideClient, CacheConnection, Driver, KeyDistribution, KeyPool,
    MemoryStore, MokaCache, PointLookup,
};

const POOL_SIZE: usize = 10_000;
const RUN_ITERATIONS: u64 = 10_000;

type Client = CacheAsideClient<MokaCache, MemoryConnection>;

fn connect(cache: &MokaCache, store: &MemoryStore) -> Client {
    Client::connect(cache, Some(store), &PointLookup::default())
        .expect("Failed to connect benchmark client")
}

// ----------------------------------------------------------------
// 单次查询：命中路径与回源路径
// ----------------------------------------------------------------
fn bench_lookup(c: &mut Criterion) {
    let pool = KeyPool::generate(POOL_SIZE);
    let store = MemoryStore::new();
    store.populate(&pool);

    let mut group = c.benchmark_group("CacheAsideClient::lookup");
    group.throughput(Throughput::Elements(1));

    // 全部预热后只走命中路径
    let warm_cache = MokaCache::unbounded();
    let mut client = connect(&warm_cache, &store);
    for key in pool.iter() {
        client.warm_one(key);
    }
    let mut chooser = KeyChooser::new(KeyDistribution::Uniform, pool.len(), Some(42), 0)
        .expect("Failed to create key chooser");
    group.bench_function("hit", |b| {
        b.iter(|| black_box(client.lookup(&pool[chooser.next_index()])))
    });

    // 每轮清空缓存，测量未命中回源并回填
    let cold_cache = MokaCache::unbounded();
    let mut client = connect(&cold_cache, &store);
    let mut flusher = cold_cache.clone();
    let mut i = 0usize;
    group.bench_function("resolved_miss", |b| {
        b.iter_batched(
            || {
                flusher.flush_all().expect("Failed to flush cache");
                i = (i + 1) % POOL_SIZE;
                &pool[i]
            },
            |key| black_box(client.lookup(key)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ----------------------------------------------------------------
// 完整运行：连接、预热、同步启动、汇总
// ----------------------------------------------------------------
fn bench_driver(c: &mut Criterion) {
    let store = MemoryStore::new();
    store.populate(&KeyPool::generate(POOL_SIZE));

    let mut group = c.benchmark_group("Driver::run");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for workers in [1usize, 4] {
        group.throughput(Throughput::Elements(RUN_ITERATIONS * workers as u64));
        group.bench_function(format!("{}_workers", workers), |b| {
            b.iter_batched(
                MokaCache::unbounded,
                |cache| {
                    let config = BenchConfig {
                        concurrency: workers,
                        test_count: RUN_ITERATIONS,
                        num_keys: POOL_SIZE,
                        seed: Some(7),
                        ..Default::default()
                    };
                    Driver::new(config, &cache, Some(&store))
                        .run()
                        .expect("Benchmark failed")
                },
                BatchSize::PerIteration,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_driver);
criterion_main!(benches);
