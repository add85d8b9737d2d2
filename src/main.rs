//! cache-aside-bench - 多线程 cache-aside 压测工具

use cache_aside_bench::config::{
    DEFAULT_CONCURRENCY, DEFAULT_EXECUTE_NUMBER, DEFAULT_NUM_KEYS, MAX_DELAY_US, MIN_DELAY_US,
};
use cache_aside_bench::{
    BenchConfig, Driver, KeyDistribution, KeyPool, MemoryStore, MokaCache, RunReport,
};
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate cache-aside load against a cache and its backing store", long_about = None)]
struct Args {
    /// Number of threads to start
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Number of lookups each thread executes
    #[arg(short, long = "execute-number", default_value_t = DEFAULT_EXECUTE_NUMBER)]
    execute_number: u64,

    /// Number of keys in the pool
    #[arg(short, long, default_value_t = DEFAULT_NUM_KEYS)]
    num_keys: usize,

    /// Flush the cache prior to the test
    #[arg(short = 'F', long)]
    flush: bool,

    /// Skip loading the cache from the backing store before measuring
    #[arg(long)]
    no_warmup: bool,

    /// Enable the in-memory backing store as the miss fallback
    #[arg(long)]
    db: bool,

    /// Rows to seed into the backing store (defaults to --num-keys)
    #[arg(long, requires = "db")]
    db_rows: Option<usize>,

    /// Minimum simulated backing store latency in microseconds
    #[arg(long, default_value_t = MIN_DELAY_US)]
    db_min_delay_us: u64,

    /// Maximum simulated backing store latency in microseconds
    #[arg(long, default_value_t = MAX_DELAY_US)]
    db_max_delay_us: u64,

    /// Cache capacity in entries (unbounded if omitted)
    #[arg(long)]
    cache_capacity: Option<u64>,

    /// Cache entry TTL in seconds (never expires if omitted)
    #[arg(long)]
    ttl: Option<u64>,

    /// Draw keys from a Zipf distribution with this exponent instead of uniformly
    #[arg(long, num_args = 0..=1, default_missing_value = "1.1")]
    zipf: Option<f64>,

    /// Seed for reproducible key sequences
    #[arg(long)]
    seed: Option<u64>,

    /// Only print errors and the final summary
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            concurrency: self.concurrency,
            test_count: self.execute_number,
            num_keys: self.num_keys,
            warmup: !self.no_warmup,
            flush: self.flush,
            distribution: match self.zipf {
                Some(exponent) => KeyDistribution::Zipf { exponent },
                None => KeyDistribution::Uniform,
            },
            seed: self.seed,
            cache_ttl: self.ttl.map(Duration::from_secs),
            ..Default::default()
        }
    }

    fn backing_store(&self) -> Option<MemoryStore> {
        if !self.db {
            return None;
        }
        let store = if self.db_max_delay_us == 0 {
            MemoryStore::new()
        } else {
            MemoryStore::with_latency(
                Duration::from_micros(self.db_min_delay_us),
                Duration::from_micros(self.db_max_delay_us),
            )
        };
        let rows = self.db_rows.unwrap_or(self.num_keys);
        store.populate(&KeyPool::generate(rows));
        info!(rows, "seeded backing store");
        Some(store)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let cache = match args.cache_capacity {
        Some(capacity) => MokaCache::with_capacity(capacity),
        None => MokaCache::unbounded(),
    };
    let store = args.backing_store();
    let driver = Driver::new(args.bench_config(), &cache, store.as_ref());

    match driver.run() {
        Ok(report) => {
            print_report(&args, &report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "benchmark aborted");
            ExitCode::FAILURE
        }
    }
}

fn secs(d: Duration) -> String {
    format!("{:>8.3}", d.as_secs_f64())
}

fn micros(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:>10.3} us", d.as_secs_f64() * 1e6),
        None => format!("{:>10} us", "-"),
    }
}

fn print_report(args: &Args, report: &RunReport) {
    let t = &report.timings;
    let s = &report.summary;
    let line = "--------------------------------------------------------------------";

    if !args.quiet {
        if let Some(flush) = t.flush {
            println!("Time to flush cache ({}):              {} seconds.", report.cache_name, secs(flush));
        }
        println!("Time to generate   {:>8} test keys:    {} seconds.", args.num_keys, secs(t.keygen));
        println!(
            "Time to init cache {:>8} test keys:    {} seconds. (loaded {}, missing {}, failed {})",
            report.warmup.assigned,
            secs(t.warmup),
            report.warmup.loaded,
            report.warmup.missing,
            report.warmup.write_failures
        );
        for w in &report.workers {
            println!(
                "  worker {:>4}: hits {:>10} misses {:>10} avg hit {} avg miss {} in {} seconds.",
                w.worker_id,
                w.hits,
                w.misses,
                micros(w.avg_cache_latency()),
                micros(w.avg_db_latency()),
                secs(w.elapsed)
            );
        }
    }

    println!("{}", line);
    println!(
        "Time to get {:>10} keys by {:>4} threads:  {} seconds.",
        s.total_retrieved,
        s.workers,
        secs(s.elapsed)
    );
    println!(
        "Hits {:>10}  Misses {:>10}  (resolved {}, write-back failures {})  Hit rate {:.2}%",
        s.total_hits, s.total_misses, s.total_resolved, s.total_write_back_failures, s.hit_rate()
    );
    println!(
        "Mean hit latency: {}  Mean miss latency: {}  Throughput: {:.0} ops/s",
        micros(s.mean_cache_latency),
        micros(s.mean_db_latency),
        s.throughput()
    );
    println!("{}", line);
    println!("Time total:                                    {} seconds.", secs(t.total));
}
