//! Scrape statistics for the exporter's own health reporting.
//!
//! Collectors record the outcome of every scrape here; the `/health`
//! endpoint and the optional telemetry gauges read it back.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns (last, avg, max, min, count).
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// How a single scrape ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeResult {
    Completed,
    InvocationFailed,
    DecodeFailed,
    InternalError,
}

/// Counters shared by all collectors of one exporter instance.
pub struct ScrapeStats {
    pub scrapes_total: AtomicU64,
    pub completed: AtomicU64,
    pub invocation_failures: AtomicU64,
    pub decode_failures: AtomicU64,
    pub internal_errors: AtomicU64,
    pub last_exit_code: AtomicI64,
    pub last_completed: AtomicBool,
    pub scrape_duration_seconds: Stat,
    pub start_time: Instant,
    pub last_scrape_time: StdRwLock<Option<Instant>>,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self {
            scrapes_total: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            invocation_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            last_exit_code: AtomicI64::new(0),
            last_completed: AtomicBool::new(false),
            scrape_duration_seconds: Stat::default(),
            start_time: Instant::now(),
            last_scrape_time: StdRwLock::new(None),
        }
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scrape(&self, result: ScrapeResult, exit_code: i32, duration: Duration) {
        self.scrapes_total.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            ScrapeResult::Completed => &self.completed,
            ScrapeResult::InvocationFailed => &self.invocation_failures,
            ScrapeResult::DecodeFailed => &self.decode_failures,
            ScrapeResult::InternalError => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_exit_code
            .store(i64::from(exit_code), Ordering::Relaxed);
        self.last_completed
            .store(result == ScrapeResult::Completed, Ordering::Relaxed);
        self.scrape_duration_seconds
            .add_sample(duration.as_secs_f64());
        if let Ok(mut last) = self.last_scrape_time.write() {
            *last = Some(Instant::now());
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// True once the latest scrape completed.
    pub fn is_healthy(&self) -> bool {
        self.last_completed.load(Ordering::Relaxed)
    }

    /// Renders the statistics as a plain-text table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let (last, avg, max, min, count) = self.scrape_duration_seconds.snapshot();
        let last_scrape = self
            .last_scrape_time
            .read()
            .ok()
            .and_then(|t| *t)
            .map(|t| format!("{:.1}s ago", t.elapsed().as_secs_f64()))
            .unwrap_or_else(|| "never".to_string());

        writeln!(out, "SCRAPE STATISTICS").ok();
        writeln!(out, "=================").ok();
        writeln!(out).ok();
        writeln!(out, "{:28} | {:>12}", "Counter", "Value").ok();
        writeln!(out, "{}", "-".repeat(43)).ok();
        for (name, value) in [
            ("scrapes_total", self.scrapes_total.load(Ordering::Relaxed)),
            ("completed", self.completed.load(Ordering::Relaxed)),
            ("invocation_failures", self.invocation_failures.load(Ordering::Relaxed)),
            ("decode_failures", self.decode_failures.load(Ordering::Relaxed)),
            ("internal_errors", self.internal_errors.load(Ordering::Relaxed)),
        ] {
            writeln!(out, "{:28} | {:>12}", name, value).ok();
        }
        writeln!(
            out,
            "{:28} | {:>12}",
            "last_exit_code",
            self.last_exit_code.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(out, "{:28} | {:>12}", "last_scrape", last_scrape).ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:28} | {:>8} | {:>8} | {:>8} | {:>8} | {:>6}",
            "Scrape duration (s)", "last", "avg", "max", "min", "count"
        )
        .ok();
        writeln!(
            out,
            "{:28} | {:>8.3} | {:>8.3} | {:>8.3} | {:>8.3} | {:>6}",
            "", last, avg, max, min, count
        )
        .ok();
        out
    }
}
