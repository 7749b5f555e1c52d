//! Cumulative wall-clock timing, reported when `-p` is passed.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy)]
struct Entry {
    total: Duration,
    calls: u64,
}

static TIMINGS: LazyLock<Mutex<HashMap<String, Entry>>> = LazyLock::new(Mutex::default);

/// Add one observation to a label's running total.
pub fn observe(label: &str, elapsed: Duration) {
    let mut map = TIMINGS.lock().unwrap_or_else(|e| e.into_inner());
    let entry = map.entry(label.to_string()).or_default();
    entry.total += elapsed;
    entry.calls += 1;
}

/// Run `f`, recording its wall-clock time under `label`.
pub fn time<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let out = f();
    observe(label, started.elapsed());
    out
}

/// Render the `limit` most expensive labels, sorted by cumulative time.
pub fn report(limit: usize) -> String {
    let map = TIMINGS.lock().unwrap_or_else(|e| e.into_inner());
    let mut rows: Vec<(&String, &Entry)> = map.iter().collect();
    rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));

    let mut out = String::new();
    let _ = writeln!(out, "{:>12} {:>8}  label", "cumulative", "calls");
    for (label, entry) in rows.into_iter().take(limit) {
        let _ = writeln!(
            out,
            "{:>11.3}s {:>8}  {label}",
            entry.total.as_secs_f64(),
            entry.calls
        );
    }
    out
}
