//! Frame timing counters, compiled in with the `perf` feature. Without it
//! every call is a no-op and [`report`] is empty.

use std::time::Duration;

#[cfg(feature = "perf")]
use std::cell::RefCell;
#[cfg(feature = "perf")]
use std::time::Instant;

#[cfg(feature = "perf")]
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    pub calls: u64,
    pub total: Duration,
    pub worst: Duration,
}

#[cfg(feature = "perf")]
thread_local! {
    static TIMINGS: RefCell<FxHashMap<&'static str, Timing>> = RefCell::new(FxHashMap::default());
}

/// Records the time until drop under its label.
#[must_use]
pub struct Timer {
    #[cfg(feature = "perf")]
    label: &'static str,
    #[cfg(feature = "perf")]
    start: Instant,
}

#[inline]
pub fn timer(label: &'static str) -> Timer {
    #[cfg(feature = "perf")]
    {
        Timer {
            label,
            start: Instant::now(),
        }
    }
    #[cfg(not(feature = "perf"))]
    {
        let _ = label;
        Timer {}
    }
}

#[cfg(feature = "perf")]
impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        TIMINGS.with(|timings| {
            let mut timings = timings.borrow_mut();
            let t = timings.entry(self.label).or_default();
            t.calls += 1;
            t.total += elapsed;
            t.worst = t.worst.max(elapsed);
        });
    }
}

/// Collected timings, slowest total first. Clears the counters.
pub fn take() -> Vec<(&'static str, Timing)> {
    #[cfg(feature = "perf")]
    {
        let mut out: Vec<_> = TIMINGS.with(|timings| timings.borrow_mut().drain().collect());
        out.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        out
    }
    #[cfg(not(feature = "perf"))]
    {
        Vec::new()
    }
}

pub fn report() -> String {
    let mut out = String::new();
    for (label, t) in take() {
        let avg_us = if t.calls == 0 {
            0.0
        } else {
            t.total.as_secs_f64() * 1e6 / t.calls as f64
        };
        out.push_str(&format!(
            "{label:<20} calls={:<6} total_ms={:>9.3} avg_us={avg_us:>9.3} worst_us={:>9.3}\n",
            t.calls,
            t.total.as_secs_f64() * 1e3,
            t.worst.as_secs_f64() * 1e6,
        ));
    }
    out
}
