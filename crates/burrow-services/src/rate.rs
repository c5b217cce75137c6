//! Throughput accounting and the human-readable figures shown to operators.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bytes accepted over the last `capacity` frames.
#[derive(Debug, Clone)]
pub struct RateWindow {
    samples: VecDeque<(Instant, usize)>,
    capacity: usize,
}

impl RateWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, at: Instant, bytes: usize) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((at, bytes));
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Bytes per second across the window; zero until two samples span a
    /// measurable interval.
    pub fn bytes_per_sec(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let span = last.0.saturating_duration_since(first.0).as_secs_f64();
        if self.samples.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        let bytes: usize = self.samples.iter().map(|(_, n)| n).sum();
        bytes as f64 / span
    }
}

/// `1536.0` → `"1.50 KiB/s"`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}/s", UNITS[unit])
}

/// Remaining time as `mm:ss`; unknown renders as `--:--`.
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let secs = d.as_secs();
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        None => "--:--".to_string(),
    }
}

/// Compact duration for cycle estimates: `93784` s → `"1d2h3m4s"`.
pub fn format_duration(d: Duration) -> String {
    const UNITS: [(u64, &str); 5] = [
        (31_536_000, "y"),
        (86_400, "d"),
        (3_600, "h"),
        (60, "m"),
        (1, "s"),
    ];
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (size, suffix) in UNITS {
        if secs >= size {
            out.push_str(&format!("{}{suffix}", secs / size));
            secs %= size;
        }
    }
    out
}
