//! Progress, speed, and ETA accounting, sampled roughly every 1000 ms.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// A point-in-time view of transfer progress, safe to publish across tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_done: u64,
    pub total_bytes: u64,
    pub percent: f64,
    pub speed_bps: f64,
    pub eta_ms: Option<u64>,
    pub chunks_done: u32,
    pub chunks_total: u32,
    pub file_name: String,
}

/// Monotonic counters plus the previous sample, used to derive speed and ETA
/// on each call to [`ProgressTracker::sample`].
pub struct ProgressTracker {
    file_name: String,
    total_bytes: u64,
    chunks_total: u32,
    bytes_done: AtomicU64,
    chunks_done: AtomicU32,
    last: std::sync::Mutex<SampleState>,
}

struct SampleState {
    bytes_done_prev: u64,
    t_prev: Instant,
}

impl ProgressTracker {
    pub fn new(file_name: String, total_bytes: u64, chunks_total: u32) -> Self {
        Self {
            file_name,
            total_bytes,
            chunks_total,
            bytes_done: AtomicU64::new(0),
            chunks_done: AtomicU32::new(0),
            last: std::sync::Mutex::new(SampleState {
                bytes_done_prev: 0,
                t_prev: Instant::now(),
            }),
        }
    }

    /// Record that `bytes` additional bytes and one additional chunk have
    /// completed. Counters are monotonic non-decreasing by construction.
    pub fn record_chunk(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::AcqRel);
        self.chunks_done.fetch_add(1, Ordering::AcqRel);
    }

    /// Take a snapshot, updating the internal previous-sample state used for
    /// the next speed/ETA computation. Call this roughly every 1000 ms.
    pub fn sample(&self) -> ProgressSnapshot {
        let bytes_done = self.bytes_done.load(Ordering::Acquire);
        let chunks_done = self.chunks_done.load(Ordering::Acquire);
        let now = Instant::now();

        let (speed_bps, eta_ms) = {
            let mut last = self.last.lock().expect("progress tracker mutex poisoned");
            let elapsed_ms = now.duration_since(last.t_prev).as_millis().max(1) as f64;
            let delta_bytes = bytes_done.saturating_sub(last.bytes_done_prev) as f64;
            let speed = delta_bytes * 1000.0 / elapsed_ms;

            last.bytes_done_prev = bytes_done;
            last.t_prev = now;

            let eta = if speed > 0.0 {
                let remaining = self.total_bytes.saturating_sub(bytes_done) as f64;
                Some((remaining * 1000.0 / speed) as u64)
            } else {
                None
            };
            (speed, eta)
        };

        let percent = if self.total_bytes == 0 {
            100.0
        } else {
            (bytes_done as f64 / self.total_bytes as f64) * 100.0
        };

        ProgressSnapshot {
            bytes_done,
            total_bytes: self.total_bytes,
            percent,
            speed_bps,
            eta_ms,
            chunks_done,
            chunks_total: self.chunks_total,
            file_name: self.file_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn initial_sample_is_zero_progress() {
        let t = ProgressTracker::new("f.bin".into(), 1000, 4);
        let s = t.sample();
        assert_eq!(s.bytes_done, 0);
        assert_eq!(s.chunks_done, 0);
        assert_eq!(s.percent, 0.0);
    }

    #[test]
    fn record_chunk_increments_monotonically() {
        let t = ProgressTracker::new("f.bin".into(), 1000, 4);
        t.record_chunk(250);
        let s1 = t.sample();
        t.record_chunk(250);
        let s2 = t.sample();
        assert!(s2.bytes_done >= s1.bytes_done);
        assert!(s2.chunks_done >= s1.chunks_done);
        assert_eq!(s2.bytes_done, 500);
        assert_eq!(s2.chunks_done, 2);
    }

    #[test]
    fn speed_is_positive_after_progress_with_elapsed_time() {
        let t = ProgressTracker::new("f.bin".into(), 1_000_000, 4);
        let _ = t.sample();
        sleep(Duration::from_millis(20));
        t.record_chunk(500_000);
        let s = t.sample();
        assert!(s.speed_bps > 0.0);
        assert!(s.eta_ms.is_some());
    }

    #[test]
    fn empty_file_reports_full_percent() {
        let t = ProgressTracker::new("empty.bin".into(), 0, 0);
        let s = t.sample();
        assert_eq!(s.percent, 100.0);
    }
}
