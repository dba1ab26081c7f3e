use hdrhistogram::{CreationError, Histogram};
use std::time::{Duration, Instant};

/// Percentiles of recorded durations, in nanoseconds.
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Records how long each evaluation of a stream pipeline takes.
pub struct LatencyRecorder {
    histogram: Histogram<u64>,
}

pub struct LatencyGuard<'a> {
    recorder: &'a mut LatencyRecorder,
    start: Instant,
}

impl Drop for LatencyGuard<'_> {
    fn drop(&mut self) {
        self.recorder.record(self.start.elapsed());
    }
}

impl LatencyRecorder {
    // 1ns .. 60s at 3 significant figures
    const HIGHEST_NANOS: u64 = 60_000_000_000;

    pub fn new() -> Result<Self, CreationError> {
        let histogram = Histogram::<u64>::new_with_bounds(1, Self::HIGHEST_NANOS, 3)?;
        Ok(Self { histogram })
    }

    pub fn record(&mut self, duration: Duration) {
        let nanos = (duration.as_nanos() as u64).clamp(1, Self::HIGHEST_NANOS);
        self.histogram.saturating_record(nanos);
    }

    pub fn guard(&mut self) -> LatencyGuard<'_> {
        LatencyGuard {
            recorder: self,
            start: Instant::now(),
        }
    }

    pub fn stats(&self) -> LatencyStats {
        if self.histogram.len() == 0 {
            return LatencyStats::default();
        }
        LatencyStats {
            count: self.histogram.len(),
            min: self.histogram.min(),
            max: self.histogram.max(),
            mean: self.histogram.mean(),
            p50: self.histogram.value_at_quantile(0.5),
            p99: self.histogram.value_at_quantile(0.99),
            p999: self.histogram.value_at_quantile(0.999),
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        if stats.count == 0 {
            return "no readings evaluated".into();
        }
        format!(
            "n={} min={} p50={} p99={} p999={} max={} mean={}",
            stats.count,
            format_nanos(stats.min as f64),
            format_nanos(stats.p50 as f64),
            format_nanos(stats.p99 as f64),
            format_nanos(stats.p999 as f64),
            format_nanos(stats.max as f64),
            format_nanos(stats.mean),
        )
    }
}

fn format_nanos(nanos: f64) -> String {
    if nanos < 1_000.0 {
        format!("{:.0}ns", nanos)
    } else if nanos < 1_000_000.0 {
        format!("{:.1}us", nanos / 1_000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.1}ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_recorder() {
        let recorder = LatencyRecorder::new().unwrap();
        assert_eq!(recorder.stats().count, 0);
        assert_eq!(recorder.summary(), "no readings evaluated");
    }

    #[test]
    fn test_records_durations() {
        let mut recorder = LatencyRecorder::new().unwrap();
        recorder.record(Duration::from_micros(5));
        recorder.record(Duration::from_micros(10));
        recorder.record(Duration::ZERO);

        let stats = recorder.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 1);
        assert!(stats.max >= 9_990);
        assert!(recorder.summary().starts_with("n=3 "));
    }

    #[test]
    fn test_guard_records_on_drop() {
        let mut recorder = LatencyRecorder::new().unwrap();
        {
            let _guard = recorder.guard();
            std::thread::sleep(Duration::from_millis(2));
        }
        let stats = recorder.stats();
        assert_eq!(stats.count, 1);
        assert!(stats.min >= 1_000_000);
    }

    #[test]
    fn test_format_nanos_units() {
        assert_eq!(format_nanos(512.0), "512ns");
        assert_eq!(format_nanos(2_500.0), "2.5us");
        assert_eq!(format_nanos(3_000_000.0), "3.0ms");
        assert_eq!(format_nanos(1_500_000_000.0), "1.50s");
    }
}
