use crate::stage::{OutputCollector, Stage};
use spdlog::info;
use std::marker::PhantomData;
use std::time::Instant;

/// Logs how many readings a stream has seen every `interval` items.
pub struct Progress<T> {
    name: String,
    interval: usize,
    count: usize,
    started: Instant,
    _phantom: PhantomData<T>,
}

impl<T: Copy> Progress<T> {
    pub fn new(name: impl Into<String>, interval: usize) -> Self {
        assert!(interval > 0, "interval must be greater than 0");
        Self {
            name: name.into(),
            interval,
            count: 0,
            started: Instant::now(),
            _phantom: PhantomData,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl<T: Copy> Stage<T, T> for Progress<T> {
    #[inline(always)]
    fn process<C>(&mut self, data: &T, collector: &mut C)
    where
        C: OutputCollector<T>,
    {
        self.count += 1;
        if self.count.is_multiple_of(self.interval) {
            let elapsed = self.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                self.count as f64 / elapsed
            } else {
                0.0
            };
            info!(
                "[{}] Observed {} readings, Avg: {:.2} readings/min",
                self.name,
                self.count,
                rate * 60.0
            );
        }
        collector.push(*data);
    }
}

pub fn progress<T: Copy>(name: impl Into<String>, interval: usize) -> Progress<T> {
    Progress::new(name, interval)
}
