use crate::measure::LatencyRecorder;
use crate::stage::{OutputCollector, Stage};
use spdlog::info;
use std::marker::PhantomData;

/// Wraps a stage and records how long each `process` call takes.
pub struct Latency<In, Out, S> {
    name: String,
    report_interval: usize,
    stage: S,
    recorder: LatencyRecorder,
    count: usize,
    _phantom: PhantomData<fn(In) -> Out>,
}

impl<In, Out, S> Latency<In, Out, S>
where
    S: Stage<In, Out>,
{
    pub fn new(name: impl Into<String>, report_interval: usize, recorder: LatencyRecorder, stage: S) -> Self {
        assert!(report_interval > 0, "report_interval must be greater than 0");
        Latency {
            name: name.into(),
            report_interval,
            stage,
            recorder,
            count: 0,
            _phantom: PhantomData,
        }
    }

    pub fn recorder(&self) -> &LatencyRecorder {
        &self.recorder
    }
}

impl<In, Out, S> Stage<In, Out> for Latency<In, Out, S>
where
    S: Stage<In, Out>,
{
    #[inline(always)]
    fn process<C>(&mut self, data: &In, collector: &mut C)
    where
        C: OutputCollector<Out>,
    {
        {
            let _guard = self.recorder.guard();
            self.stage.process(data, collector);
        }
        self.count += 1;
        if self.count.is_multiple_of(self.report_interval) {
            info!("[{}] Evaluation latency: {}", self.name, self.recorder.summary());
        }
    }
}

impl<In, Out, S> Drop for Latency<In, Out, S> {
    fn drop(&mut self) {
        if self.count > 0 {
            info!("[{}] Final evaluation latency: {}", self.name, self.recorder.summary());
        }
    }
}

pub fn latency<In, Out, S>(
    name: impl Into<String>,
    report_interval: usize,
    recorder: LatencyRecorder,
    stage: S,
) -> Latency<In, Out, S>
where
    S: Stage<In, Out>,
{
    Latency::new(name, report_interval, recorder, stage)
}
