use crate::alert::AlertEvent;
use crate::reading::Reading;
use crate::sensor::{SensorStream, StreamProfile};
use crate::stage::{OutputCollector, Stage};
use crate::stall::{StallMeasure, StallRule};
use crate::window::SlidingWindow;
use chrono::{DateTime, Local};

/// Owns one stream's sliding window and decides, reading by reading, whether
/// the stream has stalled.
///
/// A tracker is a pure synchronous transform: it has no timers and reacts only
/// to the readings it is handed, in the order it is handed them.
#[derive(Debug, Clone)]
pub struct WindowTracker {
    stream: SensorStream,
    rule: StallRule,
    window: SlidingWindow<Reading>,
}

impl WindowTracker {
    pub fn new(stream: SensorStream, profile: StreamProfile) -> Self {
        Self {
            stream,
            rule: profile.rule,
            window: SlidingWindow::new(profile.capacity),
        }
    }

    /// Tracker using the stream's built-in window shape.
    pub fn for_stream(stream: SensorStream) -> Self {
        Self::new(stream, stream.default_profile())
    }

    /// Appends `reading` and reports a stall detected at the current local time.
    pub fn observe(&mut self, reading: Reading) -> Option<AlertEvent> {
        let measure = self.push_and_evaluate(reading)?;
        Some(self.alert(reading, measure, Local::now()))
    }

    /// Like [`observe`](Self::observe) with a caller-supplied detection time.
    #[inline(always)]
    pub fn observe_at(&mut self, reading: Reading, detected_at: DateTime<Local>) -> Option<AlertEvent> {
        let measure = self.push_and_evaluate(reading)?;
        Some(self.alert(reading, measure, detected_at))
    }

    /// Appends `reading`, evicting the oldest entry when the window is full, then
    /// evaluates the stall rule over the updated window.
    #[inline(always)]
    fn push_and_evaluate(&mut self, reading: Reading) -> Option<StallMeasure> {
        debug_assert!(reading.temperature.is_finite(), "ingress must reject non-finite readings");
        self.window.push(reading);
        self.evaluate()
    }

    fn alert(&self, reading: Reading, measure: StallMeasure, detected_at: DateTime<Local>) -> AlertEvent {
        AlertEvent::new(
            self.stream,
            reading,
            measure,
            self.rule.threshold(),
            self.window.len(),
            detected_at,
        )
    }

    /// Evaluates the rule on the current window without changing it.
    #[inline(always)]
    pub fn evaluate(&self) -> Option<StallMeasure> {
        self.rule.evaluate(&self.window)
    }

    pub fn stream(&self) -> SensorStream {
        self.stream
    }

    pub fn rule(&self) -> StallRule {
        self.rule
    }

    pub fn window(&self) -> &SlidingWindow<Reading> {
        &self.window
    }
}

impl Stage<Reading, AlertEvent> for WindowTracker {
    #[inline(always)]
    fn process<C>(&mut self, data: &Reading, collector: &mut C)
    where
        C: OutputCollector<AlertEvent>,
    {
        if let Some(alert) = self.observe(*data) {
            collector.push(alert);
        }
    }
}
