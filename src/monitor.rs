use crate::alert::AlertEvent;
use crate::config::Config;
use crate::engine::{Engine, ShutdownHandle};
use crate::error::MonitorError;
use crate::ingress::{Ingress, decode};
use crate::measure::LatencyRecorder;
use crate::pipe;
use crate::pipe::{inspect, latency, progress};
use crate::queue::{QueueConsumer, StreamQueues};
use crate::reading::Reading;
use crate::sensor::SensorStream;
use crate::sink::AlertSink;
use crate::stage::Stage;
use crate::tracker::WindowTracker;
use spdlog::{error, info, trace, warn};
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type SharedSink = Arc<Mutex<Box<dyn AlertSink + Send>>>;

/// Counters shared by all workers of a monitor.
#[derive(Debug, Default)]
pub struct MonitorCounters {
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub alerts: AtomicU64,
    pub sink_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub alerts: u64,
    pub sink_failures: u64,
}

impl MonitorCounters {
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            accepted: self.accepted.load(Relaxed),
            rejected: self.rejected.load(Relaxed),
            alerts: self.alerts.load(Relaxed),
            sink_failures: self.sink_failures.load(Relaxed),
        }
    }
}

/// Consumer side: one worker per sensor stream, each draining its queue in
/// order through a [`WindowTracker`] and handing alerts to a shared sink.
pub struct StallMonitor {
    engine: Engine,
    counters: Arc<MonitorCounters>,
}

impl StallMonitor {
    pub fn start(
        config: &Config,
        queues: &StreamQueues,
        sink: impl AlertSink + Send + 'static,
    ) -> Result<Self, MonitorError> {
        Self::start_with_shutdown(config, queues, sink, ShutdownHandle::new())
    }

    pub fn start_with_shutdown(
        config: &Config,
        queues: &StreamQueues,
        sink: impl AlertSink + Send + 'static,
        shutdown: ShutdownHandle,
    ) -> Result<Self, MonitorError> {
        let sink: Box<dyn AlertSink + Send> = Box::new(sink);
        let sink: SharedSink = Arc::new(Mutex::new(sink));
        let counters = Arc::new(MonitorCounters::default());
        let mut engine = Engine::with_shutdown(shutdown);
        engine.set_pin_cores(config.runtime.pin_cores);

        for stream in SensorStream::ALL {
            let consumer = queues.consumer(stream)?;
            let profile = config.profile(stream);
            info!(
                "[Monitor] Watching {} (window {}, rule {:?}), {} message(s) waiting",
                stream,
                profile.capacity,
                profile.rule,
                consumer.backlog()
            );

            let worker = StreamWorker {
                stream,
                consumer,
                sink: sink.clone(),
                counters: counters.clone(),
                activity: engine.activity_counter(),
            };
            let name = stream.queue_name();
            let mut pipeline = pipe![
                progress::<Reading>(name, config.runtime.progress_interval),
                inspect(move |r: &Reading| {
                    trace!("[{}] [x] Received {} at {}", name, r.temperature, r.timestamp);
                }),
                latency(
                    name,
                    config.runtime.latency_report_interval,
                    LatencyRecorder::new()?,
                    WindowTracker::new(stream, profile),
                ),
            ];

            engine
                .run_worker(format!("stall-{name}"), move || worker.poll(&mut pipeline))
                .map_err(|source| MonitorError::Spawn {
                    name: name.to_string(),
                    source,
                })?;
        }

        Ok(Self { engine, counters })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.engine.shutdown_handle()
    }

    pub fn counters(&self) -> MonitorSnapshot {
        self.counters.snapshot()
    }

    pub fn await_idle(&self, timeout: Duration) {
        self.engine.await_idle(timeout);
    }

    pub fn is_any_worker_panicked(&self) -> bool {
        self.engine.is_any_worker_panicked()
    }

    /// Stops taking deliveries, finishes in-flight ones and joins every worker.
    pub fn stop(mut self) -> Result<MonitorSnapshot, MonitorError> {
        let panicked = self.engine.stop();
        let snapshot = self.counters.snapshot();
        info!(
            "[Monitor] Stopped: {} accepted, {} rejected, {} alert(s), {} sink failure(s)",
            snapshot.accepted, snapshot.rejected, snapshot.alerts, snapshot.sink_failures
        );
        if panicked > 0 {
            return Err(MonitorError::WorkerPanicked(panicked));
        }
        Ok(snapshot)
    }
}

struct StreamWorker {
    stream: SensorStream,
    consumer: QueueConsumer,
    sink: SharedSink,
    counters: Arc<MonitorCounters>,
    activity: Arc<AtomicU64>,
}

impl StreamWorker {
    /// Handles at most one delivery. Returns `false` when the queue was empty.
    fn poll<P>(&self, pipeline: &mut P) -> bool
    where
        P: Stage<Reading, AlertEvent>,
    {
        let Some(delivery) = self.consumer.next_delivery() else {
            return false;
        };

        match decode(delivery.payload()) {
            Ingress::Accepted(reading) => {
                self.counters.accepted.fetch_add(1, Relaxed);
                pipeline.process(&reading, &mut |alert: AlertEvent| self.dispatch(alert));
                self.consumer.ack(&delivery);
            }
            Ingress::Rejected(reason) => {
                warn!(
                    "[{}] Rejecting message {}: {} ({:?})",
                    self.stream, delivery.tag(), reason, delivery
                );
                self.counters.rejected.fetch_add(1, Relaxed);
                self.consumer.reject(&delivery);
            }
        }
        self.activity.fetch_add(1, Relaxed);
        true
    }

    fn dispatch(&self, alert: AlertEvent) {
        self.counters.alerts.fetch_add(1, Relaxed);
        warn!("[{}] {}: {}", self.stream, alert.detected_at_text(), alert.message);

        let result = match self.sink.lock() {
            Ok(mut sink) => sink.record(&alert),
            Err(poisoned) => poisoned.into_inner().record(&alert),
        };
        if let Err(e) = result {
            self.counters.sink_failures.fetch_add(1, Relaxed);
            error!("[{}] Failed to record {} alert: {}", self.stream, alert.category, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::Envelope;

    #[derive(Clone, Default)]
    struct Collected(Arc<Mutex<Vec<AlertEvent>>>);

    impl AlertSink for Collected {
        fn record(&mut self, alert: &AlertEvent) -> Result<(), crate::error::SinkError> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    #[test]
    fn test_smoker_drop_reaches_sink() {
        let mut queues = StreamQueues::in_memory(64).unwrap();
        let collected = Collected::default();
        let monitor = StallMonitor::start(&Config::default(), &queues, collected.clone()).unwrap();

        for t in [100.0, 95.0, 90.0, 86.0, 84.0] {
            let payload = Envelope::new("03/07/24 14:30:00", t).encode().unwrap();
            queues.publish(SensorStream::Smoker, &payload).unwrap();
        }
        monitor.await_idle(Duration::from_secs(2));
        let snapshot = monitor.stop().unwrap();

        assert_eq!(snapshot.accepted, 5);
        assert_eq!(snapshot.alerts, 1);
        let alerts = collected.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stream, SensorStream::Smoker);
        assert_eq!(queues.get(SensorStream::Smoker).pending(), 0);
    }
}
