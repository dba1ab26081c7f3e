use spdlog::{error, info};
use std::hint::spin_loop;
use std::io;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Cloneable flag used to ask every worker of an [`Engine`] to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn request(&self) {
        self.running.store(false, Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        !self.running.load(Relaxed)
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    /// Returns `false` when the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs long-lived worker loops on dedicated threads.
///
/// Each worker is a closure returning whether it did any work; idle workers
/// back off from spinning to yielding to short sleeps. Workers report progress
/// through activity counters so callers can wait for the engine to go idle.
pub struct Engine {
    shutdown: ShutdownHandle,
    worker_handlers: Vec<(String, thread::JoinHandle<()>)>,
    counters: Mutex<Vec<Arc<AtomicU64>>>,
    pin_cores: bool,
    idle_sleep: Duration,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_shutdown(ShutdownHandle::new())
    }

    pub fn with_shutdown(shutdown: ShutdownHandle) -> Self {
        Self {
            shutdown,
            worker_handlers: vec![],
            counters: Mutex::new(vec![]),
            pin_cores: false,
            idle_sleep: Duration::from_millis(1),
        }
    }

    pub fn set_pin_cores(&mut self, pin_cores: bool) {
        self.pin_cores = pin_cores;
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Counter a worker bumps once per processed item.
    pub fn activity_counter(&self) -> Arc<AtomicU64> {
        let counter = Arc::new(AtomicU64::new(0));
        if let Ok(mut counters) = self.counters.lock() {
            counters.push(counter.clone());
        }
        counter
    }

    fn total_activity(&self) -> u64 {
        self.counters
            .lock()
            .map(|counters| counters.iter().map(|c| c.load(Relaxed)).sum())
            .unwrap_or(0)
    }

    pub fn run_worker(
        &mut self,
        name: impl Into<String>,
        mut runnable: impl FnMut() -> bool + Send + 'static,
    ) -> io::Result<()> {
        let name = name.into();
        let worker_id = self.worker_handlers.len();
        let shutdown = self.shutdown.clone();
        let pin_cores = self.pin_cores;
        let idle_sleep = self.idle_sleep;

        let handler = thread::Builder::new().name(name.clone()).spawn(move || {
            if pin_cores
                && let Some(core_ids) = core_affinity::get_core_ids()
                && let Some(core_id) = core_ids.get(worker_id % core_ids.len().max(1))
            {
                core_affinity::set_for_current(*core_id);
            }

            let mut idle_steps = 0u32;
            while !shutdown.is_requested() {
                if runnable() {
                    idle_steps = 0;
                    continue;
                }
                idle_steps = idle_steps.saturating_add(1);
                if idle_steps < 16 {
                    spin_loop();
                } else if idle_steps < 1024 {
                    thread::yield_now();
                } else {
                    sleep(idle_sleep);
                }
            }
        })?;
        self.worker_handlers.push((name, handler));
        Ok(())
    }

    /// Returns once no counter moved during a poll period, or after `timeout`.
    pub fn await_idle(&self, timeout: Duration) {
        let start = Instant::now();
        let mut last_count = self.total_activity();
        loop {
            sleep(Duration::from_millis(20));
            let new_count = self.total_activity();
            if new_count == last_count || start.elapsed() > timeout {
                break;
            }
            last_count = new_count;
        }
    }

    pub fn is_any_worker_panicked(&self) -> bool {
        !self.shutdown.is_requested() && self.worker_handlers.iter().any(|(_, h)| h.is_finished())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handlers.len()
    }

    /// Requests shutdown and joins every worker. Returns how many panicked.
    pub fn stop(&mut self) -> usize {
        self.shutdown.request();
        let mut panicked = 0;
        for (name, handler) in self.worker_handlers.drain(..) {
            match handler.join() {
                Ok(()) => info!("[Engine] Worker {} stopped", name),
                Err(_) => {
                    error!("[Engine] Worker {} panicked", name);
                    panicked += 1;
                }
            }
        }
        panicked
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
