pub mod alert;
pub mod config;
mod engine;
pub mod error;
pub mod ingress;
mod macros;
pub mod measure;
mod monitor;
mod pipe;
pub mod queue;
pub mod reading;
pub mod replay;
pub mod sensor;
pub mod sink;
mod stage;
pub mod stall;
mod storage;
mod tracker;
pub mod window;

pub use crate::alert::{AlertCategory, AlertEvent};
pub use crate::config::Config;
pub use crate::engine::{Engine, ShutdownHandle};
pub use crate::ingress::{Envelope, Ingress, RejectReason, decode};
pub use crate::monitor::{MonitorSnapshot, StallMonitor};
pub use crate::pipe::*;
pub use crate::queue::{Delivery, MAX_QUEUE_CAPACITY, MessageQueue, QueueConsumer, StreamQueues};
pub use crate::reading::{Reading, Timestamp};
pub use crate::replay::{ReplayStats, replay_csv};
pub use crate::sensor::{SensorStream, StreamProfile};
pub use crate::sink::{AlertRouter, AlertSink, CsvAlertLog};
pub use crate::stage::{OutputCollector, Stage, StageExt};
pub use crate::stall::{StallMeasure, StallRule};
pub use crate::tracker::WindowTracker;
pub use crate::window::SlidingWindow;
