use crate::error::QueueError;
use crate::sensor::SensorStream;
use crate::storage::journal_mmap::JournalMmap;
use bytemuck::{Pod, Zeroable};
use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};

/// Largest message body a single frame can carry.
pub const FRAME_PAYLOAD: usize = 252;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Frame {
    len: u32,
    payload: [u8; FRAME_PAYLOAD],
}

const FRAME_SIZE: usize = size_of::<Frame>();

/// Most messages a single queue may be created with (4 GiB of frames).
pub const MAX_QUEUE_CAPACITY: usize = 1 << 24;

pub struct QueueOptions<'a> {
    pub name: &'a str,
    /// Number of messages the queue can hold over its lifetime.
    pub capacity: usize,
    pub in_memory: bool,
}

/// A named, durable FIFO queue backed by a memory-mapped journal.
///
/// The queue handle is the single publisher. [`MessageQueue::consumer`] hands
/// out at most one live consumer at a time, which may live on another thread
/// or, for file-backed queues, in another process.
pub struct MessageQueue {
    name: String,
    path: Option<PathBuf>,
    storage: JournalMmap,
    consumer_live: Arc<AtomicBool>,
}

impl MessageQueue {
    pub fn new(root_path: &Path, options: QueueOptions) -> Result<Self, QueueError> {
        let path = (!options.in_memory).then(|| root_path.join(format!("{}.queue", options.name)));
        let storage = Self::data_size(options.capacity)
            .and_then(|data_size| match &path {
                None => JournalMmap::new(None, data_size, FRAME_SIZE),
                Some(p) => std::fs::create_dir_all(root_path)
                    .and_then(|_| JournalMmap::open_or_create(p, data_size, FRAME_SIZE)),
            })
            .map_err(|source| QueueError::Open {
                name: options.name.to_string(),
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            name: options.name.to_string(),
            path,
            storage,
            consumer_live: Arc::new(AtomicBool::new(false)),
        })
    }

    fn data_size(capacity: usize) -> io::Result<usize> {
        if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("queue capacity must be between 1 and {MAX_QUEUE_CAPACITY} messages"),
            ));
        }
        capacity
            .checked_mul(FRAME_SIZE)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "queue capacity overflows"))
    }

    /// Opens `<dir>/<name>.queue`, creating it when missing.
    pub fn open(dir: &Path, name: &str, capacity: usize) -> Result<Self, QueueError> {
        Self::new(
            dir,
            QueueOptions {
                name,
                capacity,
                in_memory: false,
            },
        )
    }

    pub fn in_memory(name: &str, capacity: usize) -> Result<Self, QueueError> {
        Self::new(
            Path::new(""),
            QueueOptions {
                name,
                capacity,
                in_memory: true,
            },
        )
    }

    pub fn publish(&mut self, payload: &[u8]) -> Result<(), QueueError> {
        self.check_publish(payload)?;
        let mut frame = Frame::zeroed();
        frame.len = payload.len() as u32;
        frame.payload[..payload.len()].copy_from_slice(payload);
        self.storage.append(&frame);
        Ok(())
    }

    /// Fails the way [`publish`](Self::publish) would, without publishing.
    pub fn check_publish(&self, payload: &[u8]) -> Result<(), QueueError> {
        if payload.len() > FRAME_PAYLOAD {
            return Err(QueueError::PayloadTooLarge {
                len: payload.len(),
                limit: FRAME_PAYLOAD,
            });
        }
        if self.storage.remaining() < FRAME_SIZE {
            return Err(QueueError::Full {
                name: self.name.clone(),
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Hands out the queue's consumer. Fails while a previous consumer is
    /// still alive; dropping it frees the slot.
    pub fn consumer(&self) -> Result<QueueConsumer, QueueError> {
        if self.consumer_live.swap(true, Acquire) {
            return Err(QueueError::ConsumerTaken {
                name: self.name.clone(),
            });
        }
        let storage = self.storage.reader();
        Ok(QueueConsumer {
            name: self.name.clone(),
            cursor: Cell::new(storage.ack_offset()),
            storage,
            live: self.consumer_live.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.storage.len() / FRAME_SIZE
    }

    /// Messages published over the queue's lifetime.
    pub fn published(&self) -> usize {
        self.storage.write_offset() / FRAME_SIZE
    }

    /// Messages published but not yet acknowledged or rejected.
    pub fn pending(&self) -> usize {
        (self.storage.write_offset() - self.storage.ack_offset()) / FRAME_SIZE
    }

    pub fn flush(&self) -> Result<(), QueueError> {
        if self.path.is_none() {
            return Ok(());
        }
        self.storage.flush().map_err(|source| QueueError::Flush {
            name: self.name.clone(),
            source,
        })
    }
}

/// One message handed to the consumer, identified by its position in the queue.
#[derive(Clone, Copy)]
pub struct Delivery {
    tag: u64,
    frame: Frame,
}

impl Delivery {
    /// Sequence number of the message within its queue, starting at 0.
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        let len = (self.frame.len as usize).min(FRAME_PAYLOAD);
        &self.frame.payload[..len]
    }

    fn end_offset(&self) -> usize {
        (self.tag as usize + 1) * FRAME_SIZE
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("payload", &String::from_utf8_lossy(self.payload()))
            .finish()
    }
}

/// Reads a queue in order.
///
/// Delivery starts after the last acknowledged message, so anything delivered
/// but not settled before a restart is delivered again.
pub struct QueueConsumer {
    name: String,
    cursor: Cell<usize>,
    storage: JournalMmap,
    live: Arc<AtomicBool>,
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        self.live.store(false, Release);
    }
}

impl QueueConsumer {
    pub fn next_delivery(&self) -> Option<Delivery> {
        let offset = self.cursor.get();
        if offset + FRAME_SIZE > self.storage.write_offset() {
            return None;
        }
        let frame = *self.storage.read::<Frame>(offset);
        self.cursor.set(offset + FRAME_SIZE);
        Some(Delivery {
            tag: (offset / FRAME_SIZE) as u64,
            frame,
        })
    }

    /// Marks the delivery and everything before it as processed.
    pub fn ack(&self, delivery: &Delivery) {
        self.settle(delivery);
    }

    /// Drops a message that can never be processed. It is not redelivered.
    pub fn reject(&self, delivery: &Delivery) {
        self.settle(delivery);
    }

    fn settle(&self, delivery: &Delivery) {
        let end = delivery.end_offset();
        if end > self.storage.ack_offset() {
            self.storage.store_ack_offset(end);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages available to `next_delivery` right now.
    pub fn backlog(&self) -> usize {
        (self.storage.write_offset() - self.cursor.get()) / FRAME_SIZE
    }
}

/// The three per-stream queues, in stream order.
pub struct StreamQueues {
    queues: [MessageQueue; 3],
}

impl StreamQueues {
    pub fn open(dir: &Path, capacity: usize) -> Result<Self, QueueError> {
        Ok(Self {
            queues: [
                MessageQueue::open(dir, SensorStream::Smoker.queue_name(), capacity)?,
                MessageQueue::open(dir, SensorStream::FoodA.queue_name(), capacity)?,
                MessageQueue::open(dir, SensorStream::FoodB.queue_name(), capacity)?,
            ],
        })
    }

    pub fn in_memory(capacity: usize) -> Result<Self, QueueError> {
        Ok(Self {
            queues: [
                MessageQueue::in_memory(SensorStream::Smoker.queue_name(), capacity)?,
                MessageQueue::in_memory(SensorStream::FoodA.queue_name(), capacity)?,
                MessageQueue::in_memory(SensorStream::FoodB.queue_name(), capacity)?,
            ],
        })
    }

    fn index(stream: SensorStream) -> usize {
        match stream {
            SensorStream::Smoker => 0,
            SensorStream::FoodA => 1,
            SensorStream::FoodB => 2,
        }
    }

    pub fn get(&self, stream: SensorStream) -> &MessageQueue {
        &self.queues[Self::index(stream)]
    }

    pub fn get_mut(&mut self, stream: SensorStream) -> &mut MessageQueue {
        &mut self.queues[Self::index(stream)]
    }

    pub fn publish(&mut self, stream: SensorStream, payload: &[u8]) -> Result<(), QueueError> {
        self.get_mut(stream).publish(payload)
    }

    pub fn consumer(&self, stream: SensorStream) -> Result<QueueConsumer, QueueError> {
        self.get(stream).consumer()
    }

    pub fn flush(&self) -> Result<(), QueueError> {
        self.queues.iter().try_for_each(MessageQueue::flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        assert_eq!(FRAME_SIZE, 256);
    }

    #[test]
    fn test_consumer_sees_messages_in_order() {
        let mut queue = MessageQueue::in_memory("order", 8).unwrap();
        let consumer = queue.consumer().unwrap();
        assert!(consumer.next_delivery().is_none());

        queue.publish(b"first").unwrap();
        queue.publish(b"second").unwrap();

        let d1 = consumer.next_delivery().unwrap();
        let d2 = consumer.next_delivery().unwrap();
        assert_eq!((d1.tag(), d1.payload()), (0, &b"first"[..]));
        assert_eq!((d2.tag(), d2.payload()), (1, &b"second"[..]));
        assert!(consumer.next_delivery().is_none());
    }

    #[test]
    fn test_pending_tracks_settlement() {
        let mut queue = MessageQueue::in_memory("pending", 8).unwrap();
        let consumer = queue.consumer().unwrap();
        queue.publish(b"a").unwrap();
        queue.publish(b"b").unwrap();
        assert_eq!(queue.pending(), 2);

        let d = consumer.next_delivery().unwrap();
        assert_eq!(queue.pending(), 2);
        consumer.reject(&d);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.published(), 2);
    }
}
