//! Bounded work queue between the record loader and the verification workers.
//!
//! The queue is a tokio bounded channel with one producer handle and a
//! receiver shared by every worker. Capacity gives backpressure: `enqueue`
//! suspends while the buffer is full.
//!
//! Closing drops the producer handle. Workers keep draining whatever is
//! buffered and then see end-of-stream. Closing twice is a no-op; enqueueing
//! after close returns [`Error::QueueClosed`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::Error;
use crate::record::CandidateRecord;

/// Default number of records buffered between loader and workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

pub struct WorkQueue {
    sender: Mutex<Option<mpsc::Sender<CandidateRecord>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<CandidateRecord>>,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
}

impl WorkQueue {
    /// Creates a queue holding at most `capacity` pending records.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
        }
    }

    /// Adds a record, waiting for space if the queue is full.
    pub async fn enqueue(&self, record: CandidateRecord) -> Result<(), Error> {
        // Clone the handle so the lock is not held across the await.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::QueueClosed)?;

        sender.send(record).await.map_err(|_| Error::QueueClosed)?;
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Takes the next record. Returns `None` once the queue is closed and
    /// drained.
    pub async fn dequeue(&self) -> Option<CandidateRecord> {
        let record = self.receiver.lock().await.recv().await;
        if record.is_some() {
            self.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        record
    }

    /// Signals that no further records will arrive.
    ///
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take().is_some()
    }

    /// Total records accepted by `enqueue`.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total records handed out by `dequeue`.
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }
}
