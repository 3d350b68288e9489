//! Checks one candidate password against a list of `identifier,bcrypt-hash`
//! records and writes every match to a result file.
//!
//! bcrypt is slow on purpose, so total run time is roughly
//! `records / workers * cost`. The [`Pipeline`] spreads that work across a
//! pool of workers:
//!
//! ```text
//! load_file ──▶ WorkQueue (bounded) ──▶ worker × N ──▶ ResultSink ──▶ result file
//!                    ▲                       ▲
//!                    └── ShutdownController ─┘
//! ```
//!
//! - [`WorkQueue`] buffers a fixed number of records and makes the loader wait
//!   while it is full.
//! - Each [`worker`] takes records until the queue reports end-of-stream and
//!   runs the bcrypt comparison on tokio's blocking pool. Unusable hashes are
//!   treated as a mismatch.
//! - [`ResultSink`] serializes writes so every match lands as one complete
//!   line, and keeps going when a write fails.
//! - [`ShutdownController`] turns SIGINT/SIGTERM into cancellation: feeding
//!   stops, workers finish the comparison in hand, and queued records are
//!   abandoned.
//!
//! [`Pipeline::run_sequential`] performs the same comparisons on one thread
//! with none of the above, as a throughput baseline and correctness reference.
//!
//! # Input format
//!
//! One record per line, two comma-separated fields:
//!
//! ```text
//! alice@example.com,$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy
//! ```
//!
//! Lines with any other field count are skipped. Matches are written as
//! `identifier,password,hash`.

pub mod error;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod shutdown;
pub mod sink;
pub mod worker;

pub use error::Error;
pub use pipeline::{DEFAULT_SHUTDOWN_GRACE, Pipeline, PipelineConfig, RunStatistics};
pub use queue::{DEFAULT_QUEUE_CAPACITY, WorkQueue};
pub use record::{
    CandidateRecord, DELIMITER, LoadedRecords, MatchRecord, TargetPassword, load_file,
    load_records,
};
pub use shutdown::{ShutdownController, ShutdownReason};
pub use sink::ResultSink;
pub use worker::{DEFAULT_WORKERS, WorkerStats, check_record, verify, worker};
