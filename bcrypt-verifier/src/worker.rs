use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::queue::WorkQueue;
use crate::record::{CandidateRecord, MatchRecord, TargetPassword};
use crate::sink::ResultSink;

/// Default number of verification workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Compares the target password against one stored bcrypt hash.
///
/// Malformed or unsupported hashes count as a mismatch.
pub fn verify(password: &TargetPassword, record: &CandidateRecord) -> bool {
    match bcrypt::verify(password.as_str(), record.stored_hash()) {
        Ok(matched) => matched,
        Err(e) => {
            debug!(identifier = record.identifier(), error = %e, "unusable hash, treating as mismatch");
            false
        }
    }
}

/// Verifies one record and hands a match to the sink.
///
/// Returns `true` on a match, whether or not the write succeeded.
pub fn check_record<W: std::io::Write>(
    password: &TargetPassword,
    record: &CandidateRecord,
    sink: &ResultSink<W>,
) -> bool {
    if !verify(password, record) {
        return false;
    }
    sink.record(&MatchRecord::new(record, password));
    true
}

/// Per-worker counters returned when the worker exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub verified: u64,
    pub matched: u64,
}

/// Worker task that drains the queue until end-of-stream or cancellation.
///
/// Each comparison runs on tokio's blocking pool so the hashing never stalls
/// the runtime. A cancelled worker finishes its current comparison and exits
/// without taking another record.
pub async fn worker<W>(
    id: usize,
    queue: Arc<WorkQueue>,
    password: TargetPassword,
    sink: Arc<ResultSink<W>>,
    cancel: CancellationToken,
    progress: Arc<AtomicU64>,
) -> WorkerStats
where
    W: std::io::Write + Send + 'static,
{
    let mut stats = WorkerStats::default();

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.dequeue() => match next {
                Some(record) => record,
                None => break,
            },
        };

        let password = password.clone();
        let sink = Arc::clone(&sink);
        let outcome =
            tokio::task::spawn_blocking(move || check_record(&password, &record, &sink)).await;

        stats.verified += 1;
        progress.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(true) => stats.matched += 1,
            Ok(false) => {}
            // A panic inside one comparison must not take the worker down.
            Err(e) => debug!(worker = id, error = %e, "comparison task failed"),
        }
    }

    debug!(worker = id, verified = stats.verified, matched = stats.matched, "worker finished");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashed(id: &str, password: &str) -> CandidateRecord {
        CandidateRecord::new(id, bcrypt::hash(password, 4).unwrap())
    }

    #[test]
    fn test_verify_match_and_mismatch() {
        let password = TargetPassword::new("secret");
        assert!(verify(&password, &hashed("alice", "secret")));
        assert!(!verify(&password, &hashed("bob", "other")));
    }

    #[test]
    fn test_verify_malformed_hash_is_mismatch() {
        let password = TargetPassword::new("secret");
        assert!(!verify(&password, &CandidateRecord::new("x", "not-a-hash")));
        assert!(!verify(&password, &CandidateRecord::new("x", "")));
        assert!(!verify(&password, &CandidateRecord::new("x", "$2b$04$short")));
    }

    #[test]
    fn test_check_record_writes_only_matches() {
        let password = TargetPassword::new("secret");
        let sink = ResultSink::new(Vec::new());
        let alice = hashed("alice", "secret");

        assert!(check_record(&password, &alice, &sink));
        assert!(!check_record(&password, &hashed("bob", "other"), &sink));

        let out = String::from_utf8(sink.close().unwrap()).unwrap();
        assert_eq!(out, format!("alice,secret,{}\n", alice.stored_hash()));
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let queue = Arc::new(WorkQueue::new(8));
        let sink = Arc::new(ResultSink::new(Vec::new()));
        let progress = Arc::new(AtomicU64::new(0));

        queue.enqueue(hashed("alice", "secret")).await.unwrap();
        queue.enqueue(CandidateRecord::new("broken", "zzz")).await.unwrap();
        queue.enqueue(hashed("carol", "secret")).await.unwrap();
        queue.close();

        let stats = worker(
            0,
            Arc::clone(&queue),
            TargetPassword::new("secret"),
            Arc::clone(&sink),
            CancellationToken::new(),
            Arc::clone(&progress),
        )
        .await;

        assert_eq!(stats, WorkerStats { verified: 3, matched: 2 });
        assert_eq!(progress.load(Ordering::Relaxed), 3);
        assert_eq!(sink.written(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_worker_takes_nothing() {
        let queue = Arc::new(WorkQueue::new(8));
        queue.enqueue(hashed("alice", "secret")).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = worker(
            0,
            Arc::clone(&queue),
            TargetPassword::new("secret"),
            Arc::new(ResultSink::new(Vec::new())),
            cancel,
            Arc::new(AtomicU64::new(0)),
        )
        .await;

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(queue.dequeued(), 0);
    }
}
