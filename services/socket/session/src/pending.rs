//! Pending-request queue and the reply handle returned to callers.

use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::SessionError;

/// Settlement sent to a waiting caller
pub type ReplyResult = Result<Value, SessionError>;

/// Single-resolution handle returned by `send()`.
///
/// Resolves with the matched reply payload, or with the failure that tore the
/// session down before a reply arrived.
#[derive(Debug)]
pub struct Reply {
    rx: oneshot::Receiver<ReplyResult>,
}

impl Reply {
    /// Create a handle together with the sender that settles it
    pub(crate) fn channel() -> (oneshot::Sender<ReplyResult>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that is already settled
    pub(crate) fn settled(result: ReplyResult) -> Self {
        let (tx, reply) = Self::channel();
        let _ = tx.send(result);
        reply
    }
}

impl Future for Reply {
    type Output = ReplyResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the session task is gone
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(SessionError::Closed)))
    }
}

/// One outstanding caller expectation of a reply
#[derive(Debug)]
struct PendingRequest {
    seq: u64,
    request_id: Option<u64>,
    tx: oneshot::Sender<ReplyResult>,
}

/// Strict FIFO queue of unresolved requests, owned by the session task
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingRequest>,
    next_seq: u64,
}

impl PendingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request at the tail and return its creation sequence number
    pub fn push(&mut self, tx: oneshot::Sender<ReplyResult>, request_id: Option<u64>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(PendingRequest {
            seq,
            request_id,
            tx,
        });
        seq
    }

    /// Resolve the oldest request with `payload`. Returns its sequence number,
    /// or `None` if nothing was pending.
    pub fn resolve_oldest(&mut self, payload: Value) -> Option<u64> {
        let entry = self.entries.pop_front()?;
        // Caller may have dropped its handle; the slot is consumed regardless
        let _ = entry.tx.send(Ok(payload));
        Some(entry.seq)
    }

    /// Resolve the request carrying `request_id`. Returns its sequence number,
    /// or `None` if no such request is pending.
    pub fn resolve_id(&mut self, request_id: u64, payload: Value) -> Option<u64> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.request_id == Some(request_id))?;
        let entry = self.entries.remove(pos)?;
        let _ = entry.tx.send(Ok(payload));
        Some(entry.seq)
    }

    /// Reject every pending request with `err` and clear the queue.
    /// Returns how many were rejected.
    pub fn reject_all(&mut self, err: &SessionError) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            let _ = entry.tx.send(Err(err.clone()));
        }
        count
    }

    /// Number of unresolved requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
