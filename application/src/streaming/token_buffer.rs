//! Token batching between a model stream and the broker.
//!
//! Model streams emit many tiny fragments; the broker prefers fewer, larger
//! writes. [`TokenBuffer`] collects fragments under a mutex and hands them to
//! a [`BatchSender`] as batches, triggered by size (caller-driven), by a
//! periodic timer, by an external cancellation or by [`TokenBuffer::stop`].
//!
//! A flush swaps the pending list out and enqueues it while still holding
//! the lock, so batches enter the queue in the order fragments were added.
//! A single background task drains the queue sequentially, which preserves
//! that order through to the sender.

use async_trait::async_trait;
use seminar_domain::TokenMessage;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Destination of flushed batches.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Deliver one batch. Failures are the sender's to log; the buffer
    /// never retries.
    async fn send_batch(&self, batch: Vec<TokenMessage>);
}

struct Pending {
    items: Vec<TokenMessage>,
    queue: Option<mpsc::UnboundedSender<Vec<TokenMessage>>>,
}

struct Shared {
    pending: Mutex<Pending>,
}

impl Shared {
    fn flush(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.items.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut pending.items);
        if let Some(queue) = &pending.queue {
            trace!(size = batch.len(), "token batch queued");
            // The receiver lives until the queue is closed below
            let _ = queue.send(batch);
        }
    }

    fn close(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.queue = None;
    }
}

/// Batching buffer with its own background flush task.
pub struct TokenBuffer {
    shared: Arc<Shared>,
    batch_size: usize,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl TokenBuffer {
    /// Create the buffer and spawn its flush loop.
    ///
    /// `cancel` is the turn's cancellation: when it fires the buffer flushes
    /// what it holds but keeps delivering until [`stop`](Self::stop).
    pub fn start(
        batch_size: usize,
        flush_interval: Duration,
        sender: Arc<dyn BatchSender>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                items: Vec::with_capacity(batch_size),
                queue: Some(tx),
            }),
        });
        let stop = CancellationToken::new();

        let task = tokio::spawn(run_flush_loop(
            Arc::clone(&shared),
            rx,
            sender,
            flush_interval,
            stop.clone(),
            cancel,
        ));

        Self {
            shared,
            batch_size: batch_size.max(1),
            stop,
            task,
        }
    }

    /// Append a fragment. Returns `true` once the pending list has reached
    /// the batch size; the caller decides whether to [`flush`](Self::flush).
    pub fn add(&self, message: TokenMessage) -> bool {
        let mut pending = self.shared.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.items.push(message);
        pending.items.len() >= self.batch_size
    }

    /// Hand the pending fragments to the sender. No-op when empty.
    pub fn flush(&self) {
        self.shared.flush();
    }

    pub fn pending_len(&self) -> usize {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .items
            .len()
    }

    /// Flush everything, wait until every queued batch has been sent, and
    /// shut the flush loop down.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "token buffer task ended abnormally");
        }
    }
}

async fn run_flush_loop(
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<Vec<TokenMessage>>,
    sender: Arc<dyn BatchSender>,
    flush_interval: Duration,
    stop: CancellationToken,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cancel_seen = false;

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                shared.flush();
            }
            Some(batch) = rx.recv() => sender.send_batch(batch).await,
            _ = ticker.tick() => shared.flush(),
        }
    }

    shared.flush();
    shared.close();
    while let Some(batch) = rx.recv().await {
        sender.send_batch(batch).await;
    }
}
