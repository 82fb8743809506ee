//! Non-blocking audit logging.
//!
//! Callers hand entries to [`AuditLogger::log`], which never awaits the sink.
//! A background task drains a bounded queue and writes each entry with a
//! timeout; failures are logged and dropped.

use crate::entry::AuditEntry;
use crate::error::{AuditError, Result};
use crate::sink::AuditSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

enum Command {
    Write(Box<AuditEntry>),
    Flush(oneshot::Sender<()>),
}

/// Cheap to clone handle to the audit worker.
#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::Sender<Command>,
}

impl AuditLogger {
    /// Starts the background writer. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>) -> Self {
        Self::spawn_with(sink, DEFAULT_QUEUE_CAPACITY, DEFAULT_WRITE_TIMEOUT)
    }

    pub fn spawn_with(sink: Arc<dyn AuditSink>, capacity: usize, write_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(sink, rx, write_timeout));
        Self { tx }
    }

    /// Queues an entry without waiting. A full or closed queue drops the entry with a warning.
    pub fn log(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        match self.tx.try_send(Command::Write(Box::new(entry))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(action = %action, "Audit queue full, dropping entry");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(action = %action, "Audit worker stopped, dropping entry");
            }
        }
    }

    /// Waits until every entry queued before this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Closed`] if the worker has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(done_tx))
            .await
            .map_err(|_| AuditError::Closed)?;
        done_rx.await.map_err(|_| AuditError::Closed)
    }
}

async fn run_worker(sink: Arc<dyn AuditSink>, mut rx: mpsc::Receiver<Command>, write_timeout: Duration) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(entry) => {
                let outcome = tokio::time::timeout(write_timeout, sink.write(&entry)).await;
                match outcome {
                    Ok(Ok(())) => debug!(action = %entry.action, audit_id = %entry.id, "Audit entry written"),
                    Ok(Err(e)) => warn!(action = %entry.action, audit_id = %entry.id, error = %e, "Audit write failed"),
                    Err(_) => warn!(
                        action = %entry.action,
                        audit_id = %entry.id,
                        error = %AuditError::Timeout(u64::try_from(write_timeout.as_millis()).unwrap_or(u64::MAX)),
                        "Audit write failed"
                    ),
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
