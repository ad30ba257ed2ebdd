//! Fire-and-forget background work
//!
//! Side effects that must never influence a response (post-create hooks,
//! webhook notifications) are handed to [`BackgroundTasks`]. Each job runs on
//! its own tokio task, at most once and without retry. Failures are logged
//! and reported on a broadcast channel, never returned to the caller.
//!
//! ```text
//! create handler ──▶ BackgroundTasks::dispatch() ──▶ tokio::spawn(job)
//!                                                      └──▶ TaskReport ──▶ subscribers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let tasks = BackgroundTasks::new(64);
//! let mut rx = tasks.subscribe();
//!
//! tasks.dispatch("stores.after_create", async move {
//!     notify(&store).await
//! });
//!
//! let report = rx.recv().await?;
//! assert!(report.succeeded());
//! ```

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Result of a background job
pub type JobResult = anyhow::Result<()>;

/// A boxed background job
pub type Job = BoxFuture<'static, JobResult>;

/// Outcome of one background job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    /// Label given at dispatch time
    pub label: String,
    /// When the job finished
    pub finished_at: DateTime<Utc>,
    /// Error message if the job failed
    pub error: Option<String>,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Dispatcher for best-effort jobs
///
/// Cheap to clone and shareable across handlers.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    reports: broadcast::Sender<TaskReport>,
}

impl BackgroundTasks {
    /// Create a dispatcher whose report channel buffers `capacity` reports
    pub fn new(capacity: usize) -> Self {
        let (reports, _) = broadcast::channel(capacity);
        Self { reports }
    }

    /// Run a job in the background
    ///
    /// The job is never retried. A failure is logged at `warn` level.
    pub fn dispatch<F>(&self, label: impl Into<String>, job: F) -> JoinHandle<()>
    where
        F: Future<Output = JobResult> + Send + 'static,
    {
        let label = label.into();
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let error = match job.await {
                Ok(()) => {
                    tracing::debug!(task = %label, "background task finished");
                    None
                }
                Err(e) => {
                    tracing::warn!(task = %label, error = %e, "background task failed");
                    Some(e.to_string())
                }
            };

            // No subscribers is fine
            let _ = reports.send(TaskReport {
                label,
                finished_at: Utc::now(),
                error,
            });
        })
    }

    /// Subscribe to reports of jobs finishing after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TaskReport> {
        self.reports.subscribe()
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new(256)
    }
}
