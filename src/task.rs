//! Asynchronous task records and the completion waiter.
//!
//! Mutating operations are accepted by the server as tasks. [`TaskInfo`] is
//! the handle returned when the request is accepted, [`Task`] a snapshot of
//! its current state fetched from `GET /tasks/{uid}`. [`wait_for_task`]
//! polls snapshots until the task reaches a terminal status or the wait
//! deadline passes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::error::ApiError;
use crate::timestamp;
use crate::ClientError;

/// Lifecycle status of a task.
///
/// Transitions only go `Enqueued -> Processing -> {Succeeded, Failed, Cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    #[serde(rename = "canceled", alias = "cancelled")]
    Cancelled,
}

impl TaskStatus {
    /// No further transitions happen once a task is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueued => write!(f, "enqueued"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Handle returned when the server accepts a mutating request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    #[serde(alias = "taskUid")]
    pub uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub enqueued_at: Option<DateTime<Utc>>,
}

/// Point-in-time snapshot of a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub error: Option<ApiError>,
    /// ISO 8601 duration as reported by the server (`PT0.1S`).
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_succeeded(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    /// Returns the task when it succeeded, [`ClientError::TaskFailed`] otherwise.
    pub fn into_result(self) -> Result<Self, ClientError> {
        if self.is_succeeded() {
            Ok(self)
        } else {
            Err(ClientError::TaskFailed(Box::new(self)))
        }
    }
}

/// Source of task snapshots polled by [`wait_for_task`].
pub trait TaskSource {
    fn fetch_task(&self, task_uid: u64) -> impl Future<Output = Result<Task, ClientError>> + Send;
}

/// Polling configuration for [`wait_for_task`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// Total time to wait before giving up.
    pub timeout: Duration,
    /// Delay before the second fetch.
    pub interval: Duration,
    /// Added to the delay after every non-terminal fetch.
    pub interval_step: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            interval: Duration::from_millis(50),
            interval_step: Duration::from_millis(50),
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_interval_step(mut self, step: Duration) -> Self {
        self.interval_step = step;
        self
    }
}

/// Additively growing delay between two polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollInterval {
    current: Duration,
    step: Duration,
}

impl PollInterval {
    pub fn new(initial: Duration, step: Duration) -> Self {
        Self {
            current: initial,
            step,
        }
    }

    /// Returns the delay to use now and grows the next one by the step.
    pub fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_add(self.step);
        delay
    }
}

/// Polls `source` until the task is terminal or `options.timeout` elapses.
///
/// A `failed` or `cancelled` task is returned as `Ok`; callers inspect
/// [`Task::status`] and [`Task::error`]. Only the polling itself failing
/// (communication error, timeout) is an `Err`. No sleep follows a terminal
/// fetch, and no fetch follows the deadline. A fetch still in flight when
/// the deadline passes is dropped.
pub async fn wait_for_task<S>(
    source: &S,
    task_uid: u64,
    options: &WaitOptions,
) -> Result<Task, ClientError>
where
    S: TaskSource + ?Sized,
{
    let started = Instant::now();
    let mut interval = PollInterval::new(options.interval, options.interval_step);

    loop {
        let remaining = options.timeout.saturating_sub(started.elapsed());
        let Ok(fetched) = timeout(remaining, source.fetch_task(task_uid)).await else {
            let elapsed = started.elapsed();
            debug!(task_uid, ?elapsed, "task fetch cut off by the wait deadline");
            return Err(ClientError::Timeout { task_uid, elapsed });
        };
        let task = fetched?;
        if task.status.is_terminal() {
            debug!(task_uid, status = %task.status, "task finished");
            return Ok(task);
        }

        let remaining = options.timeout.saturating_sub(started.elapsed());
        let delay = interval.advance().min(remaining);
        debug!(task_uid, status = %task.status, ?delay, "task not finished");
        sleep(delay).await;

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(ClientError::Timeout { task_uid, elapsed });
        }
    }
}
