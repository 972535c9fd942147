//! Job status polling.
//!
//! A poll loop fetches the status of one job, reports every record it sees,
//! and stops at the first `completed` or `failed` status. The first fetch
//! happens immediately and the next one is only scheduled once the previous
//! response has been handled, so at most one request is in flight per loop.
//! Status values the loop does not recognise keep it polling.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ClientError, ClientResult, JobState, JobStatusRecord};
use crate::infrastructure::api::ApiClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Anything that can report the current status of a job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: &str) -> ClientResult<JobStatusRecord>;
}

#[async_trait]
impl JobStatusSource for ApiClient {
    async fn job_status(&self, job_id: &str) -> ClientResult<JobStatusRecord> {
        ApiClient::job_status(self, job_id).await
    }
}

/// One item of a [`JobPoller::watch`] stream.
#[derive(Debug)]
pub enum PollEvent {
    /// A record was fetched. Emitted for every fetch, terminal or not.
    Status(JobStatusRecord),
    /// The loop ended. Always the last item.
    Settled(ClientResult<JobStatusRecord>),
}

pub type PollEvents = Pin<Box<dyn Stream<Item = PollEvent> + Send>>;

pub struct JobPoller<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S> Clone for JobPoller<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            interval: self.interval,
        }
    }
}

impl<S: JobStatusSource + 'static> JobPoller<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until the job settles. There is no way to stop this loop other
    /// than a terminal status or a fetch error; see [`JobPoller::poll_until`].
    pub async fn poll<F>(&self, job_id: &str, on_status: F) -> ClientResult<JobStatusRecord>
    where
        F: FnMut(&JobStatusRecord),
    {
        self.poll_until(job_id, &CancellationToken::new(), on_status).await
    }

    /// Polls until the job settles or `cancel` fires. Cancellation drops an
    /// in-flight fetch or the pending delay and yields [`ClientError::Cancelled`].
    pub async fn poll_until<F>(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        mut on_status: F,
    ) -> ClientResult<JobStatusRecord>
    where
        F: FnMut(&JobStatusRecord),
    {
        info!(job_id, interval_ms = self.interval.as_millis() as u64, "Polling job status");
        let mut fetches = 0u64;

        loop {
            let record = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::cancelled(job_id)),
                fetched = self.source.job_status(job_id) => fetched?,
            };
            fetches += 1;

            on_status(&record);

            match record.status {
                JobState::Completed => {
                    info!(job_id, fetches, "Job completed");
                    return Ok(record);
                }
                JobState::Failed => {
                    warn!(job_id, fetches, message = ?record.message, "Job failed");
                    return Err(ClientError::job_failed(job_id, record.message.as_deref()));
                }
                ref status => {
                    debug!(job_id, fetches, %status, progress = record.progress, "Job still running");
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::cancelled(job_id)),
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Runs the poll loop on the runtime and streams its progress.
    ///
    /// Every fetched record arrives as [`PollEvent::Status`]; the stream ends
    /// with exactly one [`PollEvent::Settled`]. Dropping the stream does not
    /// stop the loop, cancelling the token does.
    pub fn watch(&self, job_id: impl Into<String>, cancel: CancellationToken) -> PollEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = self.clone();
        let job_id = job_id.into();

        tokio::spawn(async move {
            let updates = tx.clone();
            let outcome = poller
                .poll_until(&job_id, &cancel, |record| {
                    let _ = updates.send(PollEvent::Status(record.clone()));
                })
                .await;
            if tx.send(PollEvent::Settled(outcome)).is_err() {
                debug!(job_id, "Poll receiver dropped before settling");
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}
