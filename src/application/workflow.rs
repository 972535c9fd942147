//! Bridges user actions to the remote service.
//!
//! Input handling produces [`Command`]s. The [`Dispatcher`] runs each one
//! as a background task and reports back through an [`AppEvent`] channel;
//! only the UI loop applies those events to the store.

use std::path::PathBuf;

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{ClientResult, HealthStatus, JobDescriptor, ModelType, UploadResult};
use crate::infrastructure::{clipboard, ApiClient, JobPoller, PollEvent};

/// Work requested by the user that needs I/O.
#[derive(Debug, Clone)]
pub enum Command {
    CheckHealth,
    RefreshJobs,
    Upload(PathBuf),
    StartSegmentation { study_id: String, model_type: ModelType },
    TrackJob { job_id: String, cancel: CancellationToken },
    CopyToClipboard(String),
    DownloadStl { job_id: String, filename: String, dest: PathBuf },
}

/// Result of a background task, delivered to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    HealthChecked(ClientResult<HealthStatus>),
    JobsListed(ClientResult<Vec<JobDescriptor>>),
    UploadProgress(u8),
    Uploaded(ClientResult<UploadResult>),
    SegmentationStarted(ClientResult<JobDescriptor>),
    Poll { job_id: String, event: PollEvent },
    Copied(ClientResult<String>),
    Downloaded(ClientResult<PathBuf>),
}

pub struct Dispatcher {
    client: ApiClient,
    poller: JobPoller<ApiClient>,
    events: UnboundedSender<AppEvent>,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(client: ApiClient, events: UnboundedSender<AppEvent>, runtime: Handle) -> Self {
        let poller = JobPoller::new(std::sync::Arc::new(client.clone())).with_interval(client.config().poll_interval);
        Self {
            client,
            poller,
            events,
            runtime,
        }
    }

    /// Spawns the task for `command`. Returns immediately.
    pub fn dispatch(&self, command: Command) {
        debug!(?command, "Dispatching");
        let client = self.client.clone();
        let tx = self.events.clone();

        match command {
            Command::CheckHealth => {
                self.runtime.spawn(async move {
                    send(&tx, AppEvent::HealthChecked(client.health().await));
                });
            }
            Command::RefreshJobs => {
                self.runtime.spawn(async move {
                    send(&tx, AppEvent::JobsListed(client.list_jobs().await));
                });
            }
            Command::Upload(path) => {
                self.runtime.spawn(async move {
                    let progress = tx.clone();
                    let result = client
                        .upload_dicom_with_progress(&path, move |p| {
                            let _ = progress.send(AppEvent::UploadProgress(p));
                        })
                        .await;
                    send(&tx, AppEvent::Uploaded(result));
                });
            }
            Command::StartSegmentation { study_id, model_type } => {
                self.runtime.spawn(async move {
                    send(&tx, AppEvent::SegmentationStarted(client.start_segmentation(&study_id, model_type).await));
                });
            }
            Command::TrackJob { job_id, cancel } => {
                let poller = self.poller.clone();
                self.runtime.spawn(async move {
                    let mut updates = poller.watch(job_id.clone(), cancel);
                    while let Some(event) = updates.next().await {
                        send(&tx, AppEvent::Poll { job_id: job_id.clone(), event });
                    }
                });
            }
            Command::CopyToClipboard(text) => {
                self.runtime.spawn_blocking(move || {
                    let result = clipboard::copy_text(&text).map(|()| text);
                    send(&tx, AppEvent::Copied(result));
                });
            }
            Command::DownloadStl { job_id, filename, dest } => {
                self.runtime.spawn(async move {
                    let result = client.download_stl(&job_id, &filename, &dest).await.map(|_| dest);
                    send(&tx, AppEvent::Downloaded(result));
                });
            }
        }
    }
}

fn send(tx: &UnboundedSender<AppEvent>, event: AppEvent) {
    if tx.send(event).is_err() {
        warn!("UI loop has gone away, dropping event");
    }
}
