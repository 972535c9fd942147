//! Terminal session state.
//!
//! `App` owns the [`AppState`] store together with everything the terminal
//! UI needs on top of it: the active route, the input mode, and the results
//! of the last background calls.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::store::AppState;
use crate::application::workflow::{AppEvent, Command};
use crate::domain::{routes, ClientError, HealthStatus, JobDescriptor, ModelType, Route, StlFile, View};
use crate::infrastructure::{ClientConfig, PollEvent};

/// Represents the current mode of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Navigation mode - shortcuts available
    Normal,
    /// User is typing the path of a DICOM file to upload
    UploadPath,
    /// Help screen is displayed
    Help,
}

/// Main application state for the terminal UI.
///
/// # Examples
///
/// ```
/// use v3di_slicer::application::App;
/// use v3di_slicer::domain::View;
///
/// let mut app = App::default();
/// assert_eq!(app.route.view, View::Dashboard);
/// assert!(app.navigate("/settings"));
/// assert_eq!(app.route.view, View::Settings);
/// ```
#[derive(Debug)]
pub struct App {
    /// Session store shared by every view
    pub state: AppState,
    /// Configuration the session was started with
    pub config: ClientConfig,
    /// Route currently displayed
    pub route: &'static Route,
    /// Current input mode
    pub mode: AppMode,
    /// Input buffer for the upload path prompt
    pub input: String,
    /// Cursor position within the input buffer
    pub cursor_position: usize,
    /// Scroll position in help text
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Last health payload received from the backend
    pub health: Option<HealthStatus>,
    /// Last job listing received from the backend
    pub jobs: Vec<JobDescriptor>,
    /// Index of the highlighted STL file in the viewer
    pub selected_stl: usize,
    /// Model requested by the next segmentation
    pub model_type: ModelType,
    /// Upload progress while an upload is running
    pub upload_progress: Option<u8>,
    tracking: Option<CancellationToken>,
}

impl Default for App {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl App {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            state: AppState::from_config(&config),
            config,
            route: Route::home(),
            mode: AppMode::Normal,
            input: String::new(),
            cursor_position: 0,
            help_scroll: 0,
            status_message: None,
            health: None,
            jobs: Vec::new(),
            selected_stl: 0,
            model_type: ModelType::default(),
            upload_progress: None,
            tracking: None,
        }
    }

    /// Switches to the route registered for `path`. Unknown paths leave the
    /// current route in place and return `false`.
    pub fn navigate(&mut self, path: &str) -> bool {
        match routes::resolve(path) {
            Some(route) => {
                self.route = route;
                true
            }
            None => {
                self.status_message = Some(format!("No route for {path}"));
                false
            }
        }
    }

    pub fn show_view(&mut self, view: View) {
        self.route = Route::for_view(view);
    }

    pub fn next_route(&mut self) {
        self.route = self.route.next();
    }

    pub fn previous_route(&mut self) {
        self.route = self.route.previous();
    }

    pub fn show_help(&mut self) {
        self.mode = AppMode::Help;
        self.help_scroll = 0;
    }

    /// Opens the upload prompt.
    pub fn start_upload_prompt(&mut self) {
        self.mode = AppMode::UploadPath;
        self.input.clear();
        self.cursor_position = 0;
        self.status_message = None;
    }

    pub fn cancel_input(&mut self) {
        self.mode = AppMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Closes the prompt and asks for the typed file to be uploaded.
    pub fn submit_upload(&mut self) -> Option<Command> {
        let path = self.input.trim().to_string();
        self.cancel_input();
        if path.is_empty() {
            self.status_message = Some("Upload cancelled: no file given".to_string());
            return None;
        }
        self.upload_progress = Some(0);
        self.status_message = Some(format!("Uploading {path}..."));
        Some(Command::Upload(PathBuf::from(path)))
    }

    /// Requests a segmentation of the current study with the selected model.
    pub fn start_segmentation(&mut self) -> Option<Command> {
        if self.state.is_processing() {
            self.status_message = Some("A segmentation job is already running".to_string());
            return None;
        }
        let Some(study_id) = self.state.current_study() else {
            self.status_message = Some("Upload a study before starting a segmentation".to_string());
            return None;
        };
        let command = Command::StartSegmentation {
            study_id: study_id.to_string(),
            model_type: self.model_type,
        };
        self.state.set_processing(true, "Submitting segmentation job");
        Some(command)
    }

    pub fn cycle_model_type(&mut self) {
        self.model_type = self.model_type.next();
    }

    /// Starts tracking `job_id`, replacing any previous tracking token.
    pub fn track_job(&mut self, job_id: impl Into<String>) -> Command {
        let job_id = job_id.into();
        if let Some(previous) = self.tracking.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.tracking = Some(cancel.clone());
        self.state.set_processing_job(job_id.clone());
        Command::TrackJob { job_id, cancel }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    /// Stops polling the current job and leaves the processing state.
    pub fn cancel_tracking(&mut self) {
        match self.tracking.take() {
            Some(cancel) => {
                cancel.cancel();
                self.state.set_processing(false, "");
                self.status_message = Some("Stopped tracking the segmentation job".to_string());
            }
            None => {
                self.status_message = Some("No job is being tracked".to_string());
            }
        }
    }

    /// Drops the current study together with its meshes and any job running for it.
    pub fn clear_study(&mut self) {
        self.abandon_job();
        self.state.clear_study();
        self.selected_stl = 0;
        self.status_message = Some("Study cleared".to_string());
    }

    /// Stops tracking and leaves the processing state without a status message.
    fn abandon_job(&mut self) {
        if let Some(cancel) = self.tracking.take() {
            info!(job_id = ?self.state.processing_job(), "Abandoning segmentation job");
            cancel.cancel();
        }
        if self.state.is_processing() {
            self.state.set_processing(false, "");
        }
    }

    pub fn select_next_stl(&mut self) {
        let count = self.state.stl_files().len();
        if count > 0 && self.selected_stl + 1 < count {
            self.selected_stl += 1;
        }
    }

    pub fn select_previous_stl(&mut self) {
        self.selected_stl = self.selected_stl.saturating_sub(1);
    }

    pub fn selected_stl(&self) -> Option<&StlFile> {
        self.state.stl_files().get(self.selected_stl)
    }

    /// Download location of the highlighted STL file.
    pub fn selected_download_url(&self) -> Option<String> {
        self.selected_stl().map(|file| file.absolute_url(self.state.backend_url()))
    }

    pub fn copy_selected_url(&mut self) -> Option<Command> {
        match self.selected_download_url() {
            Some(url) => Some(Command::CopyToClipboard(url)),
            None => {
                self.status_message = Some("No STL file selected".to_string());
                None
            }
        }
    }

    /// Saves the highlighted STL file into the working directory.
    pub fn download_selected(&mut self) -> Option<Command> {
        let Some(file) = self.selected_stl() else {
            self.status_message = Some("No STL file selected".to_string());
            return None;
        };
        let filename = file.filename().to_string();
        let job_id = file
            .url
            .trim_end_matches(&filename)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Some(Command::DownloadStl {
            job_id,
            dest: PathBuf::from(&filename),
            filename,
        })
    }

    /// Applies the outcome of a background task. May return a follow-up command.
    pub fn handle_event(&mut self, event: AppEvent) -> Option<Command> {
        match event {
            AppEvent::HealthChecked(Ok(health)) => {
                self.status_message = Some(format!("Backend is {}", health.status));
                self.health = Some(health);
            }
            AppEvent::HealthChecked(Err(e)) => {
                self.health = None;
                self.status_message = Some(format!("Health check failed: {e}"));
            }
            AppEvent::JobsListed(Ok(jobs)) => {
                self.status_message = Some(format!("{} job(s) on the backend", jobs.len()));
                self.jobs = jobs;
            }
            AppEvent::JobsListed(Err(e)) => {
                self.status_message = Some(format!("Could not list jobs: {e}"));
            }
            AppEvent::UploadProgress(percent) => {
                self.upload_progress = Some(percent);
            }
            AppEvent::Uploaded(Ok(upload)) => {
                self.upload_progress = None;
                if self.state.current_study() != Some(upload.study_id.as_str()) {
                    self.abandon_job();
                    self.state.clear_study();
                }
                self.state.set_study(upload.study_id.clone(), None);
                self.selected_stl = 0;
                self.status_message = Some(format!("Uploaded study {}", upload.study_id));
            }
            AppEvent::Uploaded(Err(e)) => {
                self.upload_progress = None;
                self.status_message = Some(format!("Upload failed: {e}"));
            }
            AppEvent::SegmentationStarted(Ok(job)) if !self.state.is_processing() => {
                info!(job_id = %job.job_id, "Ignoring job submitted for a study that was since dropped");
            }
            AppEvent::SegmentationStarted(Ok(job)) => {
                info!(job_id = %job.job_id, "Segmentation job accepted");
                self.state.set_processing(true, "Segmenting");
                self.show_view(View::Segmentation);
                return Some(self.track_job(job.job_id));
            }
            AppEvent::SegmentationStarted(Err(e)) => {
                self.state.set_processing(false, "");
                self.status_message = Some(format!("Could not start segmentation: {e}"));
            }
            AppEvent::Poll { job_id, event } => self.apply_poll_event(&job_id, event),
            AppEvent::Copied(Ok(url)) => {
                self.status_message = Some(format!("Copied {url}"));
            }
            AppEvent::Copied(Err(e)) | AppEvent::Downloaded(Err(e)) => {
                self.status_message = Some(e.to_string());
            }
            AppEvent::Downloaded(Ok(path)) => {
                self.status_message = Some(format!("Saved {}", path.display()));
            }
        }
        None
    }

    fn apply_poll_event(&mut self, job_id: &str, event: PollEvent) {
        // Late events from a job that is no longer tracked.
        if self.state.processing_job() != Some(job_id) {
            return;
        }

        match event {
            PollEvent::Status(record) => {
                self.state.update_progress(record.progress, record.message.as_deref());
            }
            PollEvent::Settled(Ok(record)) => {
                self.tracking = None;
                let count = record.stl_urls.len();
                for file in record.stl_urls {
                    self.state.add_stl_file(file);
                }
                let message = record.message.unwrap_or_default();
                self.state.set_processing(false, &message);
                self.show_view(View::Viewer);
                self.status_message = Some(format!("Job {job_id} completed with {count} mesh(es)"));
            }
            PollEvent::Settled(Err(e)) => {
                self.tracking = None;
                self.state.set_processing(false, "");
                self.status_message = Some(match e {
                    ClientError::JobFailed { message, .. } => format!("Job {job_id} failed: {message}"),
                    other => format!("Lost track of job {job_id}: {other}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobState, JobStatusRecord, UploadResult};

    fn app_with_study() -> App {
        let mut app = App::default();
        app.handle_event(AppEvent::Uploaded(Ok(UploadResult {
            study_id: "ab12cd34".to_string(),
            filename: Some("scan.zip".to_string()),
            path: None,
        })));
        app
    }

    fn tooth(name: &str) -> StlFile {
        StlFile {
            name: name.to_string(),
            url: format!("/download/stl/j1/{name}.stl"),
            size: 134,
        }
    }

    fn started(app: &mut App) -> String {
        let Some(Command::StartSegmentation { study_id, .. }) = app.start_segmentation() else {
            panic!("segmentation was not requested");
        };
        assert_eq!(study_id, "ab12cd34");
        let follow_up = app.handle_event(AppEvent::SegmentationStarted(Ok(JobDescriptor {
            job_id: "j1".to_string(),
            status: JobState::Queued,
            progress: 0,
            created_at: None,
        })));
        match follow_up {
            Some(Command::TrackJob { job_id, .. }) => job_id,
            other => panic!("expected TrackJob, got {other:?}"),
        }
    }

    #[test]
    fn test_app_default() {
        let app = App::default();
        assert_eq!(app.route.view, View::Dashboard);
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.input.is_empty());
        assert!(app.status_message.is_none());
        assert_eq!(app.model_type, ModelType::Teeth);
        assert!(!app.is_tracking());
    }

    #[test]
    fn test_navigate_unknown_path_keeps_route() {
        let mut app = App::default();
        assert!(app.navigate("/viewer"));
        assert!(!app.navigate("/admin"));
        assert_eq!(app.route.view, View::Viewer);
        assert_eq!(app.status_message.as_deref(), Some("No route for /admin"));
    }

    #[test]
    fn test_upload_prompt_flow() {
        let mut app = App::default();
        app.start_upload_prompt();
        assert_eq!(app.mode, AppMode::UploadPath);
        app.input = " /data/scan.zip ".to_string();

        match app.submit_upload() {
            Some(Command::Upload(path)) => assert_eq!(path, PathBuf::from("/data/scan.zip")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.upload_progress, Some(0));

        app.start_upload_prompt();
        assert!(app.submit_upload().is_none());
    }

    #[test]
    fn test_upload_sets_study() {
        let app = app_with_study();
        assert_eq!(app.state.current_study(), Some("ab12cd34"));
        assert!(app.upload_progress.is_none());
    }

    #[test]
    fn test_segmentation_requires_study() {
        let mut app = App::default();
        assert!(app.start_segmentation().is_none());
        assert!(!app.state.is_processing());
    }

    #[test]
    fn test_segmentation_completes_into_viewer() {
        let mut app = app_with_study();
        let job_id = started(&mut app);
        assert!(app.is_tracking());
        assert_eq!(app.state.processing_job(), Some("j1"));
        assert_eq!(app.route.view, View::Segmentation);
        assert!(app.start_segmentation().is_none());

        app.handle_event(AppEvent::Poll {
            job_id: job_id.clone(),
            event: PollEvent::Status(
                JobStatusRecord::new("j1", JobState::Processing)
                    .with_progress(50)
                    .with_message("Running AI inference..."),
            ),
        });
        assert_eq!(app.state.processing_progress(), 50);
        assert_eq!(app.state.processing_message(), "Running AI inference...");

        let done = JobStatusRecord::new("j1", JobState::Completed)
            .with_progress(100)
            .with_message("Segmentation complete")
            .with_stl(tooth("tooth_11"))
            .with_stl(tooth("tooth_12"));
        app.handle_event(AppEvent::Poll { job_id, event: PollEvent::Settled(Ok(done)) });

        assert!(!app.state.is_processing());
        assert_eq!(app.state.processing_progress(), 0);
        assert!(app.state.processing_job().is_none());
        assert_eq!(app.state.stl_files().len(), 2);
        assert_eq!(app.route.view, View::Viewer);
        assert!(!app.is_tracking());
        assert_eq!(
            app.selected_download_url().as_deref(),
            Some("http://localhost:8001/download/stl/j1/tooth_11.stl")
        );
    }

    #[test]
    fn test_failed_job_surfaces_message() {
        let mut app = app_with_study();
        let job_id = started(&mut app);

        app.handle_event(AppEvent::Poll {
            job_id,
            event: PollEvent::Settled(Err(ClientError::job_failed("j1", Some("Slicer not found")))),
        });

        assert!(!app.state.is_processing());
        assert_eq!(app.status_message.as_deref(), Some("Job j1 failed: Slicer not found"));
    }

    #[test]
    fn test_cancel_tracking_ignores_late_events() {
        let mut app = app_with_study();
        let job_id = started(&mut app);

        app.cancel_tracking();
        assert!(!app.state.is_processing());
        assert!(!app.is_tracking());

        app.handle_event(AppEvent::Poll {
            job_id,
            event: PollEvent::Status(JobStatusRecord::new("j1", JobState::Processing).with_progress(90)),
        });
        assert_eq!(app.state.processing_progress(), 0);
    }

    #[test]
    fn test_clear_study_drops_results() {
        let mut app = app_with_study();
        app.state.add_stl_file(tooth("tooth_21"));
        app.selected_stl = 0;

        app.clear_study();
        assert!(!app.state.has_active_study());
        assert!(app.selected_stl().is_none());
        assert!(app.copy_selected_url().is_none());
    }

    #[test]
    fn test_clear_study_mid_job_discards_its_results() {
        let mut app = app_with_study();
        let job_id = started(&mut app);

        app.clear_study();
        assert!(!app.is_tracking());
        assert!(!app.state.is_processing());

        let done = JobStatusRecord::new("j1", JobState::Completed).with_stl(tooth("tooth_11"));
        app.handle_event(AppEvent::Poll { job_id, event: PollEvent::Settled(Ok(done)) });
        assert!(!app.state.has_active_study());
        assert!(!app.state.has_stl_files());
    }

    #[test]
    fn test_new_upload_replaces_previous_meshes() {
        let mut app = app_with_study();
        app.state.add_stl_file(tooth("tooth_11"));

        app.handle_event(AppEvent::Uploaded(Ok(UploadResult {
            study_id: "ef56gh78".to_string(),
            filename: Some("second.zip".to_string()),
            path: None,
        })));
        assert_eq!(app.state.current_study(), Some("ef56gh78"));
        assert!(!app.state.has_stl_files());
    }

    #[test]
    fn test_upload_during_job_stops_tracking_it() {
        let mut app = app_with_study();
        let job_id = started(&mut app);

        app.handle_event(AppEvent::Uploaded(Ok(UploadResult {
            study_id: "ef56gh78".to_string(),
            filename: None,
            path: None,
        })));
        assert!(!app.is_tracking());

        let done = JobStatusRecord::new("j1", JobState::Completed).with_stl(tooth("tooth_11"));
        app.handle_event(AppEvent::Poll { job_id, event: PollEvent::Settled(Ok(done)) });
        assert_eq!(app.state.current_study(), Some("ef56gh78"));
        assert!(!app.state.has_stl_files());
    }

    #[test]
    fn test_job_accepted_after_clear_is_not_tracked() {
        let mut app = app_with_study();
        assert!(app.start_segmentation().is_some());
        app.clear_study();

        let follow_up = app.handle_event(AppEvent::SegmentationStarted(Ok(JobDescriptor {
            job_id: "j1".to_string(),
            status: JobState::Queued,
            progress: 0,
            created_at: None,
        })));
        assert!(follow_up.is_none());
        assert!(!app.is_tracking());
        assert!(app.state.processing_job().is_none());
    }

    #[test]
    fn test_download_selected_derives_job_and_file() {
        let mut app = App::default();
        app.state.add_stl_file(tooth("tooth_11"));
        app.state.add_stl_file(tooth("tooth_12"));
        app.select_next_stl();
        app.select_next_stl();

        match app.download_selected() {
            Some(Command::DownloadStl { job_id, filename, dest }) => {
                assert_eq!(job_id, "j1");
                assert_eq!(filename, "tooth_12.stl");
                assert_eq!(dest, PathBuf::from("tooth_12.stl"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_model_type() {
        let mut app = App::default();
        app.cycle_model_type();
        assert_eq!(app.model_type, ModelType::Anatomy);
    }
}
