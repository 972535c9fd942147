//! Session-wide application state.
//!
//! The store is created once when the session starts and is owned by the UI
//! loop. Fields are private and change only through the named mutators
//! below; none of them validate their input.

use crate::domain::StlFile;
use crate::infrastructure::ClientConfig;

/// Panel shown by default inside the viewer.
pub const DEFAULT_PANEL: &str = "viewer";

/// Mutable state shared by every view of the application.
///
/// # Examples
///
/// ```
/// use v3di_slicer::application::AppState;
///
/// let mut state = AppState::new("http://localhost:8001");
/// state.set_processing(true, "Segmenting");
/// state.update_progress(42, None);
/// assert!(state.is_processing());
/// assert_eq!(state.processing_progress(), 42);
/// assert_eq!(state.processing_message(), "Segmenting");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    backend_url: String,
    user: Option<String>,
    current_study: Option<String>,
    current_series: Option<String>,
    is_processing: bool,
    processing_job: Option<String>,
    processing_progress: u8,
    processing_message: String,
    stl_files: Vec<StlFile>,
    sidebar_collapsed: bool,
    active_panel: String,
}

impl AppState {
    /// Creates the store with every optional field empty.
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            user: None,
            current_study: None,
            current_series: None,
            is_processing: false,
            processing_job: None,
            processing_progress: 0,
            processing_message: String::new(),
            stl_files: Vec::new(),
            sidebar_collapsed: false,
            active_panel: DEFAULT_PANEL.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_str())
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn current_study(&self) -> Option<&str> {
        self.current_study.as_deref()
    }

    pub fn current_series(&self) -> Option<&str> {
        self.current_series.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn processing_job(&self) -> Option<&str> {
        self.processing_job.as_deref()
    }

    pub fn processing_progress(&self) -> u8 {
        self.processing_progress
    }

    pub fn processing_message(&self) -> &str {
        &self.processing_message
    }

    pub fn stl_files(&self) -> &[StlFile] {
        &self.stl_files
    }

    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    pub fn active_panel(&self) -> &str {
        &self.active_panel
    }

    pub fn has_active_study(&self) -> bool {
        self.current_study.is_some()
    }

    pub fn has_stl_files(&self) -> bool {
        !self.stl_files.is_empty()
    }

    /// Sets the study and series together.
    pub fn set_study(&mut self, study: impl Into<String>, series: Option<String>) {
        self.current_study = Some(study.into());
        self.current_series = series;
    }

    /// Clears the study, its series, and every STL file that belonged to it.
    pub fn clear_study(&mut self) {
        self.current_study = None;
        self.current_series = None;
        self.stl_files.clear();
    }

    /// Sets the processing flag and message. Turning processing off also
    /// resets the progress to zero and forgets the job.
    pub fn set_processing(&mut self, is_processing: bool, message: &str) {
        self.is_processing = is_processing;
        self.processing_message = message.to_string();
        if !is_processing {
            self.processing_progress = 0;
            self.processing_job = None;
        }
    }

    pub fn set_processing_job(&mut self, job_id: impl Into<String>) {
        self.processing_job = Some(job_id.into());
    }

    /// Updates the progress; the message only changes when a non-empty one is given.
    pub fn update_progress(&mut self, progress: u8, message: Option<&str>) {
        self.processing_progress = progress;
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.processing_message = message.to_string();
        }
    }

    pub fn add_stl_file(&mut self, file: StlFile) {
        self.stl_files.push(file);
    }

    pub fn clear_stl_files(&mut self) {
        self.stl_files.clear();
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    pub fn clear_user(&mut self) {
        self.user = None;
    }

    pub fn set_active_panel(&mut self, panel: impl Into<String>) {
        self.active_panel = panel.into();
    }
}
