use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Status of a server-side segmentation job.
///
/// Values the service may add later are kept verbatim in `Other` so a
/// caller can still display them; only `Completed` and `Failed` end a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Pending,
    Queued,
    Running,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Pending => "pending",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl From<String> for JobState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => JobState::Pending,
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "processing" => JobState::Processing,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            _ => JobState::Other(value),
        }
    }
}

impl From<JobState> for String {
    fn from(value: JobState) -> Self {
        match value {
            JobState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segmentation model requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Teeth,
    Anatomy,
    Implant,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Teeth => "teeth",
            ModelType::Anatomy => "anatomy",
            ModelType::Implant => "implant",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ModelType::Teeth => ModelType::Anatomy,
            ModelType::Anatomy => ModelType::Implant,
            ModelType::Implant => ModelType::Teeth,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teeth" => Ok(ModelType::Teeth),
            "anatomy" => Ok(ModelType::Anatomy),
            "implant" => Ok(ModelType::Implant),
            other => Err(format!("unknown model type '{other}' (expected teeth, anatomy or implant)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub slicer_available: bool,
    #[serde(default)]
    pub slicer_path: Option<String>,
    #[serde(default)]
    pub active_jobs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub study_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRequest {
    pub study_id: String,
    pub model_type: ModelType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Descriptor of one mesh produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlFile {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

impl StlFile {
    /// File name component of the download URL (`tooth_11.stl`).
    pub fn filename(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// The service hands back paths relative to its own root.
    pub fn absolute_url(&self, base_url: &str) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), self.url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    #[serde(default)]
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stl_urls: Vec<StlFile>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl JobStatusRecord {
    pub fn new(job_id: impl Into<String>, status: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: 0,
            message: None,
            stl_urls: Vec::new(),
            result: None,
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_stl(mut self, file: StlFile) -> Self {
        self.stl_urls.push(file);
        self
    }
}

/// `GET /jobs` answers with `{"jobs": [...]}`; older builds sent the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobListing {
    Envelope { jobs: Vec<JobDescriptor> },
    Bare(Vec<JobDescriptor>),
}

impl JobListing {
    pub fn into_jobs(self) -> Vec<JobDescriptor> {
        match self {
            JobListing::Envelope { jobs } | JobListing::Bare(jobs) => jobs,
        }
    }
}

/// Builds the static download location of a job artifact. Performs no I/O.
pub fn stl_download_url(base_url: &str, job_id: &str, filename: &str) -> String {
    format!("{}/download/stl/{}/{}", base_url.trim_end_matches('/'), job_id, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_exact() {
        assert_eq!(stl_download_url("http://x", "j1", "out.stl"), "http://x/download/stl/j1/out.stl");
        assert_eq!(stl_download_url("http://x/", "j1", "out.stl"), "http://x/download/stl/j1/out.stl");
    }

    #[test]
    fn test_job_state_keeps_unknown_values() {
        let record: JobStatusRecord = serde_json::from_str(r#"{"status":"completd"}"#).unwrap();
        assert_eq!(record.status, JobState::Other("completd".to_string()));
        assert!(!record.status.is_terminal());
        assert_eq!(String::from(record.status), "completd");
    }

    #[test]
    fn test_status_record_from_backend_payload() {
        let json = r#"{
            "job_id": "a1b2",
            "status": "completed",
            "progress": 100,
            "message": "Segmentation complete",
            "stl_urls": [{"name": "tooth_11", "url": "/download/stl/a1b2/tooth_11.stl", "size": 134}],
            "result": {"teeth_count": 1}
        }"#;
        let record: JobStatusRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, JobState::Completed);
        assert!(record.status.is_terminal());
        assert_eq!(record.stl_urls[0].filename(), "tooth_11.stl");
        assert_eq!(
            record.stl_urls[0].absolute_url("http://host:8001/"),
            "http://host:8001/download/stl/a1b2/tooth_11.stl"
        );
    }

    #[test]
    fn test_job_listing_accepts_both_shapes() {
        let envelope: JobListing =
            serde_json::from_str(r#"{"jobs":[{"job_id":"1","status":"queued","progress":0}]}"#).unwrap();
        let bare: JobListing = serde_json::from_str(r#"[{"job_id":"2","status":"processing"}]"#).unwrap();
        assert_eq!(envelope.into_jobs()[0].status, JobState::Queued);
        assert_eq!(bare.into_jobs()[0].job_id, "2");
    }

    #[test]
    fn test_model_type_wire_format() {
        let req = SegmentationRequest { study_id: "s1".to_string(), model_type: ModelType::default() };
        assert_eq!(serde_json::to_value(&req).unwrap(), serde_json::json!({"study_id": "s1", "model_type": "teeth"}));
        assert_eq!("Implant".parse::<ModelType>(), Ok(ModelType::Implant));
        assert!("bones".parse::<ModelType>().is_err());
        assert_eq!(ModelType::Implant.next(), ModelType::Teeth);
    }
}
