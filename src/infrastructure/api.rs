//! HTTP client for the segmentation service.
//!
//! Every call issues exactly one request and hands back the decoded body.
//! Transport and status failures are returned as they come from `reqwest`;
//! nothing here retries.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::domain::{
    stl_download_url, ClientResult, HealthStatus, JobDescriptor, JobListing, JobStatusRecord, ModelType,
    SegmentationRequest, UploadResult,
};
use crate::infrastructure::config::ClientConfig;

/// Size of the pieces an upload body is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Client for the segmentation service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Builds a client from configuration. Fails if the base address is not
    /// an absolute URL or the HTTP stack cannot be initialised.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.config.base_str()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub async fn health(&self) -> ClientResult<HealthStatus> {
        debug!("GET /health");
        let response = self.http_client.get(self.endpoint("/health")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn upload_dicom(&self, path: &Path) -> ClientResult<UploadResult> {
        self.upload_dicom_with_progress(path, |_| {}).await
    }

    /// Uploads a DICOM file (or zip archive) as the multipart field `file`.
    ///
    /// `on_progress` receives `floor(sent * 100 / total)` each time a chunk
    /// of the body is handed to the transport. An empty file reports 100.
    pub async fn upload_dicom_with_progress<F>(&self, path: &Path, mut on_progress: F) -> ClientResult<UploadResult>
    where
        F: FnMut(u8) + Send + Sync + 'static,
    {
        let file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.dcm".to_string());

        info!(file = %filename, bytes = total, "Uploading DICOM");

        if total == 0 {
            on_progress(100);
        }

        let mut sent = 0u64;
        let body = ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                on_progress(upload_percent(sent, total));
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(filename)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        // multipart() replaces the default JSON content type with the boundary header.
        let response = self
            .http_client
            .post(self.endpoint("/upload-dicom"))
            .multipart(form)
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn start_segmentation(&self, study_id: &str, model_type: ModelType) -> ClientResult<JobDescriptor> {
        info!(study_id, %model_type, "Starting segmentation");
        let request = SegmentationRequest {
            study_id: study_id.to_string(),
            model_type,
        };
        let response = self
            .http_client
            .post(self.endpoint("/segment"))
            .json(&request)
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn job_status(&self, job_id: &str) -> ClientResult<JobStatusRecord> {
        debug!(job_id, "GET /status");
        let response = self
            .http_client
            .get(self.endpoint(&format!("/status/{job_id}")))
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn list_jobs(&self) -> ClientResult<Vec<JobDescriptor>> {
        let response = self.http_client.get(self.endpoint("/jobs")).send().await?;
        let listing: JobListing = response.error_for_status()?.json().await?;
        Ok(listing.into_jobs())
    }

    pub fn stl_download_url(&self, job_id: &str, filename: &str) -> String {
        stl_download_url(self.base_url(), job_id, filename)
    }

    /// Fetches an STL artifact and writes it to `dest`. Returns the byte count.
    pub async fn download_stl(&self, job_id: &str, filename: &str, dest: &Path) -> ClientResult<u64> {
        let url = self.stl_download_url(job_id, filename);
        info!(%url, dest = %dest.display(), "Downloading STL");
        let response = self.http_client.get(url).send().await?;
        let bytes = response.error_for_status()?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

pub fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.saturating_mul(100) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientError, JobState};
    use std::io::Write;
    use crate::infrastructure::JobPoller;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ClientConfig::with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_upload_percent_floors() {
        assert_eq!(upload_percent(0, 3), 0);
        assert_eq!(upload_percent(1, 3), 33);
        assert_eq!(upload_percent(2, 3), 66);
        assert_eq!(upload_percent(3, 3), 100);
        assert_eq!(upload_percent(0, 0), 100);
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let err = ApiClient::new(ClientConfig::with_base_url("nope")).unwrap_err();
        assert!(matches!(err, ClientError::Url(_)));
    }

    #[test]
    fn test_download_url_uses_base() {
        let client = ApiClient::new(ClientConfig::with_base_url("http://x")).unwrap();
        assert_eq!(client.stl_download_url("j1", "out.stl"), "http://x/download/stl/j1/out.stl");
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy",
                "timestamp": "2026-01-01T00:00:00",
                "slicer_available": false,
                "slicer_path": "/opt/v3di-backend/Slicer",
                "active_jobs": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let health = client_for(&server).await.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_jobs, 2);
        assert!(!health.slicer_available);
    }

    #[tokio::test]
    async fn test_start_segmentation_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/segment"))
            .and(body_json(serde_json::json!({"study_id": "ab12cd34", "model_type": "teeth"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "j1", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let job = client_for(&server)
            .await
            .start_segmentation("ab12cd34", ModelType::default())
            .await
            .unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.status, JobState::Queued);
        assert_eq!(job.progress, 0);
    }

    #[tokio::test]
    async fn test_job_status_and_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "j1", "status": "processing", "progress": 30, "message": "Loading volume...",
                "stl_urls": [], "result": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jobs": [{"job_id": "j1", "status": "processing", "progress": 30, "created_at": null}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let status = client.job_status("j1").await.unwrap();
        assert_eq!(status.status, JobState::Processing);
        assert_eq!(status.message.as_deref(), Some("Loading volume..."));

        let jobs = client.list_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].progress, 30);
    }

    #[tokio::test]
    async fn test_error_status_propagates_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Job not found"})))
            .mount(&server)
            .await;

        let err = client_for(&server).await.job_status("missing").await.unwrap_err();
        match err {
            ClientError::Http(e) => assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_settles_poll_with_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "j1", "status": "processing", "progress": 40
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status/j1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let poller = JobPoller::new(Arc::new(client_for(&server).await)).with_interval(Duration::from_millis(10));
        let mut seen = Vec::new();
        let err = poller.poll("j1", |r| seen.push(r.progress)).await.unwrap_err();

        assert_eq!(seen, vec![40]);
        match err {
            ClientError::Http(e) => assert_eq!(e.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR)),
            other => panic!("unexpected error: {other:?}"),
        }
        // No fetch follows the failure.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload-dicom"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "study_id": "ab12cd34", "filename": "scan.zip", "path": "/opt/v3di-backend/uploads/ab12cd34"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::Builder::new().suffix(".zip").tempfile().unwrap();
        file.write_all(&vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10]).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result = client_for(&server)
            .await
            .upload_dicom_with_progress(file.path(), move |p| sink.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(result.study_id, "ab12cd34");
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap().to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        assert!(requests[0].body.len() > UPLOAD_CHUNK_SIZE * 2 + 10);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains(&"\u{7}".repeat(UPLOAD_CHUNK_SIZE * 2 + 10)));
    }

    #[tokio::test]
    async fn test_upload_empty_file_reports_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload-dicom"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "study_id": "empty01" })))
            .mount(&server)
            .await;

        let file = tempfile::Builder::new().suffix(".dcm").tempfile().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result = client_for(&server)
            .await
            .upload_dicom_with_progress(file.path(), move |p| sink.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(result.study_id, "empty01");
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_download_stl_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/stl/j1/tooth_11.stl"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 134]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tooth_11.stl");
        let written = client_for(&server)
            .await
            .download_stl("j1", "tooth_11.stl", &dest)
            .await
            .unwrap();
        assert_eq!(written, 134);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 134);
    }
}
