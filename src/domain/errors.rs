use thiserror::Error;

/// Message used when a failed job carries no message of its own.
pub const DEFAULT_JOB_FAILURE_MESSAGE: &str = "Job failed";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or HTTP status failure, passed through untouched.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    JobFailed { job_id: String, message: String },

    #[error("polling of job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("clipboard unavailable: {reason}")]
    Clipboard { reason: String },
}

impl ClientError {
    /// Builds the terminal failure for a job, falling back to the default
    /// message when the service sent none (or an empty one).
    pub fn job_failed(job_id: impl Into<String>, message: Option<&str>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_JOB_FAILURE_MESSAGE)
            .to_string();
        Self::JobFailed {
            job_id: job_id.into(),
            message,
        }
    }

    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn clipboard(reason: impl Into<String>) -> Self {
        Self::Clipboard {
            reason: reason.into(),
        }
    }

    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    pub const fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
