//! Infrastructure layer providing external service integrations.
//!
//! This module contains the HTTP client for the segmentation service, the
//! job status poller, configuration loading and clipboard access.

pub mod api;
pub mod clipboard;
pub mod config;
pub mod poller;

pub use api::*;
pub use config::*;
pub use poller::*;
