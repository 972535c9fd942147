//! V3Di Slicer client library
//!
//! Client for the V3Di segmentation service: DICOM upload, segmentation job
//! submission and polling, and STL result retrieval, plus the session state
//! and terminal views built on top of it.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
