//! Application layer managing state and business workflows.
//!
//! This module coordinates between the remote service and the presentation
//! layer: the session store, the terminal session built around it, and the
//! dispatcher that runs user commands in the background.

pub mod app;
pub mod store;
pub mod workflow;

pub use app::*;
pub use store::*;
pub use workflow::*;
