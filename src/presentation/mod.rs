//! Presentation layer handling terminal UI and user input.
//!
//! This module renders the view of the active route using ratatui and
//! turns keyboard input into session changes and background commands.

pub mod ui;
pub mod input;

pub use ui::*;
pub use input::*;
