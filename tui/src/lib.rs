//! Muse TUI - Terminal interface for the creative generation companion
//!
//! This crate provides a full-screen terminal UI over `muse-core`: a prompt
//! box with a category selector, a single output panel with a feedback box,
//! and a login screen for the device authorization flow.
//!
//! # Architecture
//!
//! - **App**: Event loop and rendering; applies controller events to a
//!   small display state
//! - **Prompt**: Input buffer and category selector
//! - **Output**: Current output panel with scroll and the feedback box
//! - **Theme**: The muse color palette

pub mod app;
pub mod output;
pub mod prompt;
pub mod theme;

pub use app::App;
