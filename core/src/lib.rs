//! Muse Core - Headless Creative Companion Client
//!
//! This crate contains everything about the client except the screen: the
//! authentication boundary, the generation service protocol, session
//! persistence, configuration, and the controller that ties them together.
//! A UI surface (the bundled terminal UI, or anything else) renders
//! controller state and feeds it user intent; it never talks to the network
//! itself.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------+
//! |                  Surface                    |
//! |       (renders state, sends intents)        |
//! +----------------------+----------------------+
//!                        |
//!                        v
//! +---------------------------------------------+
//! |                 Controller                  |
//! |  auth lifecycle / request sequencing /      |
//! |  session continuity / single current output |
//! +-----+----------------+----------------+-----+
//!       |                |                |
//!       v                v                v
//!  CredentialProvider  CreativeApi   SessionStore
//!  (identity, tokens)  (generate,    (session id
//!                      feedback,     on disk)
//!                      history)
//! ```
//!
//! The two trait seams ([`CredentialProvider`] and [`CreativeApi`]) exist so
//! the controller's full request lifecycle runs under test with
//! deterministic fakes.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod session;

pub use api::{
    ApiError, Category, CreativeApi, FeedbackRequest, GenerationRequest, GenerationResult,
    HistoryEntry, HistoryRequest, HttpCreativeApi, SessionHistory,
};
pub use auth::{
    AuthError, AuthState, CredentialProvider, DeviceFlowProvider, LoginPrompt, UserIdentity,
};
pub use config::{load_config, AppConfig, ConfigError};
pub use controller::{Controller, ControllerConfig, ControllerEvent};
pub use session::SessionStore;
