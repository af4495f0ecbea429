//! Creative Generation API
//!
//! Trait definition and wire types for the remote generation service.
//! The abstraction allows the Controller to work against the real HTTP
//! service or a deterministic fake in tests without changing core logic.
//!
//! # Design Philosophy
//!
//! The `CreativeApi` trait covers exactly the three operations the service
//! exposes: `generate`, `feedback`, and `history`. Every call carries a
//! bearer token; the service validates it and matches the `user_id` in the
//! body against the token subject.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;

pub use http::HttpCreativeApi;

/// The requested creative-output kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Poems and verse
    Poetry,
    /// Melody sketches (described in text)
    Melody,
    /// Game scripts and dialogue
    Script,
}

impl Category {
    /// All categories, in presentation order
    #[must_use]
    pub const fn all() -> [Category; 3] {
        [Category::Poetry, Category::Melody, Category::Script]
    }

    /// Human-readable label for selectors
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Category::Poetry => "Poetry",
            Category::Melody => "Melody",
            Category::Script => "Game Script",
        }
    }

    /// The next category, wrapping around
    #[must_use]
    pub const fn next(&self) -> Category {
        match self {
            Category::Poetry => Category::Melody,
            Category::Melody => Category::Script,
            Category::Script => Category::Poetry,
        }
    }

    /// The previous category, wrapping around
    #[must_use]
    pub const fn prev(&self) -> Category {
        match self {
            Category::Poetry => Category::Script,
            Category::Melody => Category::Poetry,
            Category::Script => Category::Melody,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Poetry
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Request body for `POST /generate`
#[derive(Clone, Debug, Serialize)]
pub struct GenerationRequest {
    /// Subject identifier of the authenticated user
    pub user_id: String,
    /// Current session id (empty string when no session exists yet)
    pub session_id: String,
    /// The prompt text (trimmed, non-empty)
    pub input_text: String,
    /// Requested output kind
    #[serde(rename = "type")]
    pub category: Category,
}

/// A successful generation response
///
/// Held as the single "current output": a new result replaces the previous
/// one, no history is retained client-side.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GenerationResult {
    /// The generated text
    #[serde(rename = "output")]
    pub output_text: String,
    /// Session id issued or confirmed by the service
    #[serde(default)]
    pub session_id: Option<String>,
    /// Output reference, used to correlate feedback with this result
    #[serde(default)]
    pub output_id: Option<String>,
    /// Generation mode reported by the service ("new" or "extend")
    #[serde(default)]
    pub mode: Option<String>,
}

/// Request body for `POST /feedback`
#[derive(Clone, Debug, Serialize)]
pub struct FeedbackRequest {
    /// Subject identifier of the authenticated user
    pub user_id: String,
    /// Reference to the output the feedback is about
    pub output_id: String,
    /// Free-text feedback (non-empty)
    pub feedback: String,
    /// Optional numeric rating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

/// Request body for `POST /history`
#[derive(Clone, Debug, Serialize)]
pub struct HistoryRequest {
    /// Subject identifier of the authenticated user
    pub user_id: String,
    /// Session to fetch history for
    pub session_id: String,
}

/// One prior interaction within a session
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    /// The prompt that produced this entry
    #[serde(default)]
    pub input: String,
    /// The generated output
    #[serde(default)]
    pub output: String,
    /// Category of the entry ("poetry", "melody", "script")
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Server-side timestamp, opaque to the client
    #[serde(default)]
    pub timestamp: String,
    /// Server-side entry id
    #[serde(default)]
    pub id: String,
}

/// Response body for `POST /history`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SessionHistory {
    /// The session the entries belong to
    pub session_id: String,
    /// Entries, oldest first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Failure body the service attaches to non-2xx responses
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    /// Server-provided detail message, shown to the user when present
    #[serde(default)]
    pub detail: Option<String>,
}

/// Errors from the generation service
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status from the service
    #[error("service returned {status}{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status {
        /// The HTTP status code
        status: u16,
        /// Detail message extracted from the error body, if any
        detail: Option<String>,
    },

    /// Transport-level failure (connection, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl ApiError {
    /// The message shown to the user for a failed generate call
    ///
    /// A server-provided `detail` is used verbatim; everything else
    /// collapses to a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Status { detail: None, .. } => "Error generating content".to_string(),
            ApiError::Transport(_) | ApiError::Body(_) => "Something went wrong".to_string(),
        }
    }
}

/// Generation service client trait
///
/// Implemented by [`HttpCreativeApi`] for the real service and by fakes in
/// tests. All operations are authenticated with a bearer token.
#[async_trait]
pub trait CreativeApi: Send + Sync {
    /// Submit a generation request and wait for the result
    async fn generate(
        &self,
        request: &GenerationRequest,
        token: &str,
    ) -> Result<GenerationResult, ApiError>;

    /// Attach free-text feedback to a previously generated output
    ///
    /// The success body is not consumed beyond its status.
    async fn feedback(&self, request: &FeedbackRequest, token: &str) -> Result<(), ApiError>;

    /// Fetch prior interactions for a session
    async fn history(
        &self,
        request: &HistoryRequest,
        token: &str,
    ) -> Result<SessionHistory, ApiError>;
}
