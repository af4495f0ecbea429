//! Authentication State and Credential Provider
//!
//! Types describing the identity provider boundary. The provider owns
//! authentication state; everything else reads a snapshot of it and asks for
//! bearer tokens on demand.
//!
//! # Design Philosophy
//!
//! The Controller never talks OAuth. It observes an [`AuthState`] snapshot,
//! starts a login flow exactly once when the state resolves to
//! unauthenticated, and acquires short-lived bearer tokens per request
//! through the [`CredentialProvider`] trait. The trait boundary is what makes
//! the whole request lifecycle testable with deterministic fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod device_flow;

pub use device_flow::DeviceFlowProvider;

/// Identity of the authenticated user
///
/// Immutable once issued by the provider for the lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider-issued subject identifier (e.g. `auth0|abc123`)
    #[serde(rename = "sub")]
    pub subject_id: String,
    /// Display name, if the provider knows one
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
    /// Email address, if the provider knows one
    #[serde(default)]
    pub email: Option<String>,
}

impl UserIdentity {
    /// Best label for showing who is signed in
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.subject_id)
    }
}

/// Snapshot of the provider's authentication state
///
/// Owned by the provider, read-only to the controller. Transitions:
/// `loading -> {authenticated, unauthenticated}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    /// Provider is still resolving cached credentials
    pub is_loading: bool,
    /// A valid identity is present
    pub is_authenticated: bool,
    /// The resolved user, when authenticated
    pub user: Option<UserIdentity>,
}

impl AuthState {
    /// State while the provider resolves cached credentials
    #[must_use]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            is_authenticated: false,
            user: None,
        }
    }

    /// Resolved, signed-in state
    #[must_use]
    pub fn authenticated(user: UserIdentity) -> Self {
        Self {
            is_loading: false,
            is_authenticated: true,
            user: Some(user),
        }
    }

    /// Resolved, signed-out state
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            is_loading: false,
            is_authenticated: false,
            user: None,
        }
    }
}

/// What the user must do to complete a login
///
/// The terminal equivalent of a login redirect: the user opens the
/// verification URI in a browser and enters the code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginPrompt {
    /// URL the user opens in a browser
    pub verification_uri: String,
    /// Code the user enters (may already be embedded in the URI)
    pub user_code: String,
}

/// Errors from the credential provider
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials and no way to silently obtain them
    #[error("not authenticated")]
    NotAuthenticated,

    /// The interactive login flow failed or was denied
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A silent token refresh failed; a fresh interactive login is needed
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The identity provider could not be reached
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with something unparseable
    #[error("malformed identity provider response: {0}")]
    Malformed(String),
}

/// Credential provider trait
///
/// Implemented by [`DeviceFlowProvider`] for a real identity provider and by
/// fakes in tests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current authentication state snapshot
    fn auth_state(&self) -> AuthState;

    /// Start an interactive login flow
    ///
    /// Returns the prompt the surface must show the user. Called exactly once
    /// per entry into the unauthenticated state; the controller guards the
    /// transition.
    async fn begin_login(&self) -> Result<LoginPrompt, AuthError>;

    /// Advance a pending login flow
    ///
    /// Returns `Ok(true)` once the login completed. Providers without a
    /// polling step resolve immediately.
    async fn poll_login(&self) -> Result<bool, AuthError> {
        Ok(false)
    }

    /// Get a bearer token for outbound requests
    ///
    /// May suspend to silently refresh an expired token; fails if the session
    /// cannot be silently renewed. `audience` selects the API the token is
    /// for; `None` means the provider's default.
    async fn bearer_token(&self, audience: Option<&str>) -> Result<String, AuthError>;
}
