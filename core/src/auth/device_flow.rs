//! Device-Authorization-Grant Credential Provider
//!
//! OAuth 2.0 device flow against the configured identity provider. This is
//! the terminal-native equivalent of a browser login redirect: the provider
//! hands out a verification URL plus user code, the user completes login in
//! a browser, and the client polls the token endpoint until tokens arrive.
//!
//! # State
//!
//! ```text
//! Resolving ──cached refresh ok──▶ SignedIn
//!     │                               ▲
//!     └──no/stale cache──▶ SignedOut ─┘ (device flow completes)
//!                              │
//!                       begin_login ──▶ Pending ──poll──▶ SignedIn
//! ```
//!
//! The refresh token is cached in a 0600 file under the XDG data dir so a
//! restart can sign in silently. Access tokens live only in memory.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use super::{AuthError, AuthState, CredentialProvider, LoginPrompt, UserIdentity};

/// Data directory name under the XDG data dir
pub const DATA_DIR_NAME: &str = "muse";

/// Refresh token cache file name
pub const REFRESH_TOKEN_FILENAME: &str = "refresh.token";

/// Scope requested at login; `offline_access` yields the refresh token
const LOGIN_SCOPE: &str = "openid profile email offline_access";

/// Tokens within this margin of expiry are refreshed proactively
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Extra delay added when the provider answers `slow_down`
const SLOW_DOWN_BACKOFF: Duration = Duration::from_secs(5);

/// Fallback access-token lifetime when the provider omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Device-flow credential provider
pub struct DeviceFlowProvider {
    /// HTTP client for the identity provider
    http_client: reqwest::Client,
    /// Identity provider domain (no scheme)
    domain: String,
    /// OAuth client identifier
    client_id: String,
    /// API audience tokens are minted for
    audience: Option<String>,
    /// Where the refresh token is cached (None disables caching)
    refresh_token_path: Option<PathBuf>,
    /// Mutable provider state
    state: Mutex<ProviderState>,
}

/// In-memory provider state
struct ProviderState {
    phase: Phase,
    tokens: Option<TokenSet>,
}

/// Where the provider is in its lifecycle
enum Phase {
    /// Startup: cached credentials not yet checked
    Resolving,
    /// Resolved, no valid credentials
    SignedOut,
    /// Device flow started, waiting for the user
    Pending(PendingLogin),
    /// Valid credentials present
    SignedIn,
}

/// A device flow waiting for user completion
#[derive(Clone)]
struct PendingLogin {
    device_code: String,
    interval: Duration,
    next_poll_at: Instant,
    expires_at: Instant,
}

/// An issued token set
#[derive(Clone)]
struct TokenSet {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
    user: UserIdentity,
}

impl TokenSet {
    /// Whether the access token is still safely usable
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Device code endpoint response
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    interval: Option<u64>,
}

/// Token endpoint success response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token endpoint error response
#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Outcome of one token-endpoint poll
enum PollOutcome {
    Tokens(TokenResponse),
    /// User has not finished the browser step yet
    Pending {
        slow_down: bool,
    },
    Denied(String),
}

impl DeviceFlowProvider {
    /// Create a provider for the given identity provider
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            domain: domain.into(),
            client_id: client_id.into(),
            audience,
            refresh_token_path: default_refresh_token_path(),
            state: Mutex::new(ProviderState {
                phase: Phase::Resolving,
                tokens: None,
            }),
        }
    }

    /// Override where the refresh token is cached (mainly for tests)
    #[must_use]
    pub fn with_refresh_token_path(mut self, path: Option<PathBuf>) -> Self {
        self.refresh_token_path = path;
        self
    }

    fn device_code_url(&self) -> String {
        format!("https://{}/oauth/device/code", self.domain)
    }

    fn token_url(&self) -> String {
        format!("https://{}/oauth/token", self.domain)
    }

    fn userinfo_url(&self) -> String {
        format!("https://{}/userinfo", self.domain)
    }

    /// Resolve cached credentials once at startup
    ///
    /// Leaves the provider `SignedIn` when the cached refresh token still
    /// works, `SignedOut` otherwise. Until this completes, `auth_state`
    /// reports loading.
    pub async fn resolve(&self) {
        let cached = self
            .refresh_token_path
            .as_deref()
            .and_then(read_refresh_token);

        let Some(refresh_token) = cached else {
            tracing::debug!("No cached refresh token, starting signed out");
            self.state.lock().phase = Phase::SignedOut;
            return;
        };

        match self.redeem_refresh_token(&refresh_token).await {
            Ok(tokens) => {
                tracing::info!(user = %tokens.user.label(), "Restored session from cached refresh token");
                let mut state = self.state.lock();
                state.tokens = Some(tokens);
                state.phase = Phase::SignedIn;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cached refresh token rejected");
                self.state.lock().phase = Phase::SignedOut;
            }
        }
    }

    /// One poll of the token endpoint for a pending device flow
    async fn request_device_tokens(&self, device_code: &str) -> Result<PollOutcome, AuthError> {
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("device_code", device_code),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self
            .http_client
            .post(self.token_url())
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let tokens: TokenResponse = response
                .json()
                .await
                .map_err(|e| AuthError::Malformed(e.to_string()))?;
            return Ok(PollOutcome::Tokens(tokens));
        }

        let body: OAuthErrorBody = response.json().await.unwrap_or_default();
        match body.error.as_str() {
            "authorization_pending" => Ok(PollOutcome::Pending { slow_down: false }),
            "slow_down" => Ok(PollOutcome::Pending { slow_down: true }),
            _ => Ok(PollOutcome::Denied(
                body.error_description.unwrap_or(body.error),
            )),
        }
    }

    /// Exchange a refresh token for a fresh token set
    async fn redeem_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http_client
            .post(self.token_url())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body: OAuthErrorBody = response.json().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(
                body.error_description.unwrap_or(body.error),
            ));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        // Rotating providers issue a new refresh token; keep the old one
        // when they don't.
        let next_refresh = tokens
            .refresh_token
            .clone()
            .or_else(|| Some(refresh_token.to_string()));

        self.finish_token_set(tokens, next_refresh).await
    }

    /// Turn a token response into a full `TokenSet` (resolving the user)
    async fn finish_token_set(
        &self,
        tokens: TokenResponse,
        refresh_token: Option<String>,
    ) -> Result<TokenSet, AuthError> {
        let user = self.fetch_userinfo(&tokens.access_token).await?;

        if let (Some(path), Some(rt)) = (self.refresh_token_path.as_deref(), refresh_token.as_deref())
        {
            if let Err(e) = write_refresh_token(path, rt) {
                tracing::warn!(error = %e, path = %path.display(), "Failed to cache refresh token");
            }
        }

        let lifetime = tokens
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token,
            expires_at: Instant::now() + lifetime,
            user,
        })
    }

    /// Resolve the user identity behind an access token
    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        let response = self
            .http_client
            .get(self.userinfo_url())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Malformed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl CredentialProvider for DeviceFlowProvider {
    fn auth_state(&self) -> AuthState {
        let state = self.state.lock();
        match &state.phase {
            Phase::Resolving => AuthState::loading(),
            Phase::SignedIn => match &state.tokens {
                Some(tokens) => AuthState::authenticated(tokens.user.clone()),
                None => AuthState::unauthenticated(),
            },
            Phase::SignedOut | Phase::Pending(_) => AuthState::unauthenticated(),
        }
    }

    async fn begin_login(&self) -> Result<LoginPrompt, AuthError> {
        let mut params = vec![
            ("client_id", self.client_id.clone()),
            ("scope", LOGIN_SCOPE.to_string()),
        ];
        if let Some(audience) = &self.audience {
            params.push(("audience", audience.clone()));
        }

        let response = self
            .http_client
            .post(self.device_code_url())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body: OAuthErrorBody = response.json().await.unwrap_or_default();
            return Err(AuthError::LoginFailed(
                body.error_description.unwrap_or(body.error),
            ));
        }

        let device: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        let interval = Duration::from_secs(device.interval.unwrap_or(5));
        let now = Instant::now();
        let pending = PendingLogin {
            device_code: device.device_code,
            interval,
            next_poll_at: now + interval,
            expires_at: now + Duration::from_secs(device.expires_in.unwrap_or(900)),
        };

        tracing::info!(user_code = %device.user_code, "Device login started");
        self.state.lock().phase = Phase::Pending(pending);

        Ok(LoginPrompt {
            verification_uri: device
                .verification_uri_complete
                .unwrap_or(device.verification_uri),
            user_code: device.user_code,
        })
    }

    async fn poll_login(&self) -> Result<bool, AuthError> {
        // Snapshot the pending flow without holding the lock across I/O.
        let pending = {
            let state = self.state.lock();
            match &state.phase {
                Phase::Pending(pending) => pending.clone(),
                _ => return Ok(false),
            }
        };

        let now = Instant::now();
        if now < pending.next_poll_at {
            return Ok(false);
        }
        if now >= pending.expires_at {
            self.state.lock().phase = Phase::SignedOut;
            return Err(AuthError::LoginFailed("device code expired".to_string()));
        }

        match self.request_device_tokens(&pending.device_code).await? {
            PollOutcome::Tokens(tokens) => {
                let refresh = tokens.refresh_token.clone();
                let set = self.finish_token_set(tokens, refresh).await?;
                tracing::info!(user = %set.user.label(), "Device login completed");
                let mut state = self.state.lock();
                state.tokens = Some(set);
                state.phase = Phase::SignedIn;
                Ok(true)
            }
            PollOutcome::Pending { slow_down } => {
                let mut state = self.state.lock();
                if let Phase::Pending(p) = &mut state.phase {
                    if slow_down {
                        p.interval += SLOW_DOWN_BACKOFF;
                    }
                    p.next_poll_at = Instant::now() + p.interval;
                }
                Ok(false)
            }
            PollOutcome::Denied(reason) => {
                self.state.lock().phase = Phase::SignedOut;
                Err(AuthError::LoginFailed(reason))
            }
        }
    }

    async fn bearer_token(&self, audience: Option<&str>) -> Result<String, AuthError> {
        if let Some(requested) = audience {
            // Tokens are minted for the configured audience at login time.
            if self.audience.as_deref() != Some(requested) {
                tracing::debug!(requested, "Audience differs from configured; using login token");
            }
        }

        let refresh_token = {
            let state = self.state.lock();
            let Some(tokens) = &state.tokens else {
                return Err(AuthError::NotAuthenticated);
            };
            if tokens.is_fresh(Instant::now()) {
                return Ok(tokens.access_token.clone());
            }
            tokens
                .refresh_token
                .clone()
                .ok_or(AuthError::NotAuthenticated)?
        };

        let set = self.redeem_refresh_token(&refresh_token).await?;
        let access = set.access_token.clone();
        self.state.lock().tokens = Some(set);
        Ok(access)
    }
}

/// Default refresh token cache path under the XDG data dir
#[must_use]
pub fn default_refresh_token_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME).join(REFRESH_TOKEN_FILENAME))
}

/// Read a cached refresh token, ignoring a missing file
fn read_refresh_token(path: &Path) -> Option<String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Failed to read refresh token cache");
            return None;
        }
    };

    let mut contents = String::new();
    if let Err(e) = file.read_to_string(&mut contents) {
        tracing::warn!(error = %e, path = %path.display(), "Failed to read refresh token cache");
        return None;
    }

    let token = contents.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Write the refresh token cache with owner-only permissions
fn write_refresh_token(path: &Path, token: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
            }
        }
    }

    let mut file = File::create(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(token.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;

    tracing::debug!(path = %path.display(), "Refresh token cached");
    Ok(())
}
