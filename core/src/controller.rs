//! Application Controller
//!
//! Owns all mutable client state and sequences the auth-gated request
//! lifecycle: observe the credential provider, acquire a bearer token, call
//! the generation service, reconcile the session id, and surface exactly one
//! of {loading, error, output} to the UI.
//!
//! # Design Philosophy
//!
//! The controller is headless and fully injected: a credential provider, an
//! API client, a session store, and an event channel are passed at
//! construction. Nothing is read from ambient globals, which is what makes
//! the lifecycle testable with deterministic fakes.
//!
//! Requests run as spawned tasks and settle into an internal completion
//! channel; the surface drives [`Controller::poll`] from its event loop.
//! Every generation request carries a monotonically increasing sequence
//! number and a completion is applied only if it belongs to the latest
//! issued request, so overlapping submits cannot interleave stale state.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{
    CreativeApi, FeedbackRequest, GenerationRequest, GenerationResult, HistoryRequest,
    SessionHistory,
};
use crate::auth::{AuthState, CredentialProvider, LoginPrompt, UserIdentity};
use crate::session::SessionStore;
use crate::Category;

/// Error shown when a submit is attempted without a signed-in user
pub const ERR_NOT_AUTHENTICATED: &str = "User not authenticated!";

/// Generic failure message for transport, parse, and token errors
pub const ERR_GENERIC: &str = "Something went wrong";

/// Messages from the controller to the UI surface
#[derive(Clone, Debug)]
pub enum ControllerEvent {
    /// A login flow started; show the prompt to the user
    LoginRequired {
        /// What the user must do to complete login
        prompt: LoginPrompt,
    },
    /// The login flow failed or was denied
    LoginFailed {
        /// Human-readable reason
        message: String,
    },
    /// The user is signed in
    Authenticated {
        /// The resolved identity
        user: UserIdentity,
    },
    /// A generation request was issued
    GenerationStarted,
    /// The latest generation request succeeded
    GenerationComplete {
        /// The new current output
        result: GenerationResult,
    },
    /// The latest generation request failed
    GenerationFailed {
        /// User-visible message
        message: String,
    },
    /// The service issued a new session id
    SessionUpdated {
        /// The new id, already persisted
        session_id: String,
    },
    /// Session history arrived
    HistoryLoaded {
        /// Entries for the current session, oldest first
        history: SessionHistory,
    },
}

/// Controller-side configuration
#[derive(Clone, Debug, Default)]
pub struct ControllerConfig {
    /// Audience requested for generation-call tokens
    pub audience: Option<String>,
}

/// Where the controller is in the auth lifecycle
///
/// Guards the login side effect on the transition into the unauthenticated
/// state, not on every observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthPhase {
    /// Provider still resolving cached credentials
    Loading,
    /// Signed in
    Authenticated,
    /// Login flow started, waiting for the user
    AwaitingLogin,
    /// Login flow failed; waiting for an explicit retry
    LoginFailed,
}

/// A settled background request
enum Completion {
    Generation {
        seq: u64,
        result: Result<GenerationResult, String>,
    },
    History {
        result: Result<SessionHistory, String>,
    },
}

/// The application controller
pub struct Controller<P, C> {
    /// Credential provider handle
    provider: Arc<P>,
    /// Generation service client
    api: Arc<C>,
    /// Durable session id store
    store: SessionStore,
    /// Controller configuration
    config: ControllerConfig,

    /// Current session id (empty until the service issues one)
    session_id: String,
    /// The single current output
    output: Option<GenerationResult>,
    /// A generation request is in flight
    loading: bool,
    /// Transient error, cleared at the start of the next attempt
    error: Option<String>,
    /// History for the current session, once fetched
    history: Option<SessionHistory>,

    /// Auth state machine
    phase: AuthPhase,
    /// Next sequence number to issue
    next_seq: u64,
    /// Sequence number of the latest issued request
    latest_seq: Option<u64>,

    /// Settled background requests land here
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    /// Events to the surface
    events_tx: mpsc::Sender<ControllerEvent>,
}

impl<P, C> Controller<P, C>
where
    P: CredentialProvider + 'static,
    C: CreativeApi + 'static,
{
    /// Create a controller with an explicitly injected context
    ///
    /// The persisted session id is read here, before the first render.
    pub fn new(
        provider: Arc<P>,
        api: Arc<C>,
        store: SessionStore,
        config: ControllerConfig,
        events_tx: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        let session_id = store.load();
        if !session_id.is_empty() {
            tracing::debug!(%session_id, "Restored session id");
        }
        let (completions_tx, completions_rx) = mpsc::channel(16);

        Self {
            provider,
            api,
            store,
            config,
            session_id,
            output: None,
            loading: false,
            error: None,
            history: None,
            phase: AuthPhase::Loading,
            next_seq: 0,
            latest_seq: None,
            completions_tx,
            completions_rx,
            events_tx,
        }
    }

    /// Observe provider auth state and advance the auth state machine
    ///
    /// Call regularly from the event loop. Starts the login flow exactly
    /// once per entry into the unauthenticated state and advances a pending
    /// device flow.
    pub async fn observe_auth(&mut self) {
        let state = self.provider.auth_state();

        if state.is_loading {
            self.phase = AuthPhase::Loading;
            return;
        }

        if state.is_authenticated {
            if self.phase != AuthPhase::Authenticated {
                self.phase = AuthPhase::Authenticated;
                if let Some(user) = state.user {
                    tracing::info!(user = %user.label(), "Signed in");
                    self.emit(ControllerEvent::Authenticated { user }).await;
                }
            }
            return;
        }

        match self.phase {
            AuthPhase::AwaitingLogin => {
                // Advance the pending flow; completion shows up in the next
                // auth_state snapshot.
                if let Err(e) = self.provider.poll_login().await {
                    tracing::warn!(error = %e, "Login flow failed");
                    self.phase = AuthPhase::LoginFailed;
                    self.emit(ControllerEvent::LoginFailed {
                        message: e.to_string(),
                    })
                    .await;
                }
            }
            AuthPhase::LoginFailed => {
                // Stay put until the user retries explicitly.
            }
            AuthPhase::Loading | AuthPhase::Authenticated => {
                // Transition into unauthenticated: start login once.
                self.start_login().await;
            }
        }
    }

    /// Explicitly restart a failed login flow
    pub async fn retry_login(&mut self) {
        if self.phase == AuthPhase::LoginFailed {
            self.start_login().await;
        }
    }

    async fn start_login(&mut self) {
        self.phase = AuthPhase::AwaitingLogin;
        match self.provider.begin_login().await {
            Ok(prompt) => {
                self.emit(ControllerEvent::LoginRequired { prompt }).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not start login flow");
                self.phase = AuthPhase::LoginFailed;
                self.emit(ControllerEvent::LoginFailed {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Submit a prompt for generation
    ///
    /// Requires a signed-in user; otherwise sets the error state and issues
    /// no network call. The request runs in the background; the outcome is
    /// applied by [`Controller::poll`].
    pub async fn submit(&mut self, text: &str, category: Category) {
        let auth = self.provider.auth_state();
        let user = match auth.user {
            Some(user) if auth.is_authenticated => user,
            _ => {
                self.error = Some(ERR_NOT_AUTHENTICATED.to_string());
                return;
            }
        };

        self.loading = true;
        self.error = None;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest_seq = Some(seq);

        let request = GenerationRequest {
            user_id: user.subject_id,
            session_id: self.session_id.clone(),
            input_text: text.trim().to_string(),
            category,
        };

        tracing::info!(seq, category = %category, "Generation request issued");
        self.emit(ControllerEvent::GenerationStarted).await;

        let provider = Arc::clone(&self.provider);
        let api = Arc::clone(&self.api);
        let audience = self.config.audience.clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = run_generation(&*provider, &*api, audience.as_deref(), &request).await;
            let _ = completions.send(Completion::Generation { seq, result }).await;
        });
    }

    /// Attach feedback to a generated output
    ///
    /// Fire-and-forget by policy: a missing login is a silent no-op and any
    /// failure is logged, never shown to the user.
    pub async fn submit_feedback(&mut self, output_id: &str, feedback: &str, rating: Option<i32>) {
        let auth = self.provider.auth_state();
        let user = match auth.user {
            Some(user) if auth.is_authenticated => user,
            _ => return,
        };

        let request = FeedbackRequest {
            user_id: user.subject_id,
            output_id: output_id.to_string(),
            feedback: feedback.to_string(),
            rating,
        };

        let provider = Arc::clone(&self.provider);
        let api = Arc::clone(&self.api);

        tokio::spawn(async move {
            // Default audience, no explicit scope.
            let token = match provider.bearer_token(None).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(error = %e, "Feedback dropped: token acquisition failed");
                    return;
                }
            };

            if let Err(e) = api.feedback(&request, &token).await {
                tracing::warn!(error = %e, output_id = %request.output_id, "Feedback call failed");
            }
        });
    }

    /// Fetch prior interactions for the current session
    ///
    /// A no-op when signed out or when no session exists yet.
    pub async fn fetch_history(&mut self) {
        let auth = self.provider.auth_state();
        let user = match auth.user {
            Some(user) if auth.is_authenticated => user,
            _ => return,
        };
        if self.session_id.is_empty() {
            tracing::debug!("No session yet, nothing to fetch");
            return;
        }

        let request = HistoryRequest {
            user_id: user.subject_id,
            session_id: self.session_id.clone(),
        };

        let provider = Arc::clone(&self.provider);
        let api = Arc::clone(&self.api);
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = async {
                let token = provider
                    .bearer_token(None)
                    .await
                    .map_err(|e| {
                        tracing::warn!(error = %e, "History token acquisition failed");
                        ERR_GENERIC.to_string()
                    })?;
                api.history(&request, &token).await.map_err(|e| {
                    tracing::warn!(error = %e, "History call failed");
                    e.user_message()
                })
            }
            .await;
            let _ = completions.send(Completion::History { result }).await;
        });
    }

    /// Apply settled background requests to controller state
    ///
    /// Call regularly from the event loop; non-blocking.
    pub async fn poll(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            match completion {
                Completion::Generation { seq, result } => {
                    self.apply_generation(seq, result).await;
                }
                Completion::History { result } => {
                    self.apply_history(result).await;
                }
            }
        }
    }

    async fn apply_generation(&mut self, seq: u64, result: Result<GenerationResult, String>) {
        if Some(seq) != self.latest_seq {
            // A newer request was issued while this one was in flight.
            tracing::debug!(seq, latest = ?self.latest_seq, "Discarding stale generation response");
            return;
        }

        // The latest request settled; loading resolves on both paths.
        self.loading = false;

        match result {
            Ok(result) => {
                if let Some(session_id) = result.session_id.as_deref() {
                    if !session_id.is_empty() && session_id != self.session_id {
                        if let Err(e) = self.store.save(session_id) {
                            tracing::warn!(error = %e, "Session id not persisted");
                        }
                        self.session_id = session_id.to_string();
                        self.emit(ControllerEvent::SessionUpdated {
                            session_id: self.session_id.clone(),
                        })
                        .await;
                    }
                }

                self.emit(ControllerEvent::GenerationComplete {
                    result: result.clone(),
                })
                .await;
                self.output = Some(result);
            }
            Err(message) => {
                tracing::warn!(seq, %message, "Generation failed");
                self.error = Some(message.clone());
                self.emit(ControllerEvent::GenerationFailed { message }).await;
                // A previously successful output is left in place.
            }
        }
    }

    async fn apply_history(&mut self, result: Result<SessionHistory, String>) {
        match result {
            Ok(history) => {
                self.history = Some(history.clone());
                self.emit(ControllerEvent::HistoryLoaded { history }).await;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
    }

    async fn emit(&self, event: ControllerEvent) {
        // A closed surface channel only means we are shutting down.
        let _ = self.events_tx.send(event).await;
    }

    /// Current auth state snapshot (delegates to the provider)
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.provider.auth_state()
    }

    /// Current session id (empty when no session exists)
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The single current output, if any
    #[must_use]
    pub fn output(&self) -> Option<&GenerationResult> {
        self.output.as_ref()
    }

    /// Whether a generation request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Current transient error message, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Session history, once fetched
    #[must_use]
    pub fn history(&self) -> Option<&SessionHistory> {
        self.history.as_ref()
    }
}

/// Token acquisition plus the generate call, mapped to a user-visible
/// message on failure.
async fn run_generation<P, C>(
    provider: &P,
    api: &C,
    audience: Option<&str>,
    request: &GenerationRequest,
) -> Result<GenerationResult, String>
where
    P: CredentialProvider + ?Sized,
    C: CreativeApi + ?Sized,
{
    let token = provider.bearer_token(audience).await.map_err(|e| {
        tracing::warn!(error = %e, "Token acquisition failed");
        ERR_GENERIC.to_string()
    })?;

    api.generate(request, &token).await.map_err(|e| {
        tracing::warn!(error = %e, "Generate call failed");
        e.user_message()
    })
}
