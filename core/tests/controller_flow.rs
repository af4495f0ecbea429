//! Integration tests for the full client request lifecycle
//!
//! These tests drive the controller the way a surface does: observe auth,
//! submit prompts, poll for completions, and read back the resulting state.
//! Tests cover:
//! - The happy path from first prompt to persisted session id
//! - Server-detail error surfacing with output retention
//! - Session continuity across client restarts
//! - The login flow from cold start to signed in

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

use muse_core::api::{
    ApiError, CreativeApi, FeedbackRequest, GenerationRequest, GenerationResult, HistoryRequest,
    SessionHistory,
};
use muse_core::auth::{AuthError, AuthState, CredentialProvider, LoginPrompt, UserIdentity};
use muse_core::{Category, Controller, ControllerConfig, ControllerEvent, SessionStore};

// =============================================================================
// Fakes
// =============================================================================

fn test_user() -> UserIdentity {
    UserIdentity {
        subject_id: "auth0|integration".to_string(),
        display_name: Some("Integration Tester".to_string()),
        email: Some("tester@example.com".to_string()),
    }
}

/// Credential provider whose state is script-controlled from the test
struct ScriptedProvider {
    state: Mutex<AuthState>,
    login_calls: AtomicUsize,
    /// Number of poll_login calls before the flow completes
    polls_until_signed_in: AtomicUsize,
}

impl ScriptedProvider {
    fn signed_in() -> Self {
        Self {
            state: Mutex::new(AuthState::authenticated(test_user())),
            login_calls: AtomicUsize::new(0),
            polls_until_signed_in: AtomicUsize::new(0),
        }
    }

    fn signed_out(polls_until_signed_in: usize) -> Self {
        Self {
            state: Mutex::new(AuthState::unauthenticated()),
            login_calls: AtomicUsize::new(0),
            polls_until_signed_in: AtomicUsize::new(polls_until_signed_in),
        }
    }
}

#[async_trait]
impl CredentialProvider for ScriptedProvider {
    fn auth_state(&self) -> AuthState {
        self.state.lock().clone()
    }

    async fn begin_login(&self) -> Result<LoginPrompt, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(LoginPrompt {
            verification_uri: "https://idp.example.com/activate".to_string(),
            user_code: "WXYZ-1234".to_string(),
        })
    }

    async fn poll_login(&self) -> Result<bool, AuthError> {
        let remaining = self.polls_until_signed_in.load(Ordering::SeqCst);
        if remaining <= 1 {
            *self.state.lock() = AuthState::authenticated(test_user());
            Ok(true)
        } else {
            self.polls_until_signed_in
                .store(remaining - 1, Ordering::SeqCst);
            Ok(false)
        }
    }

    async fn bearer_token(&self, _audience: Option<&str>) -> Result<String, AuthError> {
        if self.state.lock().is_authenticated {
            Ok("integration-token".to_string())
        } else {
            Err(AuthError::NotAuthenticated)
        }
    }
}

/// API client that replays scripted generate responses and records requests
struct ScriptedApi {
    responses: Mutex<VecDeque<Result<GenerationResult, ApiError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn new(responses: Vec<Result<GenerationResult, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CreativeApi for ScriptedApi {
    async fn generate(
        &self,
        request: &GenerationRequest,
        token: &str,
    ) -> Result<GenerationResult, ApiError> {
        self.requests.lock().push(request.clone());
        self.tokens_seen.lock().push(token.to_string());
        self.responses
            .lock()
            .pop_front()
            .expect("unscripted generate call")
    }

    async fn feedback(&self, _request: &FeedbackRequest, _token: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn history(
        &self,
        request: &HistoryRequest,
        _token: &str,
    ) -> Result<SessionHistory, ApiError> {
        Ok(SessionHistory {
            session_id: request.session_id.clone(),
            history: Vec::new(),
        })
    }
}

fn build_controller(
    provider: Arc<ScriptedProvider>,
    api: Arc<ScriptedApi>,
    store: SessionStore,
) -> (
    Controller<ScriptedProvider, ScriptedApi>,
    mpsc::Receiver<ControllerEvent>,
) {
    let (tx, rx) = mpsc::channel(100);
    let controller = Controller::new(provider, api, store, ControllerConfig::default(), tx);
    (controller, rx)
}

async fn settle(controller: &mut Controller<ScriptedProvider, ScriptedApi>) {
    for _ in 0..100 {
        controller.poll().await;
        if !controller.is_loading() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("request never settled");
}

// =============================================================================
// Test 1: First prompt end to end
// =============================================================================

/// A signed-in user submits their first prompt. The request goes out with an
/// empty session id, the response's session id is adopted and persisted, and
/// the output becomes the current output.
#[tokio::test]
async fn test_first_prompt_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("session_id"));
    let provider = Arc::new(ScriptedProvider::signed_in());
    let api = Arc::new(ScriptedApi::new(vec![Ok(GenerationResult {
        output_text: "Roses are steel...".to_string(),
        session_id: Some("sess-123".to_string()),
        output_id: Some("out-1".to_string()),
        mode: Some("new".to_string()),
    })]));

    let (mut controller, mut events) =
        build_controller(Arc::clone(&provider), Arc::clone(&api), store.clone());

    controller.submit("a lonely robot", Category::Poetry).await;
    assert!(controller.is_loading(), "loading should be set immediately");
    settle(&mut controller).await;

    // The request carried the empty session id and the bearer token
    let requests = api.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_id, "");
    assert_eq!(requests[0].input_text, "a lonely robot");
    assert_eq!(requests[0].category, Category::Poetry);
    assert_eq!(api.tokens_seen.lock()[0], "integration-token");
    drop(requests);

    // State reflects the response
    assert_eq!(
        controller.output().map(|o| o.output_text.as_str()),
        Some("Roses are steel...")
    );
    assert_eq!(controller.session_id(), "sess-123");
    assert_eq!(controller.error(), None);
    assert!(!controller.is_loading());

    // The session id reached disk
    assert_eq!(store.load(), "sess-123");

    // Events arrived in lifecycle order
    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::GenerationStarted
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::SessionUpdated { session_id } if session_id == "sess-123"
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::GenerationComplete { .. }
    ));
}

// =============================================================================
// Test 2: Server detail error surfaces verbatim
// =============================================================================

/// A 400 with a detail body shows the detail verbatim, keeps the previous
/// output, and resolves the loading state.
#[tokio::test]
async fn test_server_detail_error_keeps_output() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("session_id"));
    let provider = Arc::new(ScriptedProvider::signed_in());
    let api = Arc::new(ScriptedApi::new(vec![
        Ok(GenerationResult {
            output_text: "a fine verse".to_string(),
            session_id: Some("sess-5".to_string()),
            output_id: None,
            mode: None,
        }),
        Err(ApiError::Status {
            status: 400,
            detail: Some("input_text too long".to_string()),
        }),
    ]));

    let (mut controller, _events) = build_controller(provider, Arc::clone(&api), store);

    controller.submit("ok prompt", Category::Script).await;
    settle(&mut controller).await;

    controller.submit("oversized prompt", Category::Script).await;
    settle(&mut controller).await;

    assert_eq!(controller.error(), Some("input_text too long"));
    assert_eq!(
        controller.output().map(|o| o.output_text.as_str()),
        Some("a fine verse"),
        "a failed request must not clobber the previous output"
    );
    assert!(!controller.is_loading());

    // The failed request still carried the adopted session id
    assert_eq!(api.requests.lock()[1].session_id, "sess-5");
}

// =============================================================================
// Test 3: Session continuity across restarts
// =============================================================================

/// A second controller built over the same store starts with the previous
/// session id and sends it on its first request.
#[tokio::test]
async fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("session_id"));
    let provider = Arc::new(ScriptedProvider::signed_in());

    // First run: the service issues a session id
    let api = Arc::new(ScriptedApi::new(vec![Ok(GenerationResult {
        output_text: "one".to_string(),
        session_id: Some("sess-persist".to_string()),
        output_id: None,
        mode: None,
    })]));
    let (mut controller, _events) =
        build_controller(Arc::clone(&provider), Arc::clone(&api), store.clone());
    controller.submit("first", Category::Melody).await;
    settle(&mut controller).await;
    drop(controller);

    // Second run: the id comes back from disk, not from any response
    let api2 = Arc::new(ScriptedApi::new(vec![Ok(GenerationResult {
        output_text: "two".to_string(),
        session_id: None,
        output_id: None,
        mode: None,
    })]));
    let (mut controller2, _events2) = build_controller(provider, Arc::clone(&api2), store);
    assert_eq!(controller2.session_id(), "sess-persist");

    controller2.submit("second", Category::Melody).await;
    settle(&mut controller2).await;

    assert_eq!(api2.requests.lock()[0].session_id, "sess-persist");
    assert_eq!(controller2.session_id(), "sess-persist");
}

// =============================================================================
// Test 4: Login flow from cold start
// =============================================================================

/// From a signed-out start, observing auth starts exactly one login flow,
/// polling completes it, and the signed-in event follows.
#[tokio::test]
async fn test_login_flow_cold_start() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("session_id"));
    let provider = Arc::new(ScriptedProvider::signed_out(3));
    let api = Arc::new(ScriptedApi::new(Vec::new()));

    let (mut controller, mut events) = build_controller(Arc::clone(&provider), api, store);

    // Submitting before login fails fast with no network call
    controller.submit("too eager", Category::Poetry).await;
    assert_eq!(controller.error(), Some("User not authenticated!"));

    // Drive the auth machine until signed in
    for _ in 0..10 {
        controller.observe_auth().await;
        if controller.auth_state().is_authenticated {
            break;
        }
    }

    assert!(controller.auth_state().is_authenticated);
    assert_eq!(
        provider.login_calls.load(Ordering::SeqCst),
        1,
        "login must start exactly once"
    );

    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::LoginRequired { prompt } if prompt.user_code == "WXYZ-1234"
    ));
    // Remaining observations produce exactly one Authenticated event
    controller.observe_auth().await;
    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::Authenticated { .. }
    ));
    assert!(events.try_recv().is_err());
}

// =============================================================================
// Test 5: History round trip
// =============================================================================

/// Once a session exists, fetching history loads entries for that session.
#[tokio::test]
async fn test_history_for_current_session() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("session_id"));
    store.save("sess-h").unwrap();

    let provider = Arc::new(ScriptedProvider::signed_in());
    let api = Arc::new(ScriptedApi::new(Vec::new()));
    let (mut controller, mut events) = build_controller(provider, api, store);

    controller.fetch_history().await;
    for _ in 0..100 {
        controller.poll().await;
        if controller.history().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let history = controller.history().expect("history should have loaded");
    assert_eq!(history.session_id, "sess-h");
    assert!(matches!(
        events.try_recv().unwrap(),
        ControllerEvent::HistoryLoaded { .. }
    ));
}
