//! Session-aware HTTP execution with single-flight token refresh.
//!
//! [`SessionClient`] wraps an [`HttpTransport`] with bearer-token
//! attachment and repairs a rejected access token by refreshing it at
//! most once per call. Callers that observe a 401 while a refresh is
//! already in flight join it instead of starting their own; every
//! waiter sees the same resolution.

use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, ApiResult};
use crate::session_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionStatus, StatusChangedPayload,
};
use crate::transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
use chrono::{Duration as ChronoDuration, Utc};
use client_config::Config;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_vault::{SessionMeta, TokenVault};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Login response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Refresh response body. The refresh token is reused unless the
/// backend rotates it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Callback type for session status change notifications.
pub type StatusCallback = Box<dyn Fn(StatusChangedPayload) + Send + Sync>;

/// Outcome of one owned refresh, shared with every waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Rotated,
    Failed,
}

/// Mutable session state: the token pair plus the FSM tracking status.
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    username: Option<String>,
    fsm: SessionMachine,
}

struct ClientInner {
    config: Config,
    transport: Arc<dyn HttpTransport>,
    vault: TokenVault,
    refresh_config: RefreshConfig,
    /// Guarded by a sync mutex; never held across an await.
    session: Mutex<SessionState>,
    /// `Some` while a refresh is in flight; waiters clone the receiver.
    pending_refresh: Mutex<Option<watch::Receiver<Option<RefreshOutcome>>>>,
    status_callback: Mutex<Option<StatusCallback>>,
}

/// Session-aware API client.
///
/// Cheap to clone; clones share the session, so concurrent callers
/// coordinate on the same token pair and the same pending refresh.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

impl SessionClient {
    /// Create a client backed by a reqwest transport.
    pub fn new(config: Config, vault: TokenVault) -> ApiResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let transport = Arc::new(
            ReqwestTransport::new(timeout).map_err(|e| ApiError::Unknown(e.to_string()))?,
        );
        Ok(Self::with_transport(config, vault, transport))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(
        config: Config,
        vault: TokenVault,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::with_refresh_config(config, vault, transport, RefreshConfig::default())
    }

    /// Create a client with a custom transport and refresh behavior.
    pub fn with_refresh_config(
        config: Config,
        vault: TokenVault,
        transport: Arc<dyn HttpTransport>,
        refresh_config: RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                vault,
                refresh_config,
                session: Mutex::new(SessionState {
                    access_token: None,
                    refresh_token: None,
                    username: None,
                    fsm: SessionMachine::new(),
                }),
                pending_refresh: Mutex::new(None),
                status_callback: Mutex::new(None),
            }),
        }
    }

    /// Set a callback to be notified of session status changes.
    pub fn set_status_callback(&self, callback: StatusCallback) {
        let mut cb = self.inner.status_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Get a snapshot of the current session status.
    pub fn status(&self) -> SessionStatus {
        let session = self.inner.session.lock().unwrap();
        SessionStatus::from(session.fsm.state())
    }

    /// Execute a described call, returning the raw status and body bytes.
    ///
    /// A 401 on an authenticated call triggers (or joins) a token
    /// refresh and retries the call exactly once with the rotated
    /// token. A second 401 after the retry surfaces as
    /// [`ApiError::Unauthorized`].
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> ApiResult<(u16, Vec<u8>)> {
        let token = if descriptor.requires_auth {
            match self.inner.access_token() {
                Some(token) => Some(token),
                None => {
                    debug!(path = %descriptor.path, "Rejecting authenticated call without a token");
                    return Err(ApiError::Unauthorized);
                }
            }
        } else {
            None
        };

        let response = self.inner.send(descriptor, token.as_deref()).await?;

        if response.status != 401 || !descriptor.requires_auth {
            return classify(response);
        }

        debug!(path = %descriptor.path, "Access token rejected, coordinating refresh");
        self.inner.clone().await_refresh().await?;

        let token = self.inner.access_token().ok_or(ApiError::Unauthorized)?;
        let retried = self.inner.send(descriptor, Some(&token)).await?;
        if retried.status == 401 {
            warn!(path = %descriptor.path, "Still unauthorized after refresh");
            return Err(ApiError::Unauthorized);
        }
        classify(retried)
    }

    /// Login with username and password.
    ///
    /// On success the returned token pair is installed in the session
    /// and persisted to the vault.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<()> {
        self.inner.transition(&SessionMachineInput::LoginAttempt)?;

        debug!(username = %username, "Attempting login");

        match self.inner.try_login(username, password).await {
            Ok(data) => {
                {
                    let mut session = self.inner.session.lock().unwrap();
                    session.username = Some(username.to_string());
                }
                if let Err(e) =
                    self.inner
                        .install_tokens(&data.access_token, &data.refresh_token, data.expires_in)
                {
                    warn!(error = %e, "Failed to persist session after login");
                    self.inner.clear_session_storage();
                    let _ = self.inner.transition(&SessionMachineInput::LoginFailed);
                    return Err(e);
                }
                self.inner.transition(&SessionMachineInput::LoginSucceeded)?;
                info!(username = %username, "Login successful");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                let _ = self.inner.transition(&SessionMachineInput::LoginFailed);
                Err(e)
            }
        }
    }

    /// Sign out, clearing the session and the vault.
    pub fn sign_out(&self) {
        let _ = self.inner.transition(&SessionMachineInput::SignOut);
        self.inner.clear_session_storage();
        info!("Signed out");
    }

    /// Restore a persisted session from the vault.
    ///
    /// Returns true when a token pair was found and installed. No
    /// server round-trip happens here; a stale token self-corrects
    /// through the refresh path on first use.
    pub fn restore(&self) -> ApiResult<bool> {
        let (access, refresh) = self.inner.vault.load_tokens()?;
        let (Some(access), Some(refresh)) = (access, refresh) else {
            debug!("No persisted session to restore");
            return Ok(false);
        };

        let meta = self.inner.vault.load_meta()?;
        {
            let mut session = self.inner.session.lock().unwrap();
            session.access_token = Some(access);
            session.refresh_token = Some(refresh);
            session.username = meta.and_then(|m| m.username);
        }
        self.inner
            .transition(&SessionMachineInput::SessionRestored)?;
        info!("Session restored from vault");
        Ok(true)
    }
}

impl ClientInner {
    fn access_token(&self) -> Option<String> {
        self.session.lock().unwrap().access_token.clone()
    }

    /// Transition the FSM and notify the callback if the status changed.
    fn transition(&self, input: &SessionMachineInput) -> ApiResult<SessionStatus> {
        let mut session = self.session.lock().unwrap();
        let old_status = SessionStatus::from(session.fsm.state());

        session.fsm.consume(input).map_err(|_| {
            ApiError::InvalidTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                session.fsm.state()
            ))
        })?;

        let new_status = SessionStatus::from(session.fsm.state());
        let username = session.username.clone();
        drop(session);

        if old_status != new_status {
            debug!(
                old_status = ?old_status,
                new_status = ?new_status,
                "Session status transition"
            );
            self.notify_status_change(new_status, username);
        }

        Ok(new_status)
    }

    fn notify_status_change(&self, status: SessionStatus, username: Option<String>) {
        let cb = self.status_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback(StatusChangedPayload { status, username });
        }
    }

    fn request_url(&self, path: &str) -> ApiResult<Url> {
        let joined = format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> ApiResult<TransportResponse> {
        let request = TransportRequest {
            method: descriptor.method.clone(),
            url: self.request_url(&descriptor.path)?,
            bearer_token: token.map(str::to_string),
            body: descriptor.body.clone(),
        };
        Ok(self.transport.send(request).await?)
    }

    /// Join the pending refresh, or become its owner.
    ///
    /// The owner spawns the refresh on its own task: cancelling the
    /// call that started it must not cancel it for the callers that
    /// joined. Resolves `Ok` when a rotated token is installed.
    async fn await_refresh(self: Arc<Self>) -> ApiResult<()> {
        let mut rx = {
            let mut pending = self.pending_refresh.lock().unwrap();
            match pending.as_ref() {
                Some(rx) => {
                    debug!("Joining refresh already in flight");
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    *pending = Some(rx.clone());

                    let owner = self.clone();
                    tokio::spawn(async move {
                        let outcome = owner.run_refresh().await;
                        *owner.pending_refresh.lock().unwrap() = None;
                        let _ = tx.send(Some(outcome));
                    });
                    rx
                }
            }
        };

        loop {
            let outcome = *rx.borrow_and_update();
            match outcome {
                Some(RefreshOutcome::Rotated) => return Ok(()),
                Some(RefreshOutcome::Failed) => return Err(ApiError::Unauthorized),
                None => {
                    if rx.changed().await.is_err() {
                        return Err(ApiError::Unauthorized);
                    }
                }
            }
        }
    }

    /// Perform the owned refresh: rotate the token pair or expire the
    /// session. Exactly one of these runs at a time.
    async fn run_refresh(&self) -> RefreshOutcome {
        let refresh_token = {
            let session = self.session.lock().unwrap();
            session.refresh_token.clone()
        };
        let Some(refresh_token) = refresh_token else {
            warn!("Access token rejected but no refresh token is held, expiring session");
            let _ = self.transition(&SessionMachineInput::TokenRejected);
            let _ = self.transition(&SessionMachineInput::RefreshFailed);
            self.clear_session_storage();
            return RefreshOutcome::Failed;
        };

        if self.transition(&SessionMachineInput::TokenRejected).is_err() {
            // The session already left Authenticated (signed out or
            // expired under us); there is nothing to refresh.
            return RefreshOutcome::Failed;
        }

        match self.try_refresh_cycle(&refresh_token).await {
            Ok(()) => {
                let _ = self.transition(&SessionMachineInput::RefreshSucceeded);
                info!("Access token rotated");
                RefreshOutcome::Rotated
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, expiring session");
                let _ = self.transition(&SessionMachineInput::RefreshFailed);
                self.clear_session_storage();
                RefreshOutcome::Failed
            }
        }
    }

    async fn try_refresh_cycle(&self, refresh_token: &str) -> ApiResult<()> {
        let data = self.refresh_with_backoff(refresh_token).await?;
        let rotated_refresh = data.refresh_token.as_deref().unwrap_or(refresh_token);
        self.install_tokens(&data.access_token, rotated_refresh, data.expires_in)
    }

    /// Call the refresh endpoint, retrying transient failures with
    /// exponential backoff. Non-transient failures are terminal.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> ApiResult<RefreshResponse> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() => {
                    last_error = Some(e);

                    if attempt + 1 < self.refresh_config.max_retries {
                        let _ = self.transition(&SessionMachineInput::RefreshRetry);

                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ApiError::Unknown(format!(
                "refresh failed after {} attempts",
                self.refresh_config.max_retries
            ))
        }))
    }

    /// Single attempt against the refresh endpoint.
    async fn try_refresh(&self, refresh_token: &str) -> ApiResult<RefreshResponse> {
        let url = self.request_url(&self.config.refresh_path)?;
        debug!(url = %url, "Refreshing access token");

        let request = TransportRequest {
            method: Method::POST,
            url,
            bearer_token: None,
            body: Some(json!({ "refreshToken": refresh_token })),
        };
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Refresh endpoint rejected the request");
            return Err(match response.status {
                status if (500..600).contains(&status) => ApiError::ServerError(status),
                _ => ApiError::Unauthorized,
            });
        }

        serde_json::from_slice(&response.body).map_err(ApiError::Decoding)
    }

    async fn try_login(&self, username: &str, password: &str) -> ApiResult<LoginResponse> {
        let url = self.request_url(&self.config.login_path)?;

        let request = TransportRequest {
            method: Method::POST,
            url,
            bearer_token: None,
            body: Some(json!({ "username": username, "password": password })),
        };
        let response = self.transport.send(request).await?;

        let (_, body) = classify(response)?;
        serde_json::from_slice(&body).map_err(ApiError::Decoding)
    }

    /// Install a token pair in the session and persist it.
    fn install_tokens(
        &self,
        access: &str,
        refresh: &str,
        expires_in: Option<i64>,
    ) -> ApiResult<()> {
        let username = {
            let mut session = self.session.lock().unwrap();
            session.access_token = Some(access.to_string());
            session.refresh_token = Some(refresh.to_string());
            session.username.clone()
        };

        self.vault.save_tokens(access, refresh)?;
        self.vault.save_meta(&SessionMeta {
            username,
            expires_at: expires_in
                .map(|secs| (Utc::now() + ChronoDuration::seconds(secs)).to_rfc3339()),
        })?;
        Ok(())
    }

    /// Drop the in-memory token pair and clear the vault. A failed
    /// vault clear is logged rather than surfaced; the in-memory
    /// session is reset either way.
    fn clear_session_storage(&self) {
        {
            let mut session = self.session.lock().unwrap();
            session.access_token = None;
            session.refresh_token = None;
            session.username = None;
        }
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "Failed to clear token vault");
        }
    }
}

/// Map a completed exchange to the raw payload or a classified error.
fn classify(response: TransportResponse) -> ApiResult<(u16, Vec<u8>)> {
    match response.status {
        status if (200..300).contains(&status) => Ok((status, response.body)),
        401 => Err(ApiError::Unauthorized),
        403 => Err(ApiError::Forbidden),
        status => Err(ApiError::ServerError(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    /// Scripted transport: a login endpoint handing out A1/R1, a
    /// refresh endpoint rotating to a configured access token, and a
    /// resource endpoint accepting only the currently valid token.
    struct MockTransport {
        /// Token the resource endpoint currently accepts.
        valid_token: Mutex<String>,
        /// Access token the refresh endpoint hands out.
        rotated_token: String,
        /// Refresh token rotation, when the backend rotates it.
        rotated_refresh: Option<String>,
        /// Whether the refresh endpoint accepts the request.
        refresh_ok: bool,
        /// Artificial refresh latency, to let concurrent callers pile up.
        refresh_delay_ms: u64,
        /// Force a status for resource calls regardless of token.
        resource_status: Option<u16>,
        /// Force a status for login calls.
        login_status: Option<u16>,
        login_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        resource_calls: AtomicUsize,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                valid_token: Mutex::new("A1".to_string()),
                rotated_token: "A2".to_string(),
                rotated_refresh: None,
                refresh_ok: true,
                refresh_delay_ms: 0,
                resource_status: None,
                login_status: None,
                login_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                resource_calls: AtomicUsize::new(0),
            }
        }
    }

    fn json_response(status: u16, body: serde_json::Value) -> TransportResponse {
        TransportResponse {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            match request.url.path() {
                "/auth/login" => {
                    self.login_calls.fetch_add(1, SeqCst);
                    if let Some(status) = self.login_status {
                        return Ok(json_response(status, json!({"error": "bad credentials"})));
                    }
                    Ok(json_response(
                        200,
                        json!({"accessToken": "A1", "refreshToken": "R1", "expiresIn": 3600}),
                    ))
                }
                "/auth/refresh" => {
                    self.refresh_calls.fetch_add(1, SeqCst);
                    if self.refresh_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.refresh_delay_ms)).await;
                    }
                    if !self.refresh_ok {
                        return Ok(json_response(401, json!({"error": "refresh token revoked"})));
                    }
                    *self.valid_token.lock().unwrap() = self.rotated_token.clone();
                    let mut body = json!({"accessToken": self.rotated_token});
                    if let Some(refresh) = &self.rotated_refresh {
                        body["refreshToken"] = json!(refresh);
                    }
                    Ok(json_response(200, body))
                }
                "/health" => Ok(json_response(200, json!({"status": "ok"}))),
                _ => {
                    self.resource_calls.fetch_add(1, SeqCst);
                    if let Some(status) = self.resource_status {
                        return Ok(json_response(status, json!({})));
                    }
                    match &request.bearer_token {
                        Some(token) if *token == *self.valid_token.lock().unwrap() => {
                            Ok(json_response(200, json!({"value": 42})))
                        }
                        _ => Ok(json_response(401, json!({"error": "token expired"}))),
                    }
                }
            }
        }
    }

    /// Transport that always fails at the connection level.
    struct FailingTransport {
        timeout: bool,
    }

    #[async_trait]
    impl HttpTransport for FailingTransport {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            if self.timeout {
                Err(TransportError::Timeout)
            } else {
                Err(TransportError::Network("connection refused".to_string()))
            }
        }
    }

    fn test_config() -> Config {
        Config {
            log_level: "debug".to_string(),
            api_url: "https://api.test".to_string(),
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            request_timeout_secs: 5,
        }
    }

    fn test_client(mock: Arc<MockTransport>) -> SessionClient {
        SessionClient::with_transport(test_config(), TokenVault::in_memory(), mock)
    }

    #[tokio::test]
    async fn test_authenticated_call_without_token_fails_fast() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock.clone());

        let err = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        // The transport was never contacted
        assert_eq!(mock.resource_calls.load(SeqCst), 0);
        assert_eq!(mock.refresh_calls.load(SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();

        assert_eq!(client.status(), SessionStatus::Authenticated);
        assert_eq!(mock.login_calls.load(SeqCst), 1);

        let session = client.inner.session.lock().unwrap();
        assert_eq!(session.access_token, Some("A1".to_string()));
        assert_eq!(session.refresh_token, Some("R1".to_string()));
        drop(session);

        let (access, refresh) = client.inner.vault.load_tokens().unwrap();
        assert_eq!(access, Some("A1".to_string()));
        assert_eq!(refresh, Some("R1".to_string()));
    }

    #[tokio::test]
    async fn test_login_failure_leaves_signed_out() {
        let mut mock = MockTransport::new();
        mock.login_status = Some(401);
        let client = test_client(Arc::new(mock));

        let err = client.login("alice", "wrong").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(client.status(), SessionStatus::SignedOut);
        assert!(!client.inner.vault.has_tokens().unwrap());
    }

    #[tokio::test]
    async fn test_401_triggers_refresh_and_single_retry() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();
        // The server stops accepting A1
        *mock.valid_token.lock().unwrap() = "A2".to_string();

        let (status, body) = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap();

        assert_eq!(status, 200);
        let decoded: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded["value"], 42);

        assert_eq!(mock.refresh_calls.load(SeqCst), 1);
        assert_eq!(mock.resource_calls.load(SeqCst), 2);
        assert_eq!(client.status(), SessionStatus::Authenticated);

        // Rotated access token installed and persisted; refresh token
        // unchanged because the backend did not rotate it
        let (access, refresh) = client.inner.vault.load_tokens().unwrap();
        assert_eq!(access, Some("A2".to_string()));
        assert_eq!(refresh, Some("R1".to_string()));
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_persisted() {
        let mut mock = MockTransport::new();
        mock.rotated_refresh = Some("R2".to_string());
        let mock = Arc::new(mock);
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();
        *mock.valid_token.lock().unwrap() = "A2".to_string();

        client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap();

        let (access, refresh) = client.inner.vault.load_tokens().unwrap();
        assert_eq!(access, Some("A2".to_string()));
        assert_eq!(refresh, Some("R2".to_string()));
    }

    #[tokio::test]
    async fn test_second_401_after_refresh_is_terminal() {
        let mut mock = MockTransport::new();
        // Resource endpoint rejects everything, even the rotated token
        mock.resource_status = Some(401);
        let mock = Arc::new(mock);
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();

        let err = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        // One refresh, one retry, and no further refresh attempts
        assert_eq!(mock.refresh_calls.load(SeqCst), 1);
        assert_eq!(mock.resource_calls.load(SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_expires_session_and_clears_vault() {
        let mut mock = MockTransport::new();
        mock.refresh_ok = false;
        let mock = Arc::new(mock);
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();
        *mock.valid_token.lock().unwrap() = "A2".to_string();

        let err = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(client.status(), SessionStatus::Expired);
        assert_eq!(mock.refresh_calls.load(SeqCst), 1);
        assert_eq!(client.inner.vault.load_tokens().unwrap(), (None, None));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_401s_share_a_single_refresh() {
        let mut mock = MockTransport::new();
        // Slow refresh so every caller observes its 401 while the
        // refresh is still in flight
        mock.refresh_delay_ms = 100;
        let mock = Arc::new(mock);
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();
        *mock.valid_token.lock().unwrap() = "A2".to_string();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.execute(&RequestDescriptor::get("/items")).await
            }));
        }

        for handle in handles {
            let (status, _) = handle.await.unwrap().unwrap();
            assert_eq!(status, 200);
        }

        assert_eq!(mock.refresh_calls.load(SeqCst), 1);
        assert_eq!(client.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_public_call_needs_no_session() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock.clone());

        let (status, _) = client
            .execute(&RequestDescriptor::get("/health").public())
            .await
            .unwrap();

        assert_eq!(status, 200);
        assert_eq!(mock.refresh_calls.load(SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_error_does_not_trigger_refresh() {
        let mut mock = MockTransport::new();
        mock.resource_status = Some(500);
        let mock = Arc::new(mock);
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();

        let err = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ServerError(500)));
        assert_eq!(mock.refresh_calls.load(SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_forbidden() {
        let mut mock = MockTransport::new();
        mock.resource_status = Some(403);
        let client = test_client(Arc::new(mock));

        client.login("alice", "hunter2").await.unwrap();

        let err = client
            .execute(&RequestDescriptor::get("/admin"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_and_vault() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock.clone());

        client.login("alice", "hunter2").await.unwrap();
        client.sign_out();

        assert_eq!(client.status(), SessionStatus::SignedOut);
        assert!(!client.inner.vault.has_tokens().unwrap());

        let err = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_restore_from_vault() {
        let mock = Arc::new(MockTransport::new());
        let vault = TokenVault::in_memory();
        vault.save_tokens("A1", "R1").unwrap();
        vault
            .save_meta(&SessionMeta {
                username: Some("alice".to_string()),
                expires_at: None,
            })
            .unwrap();

        let client = SessionClient::with_transport(test_config(), vault, mock.clone());

        assert!(client.restore().unwrap());
        assert_eq!(client.status(), SessionStatus::Authenticated);

        let (status, _) = client
            .execute(&RequestDescriptor::get("/items"))
            .await
            .unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_restore_with_empty_vault() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock);

        assert!(!client.restore().unwrap());
        assert_eq!(client.status(), SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn test_status_callback_sees_transitions() {
        let mock = Arc::new(MockTransport::new());
        let client = test_client(mock);

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let statuses_clone = statuses.clone();
        client.set_status_callback(Box::new(move |payload| {
            statuses_clone.lock().unwrap().push(payload.status);
        }));

        client.login("alice", "hunter2").await.unwrap();
        client.sign_out();

        let seen = statuses.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                SessionStatus::Authenticating,
                SessionStatus::Authenticated,
                SessionStatus::SignedOut,
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_network_failure_surfaces() {
        let transport = Arc::new(FailingTransport { timeout: false });
        let client =
            SessionClient::with_transport(test_config(), TokenVault::in_memory(), transport);

        let err = client
            .execute(&RequestDescriptor::get("/health").public())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_transport_timeout_surfaces() {
        let transport = Arc::new(FailingTransport { timeout: true });
        let client =
            SessionClient::with_transport(test_config(), TokenVault::in_memory(), transport);

        let err = client
            .execute(&RequestDescriptor::get("/health").public())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_reported() {
        let mut config = test_config();
        config.api_url = "not a url".to_string();
        let client = SessionClient::with_transport(
            config,
            TokenVault::in_memory(),
            Arc::new(MockTransport::new()),
        );

        let err = client
            .execute(&RequestDescriptor::get("/health").public())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }
}
