//! Session controller: restore, login, register, logout, and the
//! background token refresh loop.
//!
//! The controller is the single authority for "who is the current user,
//! and is their credential valid". It is constructed from an injected
//! [`AuthGateway`] and [`TokenVault`]; consumers observe it through
//! [`SessionController::snapshot`] and the state-change callback.

use crate::error::{SessionError, SessionResult};
use crate::fsm::{SessionEvent, SessionMachine, SessionMachineInput, SessionState};
use lettings_gateway::{AuthGateway, AuthPayload, GatewayError, LoginRequest, RegisterRequest, User};
use lettings_vault::{SessionMeta, StoreProfile, TokenPair, TokenVault};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default interval between background refresh ticks (15 minutes).
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Callback type for session state change notifications.
pub type SessionCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Configuration for the background refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Fixed interval between refresh ticks.
    pub interval: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Current user record, absent when unauthenticated.
    pub user: Option<User>,
    /// True iff a validated user record is loaded.
    pub authenticated: bool,
    /// True only during the initial restore attempt.
    pub loading: bool,
    /// Current FSM state.
    pub state: SessionState,
}

struct ControllerInner {
    gateway: Arc<dyn AuthGateway>,
    vault: TokenVault,
    refresh_settings: RefreshSettings,
    fsm: Mutex<SessionMachine>,
    user: Mutex<Option<User>>,
    /// Which profile holds the live token pair, if any.
    active_profile: Mutex<Option<StoreProfile>>,
    loading: AtomicBool,
    /// Handle of the armed refresh loop; None = loop idle.
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    state_callback: Mutex<Option<SessionCallback>>,
}

/// Session controller.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    /// Create a new controller over the given gateway and vault.
    pub fn new(gateway: Arc<dyn AuthGateway>, vault: TokenVault) -> Self {
        Self::with_refresh_settings(gateway, vault, RefreshSettings::default())
    }

    /// Create a new controller with custom refresh settings.
    pub fn with_refresh_settings(
        gateway: Arc<dyn AuthGateway>,
        vault: TokenVault,
        refresh_settings: RefreshSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                gateway,
                vault,
                refresh_settings,
                fsm: Mutex::new(SessionMachine::new()),
                user: Mutex::new(None),
                active_profile: Mutex::new(None),
                loading: AtomicBool::new(false),
                refresh_task: Mutex::new(None),
                state_callback: Mutex::new(None),
            }),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionCallback) {
        let mut cb = self.inner.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Current observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = SessionState::from(self.inner.fsm.lock().unwrap().state());
        let user = self.inner.user.lock().unwrap().clone();

        SessionSnapshot {
            authenticated: state.is_authenticated() && user.is_some(),
            user,
            loading: self.inner.loading.load(Ordering::SeqCst),
            state,
        }
    }

    /// Landing route for the current user's role, if authenticated.
    pub fn landing_route(&self) -> Option<&'static str> {
        let snapshot = self.snapshot();
        if !snapshot.authenticated {
            return None;
        }
        snapshot.user.map(|u| u.role.landing_route())
    }

    /// Attempt silent restore from the durable store.
    ///
    /// Invoked once at startup. Reads the persisted token pair, validates
    /// it against the gateway, and falls back to one refresh-and-retry
    /// cycle if the access token is rejected. Every failure path degrades
    /// silently to logged-out with storage cleared; nothing is surfaced
    /// to the caller beyond the returned flag.
    ///
    /// Returns true if a session was restored.
    pub async fn restore_session(&self) -> bool {
        let inner = &self.inner;

        inner.loading.store(true, Ordering::SeqCst);
        if inner
            .transition(&SessionMachineInput::RestoreStarted)
            .is_err()
        {
            warn!("Session restore attempted in a non-restorable state, ignoring");
            inner.loading.store(false, Ordering::SeqCst);
            return self.snapshot().authenticated;
        }

        let restored = inner.try_restore().await;

        let authenticated = match restored {
            Some(user) => {
                info!(user_id = %user.id, role = %user.role, "Session restored");
                *inner.user.lock().unwrap() = Some(user);
                *inner.active_profile.lock().unwrap() = Some(StoreProfile::Durable);
                let _ = inner.transition(&SessionMachineInput::RestoreSucceeded);
                ControllerInner::arm_refresh_loop(inner);
                true
            }
            None => {
                *inner.user.lock().unwrap() = None;
                *inner.active_profile.lock().unwrap() = None;
                let _ = inner.transition(&SessionMachineInput::RestoreFailed);
                false
            }
        };

        // Lowered unconditionally, success or failure.
        inner.loading.store(false, Ordering::SeqCst);
        authenticated
    }

    /// Login with email and password.
    ///
    /// `remember` selects the storage profile for the token pair: durable
    /// when true, ephemeral when false.
    ///
    /// Never returns an error: transport failures are folded into a
    /// `success = false` payload, and an incomplete success payload is
    /// returned verbatim without touching session state.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> AuthPayload {
        let inner = &self.inner;

        if let Err(e) = inner.transition(&SessionMachineInput::LoginStarted) {
            return AuthPayload::failure(e.to_string());
        }

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let payload = match inner.gateway.login(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Login call failed");
                let _ = inner.transition(&SessionMachineInput::LoginFailed);
                return AuthPayload::failure(e.surface_message());
            }
        };

        if !payload.is_complete() {
            debug!(success = payload.success, "Login payload incomplete, state unchanged");
            let _ = inner.transition(&SessionMachineInput::LoginFailed);
            return payload;
        }

        let profile = if remember {
            StoreProfile::Durable
        } else {
            StoreProfile::Ephemeral
        };

        match inner.adopt_payload(profile, &payload) {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role, remember, "Login successful");
                let _ = inner.transition(&SessionMachineInput::LoginSucceeded);
                ControllerInner::arm_refresh_loop(inner);
                payload
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist session after login");
                let _ = inner.vault.clear_pair(profile);
                let _ = inner.transition(&SessionMachineInput::LoginFailed);
                AuthPayload::failure("Could not persist session".to_string())
            }
        }
    }

    /// Register a new account.
    ///
    /// Same shape and failure handling as [`SessionController::login`],
    /// except a successful registration always persists to the durable
    /// profile.
    pub async fn register(&self, request: &RegisterRequest) -> AuthPayload {
        let inner = &self.inner;

        if let Err(e) = inner.transition(&SessionMachineInput::RegisterStarted) {
            return AuthPayload::failure(e.to_string());
        }

        let payload = match inner.gateway.register(request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Registration call failed");
                let _ = inner.transition(&SessionMachineInput::RegisterFailed);
                return AuthPayload::failure(e.surface_message());
            }
        };

        if !payload.is_complete() {
            debug!(success = payload.success, "Registration payload incomplete, state unchanged");
            let _ = inner.transition(&SessionMachineInput::RegisterFailed);
            return payload;
        }

        match inner.adopt_payload(StoreProfile::Durable, &payload) {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role, "Registration successful");
                let _ = inner.transition(&SessionMachineInput::RegisterSucceeded);
                ControllerInner::arm_refresh_loop(inner);
                payload
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist session after registration");
                let _ = inner.vault.clear_pair(StoreProfile::Durable);
                let _ = inner.transition(&SessionMachineInput::RegisterFailed);
                AuthPayload::failure("Could not persist session".to_string())
            }
        }
    }

    /// Log out.
    ///
    /// The remote logout call is best-effort; local session state is torn
    /// down unconditionally, so logout is idempotent and
    /// client-authoritative.
    pub async fn logout(&self) {
        let inner = &self.inner;

        let _ = inner.transition(&SessionMachineInput::LogoutStarted);
        inner.disarm_refresh_loop();

        if let Some(access) = inner.live_access_token() {
            if let Err(e) = inner.gateway.logout(&access).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        if let Err(e) = inner.vault.clear_all() {
            warn!(error = %e, "Failed to clear credential stores during logout");
        }
        *inner.user.lock().unwrap() = None;
        *inner.active_profile.lock().unwrap() = None;
        inner.force_logged_out();

        info!("Logged out");
    }

    /// Whether the background refresh loop is currently armed.
    pub fn refresh_loop_armed(&self) -> bool {
        self.inner.refresh_task.lock().unwrap().is_some()
    }
}

impl ControllerInner {
    /// Reset the machine to the logged-out terminal state.
    ///
    /// Logout must land in `LoggedOut` even when it interrupted an
    /// in-flight transition, such as a refresh tick aborted mid-call;
    /// from those states a `LogoutFinished` transition is rejected.
    fn force_logged_out(&self) {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = SessionState::from(fsm.state());
        if old_state == SessionState::LoggedOut {
            return;
        }

        *fsm = SessionMachine::new();
        drop(fsm);

        debug!(old_state = ?old_state, "Session state forced to LoggedOut");
        self.notify_state_change(&SessionState::LoggedOut);
    }

    /// Transition the FSM and notify the callback if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> SessionResult<SessionState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: &SessionState) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            let user = self.user.lock().unwrap();
            let (user_id, email, role) = user
                .as_ref()
                .map(|u| (Some(u.id.clone()), Some(u.email.clone()), Some(u.role.clone())))
                .unwrap_or((None, None, None));

            callback(SessionEvent {
                state: state.clone(),
                user_id,
                email,
                role,
            });
        }
    }

    /// Restore body: validate the stored pair, falling back to one
    /// refresh-and-retry cycle. Failure clears storage and returns None.
    async fn try_restore(&self) -> Option<User> {
        let pair = match self.vault.read_pair(StoreProfile::Durable) {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                info!("No stored session found");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return None;
            }
        };

        match self.gateway.current_user(&pair.access).await {
            Ok(user) => {
                self.persist_meta(StoreProfile::Durable, &user);
                return Some(user);
            }
            Err(e) => {
                debug!(error = %e, "Stored access token rejected, attempting refresh");
            }
        }

        // One refresh cycle, then one retry of the identity check.
        let retried = match self.refresh_pair(StoreProfile::Durable, &pair.refresh).await {
            Ok(new_pair) => self
                .gateway
                .current_user(&new_pair.access)
                .await
                .map_err(SessionError::from),
            Err(e) => Err(e),
        };

        match retried {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored after refresh");
                self.persist_meta(StoreProfile::Durable, &user);
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed, clearing stored tokens");
                if let Err(clear_err) = self.vault.clear_all() {
                    warn!(error = %clear_err, "Failed to clear stores after restore failure");
                }
                None
            }
        }
    }

    /// Persist tokens and metadata from a complete auth payload and adopt
    /// the user into memory. The opposite profile is cleared first so at
    /// most one profile ever holds a live pair.
    fn adopt_payload(&self, profile: StoreProfile, payload: &AuthPayload) -> Result<User, SessionError> {
        let user = payload.user.clone().ok_or(SessionError::NotLoggedIn)?;
        let pair = TokenPair::new(
            payload.token.clone().ok_or(SessionError::NotLoggedIn)?,
            payload.refresh_token.clone().ok_or(SessionError::NotLoggedIn)?,
        );

        self.vault.clear_pair(profile.opposite())?;
        self.vault.store_pair(profile, &pair)?;
        self.persist_meta(profile, &user);

        *self.user.lock().unwrap() = Some(user.clone());
        *self.active_profile.lock().unwrap() = Some(profile);

        Ok(user)
    }

    fn persist_meta(&self, profile: StoreProfile, user: &User) {
        let meta = SessionMeta::now(
            user.id.clone(),
            Some(user.email.clone()).filter(|e| !e.is_empty()),
            Some(user.role.to_string()),
        );
        if let Err(e) = self.vault.set_session_meta(profile, &meta) {
            warn!(error = %e, "Failed to persist session metadata");
        }
    }

    /// Exchange the refresh token for a new pair and overwrite storage.
    ///
    /// The old pair is rotated out server-side by the exchange, so a
    /// failed persist fails the whole refresh; storage and memory must
    /// never diverge.
    async fn refresh_pair(
        &self,
        profile: StoreProfile,
        refresh_token: &str,
    ) -> SessionResult<TokenPair> {
        let payload = self.gateway.refresh(refresh_token).await?;

        if !payload.is_complete() {
            return Err(SessionError::Gateway(GatewayError::Rejected {
                status: 200,
                message: "Refresh response missing token pair".to_string(),
            }));
        }

        let pair = TokenPair::new(
            payload.token.unwrap_or_default(),
            payload.refresh_token.unwrap_or_default(),
        );

        self.vault.store_pair(profile, &pair)?;

        Ok(pair)
    }

    fn live_access_token(&self) -> Option<String> {
        let profile = (*self.active_profile.lock().unwrap())?;
        self.vault
            .read_pair(profile)
            .ok()
            .flatten()
            .map(|pair| pair.access)
    }

    /// One background refresh tick.
    ///
    /// Returns true when the loop should stay armed.
    async fn refresh_tick(&self) -> bool {
        if self.transition(&SessionMachineInput::RefreshStarted).is_err() {
            debug!("Refresh tick skipped, no live session");
            return false;
        }

        let profile = match *self.active_profile.lock().unwrap() {
            Some(profile) => profile,
            None => {
                self.fail_refresh();
                return false;
            }
        };

        let pair = match self.vault.read_pair(profile) {
            Ok(Some(pair)) => pair,
            _ => {
                warn!("Refresh tick found no stored pair");
                self.fail_refresh();
                return false;
            }
        };

        match self.refresh_pair(profile, &pair.refresh).await {
            Ok(_) => {
                debug!("Background refresh succeeded");
                let _ = self.transition(&SessionMachineInput::RefreshSucceeded);
                true
            }
            Err(e) => {
                warn!(error = %e, "Background refresh failed, logging out");
                self.fail_refresh();
                false
            }
        }
    }

    /// Terminal refresh failure: clear everything and log out.
    fn fail_refresh(&self) {
        if let Err(e) = self.vault.clear_all() {
            warn!(error = %e, "Failed to clear stores after refresh failure");
        }
        *self.user.lock().unwrap() = None;
        *self.active_profile.lock().unwrap() = None;
        let _ = self.transition(&SessionMachineInput::RefreshFailed);
    }

    /// Arm the background refresh loop if it is not already running.
    ///
    /// The task holds only a weak reference, so a dropped controller
    /// cannot be kept alive by its own loop.
    fn arm_refresh_loop(inner: &Arc<ControllerInner>) {
        let mut guard = inner.refresh_task.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let weak: Weak<ControllerInner> = Arc::downgrade(inner);
        let interval = inner.refresh_settings.interval;

        debug!(interval_secs = interval.as_secs(), "Arming refresh loop");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; consume it so the
            // first real refresh happens one full interval after arming.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };

                if !inner.refresh_tick().await {
                    // Self-disarm: no retries after a terminal failure.
                    *inner.refresh_task.lock().unwrap() = None;
                    break;
                }
            }
        });

        *guard = Some(handle);
    }

    /// Cancel the refresh loop and de-schedule any pending tick.
    fn disarm_refresh_loop(&self) {
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            debug!("Disarming refresh loop");
            handle.abort();
        }
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Ok(guard) = self.refresh_task.get_mut() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lettings_gateway::{GatewayResult, RefreshPayload, Role};
    use lettings_vault::{CredentialStore, MemoryStore, VaultError, VaultResult};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Gateway double with scripted responses.
    ///
    /// Each operation pops the next scripted result; an empty script
    /// answers with a rejection (or success, for logout). With
    /// `refresh_pends` set, an unscripted refresh never resolves,
    /// simulating a hung network call.
    #[derive(Default)]
    struct MockGateway {
        login_results: Mutex<VecDeque<GatewayResult<AuthPayload>>>,
        register_results: Mutex<VecDeque<GatewayResult<AuthPayload>>>,
        current_user_results: Mutex<VecDeque<GatewayResult<User>>>,
        refresh_results: Mutex<VecDeque<GatewayResult<RefreshPayload>>>,
        logout_results: Mutex<VecDeque<GatewayResult<()>>>,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
        refresh_pends: AtomicBool,
    }

    impl MockGateway {
        fn rejected(status: u16, message: &str) -> GatewayError {
            GatewayError::Rejected {
                status,
                message: message.to_string(),
            }
        }

        fn push_login(&self, result: GatewayResult<AuthPayload>) {
            self.login_results.lock().unwrap().push_back(result);
        }

        fn push_register(&self, result: GatewayResult<AuthPayload>) {
            self.register_results.lock().unwrap().push_back(result);
        }

        fn push_current_user(&self, result: GatewayResult<User>) {
            self.current_user_results.lock().unwrap().push_back(result);
        }

        fn push_refresh(&self, result: GatewayResult<RefreshPayload>) {
            self.refresh_results.lock().unwrap().push_back(result);
        }

        fn push_logout(&self, result: GatewayResult<()>) {
            self.logout_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl AuthGateway for MockGateway {
        async fn login(&self, _request: &LoginRequest) -> GatewayResult<AuthPayload> {
            self.login_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::rejected(401, "unscripted login")))
        }

        async fn register(&self, _request: &RegisterRequest) -> GatewayResult<AuthPayload> {
            self.register_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::rejected(400, "unscripted register")))
        }

        async fn current_user(&self, _access_token: &str) -> GatewayResult<User> {
            self.current_user_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::rejected(401, "unscripted current_user")))
        }

        async fn refresh(&self, _refresh_token: &str) -> GatewayResult<RefreshPayload> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.refresh_results.lock().unwrap().pop_front();
            if let Some(result) = scripted {
                return result;
            }
            if self.refresh_pends.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Err(Self::rejected(401, "unscripted refresh"))
        }

        async fn logout(&self, _access_token: &str) -> GatewayResult<()> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            self.logout_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    /// Store double whose writes can be made to fail on demand.
    struct FlakyStore {
        inner: MemoryStore,
        fail_sets: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn new(fail_sets: Arc<AtomicBool>) -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_sets,
            }
        }
    }

    impl CredentialStore for FlakyStore {
        fn set(&self, key: &str, value: &str) -> VaultResult<()> {
            if self.fail_sets.load(Ordering::SeqCst) {
                return Err(VaultError::Backend("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> VaultResult<Option<String>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> VaultResult<bool> {
            self.inner.delete(key)
        }
    }

    fn test_user(role: Role) -> User {
        User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "a@b.com".to_string(),
            role,
            is_verified: true,
            permissions: Vec::new(),
            referral_code: None,
        }
    }

    fn complete_payload(token: &str, refresh: &str, user: User) -> AuthPayload {
        AuthPayload {
            success: true,
            token: Some(token.to_string()),
            refresh_token: Some(refresh.to_string()),
            user: Some(user),
            message: None,
        }
    }

    fn complete_refresh(token: &str, refresh: &str) -> RefreshPayload {
        RefreshPayload {
            success: true,
            token: Some(token.to_string()),
            refresh_token: Some(refresh.to_string()),
            message: None,
        }
    }

    fn memory_vault() -> TokenVault {
        TokenVault::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    fn controller_with(gateway: Arc<MockGateway>) -> SessionController {
        SessionController::new(gateway, memory_vault())
    }

    fn seed_durable_pair(controller: &SessionController, access: &str, refresh: &str) {
        controller
            .inner
            .vault
            .store_pair(StoreProfile::Durable, &TokenPair::new(access, refresh))
            .unwrap();
    }

    fn durable_pair(controller: &SessionController) -> Option<TokenPair> {
        controller
            .inner
            .vault
            .read_pair(StoreProfile::Durable)
            .unwrap()
    }

    fn ephemeral_pair(controller: &SessionController) -> Option<TokenPair> {
        controller
            .inner
            .vault
            .read_pair(StoreProfile::Ephemeral)
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_remember_true_persists_durable() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        let controller = controller_with(gateway);

        let payload = controller.login("a@b.com", "pw", true).await;

        assert!(payload.success);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T1", "R1")));
        assert_eq!(ephemeral_pair(&controller), None);

        let snapshot = controller.snapshot();
        assert!(snapshot.authenticated);
        assert_eq!(snapshot.state, SessionState::LoggedIn);
        assert_eq!(snapshot.user.unwrap().role, Role::Landlord);
        assert!(controller.refresh_loop_armed());
    }

    #[tokio::test]
    async fn test_login_remember_false_uses_ephemeral() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Tenant))));
        let controller = controller_with(gateway);

        let payload = controller.login("a@b.com", "pw", false).await;

        assert!(payload.success);
        assert_eq!(ephemeral_pair(&controller), Some(TokenPair::new("T1", "R1")));
        assert_eq!(durable_pair(&controller), None);
    }

    #[tokio::test]
    async fn test_login_clears_stale_pair_in_opposite_profile() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T2", "R2", test_user(Role::Tenant))));
        let controller = controller_with(gateway);

        // A previous remembered session left a pair in the durable store
        seed_durable_pair(&controller, "stale-T", "stale-R");

        controller.login("a@b.com", "pw", false).await;

        assert_eq!(durable_pair(&controller), None);
        assert_eq!(ephemeral_pair(&controller), Some(TokenPair::new("T2", "R2")));
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_untouched() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(AuthPayload::failure("Invalid credentials")));
        let controller = controller_with(gateway);

        let payload = controller.login("a@b.com", "wrong", false).await;

        assert!(!payload.success);
        assert_eq!(payload.message.as_deref(), Some("Invalid credentials"));
        assert_eq!(durable_pair(&controller), None);
        assert_eq!(ephemeral_pair(&controller), None);

        let snapshot = controller.snapshot();
        assert!(!snapshot.authenticated);
        assert_eq!(snapshot.state, SessionState::LoggedOut);
        assert!(!controller.refresh_loop_armed());
    }

    #[tokio::test]
    async fn test_login_transport_error_folds_to_failure_payload() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Err(MockGateway::rejected(503, "service unavailable")));
        let controller = controller_with(gateway);

        let payload = controller.login("a@b.com", "pw", true).await;

        assert!(!payload.success);
        assert_eq!(payload.message.as_deref(), Some("service unavailable"));
        assert_eq!(controller.snapshot().state, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_login_incomplete_payload_returned_verbatim() {
        let gateway = Arc::new(MockGateway::default());
        // Success flag but no user record: malformed success
        gateway.push_login(Ok(AuthPayload {
            success: true,
            token: Some("T1".to_string()),
            refresh_token: Some("R1".to_string()),
            user: None,
            message: None,
        }));
        let controller = controller_with(gateway);

        let payload = controller.login("a@b.com", "pw", true).await;

        // Returned verbatim for the caller to inspect
        assert!(payload.success);
        assert_eq!(payload.token.as_deref(), Some("T1"));

        // But session state and storage are untouched
        assert!(!controller.snapshot().authenticated);
        assert_eq!(durable_pair(&controller), None);
    }

    #[tokio::test]
    async fn test_register_always_persists_durable() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_register(Ok(complete_payload("T1", "R1", test_user(Role::Agent))));
        let controller = controller_with(gateway);

        let request = RegisterRequest {
            name: "Ada".to_string(),
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
            role: "agent".to_string(),
            ..RegisterRequest::default()
        };
        let payload = controller.register(&request).await;

        assert!(payload.success);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T1", "R1")));
        assert_eq!(ephemeral_pair(&controller), None);
        assert!(controller.snapshot().authenticated);
    }

    #[tokio::test]
    async fn test_register_failure_surfaces_message() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_register(Ok(AuthPayload::failure("Email already registered")));
        let controller = controller_with(gateway);

        let request = RegisterRequest::default();
        let payload = controller.register(&request).await;

        assert!(!payload.success);
        assert_eq!(payload.message.as_deref(), Some("Email already registered"));
        assert!(!controller.snapshot().authenticated);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let gateway = Arc::new(MockGateway::default());
        let controller = controller_with(gateway.clone());

        // Logging out while already logged out must not panic or error
        controller.logout().await;
        controller.logout().await;

        let snapshot = controller.snapshot();
        assert!(!snapshot.authenticated);
        assert!(snapshot.user.is_none());
        assert_eq!(snapshot.state, SessionState::LoggedOut);
        assert_eq!(durable_pair(&controller), None);
        assert_eq!(ephemeral_pair(&controller), None);
        // No token pair existed, so no remote call was made
        assert_eq!(gateway.logout_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_locally_even_if_remote_fails() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        gateway.push_logout(Err(MockGateway::rejected(500, "server exploded")));
        let controller = controller_with(gateway.clone());

        controller.login("a@b.com", "pw", true).await;
        controller.logout().await;

        assert_eq!(gateway.logout_calls.load(Ordering::SeqCst), 1);
        assert!(!controller.snapshot().authenticated);
        assert_eq!(durable_pair(&controller), None);
        assert_eq!(ephemeral_pair(&controller), None);
        assert!(!controller.refresh_loop_armed());
    }

    #[tokio::test]
    async fn test_restore_without_tokens_is_logged_out() {
        let gateway = Arc::new(MockGateway::default());
        let controller = controller_with(gateway);

        let restored = controller.restore_session().await;

        assert!(!restored);
        let snapshot = controller.snapshot();
        assert!(!snapshot.authenticated);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.state, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_current_user(Ok(test_user(Role::Landlord)));
        let controller = controller_with(gateway);
        seed_durable_pair(&controller, "T1", "R1");

        let restored = controller.restore_session().await;

        assert!(restored);
        let snapshot = controller.snapshot();
        assert!(snapshot.authenticated);
        assert!(!snapshot.loading);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T1", "R1")));
        assert!(controller.refresh_loop_armed());
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_refresh() {
        let gateway = Arc::new(MockGateway::default());
        // Expired access token: first identity check fails, refresh
        // succeeds, retry passes with the new token.
        gateway.push_current_user(Err(MockGateway::rejected(401, "token expired")));
        gateway.push_refresh(Ok(complete_refresh("T2", "R2")));
        gateway.push_current_user(Ok(test_user(Role::Tenant)));
        let controller = controller_with(gateway);
        seed_durable_pair(&controller, "expired", "R1");

        let restored = controller.restore_session().await;

        assert!(restored);
        assert!(controller.snapshot().authenticated);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T2", "R2")));
    }

    #[tokio::test]
    async fn test_restore_with_dead_refresh_token_clears_storage() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_current_user(Err(MockGateway::rejected(401, "token expired")));
        gateway.push_refresh(Err(MockGateway::rejected(401, "refresh token revoked")));
        let controller = controller_with(gateway);
        seed_durable_pair(&controller, "expired", "dead");

        let restored = controller.restore_session().await;

        assert!(!restored);
        let snapshot = controller.snapshot();
        assert!(!snapshot.authenticated);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.state, SessionState::LoggedOut);
        assert_eq!(durable_pair(&controller), None);
        assert_eq!(ephemeral_pair(&controller), None);
    }

    #[tokio::test]
    async fn test_restore_retry_rejection_clears_storage() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_current_user(Err(MockGateway::rejected(401, "token expired")));
        gateway.push_refresh(Ok(complete_refresh("T2", "R2")));
        gateway.push_current_user(Err(MockGateway::rejected(401, "still rejected")));
        let controller = controller_with(gateway);
        seed_durable_pair(&controller, "expired", "R1");

        let restored = controller.restore_session().await;

        assert!(!restored);
        assert_eq!(durable_pair(&controller), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_tick_overwrites_pair_and_stays_armed() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        gateway.push_refresh(Ok(complete_refresh("T2", "R2")));
        gateway.push_refresh(Ok(complete_refresh("T3", "R3")));

        let controller = SessionController::with_refresh_settings(
            gateway.clone(),
            memory_vault(),
            RefreshSettings {
                interval: Duration::from_millis(100),
            },
        );

        controller.login("a@b.com", "pw", true).await;
        assert!(controller.refresh_loop_armed());

        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;

        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T2", "R2")));
        assert!(controller.snapshot().authenticated);
        assert!(controller.refresh_loop_armed());

        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;

        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 2);
        assert_eq!(durable_pair(&controller), Some(TokenPair::new("T3", "R3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_logs_out_and_self_disarms() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        gateway.push_refresh(Err(MockGateway::rejected(401, "refresh token revoked")));

        let controller = SessionController::with_refresh_settings(
            gateway.clone(),
            memory_vault(),
            RefreshSettings {
                interval: Duration::from_millis(100),
            },
        );

        controller.login("a@b.com", "pw", true).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;

        // Failed tick: session torn down, loop disarmed
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(!controller.snapshot().authenticated);
        assert_eq!(durable_pair(&controller), None);
        assert!(!controller.refresh_loop_armed());

        // No self-retry: many intervals later, still exactly one attempt
        tokio::time::sleep(Duration::from_millis(1000)).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_refresh_tick_lands_logged_out() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        gateway.refresh_pends.store(true, Ordering::SeqCst);

        let controller = SessionController::with_refresh_settings(
            gateway.clone(),
            memory_vault(),
            RefreshSettings {
                interval: Duration::from_millis(50),
            },
        );

        controller.login("a@b.com", "pw", true).await;

        // Let a tick start and hang on the network call
        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(controller.snapshot().state, SessionState::Refreshing);

        controller.logout().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, SessionState::LoggedOut);
        assert!(!snapshot.authenticated);
        assert!(!controller.refresh_loop_armed());
        assert_eq!(durable_pair(&controller), None);

        // The controller accepts a fresh login afterwards
        gateway.push_login(Ok(complete_payload("T2", "R2", test_user(Role::Landlord))));
        let payload = controller.login("a@b.com", "pw", true).await;
        assert!(payload.success);
        assert_eq!(controller.snapshot().state, SessionState::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_persist_failure_fails_the_tick() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        gateway.push_refresh(Ok(complete_refresh("T2", "R2")));

        let fail_sets = Arc::new(AtomicBool::new(false));
        let vault = TokenVault::new(
            Box::new(FlakyStore::new(fail_sets.clone())),
            Box::new(MemoryStore::new()),
        );
        let controller = SessionController::with_refresh_settings(
            gateway.clone(),
            vault,
            RefreshSettings {
                interval: Duration::from_millis(50),
            },
        );

        controller.login("a@b.com", "pw", true).await;

        // The gateway rotates the pair but the new one cannot be written
        fail_sets.store(true, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(!controller.snapshot().authenticated);
        assert_eq!(controller.snapshot().state, SessionState::LoggedOut);
        assert_eq!(durable_pair(&controller), None);
        assert!(!controller.refresh_loop_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_disarms_refresh_loop() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));

        let controller = SessionController::with_refresh_settings(
            gateway.clone(),
            memory_vault(),
            RefreshSettings {
                interval: Duration::from_millis(100),
            },
        );

        controller.login("a@b.com", "pw", true).await;
        controller.logout().await;

        assert!(!controller.refresh_loop_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_state_callback_reports_transitions() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Agent))));
        let controller = controller_with(gateway);

        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        controller.set_state_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        controller.login("a@b.com", "pw", true).await;

        let events = events.lock().unwrap();
        let states: Vec<SessionState> = events.iter().map(|e| e.state.clone()).collect();
        assert_eq!(states, vec![SessionState::LoggingIn, SessionState::LoggedIn]);

        let last = events.last().unwrap();
        assert_eq!(last.user_id.as_deref(), Some("u1"));
        assert_eq!(last.role, Some(Role::Agent));
    }

    #[tokio::test]
    async fn test_landing_route_for_authenticated_user() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Agent))));
        let controller = controller_with(gateway);

        assert_eq!(controller.landing_route(), None);

        controller.login("a@b.com", "pw", true).await;
        assert_eq!(controller.landing_route(), Some("/agent"));
    }

    #[tokio::test]
    async fn test_token_pairing_invariant_after_operations() {
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Landlord))));
        let controller = controller_with(gateway.clone());

        // After a successful login: both halves present
        controller.login("a@b.com", "pw", true).await;
        let pair = durable_pair(&controller).unwrap();
        assert!(!pair.access.is_empty() && !pair.refresh.is_empty());

        // After logout: neither half present in either profile
        controller.logout().await;
        for profile in [StoreProfile::Durable, StoreProfile::Ephemeral] {
            let store = controller.inner.vault.read_pair(profile).unwrap();
            assert_eq!(store, None);
        }
        assert!(controller
            .inner
            .vault
            .session_meta(StoreProfile::Durable)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_login_rejected_while_in_flight() {
        // The FSM rejects a second LoginStarted while one is pending;
        // exercised here via the state guard rather than real races.
        let gateway = Arc::new(MockGateway::default());
        gateway.push_login(Ok(complete_payload("T1", "R1", test_user(Role::Tenant))));
        let controller = controller_with(gateway);

        controller.login("a@b.com", "pw", true).await;

        // Logged in: another login attempt is refused by the FSM
        let second = controller.login("a@b.com", "pw", true).await;
        assert!(!second.success);
        assert!(second.message.is_some());
    }

    #[test]
    fn test_refresh_settings_default_interval() {
        let settings = RefreshSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(900));
    }
}
