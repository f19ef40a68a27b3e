//! Authenticated identity and the sign-in / sign-up / sign-out flows.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

use crate::common::{AuthSession, AuthUser, User};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{AuthApi, Gateway};
use crate::storage::SessionCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial session not resolved yet.
    Loading,
    SignedOut,
    SignedIn(AuthUser),
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            SessionState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthUser),
    /// Account exists but the backend wants the email confirmed before sign-in.
    ConfirmationRequired(AuthUser),
}

/// Refresh this long before the access token expires.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Floor for the refresh timer when a backend hands out very short tokens.
const MIN_REFRESH_DELAY: Duration = Duration::from_millis(250);

/// Owns the current session and broadcasts every change to subscribers.
pub struct SessionStore {
    auth: Arc<dyn AuthApi>,
    gateway: Arc<dyn Gateway>,
    cache: Option<Mutex<SessionCache>>,
    tokens: Mutex<Option<AuthSession>>,
    refresh_margin: Duration,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthApi>, gateway: Arc<dyn Gateway>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            auth,
            gateway,
            cache: None,
            tokens: Mutex::new(None),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            state,
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Persist sessions in `cache` so a restart can resume them.
    pub fn with_cache(mut self, cache: SessionCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    /// Session-change notifications. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    /// Resolve the initial session from the cache, refreshing its tokens.
    pub async fn restore(&self) -> Option<AuthUser> {
        let stored = match self.cached(|cache| cache.load()) {
            Some(Ok(stored)) => stored,
            Some(Err(err)) => {
                log::warn!("Failed to read stored session: {err}");
                None
            }
            None => None,
        };

        let Some(stored) = stored.filter(|stored| stored.refresh_token.is_some()) else {
            self.publish(SessionState::SignedOut);
            return None;
        };

        *self.tokens() = Some(stored.into());
        match self.refresh().await {
            Ok(user) => {
                log::info!("Restored session for {}", user.email);
                Some(user)
            }
            Err(_) => None,
        }
    }

    /// When the access token should be renewed, relative to now. `None`
    /// while signed out or when the backend gave no expiry.
    pub fn refresh_delay(&self) -> Option<Duration> {
        let expires_at = self.tokens().as_ref()?.expires_at?;
        let margin = TimeDelta::from_std(self.refresh_margin).unwrap_or(TimeDelta::zero());
        Some(delay_until(expires_at - margin).max(MIN_REFRESH_DELAY))
    }

    /// Trade the refresh token for a new session. A rejected refresh signs
    /// the user out.
    pub async fn refresh(&self) -> GatewayResult<AuthUser> {
        let refresh_token = self
            .tokens()
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .ok_or(GatewayError::NotAuthenticated)?;

        match self.auth.refresh_session(&refresh_token).await {
            Ok(session) => {
                log::debug!("Refreshed session for {}", session.user.id);
                Ok(self.establish(session))
            }
            Err(err) => {
                log::warn!("Error refreshing session: {err}");
                self.forget();
                self.publish(SessionState::SignedOut);
                Err(err)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthUser> {
        let session = self.auth.sign_in_with_password(email, password).await?;
        Ok(self.establish(session))
    }

    /// Create the account, then write its profile row into `users`.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> GatewayResult<SignUpOutcome> {
        let response = self.auth.sign_up(email, password, name).await?;

        let Some(account) = response.user else {
            return Err(GatewayError::Auth(
                "Failed to get new user ID after sign up".to_string(),
            ));
        };

        let mut profile = User::new(account.id.clone(), name);
        profile.email = Some(email.to_string());
        if let Err(err) = self.gateway.insert_user(&profile).await {
            log::error!("Failed to create profile row for {}: {err}", account.id);
        }

        match response.session {
            Some(session) => Ok(SignUpOutcome::SignedIn(self.establish(session))),
            None => Ok(SignUpOutcome::ConfirmationRequired(account)),
        }
    }

    /// Always ends signed out, even if the backend call fails.
    pub async fn sign_out(&self) {
        if let Err(err) = self.auth.sign_out().await {
            log::warn!("Sign-out request failed: {err}");
        }
        self.forget();
        self.publish(SessionState::SignedOut);
    }

    fn establish(&self, session: AuthSession) -> AuthUser {
        if let Some(Err(err)) = self.cached(|cache| cache.save(&session)) {
            log::warn!("Failed to persist session: {err}");
        }
        let user = session.user.clone();
        *self.tokens() = Some(session);
        self.publish(SessionState::SignedIn(user.clone()));
        user
    }

    fn forget(&self) {
        *self.tokens() = None;
        if let Some(Err(err)) = self.cached(|cache| cache.clear()) {
            log::warn!("Failed to clear stored session: {err}");
        }
    }

    fn tokens(&self) -> MutexGuard<'_, Option<AuthSession>> {
        match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn cached<T>(&self, f: impl FnOnce(&SessionCache) -> T) -> Option<T> {
        let cache = self.cache.as_ref()?;
        let guard = match cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(f(&guard))
    }

    /// Notifies subscribers only when the state actually changes, so a
    /// token refresh for the same user is silent.
    fn publish(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

fn delay_until(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
