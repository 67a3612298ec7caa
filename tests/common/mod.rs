#![allow(dead_code)]

pub mod http_stub;

use std::sync::Arc;

use async_trait::async_trait;
use auth_session::auth::adapters::apple::AppleProvider;
use auth_session::auth::adapters::email_password::EmailPasswordProvider;
use auth_session::auth::adapters::google::GoogleProvider;
use auth_session::auth::domain::{
    AuthError, AuthResult, Identity, ProviderKind, SessionCredentials, SignInOutcome,
};
use auth_session::auth::ports::{IdentityPlatform, IdpCredential};
use auth_session::auth::{AuthCoordinator, ProviderRegistry};
use auth_session::config::GoogleConfig;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::Notify;

/// Scripted identity platform that records every call it receives.
#[derive(Default)]
pub struct MockIdentityPlatform {
    idp_response: Mutex<Option<AuthResult<SignInOutcome>>>,
    password_response: Mutex<Option<AuthResult<SignInOutcome>>>,
    sign_up_response: Mutex<Option<AuthResult<SignInOutcome>>>,
    reset_response: Mutex<Option<AuthResult<()>>>,
    calls: Mutex<Vec<String>>,
    /// When set, each call parks until `release()`.
    gate: Mutex<Option<Arc<Notify>>>,
    /// Signalled as soon as a call arrives.
    pub entered: Notify,
}

impl MockIdentityPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_idp_response(&self, response: AuthResult<SignInOutcome>) {
        *self.idp_response.lock() = Some(response);
    }

    pub fn set_password_response(&self, response: AuthResult<SignInOutcome>) {
        *self.password_response.lock() = Some(response);
    }

    pub fn set_sign_up_response(&self, response: AuthResult<SignInOutcome>) {
        *self.sign_up_response.lock() = Some(response);
    }

    pub fn set_reset_response(&self, response: AuthResult<()>) {
        *self.reset_response.lock() = Some(response);
    }

    pub fn hold_requests(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().push(call);
        self.entered.notify_one();

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn scripted<T: Clone>(slot: &Mutex<Option<AuthResult<T>>>) -> AuthResult<T> {
        slot.lock()
            .clone()
            .unwrap_or(Err(AuthError::Unknown("No mock response set".to_string())))
    }
}

#[async_trait]
impl IdentityPlatform for MockIdentityPlatform {
    async fn sign_in_with_idp(&self, credential: IdpCredential) -> AuthResult<SignInOutcome> {
        self.record(format!("signInWithIdp:{}", credential.post_body))
            .await;
        Self::scripted(&self.idp_response)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> AuthResult<SignInOutcome> {
        self.record(format!("signInWithPassword:{}", email)).await;
        Self::scripted(&self.password_response)
    }

    async fn sign_up(&self, email: &str, _password: &str) -> AuthResult<SignInOutcome> {
        self.record(format!("signUp:{}", email)).await;
        Self::scripted(&self.sign_up_response)
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        self.record(format!("sendOobCode:{}", email)).await;
        Self::scripted(&self.reset_response)
    }
}

pub fn outcome(identity: Identity, provider: ProviderKind, is_new_user: bool) -> SignInOutcome {
    SignInOutcome {
        identity,
        is_new_user,
        provider,
        credentials: SessionCredentials {
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
        },
    }
}

/// Coordinator with all three providers backed by `platform`.
pub fn coordinator(platform: &Arc<MockIdentityPlatform>) -> AuthCoordinator {
    let registry = ProviderRegistry::new()
        .with_email_password(EmailPasswordProvider::new(platform.clone()))
        .with_google(GoogleProvider::new(
            platform.clone(),
            GoogleConfig::default(),
        ))
        .with_provider(Arc::new(AppleProvider::new(platform.clone())));

    AuthCoordinator::new(registry)
}
