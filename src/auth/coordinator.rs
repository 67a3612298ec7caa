use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::auth::adapters::apple::AppleProvider;
use crate::auth::adapters::email_password::EmailPasswordProvider;
use crate::auth::adapters::google::GoogleProvider;
use crate::auth::domain::{
    AuthError, AuthResult, AuthorizationRequest, Identity, ProviderKind, SessionState,
    SignInOutcome, SignInParams,
};
use crate::auth::ports::{AuthProvider, AuthorizationFlow, IdentityPlatform, PasswordAccounts};
use crate::auth::session::SessionStore;
use crate::config::Settings;

/// The providers a coordinator may dispatch to, assembled by the host. One
/// adapter per kind; sign-up, password reset and the consent URL are served
/// by whichever adapter is registered for that kind.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn AuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Email/password is always available; Google and Apple follow their
    /// configuration sections.
    pub fn from_settings(platform: Arc<dyn IdentityPlatform>, settings: &Settings) -> Self {
        let mut registry =
            Self::new().with_email_password(EmailPasswordProvider::new(platform.clone()));

        if let Some(google) = settings.google.clone() {
            registry = registry.with_google(GoogleProvider::new(platform.clone(), google));
        }
        if settings.apple_enabled() {
            registry = registry.with_provider(Arc::new(AppleProvider::new(platform)));
        }
        registry
    }

    /// Registers `provider` under its own kind, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn with_email_password(self, provider: EmailPasswordProvider) -> Self {
        self.with_provider(Arc::new(provider))
    }

    pub fn with_google(self, provider: GoogleProvider) -> Self {
        self.with_provider(Arc::new(provider))
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn AuthProvider>> {
        self.providers.get(&kind)
    }

    fn password_accounts(&self) -> AuthResult<&dyn PasswordAccounts> {
        self.get(ProviderKind::EmailPassword)
            .and_then(|provider| provider.password_accounts())
            .ok_or_else(|| not_configured(ProviderKind::EmailPassword))
    }

    fn authorization_flow(&self) -> AuthResult<&dyn AuthorizationFlow> {
        self.get(ProviderKind::Google)
            .and_then(|provider| provider.authorization_flow())
            .ok_or_else(|| not_configured(ProviderKind::Google))
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.provider_id());
        kinds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Idle,
    InFlight,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn not_configured(kind: ProviderKind) -> AuthError {
    AuthError::Unknown(format!("{} sign-in is not configured", kind))
}

/// Serializes authentication requests and owns every session transition.
pub struct AuthCoordinator {
    session: SessionStore,
    providers: ProviderRegistry,
    in_flight: AtomicBool,
}

impl AuthCoordinator {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self::with_session(SessionStore::new(), providers)
    }

    pub fn with_session(session: SessionStore, providers: ProviderRegistry) -> Self {
        info!(providers = ?providers.kinds(), "auth coordinator ready");
        Self {
            session,
            providers,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn phase(&self) -> CoordinatorPhase {
        if self.in_flight.load(Ordering::Acquire) {
            CoordinatorPhase::InFlight
        } else {
            CoordinatorPhase::Idle
        }
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.session.current().identity().cloned()
    }

    fn begin(&self, operation: &str) -> AuthResult<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("{} rejected: another authentication request is in flight", operation);
                AuthError::ProviderCancelled
            })?;
        Ok(InFlightGuard(&self.in_flight))
    }

    fn finish(&self, operation: &str, result: AuthResult<SignInOutcome>) -> AuthResult<SignInOutcome> {
        match result {
            Ok(outcome) if outcome.identity.id().trim().is_empty() => {
                error!(
                    provider = %outcome.provider,
                    "{} returned an identity without an id",
                    operation
                );
                Err(AuthError::Unknown(format!(
                    "{} sign-in returned an identity without an id",
                    outcome.provider
                )))
            }
            Ok(outcome) => {
                self.session
                    .set(SessionState::Authenticated(outcome.identity.clone()));
                info!(
                    user = outcome.identity.id(),
                    provider = %outcome.provider,
                    new_user = outcome.is_new_user,
                    "{} succeeded",
                    operation
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!("{} failed: {}", operation, err);
                Err(err)
            }
        }
    }

    /// Signs in with the provider named by `params`. On failure the session
    /// is left untouched.
    pub async fn sign_in(&self, params: SignInParams) -> AuthResult<SignInOutcome> {
        let kind = params.kind();
        let _in_flight = self.begin("sign-in")?;

        info!(provider = %kind, "sign-in requested");
        let result = match self.providers.get(kind) {
            Some(provider) => provider.sign_in(params).await,
            None => Err(not_configured(kind)),
        };
        self.finish("sign-in", result)
    }

    /// Creates an email/password account and signs into it.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignInOutcome> {
        let _in_flight = self.begin("sign-up")?;

        let result = match self.providers.password_accounts() {
            Ok(accounts) => accounts.sign_up(email, password).await,
            Err(err) => Err(err),
        };
        self.finish("sign-up", result)
    }

    /// Sends a password reset email. Never changes the session.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        let _in_flight = self.begin("password reset")?;

        let accounts = self.providers.password_accounts()?;
        accounts.reset_password(email).await.map_err(|err| {
            warn!("password reset failed: {}", err);
            err
        })
    }

    /// Clears the session if authenticated. Returns whether a user was signed out.
    pub fn sign_out(&self) -> bool {
        let signed_out = self.session.clear();
        if signed_out {
            info!("signed out");
        }
        signed_out
    }

    pub fn google_authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AuthResult<AuthorizationRequest> {
        self.providers
            .authorization_flow()?
            .authorization_url(client_id, redirect_uri)
    }
}
