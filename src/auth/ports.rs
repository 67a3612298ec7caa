use crate::auth::domain::{
    AuthResult, AuthorizationRequest, ProviderKind, SignInOutcome, SignInParams,
};
use async_trait::async_trait;

/// Identity provider credential posted to `signInWithIdp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpCredential {
    pub provider: ProviderKind,
    /// Form-encoded `postBody`, e.g. `id_token=...&providerId=apple.com`.
    pub post_body: String,
}

/// The external identity backend the provider adapters talk to.
#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Exchange a federated credential for a platform session.
    async fn sign_in_with_idp(&self, credential: IdpCredential) -> AuthResult<SignInOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> AuthResult<SignInOutcome>;

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignInOutcome>;

    /// Ask the platform to email a password reset link.
    async fn send_password_reset(&self, email: &str) -> AuthResult<()>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn sign_in(&self, params: SignInParams) -> AuthResult<SignInOutcome>;

    /// Account creation and password reset, for providers that own passwords.
    fn password_accounts(&self) -> Option<&dyn PasswordAccounts> {
        None
    }

    /// Browser redirect flow, for OAuth providers.
    fn authorization_flow(&self) -> Option<&dyn AuthorizationFlow> {
        None
    }
}

#[async_trait]
pub trait PasswordAccounts: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignInOutcome>;

    async fn reset_password(&self, email: &str) -> AuthResult<()>;
}

pub trait AuthorizationFlow: Send + Sync {
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AuthResult<AuthorizationRequest>;
}
