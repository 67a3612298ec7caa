use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::auth::domain::{
    require_field, AuthError, AuthResult, EmailPasswordSignIn, ProviderKind, SignInOutcome,
    SignInParams,
};
use crate::auth::ports::{AuthProvider, IdentityPlatform, PasswordAccounts};

pub struct EmailPasswordProvider {
    platform: Arc<dyn IdentityPlatform>,
}

/// Fails before any network call when either field is missing.
fn validate(email: &str, password: &str) -> AuthResult<()> {
    require_field(email, "email")?;
    if password.is_empty() {
        return Err(AuthError::FieldValidation(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl EmailPasswordProvider {
    pub fn new(platform: Arc<dyn IdentityPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PasswordAccounts for EmailPasswordProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignInOutcome> {
        validate(email, password)?;
        info!("Creating account for email/password user");
        let mut outcome = self.platform.sign_up(email.trim(), password).await?;
        outcome.is_new_user = true;
        Ok(outcome)
    }

    async fn reset_password(&self, email: &str) -> AuthResult<()> {
        require_field(email, "email")?;
        self.platform.send_password_reset(email.trim()).await
    }
}

#[async_trait]
impl AuthProvider for EmailPasswordProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::EmailPassword
    }

    async fn sign_in(&self, params: SignInParams) -> AuthResult<SignInOutcome> {
        let SignInParams::EmailPassword(EmailPasswordSignIn { email, password }) = params else {
            return Err(AuthError::FieldValidation(
                "email sign-in requires an email and password".to_string(),
            ));
        };

        validate(&email, &password)?;
        self.platform
            .sign_in_with_password(email.trim(), &password)
            .await
    }

    fn password_accounts(&self) -> Option<&dyn PasswordAccounts> {
        Some(self)
    }
}
