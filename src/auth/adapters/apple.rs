use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::auth::adapters::idp_post_body;
use crate::auth::domain::{
    require_field, AppleSignIn, AuthError, AuthResult, ProviderKind, SignInOutcome, SignInParams,
};
use crate::auth::ports::{AuthProvider, IdentityPlatform, IdpCredential};

/// Sign in with Apple. The host obtains the identity token natively, using
/// the hashed half of a [`Nonce`](crate::auth::nonce::Nonce).
pub struct AppleProvider {
    platform: Arc<dyn IdentityPlatform>,
}

impl AppleProvider {
    pub fn new(platform: Arc<dyn IdentityPlatform>) -> Self {
        Self { platform }
    }

    fn credential(params: &AppleSignIn) -> AuthResult<IdpCredential> {
        require_field(&params.id_token, "Apple identity token")?;
        require_field(&params.raw_nonce, "nonce")?;

        Ok(IdpCredential {
            provider: ProviderKind::Apple,
            post_body: idp_post_body(&[
                ("id_token", params.id_token.as_str()),
                ("providerId", ProviderKind::Apple.provider_id()),
                ("nonce", params.raw_nonce.as_str()),
            ]),
        })
    }
}

#[async_trait]
impl AuthProvider for AppleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    async fn sign_in(&self, params: SignInParams) -> AuthResult<SignInOutcome> {
        let SignInParams::Apple(params) = params else {
            return Err(AuthError::FieldValidation(
                "Apple sign-in requires Apple credentials".to_string(),
            ));
        };

        let credential = Self::credential(&params)?;
        info!("Exchanging Apple identity token");
        let mut outcome = self.platform.sign_in_with_idp(credential).await?;

        // Apple only hands out the name once, so keep it if the platform has none.
        if outcome.identity.display_name().is_none() {
            if let Some(name) = params.full_name.filter(|n| !n.trim().is_empty()) {
                outcome.identity = outcome.identity.with_display_name(name);
            }
        }

        Ok(outcome)
    }
}
