use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::auth::domain::{
    AuthError, AuthResult, Identity, ProviderKind, SessionCredentials, SignInOutcome,
};
use crate::auth::ports::{IdentityPlatform, IdpCredential};
use crate::config::FirebaseConfig;

pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Firebase Authentication REST client.
pub struct IdentityToolkitClient {
    http_client: HttpClient,
    base_url: String,
    config: FirebaseConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: &'a str,
    request_uri: &'a str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    #[serde(default)]
    is_new_user: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl AccountResponse {
    fn into_outcome(self, provider: ProviderKind, is_new_user: bool) -> AuthResult<SignInOutcome> {
        if self.local_id.is_empty() {
            return Err(AuthError::Unknown(
                "identity platform returned an account without an id".to_string(),
            ));
        }

        let mut identity = Identity::new(self.local_id);
        if let Some(email) = non_empty(self.email) {
            identity = identity.with_email(email);
        }
        if let Some(name) = non_empty(self.display_name) {
            identity = identity.with_display_name(name);
        }
        if let Some(photo) = non_empty(self.photo_url) {
            identity = identity.with_photo_url(photo);
        }

        Ok(SignInOutcome {
            identity,
            is_new_user,
            provider,
            credentials: SessionCredentials {
                id_token: self.id_token,
                refresh_token: self.refresh_token,
                expires_at: expiry(self.expires_in.as_deref()),
            },
        })
    }
}

/// `expiresIn` is a decimal string of seconds. Missing, non-positive or
/// unrepresentable lifetimes fall back to one hour.
fn expiry(expires_in: Option<&str>) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    expires_in
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .and_then(|secs| now.checked_add(time::Duration::seconds(secs)))
        .unwrap_or_else(|| now + time::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Maps an Identity Toolkit error message (`CODE` or `CODE : detail`) onto
/// the normalized taxonomy.
pub fn map_platform_error(message: &str) -> AuthError {
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (message.trim(), None),
    };

    match code {
        "EMAIL_NOT_FOUND"
        | "INVALID_PASSWORD"
        | "INVALID_LOGIN_CREDENTIALS"
        | "USER_DISABLED"
        | "INVALID_IDP_RESPONSE"
        | "INVALID_ID_TOKEN" => AuthError::InvalidCredentials,
        "INVALID_EMAIL" => {
            AuthError::FieldValidation("email address is badly formatted".to_string())
        }
        "MISSING_EMAIL" => AuthError::FieldValidation("email must not be empty".to_string()),
        "MISSING_PASSWORD" => {
            AuthError::FieldValidation("password must not be empty".to_string())
        }
        "WEAK_PASSWORD" => AuthError::FieldValidation(
            detail
                .filter(|d| !d.is_empty())
                .unwrap_or("password is too weak")
                .to_string(),
        ),
        "EMAIL_EXISTS" => {
            AuthError::FieldValidation("email address is already in use".to_string())
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::NetworkFailure,
        _ => AuthError::Unknown(message.to_string()),
    }
}

fn map_transport_error(err: reqwest::Error) -> AuthError {
    if err.is_builder() {
        AuthError::Unknown(err.to_string())
    } else {
        AuthError::NetworkFailure
    }
}

impl IdentityToolkitClient {
    pub fn new(config: FirebaseConfig) -> AuthResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Unknown(e.to_string()))?;

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, method, self.config.api_key)
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> AuthResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // The URL carries the API key.
                let e = e.without_url();
                warn!("accounts:{} transport failure: {}", method, e);
                map_transport_error(e)
            })?;

        let status = response.status();
        // Timeouts and resets can still happen while the body streams in.
        let body = response.bytes().await.map_err(|e| {
            let e = e.without_url();
            warn!("accounts:{} response read failed: {}", method, e);
            map_transport_error(e)
        })?;

        if !status.is_success() {
            let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&body) else {
                warn!("accounts:{} returned {} without an error envelope", method, status);
                return Err(if status.is_server_error() {
                    AuthError::NetworkFailure
                } else {
                    AuthError::Unknown(format!("identity platform returned {}", status))
                });
            };
            warn!("accounts:{} rejected ({}): {}", method, status, envelope.error.message);
            return Err(map_platform_error(&envelope.error.message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!("accounts:{} returned a malformed body: {}", method, e);
            AuthError::Unknown(format!("malformed accounts:{} response: {}", method, e))
        })
    }
}

#[async_trait]
impl IdentityPlatform for IdentityToolkitClient {
    async fn sign_in_with_idp(&self, credential: IdpCredential) -> AuthResult<SignInOutcome> {
        info!("Signing in with {}", credential.provider);
        let account: AccountResponse = self
            .post(
                "signInWithIdp",
                &IdpRequest {
                    post_body: &credential.post_body,
                    request_uri: &self.config.request_uri,
                    return_idp_credential: true,
                    return_secure_token: true,
                },
            )
            .await?;

        let is_new_user = account.is_new_user;
        account.into_outcome(credential.provider, is_new_user)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<SignInOutcome> {
        info!("Signing in with password");
        let account: AccountResponse = self
            .post(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        account.into_outcome(ProviderKind::EmailPassword, false)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignInOutcome> {
        info!("Creating password account");
        let account: AccountResponse = self
            .post(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        account.into_outcome(ProviderKind::EmailPassword, true)
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        info!("Requesting password reset email");
        let _: IgnoredAny = self
            .post(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    email,
                },
            )
            .await?;
        Ok(())
    }
}
