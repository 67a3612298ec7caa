use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use oauth2::{
    basic::{
        BasicErrorResponse, BasicErrorResponseType, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenType,
    },
    reqwest::async_http_client,
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse as OAuth2TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::adapters::idp_post_body;
use crate::auth::domain::{
    require_field, AuthError, AuthResult, AuthorizationRequest, GoogleGrant, GoogleSignIn,
    ProviderKind, SignInOutcome, SignInParams,
};
use crate::auth::ports::{AuthProvider, AuthorizationFlow, IdentityPlatform, IdpCredential};
use crate::config::GoogleConfig;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Google's token endpoint returns an OpenID `id_token` next to the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleTokenFields {
    pub id_token: Option<String>,
}

impl ExtraTokenFields for GoogleTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;
type GoogleOAuthClient = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

pub struct GoogleProvider {
    platform: Arc<dyn IdentityPlatform>,
    config: GoogleConfig,
}

impl GoogleProvider {
    pub fn new(platform: Arc<dyn IdentityPlatform>, config: GoogleConfig) -> Self {
        Self { platform, config }
    }

    fn oauth_client(&self, client_id: &str) -> AuthResult<GoogleOAuthClient> {
        let auth_url = self.config.auth_url.as_deref().unwrap_or(GOOGLE_AUTH_URL);
        let token_url = self.config.token_url.as_deref().unwrap_or(GOOGLE_TOKEN_URL);

        Ok(GoogleOAuthClient::new(
            ClientId::new(client_id.to_string()),
            self.config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(auth_url.to_string()).map_err(|e| AuthError::Unknown(e.to_string()))?,
            Some(TokenUrl::new(token_url.to_string()).map_err(|e| AuthError::Unknown(e.to_string()))?),
        ))
    }

    async fn exchange_code(
        &self,
        client_id: &str,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> AuthResult<(String, Option<String>)> {
        let redirect = parse_redirect(redirect_uri)?;

        info!("Exchanging Google authorization code");
        let token = self
            .oauth_client(client_id)?
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_string()))
            .set_redirect_uri(Cow::Owned(redirect))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                error!("Failed to exchange Google authorization code: {}", e);
                map_token_error(e)
            })?;

        let id_token = token.extra_fields().id_token.clone().ok_or_else(|| {
            AuthError::Unknown("Google did not return an id token".to_string())
        })?;

        Ok((id_token, Some(token.access_token().secret().to_string())))
    }

    fn credential(id_token: &str, access_token: Option<&str>) -> IdpCredential {
        let mut pairs = vec![("id_token", id_token)];
        if let Some(access_token) = access_token.filter(|t| !t.is_empty()) {
            pairs.push(("access_token", access_token));
        }
        pairs.push(("providerId", ProviderKind::Google.provider_id()));

        IdpCredential {
            provider: ProviderKind::Google,
            post_body: idp_post_body(&pairs),
        }
    }
}

impl AuthorizationFlow for GoogleProvider {
    /// Builds a PKCE protected consent URL for a browser based flow.
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AuthResult<AuthorizationRequest> {
        require_field(client_id, "Google client id")?;
        let redirect = parse_redirect(redirect_uri)?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = self
            .oauth_client(client_id)?
            .set_redirect_uri(redirect)
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge)
            .url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            csrf_state: csrf_state.secret().to_string(),
            code_verifier: verifier.secret().to_string(),
        })
    }
}

fn parse_redirect(redirect_uri: &str) -> AuthResult<RedirectUrl> {
    require_field(redirect_uri, "redirect URI")?;
    RedirectUrl::new(redirect_uri.to_string())
        .map_err(|_| AuthError::FieldValidation("redirect URI is not a valid URL".to_string()))
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => match response.error() {
            BasicErrorResponseType::InvalidGrant
            | BasicErrorResponseType::InvalidClient
            | BasicErrorResponseType::UnauthorizedClient => AuthError::InvalidCredentials,
            BasicErrorResponseType::Extension(code) if code == "access_denied" => {
                AuthError::ProviderCancelled
            }
            _ => AuthError::Unknown(response.to_string()),
        },
        RequestTokenError::Request(_) => AuthError::NetworkFailure,
        RequestTokenError::Parse(e, _) => AuthError::Unknown(e.to_string()),
        RequestTokenError::Other(message) => AuthError::Unknown(message),
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn sign_in(&self, params: SignInParams) -> AuthResult<SignInOutcome> {
        let SignInParams::Google(GoogleSignIn { client_id, grant }) = params else {
            return Err(AuthError::FieldValidation(
                "Google sign-in requires Google credentials".to_string(),
            ));
        };
        require_field(&client_id, "Google client id")?;

        let credential = match grant {
            GoogleGrant::Tokens {
                id_token,
                access_token,
            } => {
                require_field(&id_token, "Google id token")?;
                Self::credential(&id_token, access_token.as_deref())
            }
            GoogleGrant::AuthorizationCode {
                code,
                code_verifier,
                redirect_uri,
            } => {
                require_field(&code, "authorization code")?;
                require_field(&code_verifier, "code verifier")?;
                let (id_token, access_token) = self
                    .exchange_code(&client_id, &code, &code_verifier, &redirect_uri)
                    .await?;
                Self::credential(&id_token, access_token.as_deref())
            }
        };

        self.platform.sign_in_with_idp(credential).await
    }

    fn authorization_flow(&self) -> Option<&dyn AuthorizationFlow> {
        Some(self)
    }
}
