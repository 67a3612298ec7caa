use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;

/// Normalized authenticated-user record. Immutable once built; a new sign-in
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Apple,
    Google,
    EmailPassword,
}

impl ProviderKind {
    /// Provider id as used by Firebase Authentication.
    pub fn provider_id(&self) -> &'static str {
        match self {
            ProviderKind::Apple => "apple.com",
            ProviderKind::Google => "google.com",
            ProviderKind::EmailPassword => "password",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Apple => "Apple",
            ProviderKind::Google => "Google",
            ProviderKind::EmailPassword => "Email/Password",
        };
        f.write_str(name)
    }
}

/// Tokens issued by the identity platform for a fresh sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub identity: Identity,
    pub is_new_user: bool,
    pub provider: ProviderKind,
    pub credentials: SessionCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleSignIn {
    pub id_token: String,
    /// The unhashed nonce; Apple received its SHA-256 digest.
    pub raw_nonce: String,
    /// Apple only shares the name on the first authorization.
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleGrant {
    /// Tokens already obtained by a native Google sign-in SDK.
    Tokens {
        id_token: String,
        access_token: Option<String>,
    },
    /// Authorization code from a browser consent flow with PKCE.
    AuthorizationCode {
        code: String,
        code_verifier: String,
        redirect_uri: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSignIn {
    pub client_id: String,
    pub grant: GoogleGrant,
}

/// Consent URL plus the secrets the host must keep until the redirect returns.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub code_verifier: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailPasswordSignIn {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for EmailPasswordSignIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailPasswordSignIn")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInParams {
    Apple(AppleSignIn),
    Google(GoogleSignIn),
    EmailPassword(EmailPasswordSignIn),
}

impl SignInParams {
    pub fn kind(&self) -> ProviderKind {
        match self {
            SignInParams::Apple(_) => ProviderKind::Apple,
            SignInParams::Google(_) => ProviderKind::Google,
            SignInParams::EmailPassword(_) => ProviderKind::EmailPassword,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("the supplied credentials were rejected")]
    InvalidCredentials,

    #[error("the identity provider could not be reached")]
    NetworkFailure,

    #[error("the sign-in request was cancelled")]
    ProviderCancelled,

    #[error("{0}")]
    FieldValidation(String),

    #[error("unexpected authentication error: {0}")]
    Unknown(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Rejects empty or whitespace-only input before anything leaves the process.
pub(crate) fn require_field(value: &str, field: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        return Err(AuthError::FieldValidation(format!("{field} must not be empty")));
    }
    Ok(())
}
