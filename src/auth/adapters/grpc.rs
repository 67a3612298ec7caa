use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures::{stream, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use crate::auth::coordinator::AuthCoordinator;
use crate::auth::domain::{
    AppleSignIn, AuthError, EmailPasswordSignIn, GoogleGrant, GoogleSignIn, Identity,
    SessionState, SignInOutcome, SignInParams,
};
use crate::auth::session::Subscription;
use crate::generated::session::session_service_server::{SessionService, SessionServiceServer};
use crate::generated::session::{
    self as proto, google_credential, sign_in_request, CurrentUserRequest, CurrentUserResponse,
    EmailPassword, ResetPasswordRequest, ResetPasswordResponse, SessionEvent, SignInRequest,
    SignInResponse, SignOutRequest, SignOutResponse, WatchSessionRequest,
};

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::FieldValidation(reason) => Status::invalid_argument(reason),
            AuthError::InvalidCredentials => Status::unauthenticated(err.to_string()),
            AuthError::ProviderCancelled => Status::aborted(err.to_string()),
            AuthError::NetworkFailure => Status::unavailable(err.to_string()),
            AuthError::Unknown(ref message) => {
                error!("Unexpected authentication error: {}", message);
                Status::internal(err.to_string())
            }
        }
    }
}

impl From<&Identity> for proto::Identity {
    fn from(identity: &Identity) -> Self {
        proto::Identity {
            id: identity.id().to_string(),
            email: identity.email().map(str::to_string),
            display_name: identity.display_name().map(str::to_string),
            photo_url: identity.photo_url().map(str::to_string),
        }
    }
}

impl From<&SessionState> for SessionEvent {
    fn from(state: &SessionState) -> Self {
        SessionEvent {
            identity: state.identity().map(proto::Identity::from),
        }
    }
}

impl From<SignInOutcome> for SignInResponse {
    fn from(outcome: SignInOutcome) -> Self {
        SignInResponse {
            identity: Some(proto::Identity::from(&outcome.identity)),
            is_new_user: outcome.is_new_user,
            provider_id: outcome.provider.provider_id().to_string(),
            id_token: outcome.credentials.id_token,
            refresh_token: outcome.credentials.refresh_token,
            expires_at: outcome.credentials.expires_at.unix_timestamp(),
        }
    }
}

impl TryFrom<SignInRequest> for SignInParams {
    type Error = AuthError;

    fn try_from(request: SignInRequest) -> Result<Self, Self::Error> {
        let provider = request.provider.ok_or_else(|| {
            AuthError::FieldValidation("sign-in request names no provider".to_string())
        })?;

        Ok(match provider {
            sign_in_request::Provider::Apple(apple) => SignInParams::Apple(AppleSignIn {
                id_token: apple.id_token,
                raw_nonce: apple.raw_nonce,
                full_name: apple.full_name,
            }),
            sign_in_request::Provider::Google(google) => {
                let grant = match google.grant {
                    Some(google_credential::Grant::Tokens(tokens)) => GoogleGrant::Tokens {
                        id_token: tokens.id_token,
                        access_token: tokens.access_token,
                    },
                    Some(google_credential::Grant::AuthorizationCode(code)) => {
                        GoogleGrant::AuthorizationCode {
                            code: code.code,
                            code_verifier: code.code_verifier,
                            redirect_uri: code.redirect_uri,
                        }
                    }
                    None => {
                        return Err(AuthError::FieldValidation(
                            "Google credential requires tokens or an authorization code"
                                .to_string(),
                        ))
                    }
                };
                SignInParams::Google(GoogleSignIn {
                    client_id: google.client_id,
                    grant,
                })
            }
            sign_in_request::Provider::EmailPassword(EmailPassword { email, password }) => {
                SignInParams::EmailPassword(EmailPasswordSignIn { email, password })
            }
        })
    }
}

/// Events buffered per `WatchSession` caller. A caller that falls further
/// behind skips the oldest events and resumes with the most recent ones.
pub const WATCH_BUFFER: usize = 16;

/// Session transitions for one `WatchSession` caller. Dropping the stream
/// drops the subscription.
pub type SessionFeed = Pin<Box<dyn Stream<Item = Result<SessionEvent, Status>> + Send>>;

fn session_feed(
    events: broadcast::Receiver<SessionEvent>,
    subscription: Subscription,
) -> SessionFeed {
    Box::pin(stream::unfold(
        (events, subscription),
        |(mut events, subscription)| async move {
            loop {
                match events.recv().await {
                    Ok(event) => return Some((Ok(event), (events, subscription))),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session watcher lagging; dropped oldest events");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    ))
}

pub struct GrpcSessionService {
    coordinator: Arc<AuthCoordinator>,
}

impl GrpcSessionService {
    pub fn new(coordinator: Arc<AuthCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[tonic::async_trait]
impl SessionService for GrpcSessionService {
    async fn sign_in(
        &self,
        request: Request<SignInRequest>,
    ) -> Result<Response<SignInResponse>, Status> {
        let params = SignInParams::try_from(request.into_inner())?;
        let outcome = self.coordinator.sign_in(params).await?;
        Ok(Response::new(outcome.into()))
    }

    async fn sign_up(
        &self,
        request: Request<EmailPassword>,
    ) -> Result<Response<SignInResponse>, Status> {
        let req = request.into_inner();
        let outcome = self.coordinator.sign_up(&req.email, &req.password).await?;
        Ok(Response::new(outcome.into()))
    }

    async fn reset_password(
        &self,
        request: Request<ResetPasswordRequest>,
    ) -> Result<Response<ResetPasswordResponse>, Status> {
        self.coordinator
            .reset_password(&request.into_inner().email)
            .await?;
        Ok(Response::new(ResetPasswordResponse {}))
    }

    async fn sign_out(
        &self,
        _request: Request<SignOutRequest>,
    ) -> Result<Response<SignOutResponse>, Status> {
        Ok(Response::new(SignOutResponse {
            was_authenticated: self.coordinator.sign_out(),
        }))
    }

    async fn current_user(
        &self,
        _request: Request<CurrentUserRequest>,
    ) -> Result<Response<CurrentUserResponse>, Status> {
        Ok(Response::new(CurrentUserResponse {
            identity: self
                .coordinator
                .current_user()
                .as_ref()
                .map(proto::Identity::from),
        }))
    }

    type WatchSessionStream = SessionFeed;

    async fn watch_session(
        &self,
        _request: Request<WatchSessionRequest>,
    ) -> Result<Response<Self::WatchSessionStream>, Status> {
        let (tx, rx) = broadcast::channel(WATCH_BUFFER);
        let subscription = self.coordinator.session().watch(move |state| {
            // No receiver means the client went away; the feed's drop
            // removes this listener.
            let _ = tx.send(SessionEvent::from(state));
        });

        Ok(Response::new(session_feed(rx, subscription)))
    }
}

pub async fn start_server(
    coordinator: Arc<AuthCoordinator>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    info!("Starting gRPC server on {}", addr);

    Server::builder()
        .add_service(SessionServiceServer::new(GrpcSessionService::new(coordinator)))
        .serve_with_shutdown(addr, shutdown)
        .await
}
