pub mod adapters;
pub mod coordinator;
pub mod domain;
pub mod nonce;
pub mod ports;
pub mod session;

pub use coordinator::{AuthCoordinator, CoordinatorPhase, ProviderRegistry};
pub use domain::{AuthError, AuthResult, Identity, SessionState, SignInParams};
pub use ports::{AuthProvider, AuthorizationFlow, IdentityPlatform, PasswordAccounts};
pub use session::{SessionStore, Subscription};
