pub mod auth;
pub mod config;
pub mod generated;

pub use auth::{AuthCoordinator, AuthError, Identity, SessionState, SessionStore};
pub use config::Settings;
