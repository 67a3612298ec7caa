use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub firebase: FirebaseConfig,
    pub google: Option<GoogleConfig>,
    pub apple: Option<AppleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Identity Toolkit connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    /// Overrides the public endpoint, e.g. to target the Auth emulator.
    pub base_url: Option<String>,
    /// Sent as `requestUri` on IdP sign-in; Firebase only checks it is a valid URL.
    #[serde(default = "default_request_uri")]
    pub request_uri: String,
}

/// Presence of this section enables Google sign-in. The client id arrives
/// with each request; only the optional secret and endpoints live here.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GoogleConfig {
    pub client_secret: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_request_uri() -> String {
    "http://localhost".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::new_with_config("config/default")
    }

    pub fn new_with_config(config_path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(Environment::with_prefix("AUTH_SESSION").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn apple_enabled(&self) -> bool {
        self.apple.as_ref().is_some_and(|apple| apple.enabled)
    }
}
