//! Server configuration loading.
//!
//! Settings come from `veridian.toml` in the working directory (optional)
//! overlaid with `VERIDIAN_`-prefixed environment variables, e.g.
//! `VERIDIAN_LISTEN` or `VERIDIAN_IDP__ISSUER`.

use serde::Deserialize;
use veridian_oidc::IdpConfig;

/// Top-level server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Whether session cookies carry the `Secure` attribute. Off for
    /// plain-HTTP development setups.
    #[serde(default)]
    pub secure_cookies: bool,

    /// Secret provisioned to authentication devices for CIBA approval.
    #[serde(default = "default_device_secret")]
    pub device_secret: String,

    /// Whether to register the demo tenant, client, and user at startup.
    #[serde(default = "default_seed")]
    pub seed_demo_data: bool,

    /// Identity provider settings.
    #[serde(default)]
    pub idp: IdpConfig,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_device_secret() -> String {
    "veridian-dev-device-secret".to_string()
}

fn default_seed() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            secure_cookies: false,
            device_secret: default_device_secret(),
            seed_demo_data: default_seed(),
            idp: IdpConfig::default(),
        }
    }
}

/// Loads the server configuration from file and environment.
pub fn load() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("veridian").required(false))
        .add_source(config::Environment::with_prefix("VERIDIAN").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}
