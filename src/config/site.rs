//! Target wiki and credential configuration

use super::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};

/// The wiki to upload to and the account to use.
///
/// The password is never stored in the file. `password_env` names an
/// environment variable holding it, typically a bot password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Full URL of the action API endpoint
    pub api_url: String,
    /// Account name, "Name@botname" for bot passwords
    pub username: String,
    /// Environment variable holding the account password
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_password_env() -> String {
    "WIKIBATCH_PASSWORD".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            username: String::new(),
            password_env: default_password_env(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl SiteConfig {
    /// Read the account password from the configured environment variable.
    pub fn password(&self) -> anyhow::Result<String> {
        std::env::var(&self.password_env).map_err(|_| {
            anyhow::anyhow!(
                "password environment variable '{}' is not set",
                self.password_env
            )
        })
    }
}
