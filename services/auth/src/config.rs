//! Service configuration, read from the environment

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Public origin the sign-in links point at
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    #[serde(default = "default_magic_link_ttl_secs")]
    pub magic_link_ttl_secs: u64,

    /// Space-separated addresses that sign in as `superadmin`
    #[serde(default)]
    pub authorized_emails: String,

    /// Sign-in links one address may request per window
    #[serde(default = "default_magic_link_max_requests")]
    pub magic_link_max_requests: u32,

    #[serde(default = "default_magic_link_window_secs")]
    pub magic_link_window_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_magic_link_ttl_secs() -> u64 {
    900
}

fn default_magic_link_max_requests() -> u32 {
    5
}

fn default_magic_link_window_secs() -> u64 {
    3600
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn authorized_emails(&self) -> AuthorizedEmails {
        AuthorizedEmails::parse(&self.authorized_emails)
    }
}

/// Addresses promoted to `superadmin` when they sign in
#[derive(Debug, Clone, Default)]
pub struct AuthorizedEmails(HashSet<String>);

impl AuthorizedEmails {
    pub fn parse(list: &str) -> Self {
        Self(list.split_whitespace().map(str::to_lowercase).collect())
    }

    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(&email.to_lowercase())
    }
}
