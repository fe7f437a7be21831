//! Server configuration from environment variables.
//!
//! | Variable       | Meaning                                           | Default        |
//! |----------------|---------------------------------------------------|----------------|
//! | `BIND_ADDR`    | address:port to listen on                         | `0.0.0.0:6957` |
//! | `VTU_BASE_URL` | VTU aggregator API base URL                       | none           |
//! | `VTU_API_KEY`  | bearer key for the aggregator                     | none           |
//! | `ADMIN_EMAILS` | comma separated emails granted the admin role     | empty          |
//!
//! `VTU_BASE_URL` and `VTU_API_KEY` must be set together. When neither is
//! present the server runs against the built-in sandbox provider, which is
//! what local development and the test suite use.

use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:6957";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamConfig {
    /// Deterministic in-process provider, no network calls.
    Sandbox,
    /// Live aggregator over HTTPS.
    Live { base_url: String, api_key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub upstream: UpstreamConfig,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.to_ascii_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

/// Read configuration from the process environment.
pub fn fetch_config() -> Result<AppConfig, ConfigError> {
    build_config(
        non_empty_var("BIND_ADDR"),
        non_empty_var("VTU_BASE_URL"),
        non_empty_var("VTU_API_KEY"),
        non_empty_var("ADMIN_EMAILS"),
    )
}

fn build_config(
    bind_addr: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    admin_emails: Option<String>,
) -> Result<AppConfig, ConfigError> {
    let upstream = match (base_url, api_key) {
        (Some(base_url), Some(api_key)) => UpstreamConfig::Live {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        },
        (None, None) => UpstreamConfig::Sandbox,
        (Some(_), None) => {
            return Err(ConfigError(
                "VTU_BASE_URL is set but VTU_API_KEY is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(ConfigError(
                "VTU_API_KEY is set but VTU_BASE_URL is missing".to_string(),
            ));
        }
    };

    let admin_emails = admin_emails
        .map(|raw| parse_admin_emails(&raw))
        .unwrap_or_default();

    Ok(AppConfig {
        bind_addr: bind_addr.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        upstream,
        admin_emails,
    })
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|email| email.trim().to_ascii_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

/// Returns `None` for unset or whitespace-only variables.
fn non_empty_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}
