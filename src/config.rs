//! Connection parameters and client options

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

pub const URL_VAR: &str = "SUPABASE_URL";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const TIMEOUT_VAR: &str = "NSS_REQUEST_TIMEOUT_SECS";

/// Configuration options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema the tables live in
    pub db_schema: String,

    /// Value sent in the `X-Client-Info` header
    pub client_info: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            client_info: format!("nss-platform/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }
}

/// The two required connection parameters plus options.
#[derive(Debug, Clone)]
pub struct NssConfig {
    pub url: Url,
    pub anon_key: String,
    pub options: ClientOptions,
}

impl NssConfig {
    /// Creates a new configuration, validating the URL and the key.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)
            .map_err(|e| Error::config(format!("{} is not a valid URL: {}", URL_VAR, e)))?;
        if anon_key.trim().is_empty() {
            return Err(Error::config(format!("{} cannot be empty", ANON_KEY_VAR)));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            options: ClientOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// Absence of either required variable is fatal.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let url = lookup(URL_VAR)
            .ok_or_else(|| Error::config(format!("{} environment variable not found", URL_VAR)))?;
        let key = lookup(ANON_KEY_VAR).ok_or_else(|| {
            Error::config(format!("{} environment variable not found", ANON_KEY_VAR))
        })?;

        let mut options = ClientOptions::default();
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw
                .parse()
                .map_err(|_| Error::config(format!("{} must be a number of seconds", TIMEOUT_VAR)))?;
            options = options.with_request_timeout(Some(Duration::from_secs(secs)));
        }

        Ok(Self::new(&url, &key)?.with_options(options))
    }

    /// Base URL without a trailing slash, as the sub-clients expect it.
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}
