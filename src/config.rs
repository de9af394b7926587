use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_STRIPE_API_VERSION: &str = "2020-08-27";

#[derive(Clone)]
pub struct Config {
    pub listen_addr: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,

    // Stripe
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub stripe_api_version: String,
    pub stripe_timeout: Duration,
    pub customer_lookup_limit: u32,

    /// JSON file overriding the built-in entitlement table.
    pub entitlements_path: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("stripe_api_base", &self.stripe_api_base)
            .field("stripe_api_version", &self.stripe_api_version)
            .field("stripe_timeout", &self.stripe_timeout)
            .field("customer_lookup_limit", &self.customer_lookup_limit)
            .field("entitlements_path", &self.entitlements_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        Ok(Self {
            listen_addr: lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: lookup("JWT_ISSUER").filter(|v| !v.is_empty()),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: lookup("STRIPE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.into()),
            stripe_api_version: lookup("STRIPE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_VERSION.into()),
            stripe_timeout: Duration::from_secs(parse_or(&lookup, "STRIPE_TIMEOUT_SECS", 30)?),
            customer_lookup_limit: parse_or(&lookup, "CUSTOMER_LOOKUP_LIMIT", 10)?,
            entitlements_path: lookup("ENTITLEMENTS_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
