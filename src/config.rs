use crate::extract::HeaderNames;
use anyhow::{Context, Result, anyhow};
use axum::http::HeaderName;
use hook_core::signatures::{SharedSecret, SignatureAlgorithm};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Routes the server mounts itself; the webhook route may not shadow them.
const RESERVED_PATHS: &[&str] = &[
    "/health",
    "/ready",
    "/swagger.json",
    "/books",
    "/borrow",
    "/return",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub webhook_secret: SharedSecret,
    pub webhook_path: String,
    pub signature_algorithms: Vec<SignatureAlgorithm>,
    pub headers: HeaderNames,
    pub docs_refs: Vec<String>,
    pub dispatch_timeout: Duration,
    pub max_payload_bytes: usize,
    pub ip_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source, so tests never
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = &lookup as &dyn Fn(&str) -> Option<String>;

        let config = Self {
            bind_addr: lookup("LIBRARY_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            webhook_secret: SharedSecret::new(required_env(lookup, "WEBHOOK_SECRET")?),
            webhook_path: env_string(lookup, "WEBHOOK_PATH", "/webhook/github"),
            signature_algorithms: env_list(lookup, "WEBHOOK_ALGORITHMS", "sha1,sha256")
                .iter()
                .map(|name| {
                    SignatureAlgorithm::from_str(name)
                        .map_err(|_| anyhow!("WEBHOOK_ALGORITHMS contains unknown algorithm {name}"))
                })
                .collect::<Result<Vec<_>>>()?,
            headers: HeaderNames {
                signature: env_header(lookup, "WEBHOOK_SIGNATURE_HEADER", "x-hub-signature")?,
                event: env_header(lookup, "WEBHOOK_EVENT_HEADER", "x-github-event")?,
            },
            docs_refs: env_list(
                lookup,
                "WEBHOOK_DOCS_REFS",
                "refs/heads/main,refs/heads/master",
            ),
            dispatch_timeout: Duration::from_millis(env_parse(
                lookup,
                "WEBHOOK_DISPATCH_TIMEOUT_MS",
                5_000u64,
            )?),
            max_payload_bytes: env_parse(lookup, "LIBRARY_MAX_PAYLOAD_BYTES", 1_048_576usize)?,
            ip_limit_per_minute: env_parse(lookup, "LIBRARY_IP_RATE_PER_MINUTE", 100u32)?,
        };

        if config.signature_algorithms.is_empty() {
            return Err(anyhow!("WEBHOOK_ALGORITHMS must name at least one algorithm"));
        }

        validate_webhook_path(&config.webhook_path)?;

        if config.dispatch_timeout.is_zero() {
            return Err(anyhow!("WEBHOOK_DISPATCH_TIMEOUT_MS must be a positive integer"));
        }

        if config.ip_limit_per_minute == 0 {
            return Err(anyhow!("LIBRARY_IP_RATE_PER_MINUTE must be a positive integer"));
        }

        Ok(config)
    }
}

fn validate_webhook_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(anyhow!("WEBHOOK_PATH must start with '/'"));
    }

    if path.contains(['{', '}', '*']) {
        return Err(anyhow!("WEBHOOK_PATH must be a literal path without captures"));
    }

    let normalized = path.trim_end_matches('/');
    if RESERVED_PATHS
        .iter()
        .any(|reserved| normalized == *reserved || path.starts_with(&format!("{reserved}/")))
    {
        return Err(anyhow!("WEBHOOK_PATH {path} collides with a built-in route"));
    }

    Ok(())
}

fn required_env(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    let value = lookup(name).with_context(|| format!("missing required env var: {name}"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("required env var {name} cannot be empty"));
    }
    Ok(value)
}

fn env_string(lookup: &dyn Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(lookup: &dyn Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| anyhow!("invalid value for {name}: {error}"))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn env_list(lookup: &dyn Fn(&str) -> Option<String>, name: &str, default: &str) -> Vec<String> {
    env_string(lookup, name, default)
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn env_header(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<HeaderName> {
    let value = env_string(lookup, name, default);
    HeaderName::from_bytes(value.as_bytes())
        .with_context(|| format!("{name} is not a valid header name"))
}
