// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup into
//! [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `APP_ENV` | `production` or `development` | `production` |
//! | `CLOUDFLARE_TEAM_DOMAIN` | Team domain serving the signing keys | Required unless bypassing |
//! | `CLOUDFLARE_POLICY_AUD` | Expected assertion audience | Required unless bypassing |
//! | `ACCESS_CERTS_PATH` | Key discovery path on the team domain | `/well-known-keys` |
//! | `DEV_BYPASS_AUTH` | Opt in to bypass mode (`true`) | `false` |
//! | `DEV_USER_EMAIL` | Bypass identity email | `dev@example.com` |
//! | `DEV_USER_NAME` | Bypass identity name | `Dev User` |
//! | `KEY_CACHE_TTL_SECS` | Key set cache lifetime | `86400` |
//! | `KEY_FETCH_TIMEOUT_SECS` | Key set fetch timeout | `10` |
//! | `KEY_REFRESH_COOLDOWN_SECS` | Minimum age of a key set before an unknown key id refetches it | `10` |
//! | `STORE_TIMEOUT_MS` | Identity store call timeout | `2000` |
//! | `FRONTEND_URL` | Allowed CORS origin, an `http(s)` origin (not `*`) | `http://localhost:3000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::auth::bypass::{DEFAULT_BYPASS_EMAIL, DEFAULT_BYPASS_NAME};
use crate::auth::jwks::{key_discovery_url, DEFAULT_CERTS_PATH};
use crate::auth::{BypassMode, Environment};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const APP_ENV: &str = "APP_ENV";
pub const TEAM_DOMAIN_ENV: &str = "CLOUDFLARE_TEAM_DOMAIN";
pub const POLICY_AUD_ENV: &str = "CLOUDFLARE_POLICY_AUD";
pub const CERTS_PATH_ENV: &str = "ACCESS_CERTS_PATH";
pub const BYPASS_ENV: &str = "DEV_BYPASS_AUTH";
pub const BYPASS_EMAIL_ENV: &str = "DEV_USER_EMAIL";
pub const BYPASS_NAME_ENV: &str = "DEV_USER_NAME";
pub const KEY_CACHE_TTL_ENV: &str = "KEY_CACHE_TTL_SECS";
pub const KEY_FETCH_TIMEOUT_ENV: &str = "KEY_FETCH_TIMEOUT_SECS";
pub const KEY_REFRESH_COOLDOWN_ENV: &str = "KEY_REFRESH_COOLDOWN_SECS";
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Configuration errors. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required when auth bypass is not enabled")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("CLOUDFLARE_TEAM_DOMAIN must be a bare host name, got {0:?}")]
    InvalidTeamDomain(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// `json` selects JSON output; anything else is pretty.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// How requests are authenticated.
#[derive(Debug, Clone)]
pub enum AuthSettings {
    Verify {
        team_domain: String,
        audience: String,
    },
    Bypass(BypassMode),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub auth: AuthSettings,
    pub certs_path: String,
    pub key_cache_ttl: Duration,
    pub key_fetch_timeout: Duration,
    pub key_refresh_cooldown: Duration,
    pub store_timeout: Duration,
    pub frontend_url: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
            })?;

        let environment = Environment::parse(get(APP_ENV).as_deref());
        let opt_in = parse_flag(get(BYPASS_ENV), BYPASS_ENV)?;
        let certs_path = get(CERTS_PATH_ENV).unwrap_or_else(|| DEFAULT_CERTS_PATH.to_string());

        let bypass = BypassMode::from_flags(
            environment,
            opt_in,
            get(BYPASS_EMAIL_ENV).unwrap_or_else(|| DEFAULT_BYPASS_EMAIL.to_string()),
            get(BYPASS_NAME_ENV).unwrap_or_else(|| DEFAULT_BYPASS_NAME.to_string()),
        );

        let auth = match bypass {
            Some(bypass) => AuthSettings::Bypass(bypass),
            None => {
                let team_domain = get(TEAM_DOMAIN_ENV).ok_or(ConfigError::Missing(TEAM_DOMAIN_ENV))?;
                let audience = get(POLICY_AUD_ENV).ok_or(ConfigError::Missing(POLICY_AUD_ENV))?;
                key_discovery_url(&team_domain, &certs_path)
                    .map_err(|_| ConfigError::InvalidTeamDomain(team_domain.clone()))?;
                AuthSettings::Verify {
                    team_domain,
                    audience,
                }
            }
        };

        if opt_in && !matches!(auth, AuthSettings::Bypass(_)) {
            tracing::warn!(
                "{BYPASS_ENV} is set but {APP_ENV} is not development; bypass stays disabled"
            );
        }

        let frontend_url = match get(FRONTEND_URL_ENV) {
            Some(value) => parse_origin(value, FRONTEND_URL_ENV)?,
            None => DEFAULT_FRONTEND_URL.to_string(),
        };

        Ok(Self {
            bind_addr,
            environment,
            auth,
            certs_path,
            key_cache_ttl: Duration::from_secs(parse_or(
                get(KEY_CACHE_TTL_ENV),
                KEY_CACHE_TTL_ENV,
                86_400,
            )?),
            key_fetch_timeout: Duration::from_secs(parse_or(
                get(KEY_FETCH_TIMEOUT_ENV),
                KEY_FETCH_TIMEOUT_ENV,
                10,
            )?),
            key_refresh_cooldown: Duration::from_secs(parse_or(
                get(KEY_REFRESH_COOLDOWN_ENV),
                KEY_REFRESH_COOLDOWN_ENV,
                10,
            )?),
            store_timeout: Duration::from_millis(parse_or(
                get(STORE_TIMEOUT_ENV),
                STORE_TIMEOUT_ENV,
                2_000,
            )?),
            frontend_url,
            log_format: LogFormat::parse(get(LOG_FORMAT_ENV).as_deref()),
        })
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self.auth, AuthSettings::Bypass(_))
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Parse a single `http(s)` origin, returned without a trailing slash.
/// Wildcards and values carrying a path, query or credentials are rejected.
fn parse_origin(value: String, name: &'static str) -> Result<String, ConfigError> {
    let invalid = |value: String| ConfigError::Invalid { name, value };

    let Ok(url) = Url::parse(&value) else {
        return Err(invalid(value));
    };
    let is_origin = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();

    if !is_origin {
        return Err(invalid(value));
    }
    Ok(url.origin().ascii_serialization())
}

fn parse_flag(value: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "false" | "0" => Ok(false),
        "true" | "1" => Ok(true),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const VERIFY: &[(&str, &str)] = &[
        (TEAM_DOMAIN_ENV, "acme.cloudflareaccess.com"),
        (POLICY_AUD_ENV, "aud-tag"),
    ];

    #[test]
    fn defaults_with_verification() {
        let config = load(VERIFY).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.certs_path, DEFAULT_CERTS_PATH);
        assert_eq!(config.key_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.key_fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.key_refresh_cooldown, Duration::from_secs(10));
        assert_eq!(config.store_timeout, Duration::from_millis(2_000));
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(matches!(
            config.auth,
            AuthSettings::Verify { ref team_domain, ref audience }
                if team_domain == "acme.cloudflareaccess.com" && audience == "aud-tag"
        ));
    }

    #[test]
    fn missing_team_domain_is_fatal_outside_bypass() {
        let result = load(&[(POLICY_AUD_ENV, "aud-tag")]);
        assert!(matches!(result, Err(ConfigError::Missing(TEAM_DOMAIN_ENV))));

        let result = load(&[(TEAM_DOMAIN_ENV, "acme.cloudflareaccess.com")]);
        assert!(matches!(result, Err(ConfigError::Missing(POLICY_AUD_ENV))));
    }

    #[test]
    fn team_domain_must_be_bare_host() {
        let result = load(&[
            (TEAM_DOMAIN_ENV, "https://acme.cloudflareaccess.com"),
            (POLICY_AUD_ENV, "aud-tag"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidTeamDomain(_))));
    }

    #[test]
    fn bypass_requires_development_and_opt_in() {
        let production_opt_in = load(&[(BYPASS_ENV, "true"), (APP_ENV, "production")]);
        assert!(matches!(production_opt_in, Err(ConfigError::Missing(_))));

        let unset_env_opt_in = load(&[(BYPASS_ENV, "true")]);
        assert!(matches!(unset_env_opt_in, Err(ConfigError::Missing(_))));

        let development_only = load(&[(APP_ENV, "development")]);
        assert!(matches!(development_only, Err(ConfigError::Missing(_))));

        let config = load(&[(APP_ENV, "development"), (BYPASS_ENV, "true")]).unwrap();
        assert!(config.is_bypass());
        let AuthSettings::Bypass(bypass) = config.auth else {
            panic!("expected bypass settings");
        };
        assert_eq!(bypass.email(), "dev@example.com");
        assert_eq!(bypass.name(), "Dev User");
    }

    #[test]
    fn production_opt_in_with_credentials_still_verifies() {
        let mut vars = VERIFY.to_vec();
        vars.push((BYPASS_ENV, "true"));
        let config = load(&vars).unwrap();
        assert!(!config.is_bypass());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = VERIFY.to_vec();
        vars.extend([
            (PORT_ENV, "9090"),
            (CERTS_PATH_ENV, "/cdn-cgi/access/certs"),
            (KEY_CACHE_TTL_ENV, "60"),
            (KEY_REFRESH_COOLDOWN_ENV, "30"),
            (STORE_TIMEOUT_ENV, "250"),
            (FRONTEND_URL_ENV, "https://wallet.example.com/"),
            (LOG_FORMAT_ENV, "json"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.certs_path, "/cdn-cgi/access/certs");
        assert_eq!(config.key_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.key_refresh_cooldown, Duration::from_secs(30));
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.frontend_url, "https://wallet.example.com");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn frontend_url_must_be_a_single_origin() {
        for value in [
            "*",
            "not a url",
            "ftp://files.example.com",
            "https://wallet.example.com/app",
            "https://user:pw@wallet.example.com",
        ] {
            let mut vars = VERIFY.to_vec();
            vars.push((FRONTEND_URL_ENV, value));
            assert!(
                matches!(load(&vars), Err(ConfigError::Invalid { name: FRONTEND_URL_ENV, .. })),
                "{value}"
            );
        }

        let mut vars = VERIFY.to_vec();
        vars.push((FRONTEND_URL_ENV, "http://localhost:5173"));
        assert_eq!(load(&vars).unwrap().frontend_url, "http://localhost:5173");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("xml")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut vars = VERIFY.to_vec();
        vars.push((PORT_ENV, "eighty"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));

        let result = load(&[(APP_ENV, "development"), (BYPASS_ENV, "yes please")]);
        assert!(matches!(result, Err(ConfigError::Invalid { name: BYPASS_ENV, .. })));
    }
}
