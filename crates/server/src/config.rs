use models::material::DEFAULT_MAX_UPLOAD_BYTES;
use std::{net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Credentials for the external meetings API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferencingConfig {
    pub api_url: String,
    pub api_token: String,
}

/// Runtime configuration, read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub oidc_issuer_url: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// None means every session gets a placeholder meeting
    pub conferencing: Option<ConferencingConfig>,
    pub run_migrations: bool,
    /// Identity-provider subjects that are given an admin account on first use
    pub admin_subjects: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let conferencing = match (get("CONFERENCING_API_URL"), get("CONFERENCING_API_TOKEN")) {
            (Some(api_url), Some(api_token)) => Some(ConferencingConfig { api_url, api_token }),
            (Some(_), None) => return Err(ConfigError::Missing("CONFERENCING_API_TOKEN")),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                10,
            )?,
            oidc_issuer_url: required("OIDC_ISSUER_URL")?,
            bind_addr: parse_or(
                get("BIND_ADDR"),
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            upload_dir: get("UPLOAD_DIR").map_or_else(|| PathBuf::from("uploads"), PathBuf::from),
            max_upload_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            conferencing,
            run_migrations: parse_or(get("RUN_MIGRATIONS"), "RUN_MIGRATIONS", true)?,
            admin_subjects: get("ADMIN_SUBJECTS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/courses"),
        ("OIDC_ISSUER_URL", "https://idp.example.com"),
    ];

    #[test]
    fn test_defaults() {
        let config = config(&REQUIRED).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.run_migrations);
        assert!(config.conferencing.is_none());
        assert!(config.admin_subjects.is_empty());
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            config(&[REQUIRED[1]]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
        assert_eq!(
            config(&[REQUIRED[0], ("OIDC_ISSUER_URL", "  ")]),
            Err(ConfigError::Missing("OIDC_ISSUER_URL"))
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("RUN_MIGRATIONS", "false"),
            ("CONFERENCING_API_URL", "https://meet.example.com/v2"),
            ("CONFERENCING_API_TOKEN", "token"),
            ("ADMIN_SUBJECTS", "alice, bob,,"),
        ]);

        let config = config(&vars).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.max_upload_bytes, 2048);
        assert!(!config.run_migrations);
        assert_eq!(
            config.conferencing,
            Some(ConferencingConfig {
                api_url: "https://meet.example.com/v2".to_string(),
                api_token: "token".to_string(),
            })
        );
        assert_eq!(config.admin_subjects, vec!["alice", "bob"]);
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("MAX_UPLOAD_BYTES", "ten megabytes"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: "MAX_UPLOAD_BYTES", .. })
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("CONFERENCING_API_URL", "https://meet.example.com"));
        assert_eq!(
            config(&vars),
            Err(ConfigError::Missing("CONFERENCING_API_TOKEN"))
        );
    }
}
