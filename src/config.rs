//! Runtime configuration.
//!
//! Built-in defaults, overridden by `SNIPPETBOX_`-prefixed environment
//! variables: `SNIPPETBOX_ADDR=127.0.0.1:8080`,
//! `SNIPPETBOX_SECURE_COOKIES=false`, and so on. Field names are the
//! lowercased remainder of the variable name.

use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const ENV_PREFIX: &str = "SNIPPETBOX_";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// `host:port` to listen on.
    pub addr: String,
    /// Root of the UI assets: `html/` for templates, `static/` for files.
    pub ui_dir: PathBuf,
    pub session_lifetime_secs: u64,
    /// Mark cookies `Secure`. Turn off only for plain-HTTP development.
    pub secure_cookies: bool,
    pub request_timeout_secs: u64,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_grace_secs: u64,
    /// How often expired sessions are swept from the store.
    pub session_sweep_secs: u64,
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:4000".to_owned(),
            ui_dir: PathBuf::from("./ui"),
            session_lifetime_secs: 12 * 60 * 60,
            secure_cookies: true,
            request_timeout_secs: 10,
            max_body_bytes: 10 * 1024 * 1024,
            shutdown_grace_secs: 30,
            session_sweep_secs: 5 * 60,
            log_filter: "info".to_owned(),
        }
    }
}

impl Config {
    /// Defaults merged with the process environment.
    pub fn load() -> Result<Self, Error> {
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, Error> {
        Ok(figment.extract()?)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.ui_dir.join("html")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.ui_dir.join("static")
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn session_sweep(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();

        assert_eq!(config.addr, "0.0.0.0:4000");
        assert!(config.secure_cookies);
        assert_eq!(config.session_lifetime(), Duration::from_secs(43_200));
        assert_eq!(config.templates_dir(), PathBuf::from("./ui/html"));
        assert_eq!(config.static_dir(), PathBuf::from("./ui/static"));
    }

    #[test]
    fn later_providers_override_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Serialized::default("addr", "127.0.0.1:8080"))
            .merge(Serialized::default("secure_cookies", false))
            .merge(Serialized::default("max_body_bytes", 4096));
        let config = Config::from_figment(figment).unwrap();

        assert_eq!(config.addr, "127.0.0.1:8080");
        assert!(!config.secure_cookies);
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Serialized::default("request_timeout_secs", "soon"));

        assert!(matches!(Config::from_figment(figment), Err(Error::Config(_))));
    }
}
