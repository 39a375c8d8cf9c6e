//! Server configuration.
//!
//! Read from a TOML file layered with `COLONY__SECTION__KEY` environment
//! variables. Every section has defaults, so a missing file still yields a
//! runnable server:
//!
//! ```toml
//! [connection]
//! address = "0.0.0.0"
//! port = 9339
//!
//! [admin]
//! moderators = ["Alice"]
//!
//! [server]
//! restart_delay_secs = 10
//! unknown_case = "log"
//! ```

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::ColonyError;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "COLONY";

/// Everything the binary needs to start a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub game: GameConfig,
    pub welcome: WelcomeConfig,
    pub database: DatabaseConfig,
    pub server: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 9339,
        }
    }
}

impl ConnectionConfig {
    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Names allowed to run moderator chat commands. Matched
    /// case-insensitively.
    pub moderators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// The client protocol version logins must report.
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    pub message: String,
    pub sender: String,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            message: "Welcome!".to_string(),
            sender: "ColonyBot".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/user.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Delay between the restart warning and the shutdown.
    pub restart_delay_secs: u64,
    /// Delay between the version-mismatch warning and the disconnect.
    pub version_grace_secs: u64,
    /// Overrides the build-dependent default when set.
    pub unknown_case: Option<UnknownCasePolicy>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            restart_delay_secs: 10,
            version_grace_secs: 5,
            unknown_case: None,
        }
    }
}

impl RuntimeConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn version_grace(&self) -> Duration {
        Duration::from_secs(self.version_grace_secs)
    }
}

/// What to do when a client sends a sub-protocol variant the server does
/// not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCasePolicy {
    /// Panic the connection task so the gap is impossible to miss.
    Panic,
    /// Log at error level and drop the message.
    Log,
}

impl Default for UnknownCasePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Log
        }
    }
}

impl ServerConfig {
    /// Loads `path` (if it exists) and applies environment overrides.
    pub fn load(path: &str) -> Result<Self, ColonyError> {
        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses configuration from TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self, ColonyError> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The policy in effect: the configured one, or the build default.
    pub fn unknown_case(&self) -> UnknownCasePolicy {
        self.server.unknown_case.unwrap_or_default()
    }
}
