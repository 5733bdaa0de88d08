//! Persistent configuration for the ircline binary.
//!
//! Config file lives at `~/.config/ircline/config.toml` unless `--config`
//! points elsewhere.

use std::path::{Path, PathBuf};

use ircline_sdk::{ClientCfg, DispatchMode};
use serde::{Deserialize, Serialize};

/// Default IRC server.
pub const DEFAULT_SERVER: &str = "irc.libera.chat:6667";
/// Default channel to join when none is configured.
pub const DEFAULT_CHANNEL: &str = "#ircline";
pub const DEFAULT_NICK: &str = "ircline";

/// User configuration (persisted in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server address (host:port).
    pub server: Option<String>,
    /// IRC nickname.
    pub nick: Option<String>,
    /// Real name sent with USER.
    pub realname: Option<String>,
    /// Channels to join on connect.
    pub channels: Option<Vec<String>>,
    /// `concurrent` or `ordered`.
    pub dispatch: Option<DispatchMode>,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircline")
        .join("config.toml")
}

impl Config {
    /// Load the file at `path`. A missing file is not an error; an
    /// unreadable or invalid one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(c) => return c,
                Err(e) => tracing::warn!("Bad config file {}: {e}", path.display()),
            },
            Err(e) => tracing::warn!("Can't read {}: {e}", path.display()),
        }
        Self::default()
    }
}

/// Effective settings after merging CLI args > config file > defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub server: String,
    pub nick: String,
    pub realname: Option<String>,
    pub channels: Vec<String>,
    pub dispatch: DispatchMode,
}

impl Resolved {
    pub fn merge(cli: &super::Cli, config: &Config) -> Self {
        let server = cli
            .server
            .clone()
            .or_else(|| config.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());

        // Plaintext port if none given
        let server = if server.contains(':') {
            server
        } else {
            format!("{server}:6667")
        };

        let nick = cli
            .nick
            .clone()
            .or_else(|| config.nick.clone())
            .unwrap_or_else(|| DEFAULT_NICK.to_string());

        let channels = if let Some(ref ch) = cli.channels {
            ch.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(ref ch) = config.channels {
            ch.clone()
        } else {
            vec![DEFAULT_CHANNEL.to_string()]
        };

        let dispatch = if cli.ordered {
            DispatchMode::Ordered
        } else {
            config.dispatch.unwrap_or_default()
        };

        Self {
            server,
            nick,
            realname: config.realname.clone(),
            channels,
            dispatch,
        }
    }

    pub fn client_cfg(&self) -> ClientCfg {
        ClientCfg {
            realname: self.realname.clone(),
            ..ClientCfg::new(&self.server, &self.nick).with_dispatch(self.dispatch)
        }
    }
}
