//! Notifier configuration.
//!
//! Reads JSON at `<config dir>/reportify/notifier.json`, then applies
//! `REPORTIFY_*` environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use reportify_push_gate::{GatePolicy, ReconnectConfig};

const ENV_WS_URL: &str = "REPORTIFY_WS_URL";
const ENV_TOKEN: &str = "REPORTIFY_TOKEN";
const ENV_MAX_RECONNECT_ATTEMPTS: &str = "REPORTIFY_WS_MAX_RECONNECT_ATTEMPTS";
const ENV_RECONNECT_BASE_DELAY_MS: &str = "REPORTIFY_WS_RECONNECT_BASE_DELAY_MS";
const ENV_KEEPALIVE_SECS: &str = "REPORTIFY_WS_KEEPALIVE_SECS";
const ENV_NOTICE_DURATION_MS: &str = "REPORTIFY_NOTICE_DURATION_MS";

/// On-disk config format. Absent fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    ws_url: Option<String>,
    token: Option<String>,
    max_reconnect_attempts: Option<u32>,
    reconnect_base_delay_ms: Option<u64>,
    keepalive_secs: Option<u64>,
    notice_duration_ms: Option<u64>,
}

/// Notifier configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Push endpoint; empty disables the channel.
    pub ws_url: String,
    /// Session token to sign in with at startup.
    pub token: Option<String>,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    /// Keepalive ping period; `None` or zero disables pings.
    pub keepalive_secs: Option<u64>,
    pub notice_duration_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        let policy = GatePolicy::default();
        Self {
            ws_url: String::new(),
            token: None,
            max_reconnect_attempts: policy.reconnect.max_attempts,
            reconnect_base_delay_ms: policy.reconnect.base_delay.as_millis() as u64,
            keepalive_secs: None,
            notice_duration_ms: policy.notice_duration_ms,
        }
    }
}

impl NotifierConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file yields defaults; an unparseable one is logged and
    /// ignored.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file_path = match path {
            Some(p) => p.to_path_buf(),
            None => config_file_path()?,
        };
        let mut config = Self::default();

        if !file_path.exists() {
            tracing::debug!(path = %file_path.display(), "no config file, using defaults");
            return Ok(config);
        }

        let content = std::fs::read_to_string(&file_path)
            .with_context(|| format!("reading {}", file_path.display()))?;
        match serde_json::from_str::<ConfigFile>(&content) {
            Ok(file) => config.merge(file),
            Err(e) => tracing::warn!(
                path = %file_path.display(),
                error = %e,
                "failed to parse notifier config, using defaults"
            ),
        }

        Ok(config)
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(url) = file.ws_url {
            self.ws_url = url;
        }
        if file.token.is_some() {
            self.token = file.token;
        }
        if let Some(n) = file.max_reconnect_attempts {
            self.max_reconnect_attempts = n;
        }
        if let Some(ms) = file.reconnect_base_delay_ms {
            self.reconnect_base_delay_ms = ms;
        }
        if file.keepalive_secs.is_some() {
            self.keepalive_secs = file.keepalive_secs;
        }
        if let Some(ms) = file.notice_duration_ms {
            self.notice_duration_ms = ms;
        }
    }

    /// Applies `REPORTIFY_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_WS_URL) {
            self.ws_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(n) = parse_env(&lookup, ENV_MAX_RECONNECT_ATTEMPTS) {
            self.max_reconnect_attempts = n;
        }
        if let Some(ms) = parse_env(&lookup, ENV_RECONNECT_BASE_DELAY_MS) {
            self.reconnect_base_delay_ms = ms;
        }
        if let Some(secs) = parse_env(&lookup, ENV_KEEPALIVE_SECS) {
            self.keepalive_secs = Some(secs);
        }
        if let Some(ms) = parse_env(&lookup, ENV_NOTICE_DURATION_MS) {
            self.notice_duration_ms = ms;
        }
    }

    /// Connection policy for the notification gate.
    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            reconnect: ReconnectConfig::new(
                self.max_reconnect_attempts,
                Duration::from_millis(self.reconnect_base_delay_ms),
            ),
            notice_duration_ms: self.notice_duration_ms,
            keepalive: self
                .keepalive_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ..GatePolicy::default()
        }
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid numeric override");
            None
        }
    }
}

pub fn config_file_path() -> anyhow::Result<PathBuf> {
    let config_dir = config_base_dir()?;
    Ok(config_dir.join("reportify").join("notifier.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_gate_policy() {
        let config = NotifierConfig::default();
        assert!(config.ws_url.is_empty());
        assert!(config.token.is_none());
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_base_delay_ms, 2000);
        assert_eq!(config.notice_duration_ms, 5000);
        assert_eq!(config.policy(), GatePolicy::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotifierConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, NotifierConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.json");
        std::fs::write(
            &path,
            r#"{"ws_url": "wss://api.example/ws", "max_reconnect_attempts": 5, "keepalive_secs": 30}"#,
        )
        .unwrap();

        let config = NotifierConfig::load(Some(&path)).unwrap();
        assert_eq!(config.ws_url, "wss://api.example/ws");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_base_delay_ms, 2000);
        assert_eq!(config.policy().keepalive, Some(Duration::from_secs(30)));
    }

    #[test]
    fn unparseable_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = NotifierConfig::load(Some(&path)).unwrap();
        assert_eq!(config, NotifierConfig::default());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = NotifierConfig {
            ws_url: "wss://file/".into(),
            ..Default::default()
        };
        config.apply_env(env(&[
            (ENV_WS_URL, "wss://env/"),
            (ENV_TOKEN, "abc"),
            (ENV_RECONNECT_BASE_DELAY_MS, "500"),
            (ENV_NOTICE_DURATION_MS, "8000"),
        ]));

        assert_eq!(config.ws_url, "wss://env/");
        assert_eq!(config.token.as_deref(), Some("abc"));
        let policy = config.policy();
        assert_eq!(policy.reconnect.base_delay, Duration::from_millis(500));
        assert_eq!(policy.notice_duration_ms, 8000);
    }

    #[test]
    fn invalid_numeric_env_is_ignored() {
        let mut config = NotifierConfig::default();
        config.apply_env(env(&[
            (ENV_MAX_RECONNECT_ATTEMPTS, "many"),
            (ENV_KEEPALIVE_SECS, "-1"),
        ]));
        assert_eq!(config, NotifierConfig::default());
    }

    #[test]
    fn zero_keepalive_disables_pings() {
        let config = NotifierConfig {
            keepalive_secs: Some(0),
            ..Default::default()
        };
        assert!(config.policy().keepalive.is_none());
    }

    #[test]
    fn config_path_ends_with_app_dir() {
        let path = config_file_path().unwrap();
        assert!(path.ends_with("reportify/notifier.json"));
    }
}
