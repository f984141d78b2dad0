//! Ambient process configuration (optional `vodget.toml`). Distinct from
//! `options::Options` (the per-run, CLI-parsed record, §3): this is the
//! smaller slice of settings that make sense to pin once for a machine
//! rather than repeat on every invocation. Grounded in the teacher's
//! `configs::base::Config::load` (TOML via `toml` + `serde`, missing/empty
//! file treated as "use defaults", never fatal).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HttpConfig {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    /// Overrides the YouTube client-profile fallback order (§4.2, §B); an
    /// unrecognized name is ignored rather than rejected.
    #[serde(default)]
    pub client_profile_order: Option<Vec<String>>,
}

impl Config {
    /// Loads `vodget.toml` from the current directory. A missing file, or
    /// one that fails to parse, yields `Config::default()` rather than an
    /// error — ambient config is a convenience, not a requirement.
    pub async fn load() -> Self {
        let raw = match tokio::fs::read_to_string("vodget.toml").await {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };
        toml::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to parse vodget.toml, using defaults");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_overrides() {
        let cfg = Config::default();
        assert!(cfg.http.user_agent.is_none());
        assert!(cfg.client_profile_order.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str("[http]\ntimeout_secs = 45\n").unwrap();
        assert_eq!(cfg.http.timeout_secs, Some(45));
    }
}
