use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "earlybirds.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8001".into(),
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then the TOML file at `path` if present, then environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("EARLYBIRDS_API_BASE") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "api_base_url = \"https://orders.example.test\"\nrequest_timeout_secs = 3\n",
        )
        .expect("parse");

        assert_eq!(settings.api_base_url, "https://orders.example.test");
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "request_timeout_secs = 30").expect("parse");

        assert_eq!(settings.api_base_url, Settings::default().api_base_url);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn app_prefixed_env_wins_and_bad_timeout_is_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EARLYBIRDS_API_BASE", "http://first.example.test"),
            ("APP__API_BASE_URL", "http://second.example.test"),
            ("APP__REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.api_base_url, "http://second.example.test");
        assert_eq!(settings.request_timeout_secs, 10);
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn malformed_file_is_reported_with_its_path() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("earlybirds_config_test_{suffix}.toml"));
        fs::write(&path, "request_timeout_secs = \"ten\"").expect("write config");

        let err = load_settings(&path).expect_err("must fail");
        assert!(err.to_string().contains("failed to parse config file"));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = env::temp_dir().join("earlybirds_config_test_missing.toml");
        assert!(load_settings(&path).is_ok());
    }
}
