use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: f64 = 300.0;
pub const DEFAULT_CHAT_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_DATA_DIR: &str = ".reportlens";
pub const DEFAULT_ENV_FILE: &str = ".env";

pub const API_URL_KEY: &str = "REPORTLENS_API_URL";
pub const ANALYSIS_TIMEOUT_KEY: &str = "REPORTLENS_ANALYSIS_TIMEOUT_SECS";
pub const CHAT_TIMEOUT_KEY: &str = "REPORTLENS_CHAT_TIMEOUT_SECS";
pub const IDENTITY_API_KEY: &str = "REPORTLENS_IDENTITY_API_KEY";
pub const DATA_DIR_KEY: &str = "REPORTLENS_DATA_DIR";

const ENV_PREFIX: &str = "REPORTLENS_";

pub const IDENTITY_KEY_MISSING: &str = "Identity API key is missing. Check local .env file.";

/// Where the remote service lives and how long each call may take.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub analysis_timeout: Duration,
    pub chat_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: normalize_api_base(api_base),
            analysis_timeout: Duration::from_secs_f64(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            chat_timeout: Duration::from_secs_f64(DEFAULT_CHAT_TIMEOUT_SECS),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub client: ClientConfig,
    pub identity_api_key: Option<String>,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Process environment layered over the dotenv file. A missing file is not an error.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let env_file = env_file.unwrap_or_else(|| Path::new(DEFAULT_ENV_FILE));
        let mut vars = if env_file.exists() {
            let content = std::fs::read_to_string(env_file)
                .with_context(|| format!("failed reading {}", env_file.display()))?;
            parse_dotenv(&content)
        } else {
            BTreeMap::new()
        };
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                vars.insert(key, value);
            }
        }
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| {
            vars.get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut client = ClientConfig::new(
            lookup(API_URL_KEY)
                .as_deref()
                .unwrap_or(DEFAULT_API_URL),
        );
        if client.api_base.is_empty() {
            client.api_base = DEFAULT_API_URL.to_string();
        }
        if let Some(raw) = lookup(ANALYSIS_TIMEOUT_KEY) {
            client.analysis_timeout = parse_timeout(ANALYSIS_TIMEOUT_KEY, &raw)?;
        }
        if let Some(raw) = lookup(CHAT_TIMEOUT_KEY) {
            client.chat_timeout = parse_timeout(CHAT_TIMEOUT_KEY, &raw)?;
        }

        Ok(Self {
            client,
            identity_api_key: lookup(IDENTITY_API_KEY),
            data_dir: lookup(DATA_DIR_KEY)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        })
    }

    /// Command-line override of the service URL. Blank input is ignored.
    pub fn override_api_url(&mut self, raw: &str) {
        let api_base = normalize_api_base(raw);
        if !api_base.is_empty() {
            self.client.api_base = api_base;
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn session_log_path(&self) -> PathBuf {
        self.data_dir.join("session.jsonl")
    }
}

/// `KEY=value` lines; `#` comments, an `export ` prefix and matching quotes are stripped.
pub fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let unquoted = ['"', '\'']
            .into_iter()
            .find_map(|quote| {
                value
                    .strip_prefix(quote)
                    .and_then(|rest| rest.strip_suffix(quote))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), unquoted.to_string());
    }
    vars
}

fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_timeout(key: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .parse()
        .with_context(|| format!("{key} must be a number of seconds, got {raw:?}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{key} must be positive, got {raw:?}");
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{key} is out of range, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{parse_dotenv, ClientConfig, Settings, API_URL_KEY, DEFAULT_API_URL};

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() -> anyhow::Result<()> {
        let settings = Settings::from_vars(&BTreeMap::new())?;
        assert_eq!(settings.client.api_base, DEFAULT_API_URL);
        assert_eq!(settings.client.analysis_timeout, Duration::from_secs(300));
        assert_eq!(settings.client.chat_timeout, Duration::from_secs(60));
        assert_eq!(settings.data_dir, PathBuf::from(".reportlens"));
        assert_eq!(settings.identity_api_key, None);
        Ok(())
    }

    #[test]
    fn api_url_trailing_slashes_are_trimmed() -> anyhow::Result<()> {
        let settings =
            Settings::from_vars(&vars(&[(API_URL_KEY, "https://labs.example.com/api//")]))?;
        assert_eq!(settings.client.api_base, "https://labs.example.com/api");
        assert_eq!(
            settings.client.endpoint("/analyze"),
            "https://labs.example.com/api/analyze"
        );
        Ok(())
    }

    #[test]
    fn blank_api_url_falls_back_to_default() -> anyhow::Result<()> {
        let settings = Settings::from_vars(&vars(&[(API_URL_KEY, "  /  ")]))?;
        assert_eq!(settings.client.api_base, DEFAULT_API_URL);
        Ok(())
    }

    #[test]
    fn timeouts_accept_fractional_seconds() -> anyhow::Result<()> {
        let settings = Settings::from_vars(&vars(&[
            ("REPORTLENS_ANALYSIS_TIMEOUT_SECS", "0.5"),
            ("REPORTLENS_CHAT_TIMEOUT_SECS", "12"),
        ]))?;
        assert_eq!(settings.client.analysis_timeout, Duration::from_millis(500));
        assert_eq!(settings.client.chat_timeout, Duration::from_secs(12));
        Ok(())
    }

    #[test]
    fn invalid_timeouts_are_rejected() {
        assert!(Settings::from_vars(&vars(&[("REPORTLENS_CHAT_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Settings::from_vars(&vars(&[("REPORTLENS_ANALYSIS_TIMEOUT_SECS", "-1")])).is_err());
        assert!(Settings::from_vars(&vars(&[("REPORTLENS_CHAT_TIMEOUT_SECS", "inf")])).is_err());
    }

    #[test]
    fn oversized_timeout_is_an_error() {
        let err = Settings::from_vars(&vars(&[("REPORTLENS_ANALYSIS_TIMEOUT_SECS", "1e30")]))
            .unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err:#}");
    }

    #[test]
    fn blank_identity_key_reads_as_missing() -> anyhow::Result<()> {
        let settings = Settings::from_vars(&vars(&[("REPORTLENS_IDENTITY_API_KEY", "   ")]))?;
        assert_eq!(settings.identity_api_key, None);

        let settings = Settings::from_vars(&vars(&[("REPORTLENS_IDENTITY_API_KEY", " key-1 ")]))?;
        assert_eq!(settings.identity_api_key.as_deref(), Some("key-1"));
        Ok(())
    }

    #[test]
    fn data_dir_paths_are_derived() -> anyhow::Result<()> {
        let settings = Settings::from_vars(&vars(&[("REPORTLENS_DATA_DIR", "/tmp/rl")]))?;
        assert_eq!(settings.profile_path(), PathBuf::from("/tmp/rl/profile.json"));
        assert_eq!(
            settings.preferences_path(),
            PathBuf::from("/tmp/rl/preferences.json")
        );
        assert_eq!(settings.session_log_path(), PathBuf::from("/tmp/rl/session.jsonl"));
        Ok(())
    }

    #[test]
    fn parse_dotenv_handles_comments_exports_and_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nexport REPORTLENS_API_URL=\"http://10.0.0.2:8000\"\nREPORTLENS_IDENTITY_API_KEY='abc'\nnot a pair\n=orphan\nREPORTLENS_DATA_DIR = data \n",
        );
        assert_eq!(
            parsed.get("REPORTLENS_API_URL").map(String::as_str),
            Some("http://10.0.0.2:8000")
        );
        assert_eq!(
            parsed.get("REPORTLENS_IDENTITY_API_KEY").map(String::as_str),
            Some("abc")
        );
        assert_eq!(parsed.get("REPORTLENS_DATA_DIR").map(String::as_str), Some("data"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn load_reads_env_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join(".env");
        std::fs::write(&path, "REPORTLENS_TEST_ONLY_UNUSED=1\nREPORTLENS_DATA_DIR=from-file\n")?;
        let settings = Settings::load(Some(&path))?;
        if std::env::var_os("REPORTLENS_DATA_DIR").is_none() {
            assert_eq!(settings.data_dir, PathBuf::from("from-file"));
        }
        Ok(())
    }

    #[test]
    fn api_url_override_keeps_timeouts() -> anyhow::Result<()> {
        let mut settings = Settings::from_vars(&vars(&[("REPORTLENS_CHAT_TIMEOUT_SECS", "5")]))?;
        settings.override_api_url("http://10.1.1.1:9000/");
        settings.override_api_url("   ");
        assert_eq!(settings.client.api_base, "http://10.1.1.1:9000");
        assert_eq!(settings.client.chat_timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn client_config_default_points_at_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint("chat"), "http://localhost:8000/chat");
    }
}
