use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "locale-translator.toml";
pub const CONFIG_ENV: &str = "LOCALE_TRANSLATOR_CONFIG";
pub const API_KEY_ENV: &str = "OPENAI_KEY";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub translate: TranslateSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServerSection {
    #[serde(default)]
    pub listen: Option<String>,
}

#[derive(Clone, Deserialize, Default)]
pub struct OpenAiSection {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Fallback credential when neither the request nor `OPENAI_KEY` supplies one.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for OpenAiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSection")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TranslateSection {
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Reject model replies whose keys differ from the keys sent.
    #[serde(default)]
    pub strict_keys: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub fill_empty: Option<String>,
    #[serde(default)]
    pub translate: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        let p = PathBuf::from(p.trim());
        if p.exists() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Loads `explicit` if given, else the first config found by [`find_default_config`].
///
/// Returns the defaults (and no path) when nothing is found.
pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_default_config(CONFIG_FILENAME),
    };
    match path {
        Some(p) => Ok((load_config(&p)?, Some(p))),
        None => Ok((AppConfig::default(), None)),
    }
}

pub fn env_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{find_file_upwards, load_config, AppConfig};

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(
            &path,
            "[openai]\nmodel = \"gpt-4o-mini\"\n\n[translate]\nstrict_keys = true\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.openai.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cfg.translate.strict_keys, Some(true));
        assert!(cfg.translate.batch_size.is_none());
        assert!(cfg.server.listen.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(&path, "[openai\nmodel = 1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn finds_file_in_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("x.toml"), "").unwrap();

        let found = find_file_upwards(&nested, "x.toml", 4).unwrap();
        assert_eq!(found, dir.path().join("x.toml"));
        assert!(find_file_upwards(&nested, "x.toml", 1).is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg: AppConfig = toml::from_str("[openai]\napi_key = \"sk-from-file\"\n").unwrap();
        let s = format!("{cfg:?}");
        assert!(!s.contains("sk-from-file"), "{s}");
        assert!(s.contains("[REDACTED]"), "{s}");
    }
}
