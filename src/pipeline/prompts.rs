use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PromptsSection;
use crate::locale::LocaleMap;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_FILL_EMPTY: &str = "fill_empty.txt";
pub const DEFAULT_TRANSLATE: &str = "translate.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Translate every value.
    Translate,
    /// Only fill values that are empty strings.
    FillEmpty,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "translate" => Some(Self::Translate),
            "fillEmpty" => Some(Self::FillEmpty),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::FillEmpty => "fillEmpty",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub fill_empty: String,
    pub translate: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            fill_empty: DEFAULT_FILL_EMPTY_TEXT.to_string(),
            translate: DEFAULT_TRANSLATE_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Loads prompt overrides relative to the config file directory.
    ///
    /// An explicitly configured path must exist; the default `prompts/*.txt` files are optional
    /// and fall back to the built-in instructions.
    pub fn load(config_path: Option<&Path>, p: &PromptsSection) -> anyhow::Result<Self> {
        let config_dir = config_path
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        Ok(Self {
            fill_empty: read_prompt(
                config_dir,
                p.fill_empty.as_deref(),
                DEFAULT_FILL_EMPTY,
                DEFAULT_FILL_EMPTY_TEXT,
            )?,
            translate: read_prompt(
                config_dir,
                p.translate.as_deref(),
                DEFAULT_TRANSLATE,
                DEFAULT_TRANSLATE_TEXT,
            )?,
        })
    }

    pub fn system_prompt(&self, mode: Mode) -> &str {
        match mode {
            Mode::FillEmpty => &self.fill_empty,
            Mode::Translate => &self.translate,
        }
    }
}

fn read_prompt(
    config_dir: &Path,
    configured: Option<&str>,
    default_filename: &str,
    builtin: &str,
) -> anyhow::Result<String> {
    let (rel, required) = match configured {
        Some(path) => (PathBuf::from(path), true),
        None => (Path::new(DEFAULT_PROMPTS_DIR).join(default_filename), false),
    };
    let path = if rel.is_relative() {
        config_dir.join(&rel)
    } else {
        rel
    };
    if !path.exists() {
        if required {
            return Err(anyhow::anyhow!(
                "prompt file not found: {} (run: locale-translator --init-config)",
                path.display()
            ));
        }
        return Ok(builtin.to_string());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read prompt: {}", path.display()))?;
    if text.trim().is_empty() {
        debug!(path = %path.display(), "prompt file is empty, using built-in text");
        return Ok(builtin.to_string());
    }
    Ok(text)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FillEmptyPayload<'a> {
    key_language: &'a str,
    output_language: &'a str,
    keys: &'a LocaleMap,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslatePayload<'a> {
    input_language: &'a str,
    output_language: &'a str,
    data: &'a LocaleMap,
}

/// Serialized user message for one chunk.
pub fn user_payload(
    mode: Mode,
    input_language: &str,
    output_language: &str,
    chunk: &LocaleMap,
) -> serde_json::Result<String> {
    match mode {
        Mode::FillEmpty => serde_json::to_string(&FillEmptyPayload {
            key_language: input_language,
            output_language,
            keys: chunk,
        }),
        Mode::Translate => serde_json::to_string(&TranslatePayload {
            input_language,
            output_language,
            data: chunk,
        }),
    }
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_FILL_EMPTY, DEFAULT_FILL_EMPTY_TEXT),
        (DEFAULT_TRANSLATE, DEFAULT_TRANSLATE_TEXT),
    ]
}

pub const DEFAULT_FILL_EMPTY_TEXT: &str = r#"You are a bot that fills in the blanks of a locales JSON. The user provides you a JSON with a field named "keyLanguage", which defines the language the keys of the JSON are defined in. It also has a field named "outputLanguage", which defines the language you should translate the keys to. The last field is named "keys", which includes the object with the keys to translate. If a key already has a value, just leave it like this, otherwise fill the empty string with a translation, which best fits the key. You output only a JSON, which has the same keys as the input. I give you an example input: {"keyLanguage": "English", "outputLanguage": "German", "keys": {"hello": "", "world": ""}}. The output should be {"hello": "Hallo", "world": "Welt"}."#;

pub const DEFAULT_TRANSLATE_TEXT: &str = r#"You are a bot that translates the values of a locales JSON. The user provides you a JSON with a field named "inputLanguage", which defines the language the values of the JSON are defined in. It also has a field named "outputLanguage", which defines the language you should translate the values to. The last field is named "data", which includes the object with the values to translate. The keys of the values should never be changed. You output only a JSON, which has the same keys as the input, but with translated values. I give you an example input: {"inputLanguage": "English", "outputLanguage": "German", "data": {"hello": "Hello", "world": "World"}}. The output should be {"hello": "Hallo", "world": "Welt"}."#;

#[cfg(test)]
mod tests {
    use super::{user_payload, Mode, PromptSet, DEFAULT_TRANSLATE_TEXT};
    use crate::config::PromptsSection;
    use crate::locale::LocaleMap;

    fn chunk() -> LocaleMap {
        [("hello", ""), ("world", "Welt")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mode_names_match_wire_format() {
        assert_eq!(Mode::parse("translate"), Some(Mode::Translate));
        assert_eq!(Mode::parse("fillEmpty"), Some(Mode::FillEmpty));
        assert_eq!(Mode::parse("fill_empty"), None);
        assert_eq!(Mode::FillEmpty.as_str(), "fillEmpty");
        assert_eq!(serde_json::to_string(&Mode::FillEmpty).unwrap(), r#""fillEmpty""#);
    }

    #[test]
    fn fill_empty_payload_shape() {
        let s = user_payload(Mode::FillEmpty, "en", "de", &chunk()).unwrap();
        assert_eq!(
            s,
            r#"{"keyLanguage":"en","outputLanguage":"de","keys":{"hello":"","world":"Welt"}}"#
        );
    }

    #[test]
    fn translate_payload_shape() {
        let s = user_payload(Mode::Translate, "en", "de", &chunk()).unwrap();
        assert_eq!(
            s,
            r#"{"inputLanguage":"en","outputLanguage":"de","data":{"hello":"","world":"Welt"}}"#
        );
    }

    #[test]
    fn load_prefers_override_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("locale-translator.toml");
        std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
        std::fs::write(dir.path().join("prompts").join("fill_empty.txt"), "FILL").unwrap();

        let set = PromptSet::load(Some(&cfg_path), &PromptsSection::default()).unwrap();
        assert_eq!(set.system_prompt(Mode::FillEmpty), "FILL");
        assert_eq!(set.system_prompt(Mode::Translate), DEFAULT_TRANSLATE_TEXT);
    }

    #[test]
    fn load_fails_for_missing_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("locale-translator.toml");
        let p = PromptsSection {
            translate: Some("custom/translate.txt".to_string()),
            ..PromptsSection::default()
        };
        assert!(PromptSet::load(Some(&cfg_path), &p).is_err());
    }
}
