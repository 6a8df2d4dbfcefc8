use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::{
    env_api_key, load_or_default, AppConfig, CONFIG_FILENAME, DEFAULT_API_BASE, DEFAULT_LISTEN,
    DEFAULT_MODEL,
};
use crate::locale::BATCH_SIZE;

use super::completion::{OpenAiClientFactory, OpenAiSettings};
use super::handler::{HandlerConfig, RequestHandler};
use super::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};

/// Everything the service needs, resolved from the config file and environment.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub config_path: Option<PathBuf>,
    pub listen: SocketAddr,
    pub openai: OpenAiSettings,
    pub handler: HandlerConfig,
    pub prompts: PromptSet,
}

impl ServiceConfig {
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let (file_cfg, path) = load_or_default(config_path)?;
        Self::from_app_config(&file_cfg, path, env_api_key())
    }

    /// `env_key` takes precedence over `[openai].api_key`.
    pub fn from_app_config(
        file_cfg: &AppConfig,
        config_path: Option<PathBuf>,
        env_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let listen_text = file_cfg
            .server
            .listen
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LISTEN);
        let listen: SocketAddr = listen_text
            .parse()
            .with_context(|| format!("invalid [server].listen address: {listen_text}"))?;

        let o = &file_cfg.openai;
        let openai = OpenAiSettings {
            api_base: o
                .api_base
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: o
                .model
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: o.temperature,
            request_timeout: o.request_timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        };

        let batch_size = file_cfg.translate.batch_size.unwrap_or(BATCH_SIZE);
        if batch_size == 0 {
            return Err(anyhow::anyhow!("[translate].batch_size must be at least 1"));
        }
        let handler = HandlerConfig {
            env_api_key: env_key.or_else(|| {
                o.api_key
                    .clone()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            }),
            batch_size,
            strict_keys: file_cfg.translate.strict_keys.unwrap_or(false),
        };

        let prompts = PromptSet::load(config_path.as_deref(), &file_cfg.prompts)
            .context("load prompts")?;

        Ok(Self {
            config_path,
            listen,
            openai,
            handler,
            prompts,
        })
    }

    pub fn build_handler(&self) -> anyhow::Result<RequestHandler> {
        let factory = OpenAiClientFactory::new(self.openai.clone(), self.prompts.clone())
            .context("build http client")?;
        Ok(RequestHandler::new(Arc::new(factory), self.handler.clone()))
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }

    let cfg_text = r#"[server]
listen = "127.0.0.1:3000"

[openai]
api_base = "https://api.openai.com/v1"
model = "gpt-3.5-turbo"
# The OPENAI_KEY environment variable is preferred over this value.
# api_key = ""
# temperature = 0.2
# request_timeout_secs = 120

[translate]
batch_size = 30
# Fail when the model renames, drops or invents keys.
strict_keys = false

[prompts]
fill_empty = "prompts/fill_empty.txt"
translate = "prompts/translate.txt"
"#;

    std::fs::write(&cfg_path, cfg_text)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
