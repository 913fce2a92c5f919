use parley_agent::{ClientConfig, InferenceConfig};
use parley_core::{ModelChoice, ParleyResult, ResponseStyle};
use parley_gateway::DEFAULT_MAX_UPLOAD_BYTES;
use parley_session::ChatSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of `parley.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Directory with prompt templates overriding the built-in ones.
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Sessions untouched this long (and without an open chat socket) are
    /// dropped. `0` keeps them for the life of the process.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Model and style every new chat starts with.
#[derive(Debug, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub model: ModelChoice,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub custom_style: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            style: default_style(),
            custom_style: None,
        }
    }
}

impl DefaultsConfig {
    pub fn to_settings(&self) -> ParleyResult<ChatSettings> {
        Ok(ChatSettings {
            model: self.model,
            style: ResponseStyle::from_parts(&self.style, self.custom_style.as_deref())?,
            ..ChatSettings::default()
        })
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8501
}
fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}
fn default_session_idle_secs() -> u64 {
    3600
}
fn default_style() -> String {
    "concise".to_string()
}

impl ParleyConfig {
    /// Reads `path`; a missing file yields the defaults. Relative
    /// `prompts_dir` values resolve against the config file's directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
            })?;
            Self::parse(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?
        } else {
            Self::default()
        };

        if let Some(dir) = config.prompts_dir.take() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.prompts_dir = Some(if dir.is_relative() { base.join(dir) } else { dir });
        }

        config.api = config.api.with_env_fallback();
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Selections every new chat starts with: `[defaults]` seeded with the
    /// `[inference]` values, checked against the usual ranges.
    pub fn session_defaults(&self) -> ParleyResult<ChatSettings> {
        let mut settings = self.defaults.to_settings()?;
        self.inference.seed(&mut settings);
        settings.validate()?;
        Ok(settings)
    }
}
