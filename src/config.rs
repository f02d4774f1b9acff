use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT_ID: &str = "ep-local-default";
pub const DEFAULT_MODEL_ID: &str = "llama3.2:latest";

const HOME_DIR_NAME: &str = ".parley";
const CONFIG_FILE: &str = "config.json";

/// Filesystem layout under the user's home directory:
/// `~/.parley/` with `config.json`, `sessions/`, `docs/` and `logs/`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    home: PathBuf,
}

impl ConfigPaths {
    /// Resolve against the user's home directory; `PARLEY_HOME` overrides.
    pub fn resolve() -> Result<Self> {
        if let Ok(home) = env::var("PARLEY_HOME") {
            return Ok(Self { home: PathBuf::from(home) });
        }
        let home = dirs::home_dir().context("Could not determine the home directory")?;
        Ok(Self {
            home: home.join(HOME_DIR_NAME),
        })
    }

    /// Layout rooted at an explicit directory.
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.home.join("sessions")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.home.join("docs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn is_initialized(&self) -> bool {
        self.home.is_dir()
    }

    /// Create the home directory and its subdirectories.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.home.clone(),
            self.sessions_dir(),
            self.docs_dir(),
            self.logs_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create '{}'", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub max_tokens: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub models: Vec<ModelInfo>,
    pub priority: u32,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub auto_approve: bool,
    pub debug_mode: bool,
    pub stream_response: bool,
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_approve: false,
            debug_mode: false,
            stream_response: true,
            auto_save: true,
        }
    }
}

/// Connection parameters for the current endpoint/model, with environment
/// overrides already applied.
#[derive(Debug, Clone)]
pub struct Connection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

/// The persisted configuration. Loaded once in `main` and passed to whatever
/// needs it; there is no process-global config state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub current_endpoint: String,
    pub current_model: String,
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            current_endpoint: DEFAULT_ENDPOINT_ID.to_string(),
            current_model: DEFAULT_MODEL_ID.to_string(),
            endpoints: vec![Endpoint {
                id: DEFAULT_ENDPOINT_ID.to_string(),
                name: "Local Ollama (default)".to_string(),
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                models: vec![ModelInfo {
                    id: DEFAULT_MODEL_ID.to_string(),
                    name: "Llama 3.2".to_string(),
                    max_tokens: 16384,
                    enabled: true,
                }],
                priority: 1,
                description: "Local model via the OpenAI-compatible API".to_string(),
                created_at: now,
                updated_at: now,
            }],
            settings: Settings::default(),
        }
    }
}

impl Config {
    /// Load the config file, creating it with defaults when missing.
    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self> {
        let file = paths.config_file();
        if file.exists() {
            Self::load(paths)
        } else {
            let config = Self::default();
            config.save(paths)?;
            Ok(config)
        }
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let file = paths.config_file();
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read '{}'", file.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("'{}' is not a valid config file", file.display()))
    }

    pub fn save(&self, paths: &ConfigPaths) -> Result<()> {
        paths.ensure_layout()?;
        let file = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&file, content)
            .with_context(|| format!("Failed to write '{}'", file.display()))
    }

    /// Factory reset: settings and endpoints back to defaults. Sessions and
    /// documents on disk are untouched.
    pub fn reset(paths: &ConfigPaths) -> Result<Self> {
        let config = Self::default();
        config.save(paths)?;
        Ok(config)
    }

    pub fn current_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.iter().find(|ep| ep.id == self.current_endpoint)
    }

    pub fn current_model(&self) -> Option<&ModelInfo> {
        self.current_endpoint()?
            .models
            .iter()
            .find(|m| m.id == self.current_model)
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<()> {
        if self.endpoints.iter().any(|ep| ep.id == endpoint.id) {
            bail!("Endpoint with ID '{}' already exists", endpoint.id);
        }
        self.endpoints.push(endpoint);
        Ok(())
    }

    pub fn remove_endpoint(&mut self, endpoint_id: &str) -> Result<()> {
        if endpoint_id == DEFAULT_ENDPOINT_ID {
            bail!("Cannot remove the default endpoint");
        }
        self.endpoints.retain(|ep| ep.id != endpoint_id);

        // Removing the active endpoint falls back to the default.
        if self.current_endpoint == endpoint_id {
            self.current_endpoint = DEFAULT_ENDPOINT_ID.to_string();
            if let Some(model) = self
                .current_endpoint()
                .and_then(|ep| ep.models.iter().find(|m| m.enabled))
            {
                self.current_model = model.id.clone();
            }
        }
        Ok(())
    }

    pub fn set_current_endpoint(&mut self, endpoint_id: &str) -> Result<()> {
        let endpoint = self
            .endpoints
            .iter()
            .find(|ep| ep.id == endpoint_id)
            .with_context(|| format!("Endpoint '{}' not found", endpoint_id))?;

        // Switch to the endpoint's first enabled model.
        let model_id = endpoint.models.iter().find(|m| m.enabled).map(|m| m.id.clone());
        self.current_endpoint = endpoint_id.to_string();
        if let Some(model_id) = model_id {
            self.current_model = model_id;
        }
        Ok(())
    }

    pub fn set_current_model(&mut self, model_id: &str) -> Result<()> {
        let endpoint = self
            .current_endpoint()
            .context("No endpoint selected")?;
        let model = endpoint
            .models
            .iter()
            .find(|m| m.id == model_id)
            .with_context(|| format!("Model '{}' not found in the current endpoint", model_id))?;

        if !model.enabled {
            bail!("Model '{}' is disabled", model_id);
        }
        self.current_model = model_id.to_string();
        Ok(())
    }

    /// Connection parameters for the current endpoint and model.
    /// `PARLEY_BASE_URL`, `PARLEY_API_KEY` and `PARLEY_MODEL` override the
    /// configured values.
    pub fn connection(&self) -> Result<Connection> {
        let endpoint = self.current_endpoint().with_context(|| {
            format!("Configured endpoint '{}' does not exist", self.current_endpoint)
        })?;
        let model = self.current_model();

        Ok(Connection {
            base_url: env::var("PARLEY_BASE_URL").unwrap_or_else(|_| endpoint.base_url.clone()),
            api_key: env::var("PARLEY_API_KEY").ok().or_else(|| endpoint.api_key.clone()),
            model: env::var("PARLEY_MODEL").unwrap_or_else(|_| self.current_model.clone()),
            max_tokens: model.map(|m| m.max_tokens).unwrap_or(4096),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_create_writes_defaults() -> Result<()> {
        let dir = tempdir()?;
        let paths = ConfigPaths::at(dir.path().join(".parley"));

        let config = Config::load_or_create(&paths)?;
        assert!(paths.config_file().exists());
        assert_eq!(config.current_endpoint, DEFAULT_ENDPOINT_ID);

        // Second load reads the same file back.
        let reloaded = Config::load_or_create(&paths)?;
        assert_eq!(reloaded.current_model, config.current_model);
        Ok(())
    }

    #[test]
    fn test_layout_creation() -> Result<()> {
        let dir = tempdir()?;
        let paths = ConfigPaths::at(dir.path().join(".parley"));
        assert!(!paths.is_initialized());

        paths.ensure_layout()?;
        assert!(paths.is_initialized());
        assert!(paths.sessions_dir().is_dir());
        assert!(paths.docs_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
        Ok(())
    }

    #[test]
    fn test_default_endpoint_cannot_be_removed() {
        let mut config = Config::default();
        assert!(config.remove_endpoint(DEFAULT_ENDPOINT_ID).is_err());
    }

    fn second_endpoint() -> Endpoint {
        let now = Utc::now();
        Endpoint {
            id: "ep-two".to_string(),
            name: "Second".to_string(),
            base_url: "http://example.com/v1".to_string(),
            api_key: Some("sk-test".to_string()),
            models: vec![
                ModelInfo {
                    id: "m-disabled".to_string(),
                    name: "Disabled".to_string(),
                    max_tokens: 1024,
                    enabled: false,
                },
                ModelInfo {
                    id: "m-enabled".to_string(),
                    name: "Enabled".to_string(),
                    max_tokens: 2048,
                    enabled: true,
                },
            ],
            priority: 2,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_switching_endpoint_picks_first_enabled_model() -> Result<()> {
        let mut config = Config::default();
        config.add_endpoint(second_endpoint())?;

        config.set_current_endpoint("ep-two")?;
        assert_eq!(config.current_endpoint, "ep-two");
        assert_eq!(config.current_model, "m-enabled");
        Ok(())
    }

    #[test]
    fn test_removing_current_endpoint_falls_back_to_default() -> Result<()> {
        let mut config = Config::default();
        config.add_endpoint(second_endpoint())?;
        config.set_current_endpoint("ep-two")?;

        config.remove_endpoint("ep-two")?;
        assert_eq!(config.current_endpoint, DEFAULT_ENDPOINT_ID);
        assert_eq!(config.current_model, DEFAULT_MODEL_ID);
        Ok(())
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let mut config = Config::default();
        config.add_endpoint(second_endpoint()).unwrap();
        assert!(config.add_endpoint(second_endpoint()).is_err());
    }

    #[test]
    fn test_disabled_model_cannot_be_selected() -> Result<()> {
        let mut config = Config::default();
        config.add_endpoint(second_endpoint())?;
        config.set_current_endpoint("ep-two")?;

        assert!(config.set_current_model("m-disabled").is_err());
        assert!(config.set_current_model("missing").is_err());
        config.set_current_model("m-enabled")?;
        Ok(())
    }
}
