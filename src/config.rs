//! Layered settings: built-in defaults, then an optional TOML file, then
//! `GATEWAY_*` environment variables (`__` separates nested keys).

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineConfig, DEFAULT_ENGINE_TIMEOUT};
use crate::error::{PipelineError, Result};
use crate::level::Level;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";

const ENV_PREFIX: &str = "GATEWAY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub trust: TrustSettings,
    pub policy: PolicySettings,
    pub engine: EngineSettings,
    pub sources: SourceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Worker tasks draining the job queue
    pub workers: usize,
    pub queue_size: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub domain_path: PathBuf,
    /// No owner index means owner labels are always `Unknown`
    pub owner_path: Option<PathBuf>,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSettings {
    pub model_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub path: PathBuf,
    pub default_level: Level,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub work_dir: Option<PathBuf>,
    pub retain_failed_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub data_dir: PathBuf,
    pub metadata_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: PathBuf,
    pub log_to_stdout: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 4,
            queue_size: 100,
            request_timeout_secs: 180,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8081".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            domain_path: PathBuf::from("data/domain_index.json"),
            owner_path: None,
            k: crate::data_classifier::classifier::DEFAULT_K,
        }
    }
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("data/trust_model.json"),
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/policy.csv"),
            default_level: Level::Low,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            program: engine.program,
            args: engine.args,
            timeout_secs: DEFAULT_ENGINE_TIMEOUT.as_secs(),
            work_dir: engine.work_dir,
            retain_failed_output: engine.retain_failed_output,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("uploads"),
            metadata_path: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            log_to_stdout: false,
        }
    }
}

impl Settings {
    /// Loads defaults, then `path` (or `gateway.toml` if it exists), then the
    /// environment, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = serde_json::to_string(&Settings::default())
            .map_err(|e| PipelineError::Configuration(format!("cannot encode defaults: {}", e)))?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        match path {
            Some(path) if !path.exists() => {
                return Err(PipelineError::Configuration(format!(
                    "config file {} not found",
                    path.display()
                )))
            }
            Some(path) => builder = builder.add_source(File::from(path)),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    builder = builder.add_source(File::from(fallback));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engine.args"),
        );

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(PipelineError::Configuration(msg.to_string())) };
        if self.index.k == 0 {
            return fail("index.k must be at least 1");
        }
        if self.server.workers == 0 {
            return fail("server.workers must be at least 1");
        }
        if self.server.queue_size == 0 {
            return fail("server.queue_size must be at least 1");
        }
        if self.server.request_timeout_secs == 0 {
            return fail("server.request_timeout_secs must be positive");
        }
        if self.engine.timeout_secs == 0 {
            return fail("engine.timeout_secs must be positive");
        }
        if self.engine.program.trim().is_empty() {
            return fail("engine.program must not be empty");
        }
        if self.embedding.dimension == 0 {
            return fail("embedding.dimension must be positive");
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            program: self.engine.program.clone(),
            args: self.engine.args.clone(),
            timeout: Duration::from_secs(self.engine.timeout_secs),
            work_dir: self.engine.work_dir.clone(),
            retain_failed_output: self.engine.retain_failed_output,
        }
    }
}
