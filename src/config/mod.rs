use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Directory receiving staged uploads and generated artifacts.
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Script path, resolved relative to `base_dir`.
    #[serde(default = "default_script")]
    pub script: PathBuf,
    /// Working directory of the spawned process, so the script can resolve
    /// its own relative resource paths.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Upper bound on a single inference run, in seconds. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        // PORT maps to `port` directly; nested keys use the `__` separator
        // (e.g. INFERENCE__TIMEOUT_SECS, STAGING__DIR).
        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::default().separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            base_dir: default_base_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("scripts/inference_triposg.py")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    600
}
