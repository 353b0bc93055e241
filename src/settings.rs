use std::env;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use tracing::Level;

use crate::core::request::RequestLimits;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_env")]
    pub env: String, // file / server
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub prefix: Option<String>,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub rate_limit_per_sec: u32,
    pub rate_limit_burst: Option<u32>,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_env() -> String {
    "file".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_dimension() -> u32 {
    4096
}

fn default_max_concurrent_renders() -> usize {
    8
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: default_env(),
            host: default_host(),
            port: default_port(),
            prefix: None,
            max_dimension: default_max_dimension(),
            max_concurrent_renders: default_max_concurrent_renders(),
            jpeg_quality: default_jpeg_quality(),
            rate_limit_per_sec: 0,
            rate_limit_burst: None,
            log_dir: default_log_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_dimension > 0, "max_dimension must be positive");
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg_quality must be between 1 and 100"
        );
        ensure!(
            self.max_concurrent_renders > 0,
            "max_concurrent_renders must be positive"
        );
        self.tracing_level()?;
        Ok(())
    }

    pub fn tracing_level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .with_context(|| format!("invalid log_level `{}`", self.log_level))
    }

    /// Whether `.env` was loaded on top of the process environment.
    pub fn uses_env_file(&self) -> bool {
        self.env == "file"
    }

    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_dimension: self.max_dimension,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

pub fn get_config() -> Result<Config> {
    let env_var = env::var("ENV").unwrap_or(default_env());
    if env_var == "file" {
        let _ = dotenvy::dotenv();
    }
    Config::from_vars(env::vars())
}
