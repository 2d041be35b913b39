use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::meta::META_FILE;
use crate::model::MODEL_FILE;

pub const ENV_CONFIG: &str = "RISK_CONFIG";
pub const ENV_MODEL_DIR: &str = "RISK_MODEL_DIR";
pub const ENV_BIND_ADDR: &str = "RISK_BIND_ADDR";

/// 运行时配置：默认值 < JSON 配置文件（RISK_CONFIG）< 环境变量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the model and feature schema artifacts.
    pub model_dir: PathBuf,
    pub meta_file: String,
    pub model_file: String,

    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/ami_iabp"),
            meta_file: META_FILE.to_string(),
            model_file: MODEL_FILE.to_string(),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Resolve config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match lookup(ENV_CONFIG) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            cfg.model_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            cfg.bind_addr = addr;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        anyhow::ensure!(!self.meta_file.is_empty(), "meta_file must not be empty");
        anyhow::ensure!(!self.model_file.is_empty(), "model_file must not be empty");
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind_addr '{}'", self.bind_addr))
    }

    pub fn meta_path(&self) -> PathBuf {
        self.model_dir.join(&self.meta_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }
}
