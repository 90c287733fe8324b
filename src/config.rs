use crate::connector::ftp::{FtpConnector, DEFAULT_TIMEOUT};
use crate::connector::smb::{SmbConnector, SmbOptions, DEFAULT_MY_NAME, DEFAULT_REMOTE_NAME};
use crate::connector::ConnectionParams;
use crate::error::{ConnectorError, ConnectorResult};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the available backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftp: Option<FtpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smb: Option<SmbConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmbConfig {
    pub host: String,
    #[serde(default = "default_smb_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    #[serde(default = "default_my_name")]
    pub my_name: String,
    pub shared_folder: String,
    #[serde(default)]
    pub work_dir: String,
}

const fn default_ftp_port() -> u16 {
    21
}

const fn default_smb_port() -> u16 {
    445
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_remote_name() -> String {
    DEFAULT_REMOTE_NAME.to_string()
}

fn default_my_name() -> String {
    DEFAULT_MY_NAME.to_string()
}

fn params(host: &str, port: u16, username: &str, password: Option<&String>) -> ConnectorResult<ConnectionParams> {
    let password = password
        .ok_or_else(|| ConnectorError::Config(format!("password not configured for {}@{}", username, host)))?;
    Ok(ConnectionParams::new(host, port, username, password.as_str()))
}

impl FtpConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ftp_port(),
            username: username.into(),
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn connector(&self) -> ConnectorResult<FtpConnector> {
        let params = params(&self.host, self.port, &self.username, self.password.as_ref())?;
        Ok(FtpConnector::new(params).timeout(Duration::from_secs(self.timeout_secs)))
    }
}

impl SmbConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        shared_folder: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_smb_port(),
            username: username.into(),
            password: None,
            remote_name: default_remote_name(),
            my_name: default_my_name(),
            shared_folder: shared_folder.into(),
            work_dir: String::new(),
        }
    }

    pub fn options(&self) -> SmbOptions {
        SmbOptions {
            remote_name: self.remote_name.clone(),
            my_name: self.my_name.clone(),
            shared_folder: self.shared_folder.clone(),
            work_dir: self.work_dir.clone(),
        }
    }

    pub fn connector(&self) -> ConnectorResult<SmbConnector> {
        let params = params(&self.host, self.port, &self.username, self.password.as_ref())?;
        Ok(SmbConnector::new(params, self.options()))
    }
}

impl Config {
    /// Loads the config from the platform config directory, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_path() {
            self.save_to(&config_path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing config {}", path.display()))?;
        log::debug!("saved config to {}", path.display());
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "remote-connectors", "remote-connectors")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}
