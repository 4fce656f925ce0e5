//! Configuration for schoolpay.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger service connection.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Camera scanning parameters.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Checkout provider presentation.
    #[serde(default)]
    pub checkout: CheckoutConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ledger service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Camera scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Decode attempts per second while scanning.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Side length of the square detection window, in pixels.
    #[serde(default = "default_detection_box")]
    pub detection_box: u32,

    /// Viewfinder aspect ratio.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f32,
}

/// Checkout widget presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Merchant name shown in the widget.
    #[serde(default = "default_merchant_name")]
    pub merchant_name: String,

    /// Line shown under the merchant name.
    #[serde(default = "default_description")]
    pub description: String,

    /// Currency used when the ledger does not echo one.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Public key id for the provider. Overridden by a key echoed with the
    /// order.
    #[serde(default)]
    pub key_id: Option<String>,

    /// Widget accent colour.
    #[serde(default = "default_theme_color")]
    pub theme_color: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            scan: ScanConfig::default(),
            checkout: CheckoutConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            detection_box: default_detection_box(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            merchant_name: default_merchant_name(),
            description: default_description(),
            currency: default_currency(),
            key_id: None,
            theme_color: default_theme_color(),
        }
    }
}

impl ScanConfig {
    /// Interval between decode attempts.
    #[must_use]
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

impl ClientConfig {
    /// Check the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let base = self.ledger.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("ledger.base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "ledger.base_url must be an http(s) URL, got: {base}"
            )));
        }
        if self.ledger.timeout_secs == 0 {
            return Err(Error::Config("ledger.timeout_secs must be positive".into()));
        }
        if self.scan.fps == 0 {
            return Err(Error::Config("scan.fps must be positive".into()));
        }
        if self.scan.detection_box == 0 {
            return Err(Error::Config("scan.detection_box must be positive".into()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "schoolpay").map_or_else(
            || PathBuf::from("schoolpay.toml"),
            |dirs| dirs.config_dir().join("schoolpay.toml"),
        )
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("schoolpay/", env!("CARGO_PKG_VERSION")).to_string()
}

const fn default_fps() -> u32 {
    10
}

const fn default_detection_box() -> u32 {
    250
}

const fn default_aspect_ratio() -> f32 {
    1.0
}

fn default_merchant_name() -> String {
    "School Payment System".to_string()
}

fn default_description() -> String {
    "Wallet Recharge".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_theme_color() -> String {
    "#3B82F6".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
