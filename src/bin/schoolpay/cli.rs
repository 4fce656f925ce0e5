//! CLI definition for schoolpay.

use clap::{Parser, Subcommand, ValueEnum};
use schoolpay::config::ClientConfig;
use schoolpay::qr::Role;
use std::path::PathBuf;

/// Operator CLI for the school wallet ledger.
#[derive(Parser, Debug)]
#[command(name = "schoolpay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Ledger service base URL.
    #[arg(long, env = "SCHOOLPAY_LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Timeout for ledger requests (seconds).
    #[arg(long, env = "SCHOOLPAY_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Log level (defaults to the config file's, then `info`). `RUST_LOG`
    /// takes precedence.
    #[arg(long, value_enum)]
    pub log_level: Option<CliLogLevel>,

    /// Path to configuration file.
    #[arg(long, short, env = "SCHOOLPAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a student's or vendor's record and balance.
    Identity {
        /// Account role.
        #[arg(value_enum)]
        role: CliRole,
        /// Account id.
        id: String,
    },
    /// List an account's transactions, most recent first.
    Transactions {
        /// Account role.
        #[arg(value_enum)]
        role: CliRole,
        /// Account id.
        id: String,
        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Debit a student's wallet for a vendor.
    Charge {
        /// Vendor receiving the payment.
        #[arg(long, env = "SCHOOLPAY_VENDOR_ID")]
        vendor: String,
        /// Student being charged.
        #[arg(long)]
        student: String,
        /// Amount in rupees, e.g. `45.50`.
        #[arg(long)]
        amount: String,
        /// Optional note stored with the transaction.
        #[arg(long)]
        description: Option<String>,
    },
    /// Validate a decoded QR payload. Reads stdin if omitted.
    ParsePayload {
        /// Decoded QR text.
        payload: Option<String>,
    },
    /// Print the QR payload for an account.
    EncodePayload {
        /// Account role.
        #[arg(value_enum)]
        role: CliRole,
        /// Account id.
        id: String,
    },
    /// Fetch the ledger-rendered QR code image. Writes the data URL to
    /// --out or stdout.
    QrCode {
        /// Account role.
        #[arg(value_enum)]
        role: CliRole,
        /// Account id.
        id: String,
        /// Output file (defaults to stdout if omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Account role CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliRole {
    /// A student wallet.
    Student,
    /// A vendor account.
    Vendor,
}

impl From<CliRole> for Role {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Student => Self::Student,
            CliRole::Vendor => Self::Vendor,
        }
    }
}

/// Log level CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLogLevel {
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages.
    Info,
    /// Debug messages.
    Debug,
    /// Trace messages (verbose).
    Trace,
}

impl CliLogLevel {
    /// Filter directive for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Cli {
    /// Build the client configuration: `--config` or the default config
    /// file if present, then CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// is invalid.
    pub fn client_config(&self) -> color_eyre::Result<ClientConfig> {
        let mut config = if let Some(ref path) = self.config {
            ClientConfig::from_file(path)?
        } else {
            let path = ClientConfig::default_path();
            if path.is_file() {
                ClientConfig::from_file(&path)?
            } else {
                ClientConfig::default()
            }
        };

        if let Some(ref url) = self.ledger_url {
            config.ledger.base_url.clone_from(url);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.ledger.timeout_secs = timeout_secs;
        }
        if let Some(level) = self.log_level {
            config.log_level = level.as_str().to_string();
        }

        config.validate()?;
        Ok(config)
    }
}
