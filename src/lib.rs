//! # schoolpay
//!
//! Payment core for QR-identified school wallets.
//!
//! Parents recharge a student's stored-value wallet through a hosted
//! checkout, and vendors debit it for purchases. Counterparties are
//! identified by scanning (or uploading) a QR code.
//!
//! ## Architecture
//!
//! ```text
//! Decoder ─▶ qr::QrPayload ─▶ IdentityResolver ─▶ PaymentSession ─▶ Reconciler
//!  (scan)      (parse)           (ledger read)     (order, checkout,   (refresh)
//!                                                   verify)
//! ```
//!
//! The ledger is the only source of balances. Provider confirmations are
//! claims until the ledger verifies them, and balances are re-read after
//! every settlement rather than computed locally.
//!
//! External collaborators sit behind traits:
//! - [`ledger::LedgerService`]: balances, orders, history
//!   ([`ledger::HttpLedgerClient`], [`ledger::InMemoryLedger`])
//! - [`scan::DecoderSource`] / [`scan::Decoder`]: camera and image decoding
//! - [`payment::CheckoutProvider`]: the hosted checkout widget
//!
//! ## Example
//!
//! ```rust,no_run
//! use schoolpay::{ClientConfig, HttpLedgerClient, IdentityResolver, QrPayload, Role};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let ledger = Arc::new(HttpLedgerClient::new(&config.ledger)?);
//!     let resolver = IdentityResolver::new(ledger);
//!     let payload = QrPayload::parse(r#"{"vendor_id": "VEN001"}"#)?;
//!     let vendor = resolver.resolve(&payload, Role::Vendor).await?;
//!     println!("{} ({})", vendor.display_name, vendor.balance);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod identity;
pub mod ledger;
pub mod money;
pub mod payment;
pub mod qr;
pub mod reconcile;
pub mod scan;
#[cfg(test)]
mod test_support;

pub use config::{CheckoutConfig, ClientConfig, LedgerConfig, ScanConfig};
pub use context::ActorContext;
pub use error::{Error, Result};
pub use event::{ScanEvent, ScanEventsChannel};
pub use identity::IdentityResolver;
pub use ledger::{HttpLedgerClient, Identity, InMemoryLedger, LedgerService};
pub use money::Money;
pub use payment::{PaymentPhase, PaymentSession, Settlement};
pub use qr::{QrPayload, Role};
pub use reconcile::{AccountView, Reconciler};
pub use scan::{ScanOutcome, ScanPhase, ScanSession};
