//! Ledger service client module.
//!
//! The ledger is the system of record for balances, orders, and transaction
//! history. This crate never computes a balance itself; it asks the ledger.
//!
//! # Implementations
//!
//! - [`HttpLedgerClient`]: talks to the wallet backend over HTTP/JSON.
//! - [`InMemoryLedger`]: a local ledger with atomic debit/credit, used for
//!   development and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use schoolpay::ledger::{HttpLedgerClient, LedgerService};
//! use schoolpay::qr::Role;
//!
//! let ledger = HttpLedgerClient::new(&config.ledger)?;
//! let vendor = ledger.get_identity(Role::Vendor, "VEN001").await?;
//! println!("{} ({})", vendor.display_name, vendor.balance);
//! ```

mod http;
mod memory;
mod types;

pub use http::HttpLedgerClient;
pub use memory::{InMemoryLedger, LedgerCalls};
pub use types::{
    ChargeReceipt, ChargeRequest, Identity, PendingOrder, QrCodeImage, RechargeOrderRequest,
    Transaction, TransactionStatus, VerifiedRecharge, VerifyRechargeRequest,
};

use crate::error::LedgerError;
use crate::qr::Role;
use async_trait::async_trait;

/// Operations the payment core needs from the ledger.
///
/// Implementations must make [`create_charge`](Self::create_charge) and
/// [`verify_recharge_payment`](Self::verify_recharge_payment) atomic: either
/// every balance involved changes or none does.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Fetch the authoritative record for a student or vendor.
    async fn get_identity(&self, role: Role, id: &str) -> Result<Identity, LedgerError>;

    /// Create a pending recharge order. The returned amount is the one to
    /// display and hand to the checkout provider.
    async fn create_recharge_order(
        &self,
        request: &RechargeOrderRequest,
    ) -> Result<PendingOrder, LedgerError>;

    /// Check a provider-signed confirmation and credit the wallet.
    async fn verify_recharge_payment(
        &self,
        request: &VerifyRechargeRequest,
    ) -> Result<VerifiedRecharge, LedgerError>;

    /// Debit a student and credit a vendor in one step.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, LedgerError>;

    /// Transaction history, most recent first.
    async fn list_transactions(&self, role: Role, id: &str)
        -> Result<Vec<Transaction>, LedgerError>;

    /// Server-rendered QR code for a student or vendor.
    async fn get_qr_code(&self, role: Role, id: &str) -> Result<QrCodeImage, LedgerError>;
}
