//! Data types exchanged with the ledger service.

use crate::money::Money;
use crate::qr::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Student or vendor.
    pub role: Role,
    /// Ledger id, e.g. `STU001`.
    pub id: String,
    /// Name to show on screen.
    pub display_name: String,
    /// UPI handle, vendors only.
    pub upi_id: Option<String>,
    /// Wallet balance at lookup time.
    pub balance: Money,
}

/// Body of a create-recharge-order call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeOrderRequest {
    /// Wallet to credit.
    pub student_id: String,
    /// Vendor the recharge was initiated from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// Requested amount.
    pub amount: Money,
}

/// Order handle returned by the ledger.
///
/// `amount` and `currency` are echoed by the service; the client displays
/// them and never recomputes the charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Opaque provider order id.
    #[serde(alias = "id")]
    pub order_id: String,
    /// Amount the provider will charge.
    pub amount: Money,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Provider public key, when the ledger supplies one.
    #[serde(default)]
    pub key_id: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Body of a verify-recharge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRechargeRequest {
    /// Provider payment id.
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    /// Order the payment claims to settle.
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    /// Provider signature over order and payment ids.
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
    /// Wallet to credit.
    pub student_id: String,
    /// Vendor the recharge was initiated from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// Amount of the pending order.
    pub amount: Money,
}

/// Successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRecharge {
    /// Student balance after the credit.
    pub new_balance: Money,
}

/// Body of a direct vendor charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Student to debit.
    pub student_id: String,
    /// Vendor to credit.
    pub vendor_id: String,
    /// Amount to move.
    pub amount: Money,
    /// Free-text note, e.g. "lunch".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Balances after a direct charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// Student that was debited.
    pub student_id: String,
    /// Vendor that was credited.
    pub vendor_id: String,
    /// Student balance after the debit.
    pub student_balance: Money,
    /// Vendor balance after the credit.
    pub vendor_balance: Money,
}

/// Settlement state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting settlement.
    Pending,
    /// Settled.
    #[default]
    Completed,
    /// Did not settle.
    Failed,
}

impl TransactionStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Read-only projection of one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger entry id.
    pub id: String,
    /// The other party, absent for wallet recharges.
    pub counterparty_id: Option<String>,
    /// Amount moved.
    pub amount: Money,
    /// Free-text note.
    pub description: Option<String>,
    /// Settlement state.
    pub status: TransactionStatus,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A QR code image rendered by the ledger for a student or vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeImage {
    /// Whose code this is.
    pub role: Role,
    /// Ledger id encoded in the image.
    pub id: String,
    /// `data:` URL of the code. The HTTP ledger serves
    /// `data:image/png;base64,...`; [`InMemoryLedger`](super::InMemoryLedger)
    /// serves the raw payload as `data:application/json;base64,...`.
    pub data_url: String,
    /// Holder name, when the ledger returns it.
    pub display_name: Option<String>,
    /// UPI handle, vendors only.
    pub upi_id: Option<String>,
}
