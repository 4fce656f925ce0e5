//! Checkout provider seam.

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::ledger::PendingOrder;
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Provider-signed claim that an order was paid. Unverified until the
/// ledger accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfirmation {
    /// Provider payment id.
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    /// Order the provider says it collected for.
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    /// Provider signature over order and payment ids.
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// Everything the checkout widget needs to collect payment for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    /// Provider public key, if known.
    pub key_id: Option<String>,
    /// Order handle issued by the ledger.
    pub order_id: String,
    /// Amount echoed by the ledger.
    pub amount: Money,
    /// Currency echoed by the ledger.
    pub currency: String,
    /// Merchant name shown in the widget.
    pub merchant_name: String,
    /// Line shown under the merchant name.
    pub description: String,
    /// Widget accent colour.
    pub theme_color: String,
    /// Wallet being recharged.
    pub student_id: String,
    /// Vendor the recharge was started from, if any.
    pub vendor_id: Option<String>,
}

impl CheckoutRequest {
    /// Build a request from the ledger's order and local presentation
    /// settings. The order's key id wins over the configured one.
    #[must_use]
    pub fn new(
        order: &PendingOrder,
        config: &CheckoutConfig,
        student_id: &str,
        vendor_id: Option<&str>,
    ) -> Self {
        Self {
            key_id: order.key_id.clone().or_else(|| config.key_id.clone()),
            order_id: order.order_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            merchant_name: config.merchant_name.clone(),
            description: config.description.clone(),
            theme_color: config.theme_color.clone(),
            student_id: student_id.to_string(),
            vendor_id: vendor_id.map(str::to_string),
        }
    }
}

/// Hosted payment widget.
///
/// `open` returns once the widget is showing. The provider sends at most one
/// [`ProviderConfirmation`] on `on_result`; closing the widget without paying
/// drops the sender instead.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Show the widget for `request`.
    async fn open(
        &self,
        request: &CheckoutRequest,
        on_result: oneshot::Sender<ProviderConfirmation>,
    ) -> Result<(), CheckoutError>;
}
