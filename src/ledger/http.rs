//! HTTP/JSON client for the wallet backend.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | identity | `GET /{role}/{id}` |
//! | transactions | `GET /{role}/transactions/{id}` |
//! | QR image | `GET /get_{role}_qr/{id}` |
//! | recharge order | `POST /create_recharge_order` |
//! | verify recharge | `POST /verify_recharge_payment` |
//! | direct charge | `POST /process_student_payment` |
//!
//! Error bodies follow `{"detail": "..."}`. A 404 maps to
//! [`LedgerError::NotFound`], a 4xx mentioning insufficient balance to
//! [`LedgerError::InsufficientFunds`], other 4xx to
//! [`LedgerError::Rejected`], and everything else to
//! [`LedgerError::Transport`].

use super::types::{
    ChargeReceipt, ChargeRequest, Identity, PendingOrder, QrCodeImage, RechargeOrderRequest,
    Transaction, TransactionStatus, VerifiedRecharge, VerifyRechargeRequest,
};
use super::LedgerService;
use crate::config::LedgerConfig;
use crate::error::{Error, LedgerError, Result};
use crate::money::Money;
use crate::qr::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| Error::Config(format!("Invalid ledger base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Ledger base URL cannot carry a path: {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        debug!("Ledger client targeting {}", base_url);
        Ok(Self { base_url, client })
    }

    /// Build an endpoint URL, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, LedgerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LedgerError::Transport("ledger base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> std::result::Result<T, LedgerError> {
        let url = self.endpoint(segments)?;
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        read_response(response).await
    }

    async fn post_json<B, T>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> std::result::Result<T, LedgerError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, LedgerError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let error = classify_failure(status.as_u16(), &body);
    warn!("Ledger request failed with HTTP {}: {}", status.as_u16(), error);
    Err(error)
}

/// Map a non-success response to a typed error.
fn classify_failure(status: u16, body: &str) -> LedgerError {
    let detail = error_detail(body);
    match status {
        404 => LedgerError::NotFound(detail),
        400..=499 if detail.to_ascii_lowercase().contains("insufficient") => {
            LedgerError::InsufficientFunds
        }
        400..=499 => LedgerError::Rejected(detail),
        _ => LedgerError::Transport(format!("HTTP {status}: {detail}")),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| match b.detail {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

// =============================================================================
// Wire records
// =============================================================================

#[derive(Deserialize)]
struct IdentityRecord {
    #[serde(default, alias = "student_name", alias = "vendor_name")]
    name: Option<String>,
    #[serde(default)]
    upi_id: Option<String>,
    #[serde(default)]
    balance: Money,
}

impl IdentityRecord {
    fn into_identity(self, role: Role, id: &str) -> Identity {
        Identity {
            role,
            id: id.to_string(),
            display_name: self.name.unwrap_or_else(|| id.to_string()),
            upi_id: self.upi_id,
            balance: self.balance,
        }
    }
}

#[derive(Deserialize)]
struct TransactionList {
    #[serde(default)]
    transactions: Vec<TransactionRecord>,
}

#[derive(Deserialize)]
struct TransactionRecord {
    #[serde(alias = "transaction_id", deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    vendor_id: Option<String>,
    amount: Money,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: TransactionStatus,
    #[serde(alias = "created_at")]
    timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    fn into_transaction(self, viewer: Role) -> Transaction {
        let counterparty_id = match viewer {
            Role::Student => self.vendor_id,
            Role::Vendor => self.student_id,
        };
        Transaction {
            id: self.id,
            counterparty_id,
            amount: self.amount,
            description: self.description.filter(|d| !d.is_empty()),
            status: self.status,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Deserialize)]
struct ChargeRecord {
    student_balance: Money,
    vendor_balance: Money,
}

#[derive(Deserialize)]
struct QrRecord {
    qr_code: String,
    #[serde(default, alias = "student_name", alias = "vendor_name")]
    name: Option<String>,
    #[serde(default)]
    upi_id: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[async_trait]
impl LedgerService for HttpLedgerClient {
    async fn get_identity(
        &self,
        role: Role,
        id: &str,
    ) -> std::result::Result<Identity, LedgerError> {
        let record: IdentityRecord = self.get_json(&[role.as_str(), id]).await?;
        Ok(record.into_identity(role, id))
    }

    async fn create_recharge_order(
        &self,
        request: &RechargeOrderRequest,
    ) -> std::result::Result<PendingOrder, LedgerError> {
        self.post_json(&["create_recharge_order"], request).await
    }

    async fn verify_recharge_payment(
        &self,
        request: &VerifyRechargeRequest,
    ) -> std::result::Result<VerifiedRecharge, LedgerError> {
        self.post_json(&["verify_recharge_payment"], request).await
    }

    async fn create_charge(
        &self,
        request: &ChargeRequest,
    ) -> std::result::Result<ChargeReceipt, LedgerError> {
        let record: ChargeRecord = self
            .post_json(&["process_student_payment"], request)
            .await?;
        Ok(ChargeReceipt {
            student_id: request.student_id.clone(),
            vendor_id: request.vendor_id.clone(),
            student_balance: record.student_balance,
            vendor_balance: record.vendor_balance,
        })
    }

    async fn list_transactions(
        &self,
        role: Role,
        id: &str,
    ) -> std::result::Result<Vec<Transaction>, LedgerError> {
        let list: TransactionList = self
            .get_json(&[role.as_str(), "transactions", id])
            .await?;
        Ok(list
            .transactions
            .into_iter()
            .map(|record| record.into_transaction(role))
            .collect())
    }

    async fn get_qr_code(
        &self,
        role: Role,
        id: &str,
    ) -> std::result::Result<QrCodeImage, LedgerError> {
        let path = format!("get_{}_qr", role.as_str());
        let record: QrRecord = self.get_json(&[path.as_str(), id]).await?;
        Ok(QrCodeImage {
            role,
            id: id.to_string(),
            data_url: record.qr_code,
            display_name: record.name,
            upi_id: record.upi_id,
        })
    }
}
