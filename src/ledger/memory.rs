//! In-process ledger for development and tests.
//!
//! Balances, orders, and history live behind a single lock, so every charge
//! and every recharge credit is atomic. Provider signatures are
//! `hex(HMAC-SHA256(secret, order_id | payment_id))`; [`InMemoryLedger::sign`]
//! produces a valid one for a simulated checkout.

use super::types::{
    ChargeReceipt, ChargeRequest, Identity, PendingOrder, QrCodeImage, RechargeOrderRequest,
    Transaction, TransactionStatus, VerifiedRecharge, VerifyRechargeRequest,
};
use super::LedgerService;
use crate::error::LedgerError;
use crate::money::Money;
use crate::qr::{QrPayload, Role};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Number of calls made to each ledger operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    /// `get_identity` calls.
    pub get_identity: usize,
    /// `create_recharge_order` calls.
    pub create_recharge_order: usize,
    /// `verify_recharge_payment` calls.
    pub verify_recharge_payment: usize,
    /// `create_charge` calls.
    pub create_charge: usize,
    /// `list_transactions` calls.
    pub list_transactions: usize,
    /// `get_qr_code` calls.
    pub get_qr_code: usize,
}

impl LedgerCalls {
    /// Total calls of any kind.
    #[must_use]
    pub fn total(&self) -> usize {
        self.get_identity
            + self.create_recharge_order
            + self.verify_recharge_payment
            + self.create_charge
            + self.list_transactions
            + self.get_qr_code
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    get_identity: AtomicUsize,
    create_recharge_order: AtomicUsize,
    verify_recharge_payment: AtomicUsize,
    create_charge: AtomicUsize,
    list_transactions: AtomicUsize,
    get_qr_code: AtomicUsize,
}

#[derive(Debug, Clone)]
struct Account {
    name: String,
    upi_id: Option<String>,
    balance: Money,
}

#[derive(Debug, Clone)]
struct Order {
    student_id: String,
    vendor_id: Option<String>,
    amount: Money,
    paid: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    student_id: String,
    vendor_id: Option<String>,
    amount: Money,
    description: Option<String>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    students: HashMap<String, Account>,
    vendors: HashMap<String, Account>,
    orders: HashMap<String, Order>,
    entries: Vec<Entry>,
    next_seq: u64,
}

impl State {
    fn accounts(&self, role: Role) -> &HashMap<String, Account> {
        match role {
            Role::Student => &self.students,
            Role::Vendor => &self.vendors,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_seq += 1;
        format!("{prefix}_{:06}", self.next_seq)
    }

    fn record(
        &mut self,
        student_id: &str,
        vendor_id: Option<&str>,
        amount: Money,
        description: Option<String>,
    ) {
        let id = self.next_id("txn");
        self.entries.push(Entry {
            id,
            student_id: student_id.to_string(),
            vendor_id: vendor_id.map(str::to_string),
            amount,
            description,
            timestamp: Utc::now(),
        });
    }
}

/// Ledger held in memory.
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    secret: String,
    unavailable: AtomicBool,
    calls: CallCounters,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Create an empty ledger with a random signing secret.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            secret: hex::encode(rand::random::<[u8; 16]>()),
            unavailable: AtomicBool::new(false),
            calls: CallCounters::default(),
        }
    }

    /// Add or replace a student account.
    #[must_use]
    pub fn with_student(self, id: &str, name: &str, balance: Money) -> Self {
        self.state.lock().students.insert(
            id.to_string(),
            Account {
                name: name.to_string(),
                upi_id: None,
                balance,
            },
        );
        self
    }

    /// Add or replace a vendor account.
    #[must_use]
    pub fn with_vendor(self, id: &str, name: &str, upi_id: &str, balance: Money) -> Self {
        self.state.lock().vendors.insert(
            id.to_string(),
            Account {
                name: name.to_string(),
                upi_id: Some(upi_id.to_string()),
                balance,
            },
        );
        self
    }

    /// Simulate the service being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Signature the checkout provider would attach for this order/payment.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        self.signature_mac(order_id, payment_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    fn signature_mac(&self, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Some(mac)
    }

    fn signature_valid(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        self.signature_mac(order_id, payment_id)
            .is_some_and(|mac| mac.verify_slice(&tag).is_ok())
    }

    /// Current balance of an account.
    #[must_use]
    pub fn balance(&self, role: Role, id: &str) -> Option<Money> {
        self.state.lock().accounts(role).get(id).map(|a| a.balance)
    }

    /// Snapshot of the per-operation call counters.
    #[must_use]
    pub fn calls(&self) -> LedgerCalls {
        let load = |c: &AtomicUsize| c.load(Ordering::SeqCst);
        LedgerCalls {
            get_identity: load(&self.calls.get_identity),
            create_recharge_order: load(&self.calls.create_recharge_order),
            verify_recharge_payment: load(&self.calls.verify_recharge_payment),
            create_charge: load(&self.calls.create_charge),
            list_transactions: load(&self.calls.list_transactions),
            get_qr_code: load(&self.calls.get_qr_code),
        }
    }

    fn enter(&self, counter: &AtomicUsize) -> Result<(), LedgerError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("ledger unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn get_identity(&self, role: Role, id: &str) -> Result<Identity, LedgerError> {
        self.enter(&self.calls.get_identity)?;
        let state = self.state.lock();
        let account = state
            .accounts(role)
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("{role} {id}")))?;
        Ok(Identity {
            role,
            id: id.to_string(),
            display_name: account.name.clone(),
            upi_id: account.upi_id.clone(),
            balance: account.balance,
        })
    }

    async fn create_recharge_order(
        &self,
        request: &RechargeOrderRequest,
    ) -> Result<PendingOrder, LedgerError> {
        self.enter(&self.calls.create_recharge_order)?;
        if !request.amount.is_positive() {
            return Err(LedgerError::Rejected("amount must be positive".into()));
        }

        let mut state = self.state.lock();
        if !state.students.contains_key(&request.student_id) {
            return Err(LedgerError::NotFound(format!(
                "student {}",
                request.student_id
            )));
        }
        if let Some(vendor_id) = &request.vendor_id {
            if !state.vendors.contains_key(vendor_id) {
                return Err(LedgerError::NotFound(format!("vendor {vendor_id}")));
            }
        }

        let order_id = state.next_id("order");
        state.orders.insert(
            order_id.clone(),
            Order {
                student_id: request.student_id.clone(),
                vendor_id: request.vendor_id.clone(),
                amount: request.amount,
                paid: false,
            },
        );
        debug!("Created recharge order {order_id} for {}", request.amount);

        Ok(PendingOrder {
            order_id,
            amount: request.amount,
            currency: "INR".to_string(),
            key_id: None,
        })
    }

    async fn verify_recharge_payment(
        &self,
        request: &VerifyRechargeRequest,
    ) -> Result<VerifiedRecharge, LedgerError> {
        self.enter(&self.calls.verify_recharge_payment)?;
        let signed = self.signature_valid(
            &request.order_id,
            &request.payment_id,
            &request.signature,
        );

        let mut state = self.state.lock();
        let order = state
            .orders
            .get(&request.order_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("order {}", request.order_id)))?;

        if order.paid {
            return Err(LedgerError::Rejected("order already paid".into()));
        }
        if !signed {
            warn!("Rejected recharge {}: bad signature", request.order_id);
            return Err(LedgerError::Rejected("invalid payment signature".into()));
        }
        if order.student_id != request.student_id
            || order.vendor_id != request.vendor_id
            || order.amount != request.amount
        {
            return Err(LedgerError::Rejected(
                "payment does not match order".into(),
            ));
        }

        let new_balance = {
            let student = state
                .students
                .get_mut(&order.student_id)
                .ok_or_else(|| LedgerError::NotFound(format!("student {}", order.student_id)))?;
            student.balance = student
                .balance
                .checked_add(order.amount)
                .ok_or_else(|| LedgerError::Rejected("balance overflow".into()))?;
            student.balance
        };
        if let Some(paid) = state.orders.get_mut(&request.order_id) {
            paid.paid = true;
        }
        state.record(
            &order.student_id,
            order.vendor_id.as_deref(),
            order.amount,
            Some("Wallet recharge".to_string()),
        );
        info!(
            "Recharge {} verified, {} balance now {}",
            request.order_id, order.student_id, new_balance
        );

        Ok(VerifiedRecharge { new_balance })
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, LedgerError> {
        self.enter(&self.calls.create_charge)?;
        if !request.amount.is_positive() {
            return Err(LedgerError::Rejected("amount must be positive".into()));
        }

        let mut state = self.state.lock();
        let student_balance = state
            .students
            .get(&request.student_id)
            .map(|a| a.balance)
            .ok_or_else(|| LedgerError::NotFound(format!("student {}", request.student_id)))?;
        let vendor_balance = state
            .vendors
            .get(&request.vendor_id)
            .map(|a| a.balance)
            .ok_or_else(|| LedgerError::NotFound(format!("vendor {}", request.vendor_id)))?;

        if student_balance < request.amount {
            debug!(
                "Charge of {} refused: {} has {}",
                request.amount, request.student_id, student_balance
            );
            return Err(LedgerError::InsufficientFunds);
        }

        let student_after = student_balance
            .checked_sub(request.amount)
            .ok_or(LedgerError::InsufficientFunds)?;
        let vendor_after = vendor_balance
            .checked_add(request.amount)
            .ok_or_else(|| LedgerError::Rejected("balance overflow".into()))?;

        if let Some(student) = state.students.get_mut(&request.student_id) {
            student.balance = student_after;
        }
        if let Some(vendor) = state.vendors.get_mut(&request.vendor_id) {
            vendor.balance = vendor_after;
        }
        state.record(
            &request.student_id,
            Some(request.vendor_id.as_str()),
            request.amount,
            request.description.clone(),
        );

        Ok(ChargeReceipt {
            student_id: request.student_id.clone(),
            vendor_id: request.vendor_id.clone(),
            student_balance: student_after,
            vendor_balance: vendor_after,
        })
    }

    async fn list_transactions(
        &self,
        role: Role,
        id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.enter(&self.calls.list_transactions)?;
        let state = self.state.lock();
        if !state.accounts(role).contains_key(id) {
            return Err(LedgerError::NotFound(format!("{role} {id}")));
        }

        let mut transactions: Vec<Transaction> = state
            .entries
            .iter()
            .filter(|e| match role {
                Role::Student => e.student_id == id,
                Role::Vendor => e.vendor_id.as_deref() == Some(id),
            })
            .map(|e| Transaction {
                id: e.id.clone(),
                counterparty_id: match role {
                    Role::Student => e.vendor_id.clone(),
                    Role::Vendor => Some(e.student_id.clone()),
                },
                amount: e.amount,
                description: e.description.clone(),
                status: TransactionStatus::Completed,
                timestamp: e.timestamp,
            })
            .collect();
        transactions.reverse();
        Ok(transactions)
    }

    async fn get_qr_code(&self, role: Role, id: &str) -> Result<QrCodeImage, LedgerError> {
        self.enter(&self.calls.get_qr_code)?;
        let state = self.state.lock();
        let account = state
            .accounts(role)
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("{role} {id}")))?;
        let payload = QrPayload::for_account(role, id);
        Ok(QrCodeImage {
            role,
            id: id.to_string(),
            data_url: format!(
                "data:application/json;base64,{}",
                general_purpose::STANDARD.encode(payload.encode())
            ),
            display_name: Some(account.name.clone()),
            upi_id: account.upi_id.clone(),
        })
    }
}
