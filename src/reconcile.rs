//! Keeping a dashboard's balance and history in step with the ledger.
//!
//! Local state is never patched by arithmetic. After a payment settles the
//! verified balance is shown straight away and then the whole account is
//! fetched again, which also picks up payments made from other screens.

use crate::context::ActorContext;
use crate::error::Result;
use crate::ledger::{ChargeReceipt, Identity, LedgerService, Transaction};
use crate::money::Money;
use crate::payment::Settlement;
use crate::qr::Role;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of one account as the ledger last reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    /// Account holder, including the balance.
    pub identity: Identity,
    /// History, most recent first.
    pub transactions: Vec<Transaction>,
}

/// Holds the displayed state for one account.
pub struct Reconciler {
    ledger: Arc<dyn LedgerService>,
    role: Role,
    id: String,
    view: Option<AccountView>,
}

impl Reconciler {
    /// Track the account `role`/`id`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerService>, role: Role, id: impl Into<String>) -> Self {
        Self {
            ledger,
            role,
            id: id.into(),
            view: None,
        }
    }

    /// Track the account `context`'s dashboard shows, if it has one.
    #[must_use]
    pub fn for_context(ledger: Arc<dyn LedgerService>, context: &ActorContext) -> Option<Self> {
        context
            .own_account()
            .map(|(role, id)| Self::new(ledger, role, id))
    }

    /// Last fetched snapshot.
    #[must_use]
    pub fn view(&self) -> Option<&AccountView> {
        self.view.as_ref()
    }

    /// Balance currently shown.
    #[must_use]
    pub fn balance(&self) -> Option<Money> {
        self.view.as_ref().map(|v| v.identity.balance)
    }

    /// Fetch balance and history again. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Returns the ledger error; the previous snapshot is kept.
    pub async fn refresh(&mut self) -> Result<&AccountView> {
        let (identity, transactions) = tokio::join!(
            self.ledger.get_identity(self.role, &self.id),
            self.ledger.list_transactions(self.role, &self.id),
        );
        let identity = identity?;
        let mut transactions = transactions?;
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!(
            "Refreshed {} {}: balance {}, {} transaction(s)",
            self.role,
            self.id,
            identity.balance,
            transactions.len()
        );
        Ok(&*self.view.insert(AccountView {
            identity,
            transactions,
        }))
    }

    /// Show a settled recharge's balance, then refresh once.
    ///
    /// # Errors
    ///
    /// Returns the refresh error. The settled balance stays displayed.
    pub async fn on_settled(&mut self, settlement: &Settlement) -> Result<&AccountView> {
        if self.role == Role::Student && self.id == settlement.student_id {
            self.show_balance(settlement.new_balance);
        }
        self.refresh().await
    }

    /// Show the balance a direct charge left on this account, then refresh
    /// once. A receipt for another account only triggers the refresh.
    ///
    /// # Errors
    ///
    /// Returns the refresh error.
    pub async fn on_charged(&mut self, receipt: &ChargeReceipt) -> Result<&AccountView> {
        let balance = match self.role {
            Role::Student if self.id == receipt.student_id => Some(receipt.student_balance),
            Role::Vendor if self.id == receipt.vendor_id => Some(receipt.vendor_balance),
            _ => None,
        };
        if let Some(balance) = balance {
            self.show_balance(balance);
        }
        self.refresh().await
    }

    fn show_balance(&mut self, balance: Money) {
        if let Some(view) = self.view.as_mut() {
            view.identity.balance = balance;
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("role", &self.role)
            .field("id", &self.id)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}
