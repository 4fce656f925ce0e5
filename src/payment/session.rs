//! Two-phase wallet recharge: create order, collect, verify.

use super::checkout::{CheckoutProvider, CheckoutRequest, ProviderConfirmation};
use crate::config::CheckoutConfig;
use crate::context::ActorContext;
use crate::error::{Error, FailureReason, Result, ValidationError};
use crate::ledger::{
    Identity, LedgerService, PendingOrder, RechargeOrderRequest, VerifyRechargeRequest,
};
use crate::money::Money;
use crate::qr::Role;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Where a [`PaymentSession`] is in the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPhase {
    /// Waiting for a scanned counterparty and an amount.
    SelectingCounterparty,
    /// Order created; checkout not yet shown.
    AwaitingProviderOpen,
    /// Checkout showing; waiting for its single result.
    AwaitingProviderResult,
    /// Provider claimed success; ledger verification in flight.
    Verifying,
    /// Ledger verified the payment.
    Settled,
    /// Terminal failure.
    Failed(FailureReason),
}

impl PaymentPhase {
    /// Short name for logs and phase errors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SelectingCounterparty => "selecting a counterparty",
            Self::AwaitingProviderOpen => "awaiting checkout",
            Self::AwaitingProviderResult => "awaiting the payment result",
            Self::Verifying => "verifying",
            Self::Settled => "settled",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the session can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed(_))
    }
}

impl fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified outcome of a recharge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Ledger order that was paid.
    pub order_id: String,
    /// Wallet credited.
    pub student_id: String,
    /// Vendor the recharge was started from, if any.
    pub vendor_id: Option<String>,
    /// Amount credited, as echoed by the ledger.
    pub amount: Money,
    /// Authoritative wallet balance after the credit.
    pub new_balance: Money,
}

/// Lets the screen abandon a session whose checkout never answers.
#[derive(Debug, Clone)]
pub struct PaymentAbandonHandle {
    abandoned: Arc<watch::Sender<bool>>,
}

impl PaymentAbandonHandle {
    /// Mark the checkout as closed by the user.
    pub fn abandon(&self) {
        self.abandoned.send_replace(true);
    }
}

#[derive(Debug)]
struct OpenOrder {
    order: PendingOrder,
    student_id: String,
    vendor_id: Option<String>,
}

/// One recharge attempt. Terminal sessions cannot be reused; start a new
/// one for another recharge.
pub struct PaymentSession {
    ledger: Arc<dyn LedgerService>,
    provider: Arc<dyn CheckoutProvider>,
    checkout: CheckoutConfig,
    context: ActorContext,
    phase: PaymentPhase,
    counterparty: Option<Identity>,
    open: Option<OpenOrder>,
    result: Option<oneshot::Receiver<ProviderConfirmation>>,
    abandoned: Arc<watch::Sender<bool>>,
}

impl PaymentSession {
    /// Create a session for `context`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerService>,
        provider: Arc<dyn CheckoutProvider>,
        checkout: CheckoutConfig,
        context: ActorContext,
    ) -> Self {
        let (abandoned, _) = watch::channel(false);
        Self {
            ledger,
            provider,
            checkout,
            context,
            phase: PaymentPhase::SelectingCounterparty,
            counterparty: None,
            open: None,
            result: None,
            abandoned: Arc::new(abandoned),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &PaymentPhase {
        &self.phase
    }

    /// Counterparty chosen for this session.
    #[must_use]
    pub fn counterparty(&self) -> Option<&Identity> {
        self.counterparty.as_ref()
    }

    /// Order created by [`create_order`](Self::create_order), if any.
    #[must_use]
    pub fn pending_order(&self) -> Option<&PendingOrder> {
        self.open.as_ref().map(|o| &o.order)
    }

    /// Handle for abandoning the checkout from another task.
    #[must_use]
    pub fn abandon_handle(&self) -> PaymentAbandonHandle {
        PaymentAbandonHandle {
            abandoned: Arc::clone(&self.abandoned),
        }
    }

    /// Use `identity` as the counterparty. Replaces any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns a phase error unless selecting a counterparty.
    pub fn set_counterparty(&mut self, identity: Identity) -> Result<()> {
        self.expect_phase(&PaymentPhase::SelectingCounterparty, "choose a counterparty")?;
        debug!("Payment counterparty: {} {}", identity.role, identity.id);
        self.counterparty = Some(identity);
        Ok(())
    }

    /// Drop the counterparty, e.g. when the user scans again. From
    /// `AwaitingProviderOpen` this also discards the unpaid order.
    ///
    /// # Errors
    ///
    /// Returns a phase error once checkout has been shown.
    pub fn clear_counterparty(&mut self) -> Result<()> {
        match self.phase {
            PaymentPhase::SelectingCounterparty => {}
            PaymentPhase::AwaitingProviderOpen => {
                if let Some(open) = self.open.take() {
                    debug!("Discarding unpaid order {}", open.order.order_id);
                }
                self.set_phase(PaymentPhase::SelectingCounterparty);
            }
            _ => return Err(self.phase_error("clear the counterparty")),
        }
        self.counterparty = None;
        Ok(())
    }

    /// Ask the ledger for an order covering `amount`.
    ///
    /// Validation happens before any network call. The returned order's
    /// amount and currency are the ledger's, not a local computation.
    ///
    /// # Errors
    ///
    /// * [`ValidationError`] for a non-positive amount, a missing
    ///   counterparty, or no student to credit. The phase does not change.
    /// * [`Error::PaymentFailed`] with [`FailureReason::OrderRejected`] if
    ///   the ledger refuses.
    pub async fn create_order(&mut self, amount: Money) -> Result<PendingOrder> {
        self.expect_phase(&PaymentPhase::SelectingCounterparty, "create an order")?;
        let amount = amount.ensure_positive()?;
        let (student_id, vendor_id) = self.order_parties()?;

        let request = RechargeOrderRequest {
            student_id: student_id.clone(),
            vendor_id: vendor_id.clone(),
            amount,
        };
        match self.ledger.create_recharge_order(&request).await {
            Ok(order) => {
                info!(
                    "Created recharge order {} for {} {}",
                    order.order_id, order.amount, order.currency
                );
                self.open = Some(OpenOrder {
                    order: order.clone(),
                    student_id,
                    vendor_id,
                });
                self.set_phase(PaymentPhase::AwaitingProviderOpen);
                Ok(order)
            }
            Err(e) => {
                warn!("Recharge order for {student_id} refused: {e}");
                Err(self.fail(FailureReason::OrderRejected(e.to_string())))
            }
        }
    }

    /// Show the checkout widget for the pending order. An abandon that
    /// arrived earlier ends the session here without showing the widget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PaymentFailed`] with [`FailureReason::ProviderError`]
    /// if the widget cannot be opened, or [`FailureReason::UserAbandoned`]
    /// if the session was already abandoned.
    pub async fn open_provider(&mut self) -> Result<()> {
        self.expect_phase(&PaymentPhase::AwaitingProviderOpen, "open checkout")?;
        if *self.abandoned.borrow() {
            info!("Recharge abandoned before checkout opened");
            return Err(self.fail(FailureReason::UserAbandoned));
        }
        let Some(open) = self.open.as_ref() else {
            return Err(self.phase_error("open checkout"));
        };
        let request = CheckoutRequest::new(
            &open.order,
            &self.checkout,
            &open.student_id,
            open.vendor_id.as_deref(),
        );

        let (tx, rx) = oneshot::channel();
        match self.provider.open(&request, tx).await {
            Ok(()) => {
                debug!("Checkout open for order {}", request.order_id);
                self.result = Some(rx);
                self.set_phase(PaymentPhase::AwaitingProviderResult);
                Ok(())
            }
            Err(e) => {
                warn!("Checkout failed to open: {e}");
                Err(self.fail(FailureReason::ProviderError(e.to_string())))
            }
        }
    }

    /// Wait for the provider's single result, then verify it.
    ///
    /// Ends in `Failed(UserAbandoned)` if the session is abandoned or the
    /// widget closes without a result; no verification is attempted then.
    ///
    /// # Errors
    ///
    /// [`Error::PaymentFailed`] with the terminal reason.
    pub async fn await_result(&mut self) -> Result<Settlement> {
        self.expect_phase(&PaymentPhase::AwaitingProviderResult, "wait for payment")?;
        let Some(mut result) = self.result.take() else {
            return Err(self.phase_error("wait for payment"));
        };

        let mut abandoned = self.abandoned.subscribe();
        let confirmation = if *abandoned.borrow_and_update() {
            None
        } else {
            tokio::select! {
                biased;
                _ = abandoned.changed() => None,
                confirmation = &mut result => confirmation.ok(),
            }
        };

        match confirmation {
            Some(confirmation) => self.verify(confirmation).await,
            None => {
                info!("Checkout closed without payment");
                Err(self.fail(FailureReason::UserAbandoned))
            }
        }
    }

    /// Verify a provider confirmation with the ledger.
    ///
    /// Called once per session. A rejection or transport failure is final:
    /// money may already have moved, so nothing is retried.
    ///
    /// # Errors
    ///
    /// [`Error::PaymentFailed`] with [`FailureReason::VerificationFailed`].
    pub async fn verify(&mut self, confirmation: ProviderConfirmation) -> Result<Settlement> {
        self.expect_phase(&PaymentPhase::AwaitingProviderResult, "verify a payment")?;
        self.result = None;
        let Some(open) = self.open.as_ref() else {
            return Err(self.phase_error("verify a payment"));
        };
        if confirmation.order_id != open.order.order_id {
            error!(
                "Provider confirmed order {} but session holds {}",
                confirmation.order_id, open.order.order_id
            );
            return Err(self.fail(FailureReason::VerificationFailed(
                "confirmation is for a different order".into(),
            )));
        }

        let request = VerifyRechargeRequest {
            payment_id: confirmation.payment_id,
            order_id: open.order.order_id.clone(),
            signature: confirmation.signature,
            student_id: open.student_id.clone(),
            vendor_id: open.vendor_id.clone(),
            amount: open.order.amount,
        };
        self.set_phase(PaymentPhase::Verifying);

        match self.ledger.verify_recharge_payment(&request).await {
            Ok(verified) => {
                info!(
                    "Recharge {} settled, {} balance {}",
                    request.order_id, request.student_id, verified.new_balance
                );
                self.set_phase(PaymentPhase::Settled);
                Ok(Settlement {
                    order_id: request.order_id,
                    student_id: request.student_id,
                    vendor_id: request.vendor_id,
                    amount: request.amount,
                    new_balance: verified.new_balance,
                })
            }
            Err(e) => {
                error!("Verification of order {} failed: {e}", request.order_id);
                Err(self.fail(FailureReason::VerificationFailed(e.to_string())))
            }
        }
    }

    /// Abandon the session. Only possible before verification starts.
    ///
    /// # Errors
    ///
    /// Returns a phase error while verifying or once terminal.
    pub fn abandon(&mut self) -> Result<()> {
        match self.phase {
            PaymentPhase::SelectingCounterparty
            | PaymentPhase::AwaitingProviderOpen
            | PaymentPhase::AwaitingProviderResult => {
                self.abandoned.send_replace(true);
                self.result = None;
                self.fail(FailureReason::UserAbandoned);
                Ok(())
            }
            _ => Err(self.phase_error("abandon")),
        }
    }

    /// Run the whole protocol for `amount` against the chosen counterparty.
    ///
    /// # Errors
    ///
    /// As the individual steps.
    pub async fn run(&mut self, amount: Money) -> Result<Settlement> {
        self.create_order(amount).await?;
        self.open_provider().await?;
        self.await_result().await
    }

    fn order_parties(&self) -> Result<(String, Option<String>)> {
        let counterparty = self
            .counterparty
            .as_ref()
            .ok_or(ValidationError::MissingCounterparty)?;
        match counterparty.role {
            Role::Vendor => {
                let student_id = self
                    .context
                    .student_id()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or(ValidationError::MissingStudent)?;
                Ok((student_id.to_string(), Some(counterparty.id.clone())))
            }
            Role::Student => Ok((counterparty.id.clone(), None)),
        }
    }

    fn expect_phase(&self, expected: &PaymentPhase, action: &'static str) -> Result<()> {
        if &self.phase == expected {
            Ok(())
        } else {
            Err(self.phase_error(action))
        }
    }

    fn phase_error(&self, action: &'static str) -> Error {
        ValidationError::Phase {
            action,
            phase: self.phase.as_str(),
        }
        .into()
    }

    fn fail(&mut self, reason: FailureReason) -> Error {
        self.set_phase(PaymentPhase::Failed(reason.clone()));
        Error::PaymentFailed(reason)
    }

    fn set_phase(&mut self, phase: PaymentPhase) {
        debug!("Payment {} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

impl fmt::Debug for PaymentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentSession")
            .field("context", &self.context)
            .field("phase", &self.phase)
            .field("counterparty", &self.counterparty)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
