//! Payments against student wallets.
//!
//! Two flows share this module:
//!
//! - **Recharge** ([`PaymentSession`]): money comes in through a hosted
//!   checkout, so the session runs a two-phase protocol with the ledger.
//! - **Charge** ([`charge`]): a vendor debits a wallet directly. One ledger
//!   call, atomic on the ledger's side.
//!
//! # Recharge flow
//!
//! ```text
//! SelectingCounterparty ──create_order──▶ AwaitingProviderOpen
//!        ▲                                   │
//!        └──────clear_counterparty───────────┤
//!                                            │ open_provider
//!                                            ▼
//!                                  AwaitingProviderResult
//!                                   │                  │
//!                         confirmation          closed / abandon
//!                                   ▼                  ▼
//!                              Verifying     Failed(UserAbandoned)
//!                               │      │
//!                           verified  rejected
//!                               ▼      ▼
//!                          Settled   Failed(VerificationFailed)
//! ```
//!
//! The provider's confirmation is only a claim. A session settles when the
//! ledger verifies it, and the balance it reports is the ledger's.

mod charge;
mod checkout;
mod session;

pub use charge::charge;
pub use checkout::{CheckoutProvider, CheckoutRequest, ProviderConfirmation};
pub use session::{PaymentAbandonHandle, PaymentPhase, PaymentSession, Settlement};
