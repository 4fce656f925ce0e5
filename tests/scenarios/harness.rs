//! Shared setup for scenario tests.

use super::fakes::{CheckoutMode, FakeCheckout, FakeDecoderSource};
use schoolpay::{
    ActorContext, CheckoutConfig, IdentityResolver, InMemoryLedger, Money, PaymentSession, Role,
    ScanConfig, ScanSession,
};
use std::sync::Arc;

/// Seeded student id.
pub const STUDENT_ID: &str = "STU001";

/// Seeded vendor id.
pub const VENDOR_ID: &str = "VEN001";

/// A ledger with one student holding 30.00 and one vendor holding 0.00.
pub struct TestHarness {
    /// The ledger every component talks to.
    pub ledger: Arc<InMemoryLedger>,
    /// Resolver over [`Self::ledger`].
    pub resolver: IdentityResolver,
}

impl TestHarness {
    /// Seed the ledger.
    pub fn setup() -> Self {
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_student(STUDENT_ID, "Asha Rao", Money::from_whole(30))
                .with_vendor(VENDOR_ID, "School Canteen", "canteen@upi", Money::ZERO),
        );
        let resolver = IdentityResolver::new(ledger.clone());
        Self { ledger, resolver }
    }

    /// A scan session on `decoders` expecting `expected` codes.
    pub fn scan_session(&self, decoders: &Arc<FakeDecoderSource>, expected: Role) -> ScanSession {
        ScanSession::new(
            decoders.clone(),
            self.resolver.clone(),
            expected,
            &ScanConfig::default(),
        )
    }

    /// A checkout widget behaving as `mode`.
    pub fn checkout(&self, mode: CheckoutMode) -> Arc<FakeCheckout> {
        Arc::new(FakeCheckout::new(self.ledger.clone(), mode))
    }

    /// A parent's recharge session for the seeded student.
    pub fn parent_session(&self, checkout: &Arc<FakeCheckout>) -> PaymentSession {
        PaymentSession::new(
            self.ledger.clone(),
            checkout.clone(),
            CheckoutConfig::default(),
            ActorContext::Parent {
                student_id: Some(STUDENT_ID.to_string()),
            },
        )
    }

    /// Current balance of the seeded student.
    pub fn student_balance(&self) -> Option<Money> {
        self.ledger.balance(Role::Student, STUDENT_ID)
    }

    /// Current balance of the seeded vendor.
    pub fn vendor_balance(&self) -> Option<Money> {
        self.ledger.balance(Role::Vendor, VENDOR_ID)
    }
}
