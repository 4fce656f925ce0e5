//! Direct vendor debit of a student wallet.

use crate::context::ActorContext;
use crate::error::{Result, ValidationError};
use crate::ledger::{ChargeReceipt, ChargeRequest, Identity, LedgerService};
use crate::money::Money;
use crate::qr::Role;
use tracing::{info, warn};

/// Debit `student` and credit the signed-in vendor in one ledger call.
///
/// There is no pending state: the ledger checks the balance and moves the
/// money atomically, or changes nothing. A blank description is sent as
/// absent.
///
/// # Errors
///
/// * [`ValidationError`] before any network call when the amount is not
///   positive, no student was scanned, or `context` is not a vendor.
/// * [`crate::Error::Ledger`] with
///   [`LedgerError::InsufficientFunds`](crate::error::LedgerError::InsufficientFunds)
///   or any other ledger failure.
pub async fn charge(
    ledger: &dyn LedgerService,
    context: &ActorContext,
    student: Option<&Identity>,
    amount: Money,
    description: Option<&str>,
) -> Result<ChargeReceipt> {
    let amount = amount.ensure_positive()?;
    let student = student
        .filter(|s| s.role == Role::Student)
        .ok_or(ValidationError::MissingCounterparty)?;
    let vendor_id = context.vendor_id().ok_or(ValidationError::MissingVendor)?;

    let request = ChargeRequest {
        student_id: student.id.clone(),
        vendor_id: vendor_id.to_string(),
        amount,
        description: description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    };

    match ledger.create_charge(&request).await {
        Ok(receipt) => {
            info!(
                "Charged {} {} for {vendor_id}; student balance {}",
                student.id, amount, receipt.student_balance
            );
            Ok(receipt)
        }
        Err(e) => {
            warn!("Charge of {} to {} failed: {e}", amount, student.id);
            Err(e.into())
        }
    }
}
