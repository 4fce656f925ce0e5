//! Identity resolution: QR payload to authoritative counterparty record.
//!
//! The role check happens before any network call, so a vendor code scanned
//! on a student screen never reaches the ledger. Each resolution issues
//! exactly one ledger read and never retries; retry is the caller's choice.

use crate::error::{LedgerError, ResolveError, ScanError};
use crate::ledger::{Identity, LedgerService};
use crate::qr::{QrPayload, Role};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves scanned payloads against the ledger.
#[derive(Clone)]
pub struct IdentityResolver {
    ledger: Arc<dyn LedgerService>,
}

impl IdentityResolver {
    /// Create a resolver backed by the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerService>) -> Self {
        Self { ledger }
    }

    /// Resolve a parsed payload, requiring it to name a `expected` party.
    ///
    /// # Errors
    ///
    /// * [`ResolveError::WrongRole`] if the payload names the other role.
    /// * [`ResolveError::NotFound`] if the ledger has no such id.
    /// * [`ResolveError::ServiceUnavailable`] on any other ledger failure.
    pub async fn resolve(
        &self,
        payload: &QrPayload,
        expected: Role,
    ) -> Result<Identity, ResolveError> {
        let actual = payload.role();
        if actual != expected {
            warn!("Scanned a {actual} code where a {expected} code was expected");
            return Err(ResolveError::WrongRole { expected, actual });
        }

        let id = payload.id();
        debug!("Looking up {expected} {id}");
        match self.ledger.get_identity(expected, id).await {
            Ok(identity) => Ok(identity),
            Err(LedgerError::NotFound(_)) => Err(ResolveError::NotFound {
                role: expected,
                id: id.to_string(),
            }),
            Err(e) => {
                warn!("Lookup of {expected} {id} failed: {e}");
                Err(ResolveError::ServiceUnavailable(e.to_string()))
            }
        }
    }

    /// Parse decoded text and resolve it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Parse`] or [`ScanError::Resolve`].
    pub async fn resolve_text(&self, raw: &str, expected: Role) -> Result<Identity, ScanError> {
        let payload = QrPayload::parse(raw)?;
        Ok(self.resolve(&payload, expected).await?)
    }
}
