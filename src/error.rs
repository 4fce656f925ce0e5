//! Error types for schoolpay.
//!
//! The crate-wide [`Error`] wraps the typed errors each session boundary
//! recovers from. Callers that only need to show something to a user should
//! reach for [`Error::user_message`].

use crate::qr::Role;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in schoolpay.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Decoded text was not a recognised QR payload.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Payload could not be turned into a counterparty identity.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Input rejected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ledger service error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Decoder (camera or image) error.
    #[error(transparent)]
    Decoder(#[from] DecoderError),

    /// Checkout provider error.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Scan attempt failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Payment session reached `Failed`.
    #[error("payment failed: {0}")]
    PaymentFailed(FailureReason),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Message suitable for showing to the person operating the screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse(e) => e.user_message(),
            Self::Resolve(e) => e.user_message(),
            Self::Validation(e) => e.to_string(),
            Self::Scan(e) => e.user_message(),
            Self::PaymentFailed(reason) => reason.user_message().to_string(),
            Self::Ledger(LedgerError::InsufficientFunds) => {
                "Insufficient balance in the student's wallet.".to_string()
            }
            Self::Decoder(DecoderError::PermissionDenied) => {
                "Failed to initialize camera. Please make sure you have granted camera \
                 permissions, or upload a QR code image instead."
                    .to_string()
            }
            other => format!("Something went wrong: {other}"),
        }
    }
}

/// Failure to turn decoded text into a [`QrPayload`](crate::qr::QrPayload).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Text is not a JSON object (or no code was found at all).
    #[error("QR payload is not structured data")]
    NotStructured,
    /// JSON object without a non-empty `vendor_id` or `student_id`.
    #[error("QR payload has no vendor_id or student_id")]
    MissingField,
    /// JSON object naming both a vendor and a student.
    #[error("QR payload names both a vendor and a student")]
    Ambiguous,
}

impl ParseError {
    /// Retryable message for the scanning screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotStructured => {
                "Could not read a QR code. Please try again with a clearer image.".to_string()
            }
            Self::MissingField | Self::Ambiguous => {
                "Invalid QR code format. Please scan a valid code.".to_string()
            }
        }
    }
}

/// Failure to resolve a payload to an authoritative identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Payload role differs from the role the screen asked for.
    #[error("expected a {expected} QR code, scanned a {actual} QR code")]
    WrongRole {
        /// Role the caller asked for.
        expected: Role,
        /// Role carried by the payload.
        actual: Role,
    },
    /// Ledger has no record for this id.
    #[error("no {role} found with id {id}")]
    NotFound {
        /// Role looked up.
        role: Role,
        /// Id looked up.
        id: String,
    },
    /// Ledger could not be reached or answered garbage.
    #[error("ledger service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ResolveError {
    /// Retryable message for the scanning screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::WrongRole { expected, .. } => {
                format!("Invalid QR code format. Please scan a valid {expected} QR code.")
            }
            Self::NotFound { role, .. } => {
                format!("{} not found. Please scan a valid {role} QR code.", role.title())
            }
            Self::ServiceUnavailable(_) => {
                "Could not reach the wallet service. Please try again.".to_string()
            }
        }
    }
}

/// Input rejected locally; never sent over the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount text or value is not a finite number.
    #[error("please enter a valid amount")]
    InvalidAmount,
    /// Amount is zero or negative.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    /// No counterparty has been scanned yet.
    #[error("please scan a QR code first")]
    MissingCounterparty,
    /// No student id available for a recharge.
    #[error("please enter a student id")]
    MissingStudent,
    /// Charge attempted without a signed-in vendor.
    #[error("no vendor account is signed in")]
    MissingVendor,
    /// Operation is not valid in the session's current phase.
    #[error("cannot {action} while {phase}")]
    Phase {
        /// What was attempted.
        action: &'static str,
        /// Phase the session was in.
        phase: &'static str,
    },
}

/// Why a payment session ended in `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Checkout closed without completing. Not a system error.
    #[error("payment was cancelled")]
    UserAbandoned,
    /// Ledger did not confirm the provider's claimed success.
    #[error("payment verification failed: {0}")]
    VerificationFailed(String),
    /// Ledger refused to create the order.
    #[error("order could not be created: {0}")]
    OrderRejected(String),
    /// Checkout provider could not be opened.
    #[error("checkout provider error: {0}")]
    ProviderError(String),
}

impl FailureReason {
    /// Message for the payment screen.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UserAbandoned => "Payment was cancelled.",
            Self::VerificationFailed(_) => {
                "Payment verification failed. Please contact support before trying again."
            }
            Self::OrderRejected(_) => "Failed to create payment order. Please try again.",
            Self::ProviderError(_) => {
                "Failed to load payment system. Please try again later."
            }
        }
    }

    /// Whether this outcome counts as a system error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::UserAbandoned)
    }
}

/// Errors reported by a [`LedgerService`](crate::ledger::LedgerService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No such student, vendor, or order.
    #[error("not found: {0}")]
    NotFound(String),
    /// Student balance does not cover the charge.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Service answered but refused the request.
    #[error("rejected by ledger: {0}")]
    Rejected(String),
    /// Network or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body did not match the expected shape.
    #[error("malformed ledger response: {0}")]
    Decode(String),
}

/// Errors reported by a [`Decoder`](crate::scan::Decoder).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    /// Camera access refused by the platform or the user.
    #[error("camera permission denied")]
    PermissionDenied,
    /// Requested device is not available.
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Decoder could not be acquired or failed internally.
    #[error("decoder failure: {0}")]
    Backend(String),
}

/// Errors reported by a [`CheckoutProvider`](crate::payment::CheckoutProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Provider script or widget is not loaded yet.
    #[error("payment system is still loading")]
    NotLoaded,
    /// Provider refused to open.
    #[error("checkout failed to open: {0}")]
    Open(String),
}

/// Errors surfaced by a scan attempt (camera or upload).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Decoded text was not a valid payload.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Payload did not resolve.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Decoder failed.
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    /// Uploaded file is not an image.
    #[error("please upload an image file (got {0})")]
    NotAnImage(String),
    /// No camera was found; only image upload is usable.
    #[error("no camera available")]
    NoCamera,
    /// Scanner is in a phase that does not allow this action.
    #[error("scanner is {0}")]
    NotReady(&'static str),
}

impl ScanError {
    /// Retryable message for the scanning screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse(e) => e.user_message(),
            Self::Resolve(e) => e.user_message(),
            Self::Decoder(e) => Error::Decoder(e.clone()).user_message(),
            Self::NotAnImage(_) => "Please upload an image file.".to_string(),
            Self::NoCamera => "No camera found. Please upload a QR code image instead.".to_string(),
            Self::NotReady(_) => "Scanner is not ready. Please try again.".to_string(),
        }
    }
}
