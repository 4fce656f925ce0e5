//! QR payload model.
//!
//! Wallet QR codes carry a flat UTF-8 JSON object naming exactly one
//! counterparty:
//!
//! ```text
//! {"vendor_id": "VEN001"}
//! {"student_id": "STU001"}
//! ```
//!
//! Extra fields are ignored. Anything else is rejected at this boundary so
//! downstream code can match on [`QrPayload`] instead of probing fields.
//!
//! # Example
//!
//! ```rust
//! use schoolpay::qr::{QrPayload, Role};
//!
//! let payload = QrPayload::parse(r#"{"vendor_id":"VEN001"}"#)?;
//! assert_eq!(payload.role(), Role::Vendor);
//! assert_eq!(payload.id(), "VEN001");
//! # Ok::<(), schoolpay::error::ParseError>(())
//! ```

mod payload;

pub use payload::{QrPayload, Role, STUDENT_ID_FIELD, VENDOR_ID_FIELD};
