//! Typed QR payloads and their JSON wire format.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON field identifying a vendor code.
pub const VENDOR_ID_FIELD: &str = "vendor_id";

/// JSON field identifying a student code.
pub const STUDENT_ID_FIELD: &str = "student_id";

/// Which kind of counterparty a code or identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A canteen or shop vendor.
    Vendor,
    /// A student wallet holder.
    Student,
}

impl Role {
    /// Lowercase name, also the ledger path segment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Student => "student",
        }
    }

    /// Capitalised name for messages.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Vendor => "Vendor",
            Self::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded, validated QR payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QrPayload {
    /// `{"vendor_id": ...}`
    Vendor {
        /// Non-empty vendor id.
        vendor_id: String,
    },
    /// `{"student_id": ...}`
    Student {
        /// Non-empty student id.
        student_id: String,
    },
}

impl QrPayload {
    /// Parse decoded QR text.
    ///
    /// # Errors
    ///
    /// * [`ParseError::NotStructured`] if `raw` is not a JSON object.
    /// * [`ParseError::MissingField`] if neither id field is a non-empty
    ///   string.
    /// * [`ParseError::Ambiguous`] if both id fields are.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| ParseError::NotStructured)?;
        let Value::Object(fields) = value else {
            return Err(ParseError::NotStructured);
        };

        match (
            non_empty_str(&fields, VENDOR_ID_FIELD),
            non_empty_str(&fields, STUDENT_ID_FIELD),
        ) {
            (Some(vendor_id), None) => Ok(Self::Vendor { vendor_id }),
            (None, Some(student_id)) => Ok(Self::Student { student_id }),
            (Some(_), Some(_)) => Err(ParseError::Ambiguous),
            (None, None) => Err(ParseError::MissingField),
        }
    }

    /// Payload naming `id` in `role`. The id is used as given.
    #[must_use]
    pub fn for_account(role: Role, id: impl Into<String>) -> Self {
        match role {
            Role::Vendor => Self::Vendor {
                vendor_id: id.into(),
            },
            Role::Student => Self::Student {
                student_id: id.into(),
            },
        }
    }

    /// Encode to the wire format printed on codes.
    #[must_use]
    pub fn encode(&self) -> String {
        let id = Value::String(self.id().to_string());
        format!("{{\"{}\": {id}}}", self.field())
    }

    /// Role of the counterparty this code names.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Vendor { .. } => Role::Vendor,
            Self::Student { .. } => Role::Student,
        }
    }

    /// The counterparty id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Vendor { vendor_id } => vendor_id,
            Self::Student { student_id } => student_id,
        }
    }

    const fn field(&self) -> &'static str {
        match self {
            Self::Vendor { .. } => VENDOR_ID_FIELD,
            Self::Student { .. } => STUDENT_ID_FIELD,
        }
    }
}

fn non_empty_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
