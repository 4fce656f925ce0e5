//! Who is operating the current screen.
//!
//! Authentication happens elsewhere; whatever performs it hands the core an
//! [`ActorContext`] instead of the core reading fixed ids.

use crate::qr::Role;

/// The authenticated actor a session runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorContext {
    /// A parent recharging a student's wallet.
    Parent {
        /// Student whose wallet is recharged, if already known.
        student_id: Option<String>,
    },
    /// A vendor charging students.
    Vendor {
        /// The signed-in vendor.
        vendor_id: String,
    },
    /// A student managing their own wallet.
    Student {
        /// The signed-in student.
        student_id: String,
    },
}

impl ActorContext {
    /// Student id carried by the context, if any.
    #[must_use]
    pub fn student_id(&self) -> Option<&str> {
        match self {
            Self::Parent { student_id } => student_id.as_deref(),
            Self::Student { student_id } => Some(student_id),
            Self::Vendor { .. } => None,
        }
    }

    /// Vendor id carried by the context, if any.
    #[must_use]
    pub fn vendor_id(&self) -> Option<&str> {
        match self {
            Self::Vendor { vendor_id } => Some(vendor_id),
            Self::Parent { .. } | Self::Student { .. } => None,
        }
    }

    /// Role a counterparty QR code must have on this actor's scan screen.
    #[must_use]
    pub const fn expected_scan_role(&self) -> Role {
        match self {
            Self::Parent { .. } | Self::Student { .. } => Role::Vendor,
            Self::Vendor { .. } => Role::Student,
        }
    }

    /// The account whose balance this actor's dashboard shows.
    #[must_use]
    pub fn own_account(&self) -> Option<(Role, &str)> {
        match self {
            Self::Vendor { vendor_id } => Some((Role::Vendor, vendor_id)),
            Self::Student { student_id } => Some((Role::Student, student_id)),
            Self::Parent { student_id } => student_id.as_deref().map(|id| (Role::Student, id)),
        }
    }
}
