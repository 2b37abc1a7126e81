use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::InvoiceError;

// ============================================================================
// Invoice Value Objects
// ============================================================================

/// Payment state of an invoice.
///
/// `Processing` and `Failed` are reserved for a payment gateway; no
/// operation in this crate moves an invoice into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Cancelled,
    Processing,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Cancelled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "processing" => Ok(PaymentStatus::Processing),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(InvoiceError::UnknownStatus(other.to_string())),
        }
    }
}
