use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::errors::InvoiceError;
use super::value_objects::PaymentStatus;

/// Fixed tax policy: 10% of the tax-exclusive total. Not configurable.
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Tax on `total`, rounded half away from zero to whole cents.
pub fn tax_for(total: Decimal) -> Decimal {
    (total * TAX_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// Invoice Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    // Identity (0 until persisted)
    pub id: i64,

    pub order_id: i64,
    /// Sum of line prices, tax-exclusive.
    pub total: Decimal,
    pub tax: Decimal,
    pub payment_status: PaymentStatus,
}

impl Invoice {
    /// Fresh unpaid invoice for `order_id` with tax applied to `total`.
    pub fn issue(order_id: i64, total: Decimal) -> Self {
        Self {
            id: 0,
            order_id,
            total,
            tax: tax_for(total),
            payment_status: PaymentStatus::Unpaid,
        }
    }

    /// Ids and amounts are sane and the tax-inclusive bill is representable.
    pub fn validate(&self) -> bool {
        self.order_id > 0
            && self.total >= Decimal::ZERO
            && self.tax >= Decimal::ZERO
            && self.total.checked_add(self.tax).is_some()
    }

    /// Amount a customer must pay to settle the invoice.
    pub fn bill_with_tax(&self) -> Decimal {
        self.total + self.tax
    }

    pub fn is_unpaid(&self) -> bool {
        self.payment_status == PaymentStatus::Unpaid
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self.payment_status, next),
            (Unpaid, Paid)
                | (Unpaid, Cancelled)
                | (Unpaid, Processing)
                | (Processing, Paid)
                | (Processing, Failed)
                | (Failed, Unpaid)
        )
    }

    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<(), InvoiceError> {
        if !self.can_transition_to(next) {
            return Err(InvoiceError::InvalidTransition {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
