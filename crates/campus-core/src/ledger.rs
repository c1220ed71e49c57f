//! # Fee Ledger
//!
//! Invoice arithmetic and payment application. Everything here is pure:
//! the database layer loads rows, calls these functions inside its
//! transaction, and persists the result.
//!
//! ## Invoice Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FeeStructure rows ──► FeeLine ──┐                                     │
//! │                                  ├──► compute_invoice() ──► totals     │
//! │  StudentFeeDiscount ──► Applicable┘                                    │
//! │                                                                         │
//! │  total    = Σ lines                                                    │
//! │  discount = Σ discounts, capped at total                               │
//! │  net      = total - discount + late_fee + tax                          │
//! │  balance  = net - paid                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Flow
//! ```text
//! apply_payment(invoice, amount)
//!      │
//!      ├── status == paid?      → Conflict  (InvoiceAlreadyPaid)
//!      ├── amount <= 0?         → Validation
//!      ├── amount > balance?    → Validation (PaymentExceedsBalance)
//!      │
//!      └── paid += amount; balance = net - paid
//!          status = balance <= 0 ? paid : partial
//! ```

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percentage};
use crate::types::{DiscountKind, FeeInvoice, FeeStructure, InvoiceStatus};

// =============================================================================
// Invoice Computation
// =============================================================================

/// One billable line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeLine {
    pub fee_structure_id: Option<String>,
    pub description: String,
    pub amount: Money,
}

impl From<&FeeStructure> for FeeLine {
    fn from(structure: &FeeStructure) -> Self {
        FeeLine {
            fee_structure_id: Some(structure.id.clone()),
            description: structure.name.clone(),
            amount: structure.amount(),
        }
    }
}

/// A discount valid during the billing month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicableDiscount {
    pub discount_id: String,
    pub name: String,
    pub kind: DiscountKind,
    /// Basis points for percentage discounts, cents for fixed ones.
    pub value: i64,
}

/// Computed amounts for a new invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub total: Money,
    pub discount: Money,
    pub late_fee: Money,
    pub tax: Money,
    pub net: Money,
    pub paid: Money,
    pub balance: Money,
    pub status: InvoiceStatus,
}

/// Discount amount a single definition grants against `total`.
///
/// Percentages apply to the pre-discount total, never compounding.
pub fn discount_amount(total: Money, discount: &ApplicableDiscount) -> Money {
    match discount.kind {
        DiscountKind::Percentage => {
            let bps = discount.value.clamp(0, 10_000) as u32;
            total.percentage(Percentage::from_bps(bps))
        }
        DiscountKind::Fixed => Money::from_cents(discount.value.max(0)),
    }
}

/// Sums fee lines and discounts into a fresh pending invoice.
///
/// Late fees and tax are always zero at generation time. The combined
/// discount is capped at the total so `net` never goes negative.
///
/// ## Example
/// ```rust
/// use campus_core::ledger::{compute_invoice, ApplicableDiscount, FeeLine};
/// use campus_core::money::Money;
/// use campus_core::types::DiscountKind;
///
/// let lines = vec![
///     FeeLine { fee_structure_id: None, description: "Tuition".into(), amount: Money::from_units(10_000) },
///     FeeLine { fee_structure_id: None, description: "Transport".into(), amount: Money::from_units(2_000) },
/// ];
/// let sibling = ApplicableDiscount {
///     discount_id: "d1".into(),
///     name: "Sibling".into(),
///     kind: DiscountKind::Percentage,
///     value: 500,
/// };
///
/// let totals = compute_invoice(&lines, &[sibling]);
/// assert_eq!(totals.net, Money::from_units(11_400));
/// ```
pub fn compute_invoice(lines: &[FeeLine], discounts: &[ApplicableDiscount]) -> InvoiceTotals {
    let total: Money = lines.iter().map(|l| l.amount).sum();
    let discount = discounts
        .iter()
        .map(|d| discount_amount(total, d))
        .sum::<Money>()
        .min(total);
    let late_fee = Money::zero();
    let tax = Money::zero();
    let net = total - discount + late_fee + tax;

    InvoiceTotals {
        total,
        discount,
        late_fee,
        tax,
        net,
        paid: Money::zero(),
        balance: net,
        status: status_after_payment(Money::zero(), net, InvoiceStatus::Pending),
    }
}

// =============================================================================
// Payment Application
// =============================================================================

/// New invoice amounts after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub paid: Money,
    pub balance: Money,
    pub status: InvoiceStatus,
}

/// Status implied by a balance after payment activity.
pub fn status_after_payment(paid: Money, balance: Money, current: InvoiceStatus) -> InvoiceStatus {
    if !balance.is_positive() {
        InvoiceStatus::Paid
    } else if paid.is_positive() {
        InvoiceStatus::Partial
    } else {
        current
    }
}

/// Applies `amount` to `invoice`. The single entry point for every
/// payment route, direct or mobile.
pub fn apply_payment(invoice: &FeeInvoice, amount: Money) -> CoreResult<PaymentOutcome> {
    if invoice.status == InvoiceStatus::Paid {
        return Err(CoreError::InvoiceAlreadyPaid {
            invoice_number: invoice.invoice_number.clone(),
        });
    }

    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    if amount > invoice.balance() {
        return Err(CoreError::PaymentExceedsBalance {
            amount,
            balance: invoice.balance(),
        });
    }

    let paid = invoice.paid() + amount;
    let balance = invoice.net() - paid;

    Ok(PaymentOutcome {
        paid,
        balance,
        status: status_after_payment(paid, balance, invoice.status),
    })
}

// =============================================================================
// Overdue
// =============================================================================

/// An open invoice whose due date lies before `as_of` is overdue.
pub fn is_overdue(status: InvoiceStatus, due_date: NaiveDate, as_of: NaiveDate) -> bool {
    matches!(status, InvoiceStatus::Pending | InvoiceStatus::Partial) && due_date < as_of
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(name: &str, units: i64) -> FeeLine {
        FeeLine {
            fee_structure_id: None,
            description: name.to_string(),
            amount: Money::from_units(units),
        }
    }

    fn percent(bps: i64) -> ApplicableDiscount {
        ApplicableDiscount {
            discount_id: "d-pct".to_string(),
            name: "Sibling".to_string(),
            kind: DiscountKind::Percentage,
            value: bps,
        }
    }

    fn fixed(cents: i64) -> ApplicableDiscount {
        ApplicableDiscount {
            discount_id: "d-fixed".to_string(),
            name: "Bursary".to_string(),
            kind: DiscountKind::Fixed,
            value: cents,
        }
    }

    fn invoice(totals: InvoiceTotals) -> FeeInvoice {
        let now = Utc::now();
        FeeInvoice {
            id: "inv-1".to_string(),
            invoice_number: "INV25030001".to_string(),
            student_id: "s-1".to_string(),
            billing_month: "2025-03".to_string(),
            total_cents: totals.total.cents(),
            discount_cents: totals.discount.cents(),
            late_fee_cents: 0,
            tax_cents: 0,
            net_cents: totals.net.cents(),
            paid_cents: totals.paid.cents(),
            balance_cents: totals.balance.cents(),
            status: totals.status,
            due_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tuition_transport_scenario() {
        let totals = compute_invoice(&[line("Tuition", 10_000), line("Transport", 2_000)], &[percent(500)]);

        assert_eq!(totals.total, Money::from_units(12_000));
        assert_eq!(totals.discount, Money::from_units(600));
        assert_eq!(totals.net, Money::from_units(11_400));
        assert_eq!(totals.balance, Money::from_units(11_400));
        assert_eq!(totals.status, InvoiceStatus::Pending);

        let outcome = apply_payment(&invoice(totals), Money::from_units(11_400)).unwrap();
        assert_eq!(outcome.status, InvoiceStatus::Paid);
        assert!(outcome.balance.is_zero());
    }

    #[test]
    fn test_ten_percent_discount() {
        let totals = compute_invoice(&[line("Tuition", 8_000)], &[percent(1_000)]);
        assert_eq!(totals.net, Money::from_units(7_200));
        assert_eq!(totals.balance, totals.net);
    }

    #[test]
    fn test_discounts_do_not_compound_and_are_capped() {
        // Two 10% discounts against 1,000 = 200 off, not 190.
        let totals = compute_invoice(&[line("Tuition", 1_000)], &[percent(1_000), percent(1_000)]);
        assert_eq!(totals.discount, Money::from_units(200));

        let totals = compute_invoice(&[line("Tuition", 1_000)], &[fixed(150_000)]);
        assert_eq!(totals.discount, Money::from_units(1_000));
        assert!(totals.net.is_zero());
    }

    #[test]
    fn test_no_lines_yields_zero_invoice() {
        let totals = compute_invoice(&[], &[fixed(500)]);
        assert!(totals.total.is_zero());
        assert!(totals.net.is_zero());
        assert_eq!(totals.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_fully_discounted_invoice_is_settled() {
        let totals = compute_invoice(&[line("Tuition", 10_000)], &[percent(10_000)]);
        assert!(totals.balance.is_zero());
        assert_eq!(totals.status, InvoiceStatus::Paid);

        let totals = compute_invoice(&[line("Tuition", 10_000)], &[percent(500)]);
        assert_eq!(totals.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_partial_payment() {
        let totals = compute_invoice(&[line("Tuition", 10_000)], &[]);
        let outcome = apply_payment(&invoice(totals), Money::from_units(4_000)).unwrap();
        assert_eq!(outcome.status, InvoiceStatus::Partial);
        assert_eq!(outcome.paid, Money::from_units(4_000));
        assert_eq!(outcome.balance, Money::from_units(6_000));
    }

    #[test]
    fn test_payment_on_paid_invoice_is_conflict() {
        let totals = compute_invoice(&[line("Tuition", 100)], &[]);
        let mut paid = invoice(totals);
        paid.status = InvoiceStatus::Paid;
        paid.paid_cents = paid.net_cents;
        paid.balance_cents = 0;

        let err = apply_payment(&paid, Money::from_units(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvoiceAlreadyPaid { .. }));
    }

    #[test]
    fn test_overpayment_rejected() {
        let totals = compute_invoice(&[line("Tuition", 100)], &[]);
        let err = apply_payment(&invoice(totals), Money::from_units(101)).unwrap_err();
        assert!(matches!(err, CoreError::PaymentExceedsBalance { .. }));

        let err = apply_payment(&invoice(totals), Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_overdue_payment_moves_to_partial() {
        let totals = compute_invoice(&[line("Tuition", 100)], &[]);
        let mut overdue = invoice(totals);
        overdue.status = InvoiceStatus::Overdue;

        let outcome = apply_payment(&overdue, Money::from_units(50)).unwrap();
        assert_eq!(outcome.status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_is_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert!(is_overdue(InvoiceStatus::Pending, due, after));
        assert!(is_overdue(InvoiceStatus::Partial, due, after));
        assert!(!is_overdue(InvoiceStatus::Paid, due, after));
        assert!(!is_overdue(InvoiceStatus::Pending, due, due));
    }
}
