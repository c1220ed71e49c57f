//! # Payment Repository
//!
//! Every route that moves money onto an invoice ends in
//! [`campus_core::ledger::apply_payment`] inside one transaction.
//!
//! ## Routes
//! ```text
//! Direct (cash, bank, cheque, card)
//!   record() ── BEGIN ─► apply_payment ─► REC code ─► INSERT success ─► UPDATE invoice ─► COMMIT
//!
//! Mobile money
//!   initiate() ── BEGIN ─► apply_payment (dry run) ─► MREC code ─► INSERT pending ─► COMMIT
//!        │
//!        ▼  (gateway callback)
//!   complete(checkout_reference, success)
//!        ├── success && apply_payment ok ─► payment success, UPDATE invoice
//!        ├── success && apply_payment err ─► payment failed (reason stored)
//!        └── !success ─────────────────────► payment failed
//! ```
//!
//! A successful payment writes a notification for the student after the
//! commit. That write may fail without affecting the payment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ensure_exists;
use super::invoice::{fetch_invoice, store_payment_outcome};
use super::notification::{NewNotification, NotificationRepository};
use super::sequence::next_code;
use crate::error::{DbError, DbResult};
use campus_core::ledger::apply_payment;
use campus_core::sequence::SequenceKind;
use campus_core::validation::{validate_payment_amount, validate_phone};
use campus_core::{CoreError, FeeInvoice, FeePayment, Money, PaymentMethod, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, invoice_id, receipt_number, method, amount_cents, status, \
     reference, checkout_reference, payer_phone, failure_reason, recorded_by, created_at, completed_at";

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// A payment taken at the bursar's desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Bank slip or cheque number.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
}

/// A request to charge a payer's mobile wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobilePaymentRequest {
    pub invoice_id: String,
    pub amount_cents: i64,
    pub phone: String,
}

/// The gateway's verdict on a pending mobile payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileConfirmation {
    pub checkout_reference: String,
    pub success: bool,
    /// Gateway transaction code.
    #[serde(default)]
    pub gateway_reference: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// A payment together with the invoice state it produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: FeePayment,
    pub invoice: FeeInvoice,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for fee payments.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a settled payment against an invoice.
    ///
    /// ## Errors
    /// - NotFound: invoice missing
    /// - Conflict: invoice already paid
    /// - Validation: amount not positive or above the balance
    pub async fn record(&self, input: &NewPayment) -> DbResult<PaymentReceipt> {
        validate_payment_amount(input.amount_cents)?;
        let amount = Money::from_cents(input.amount_cents);

        let mut tx = self.pool.begin().await?;

        let mut invoice = fetch_invoice(&mut tx, &input.invoice_id).await?;
        let outcome = apply_payment(&invoice, amount)?;

        let now = Utc::now();
        let receipt_number = next_code(&mut tx, SequenceKind::Receipt, now.date_naive()).await?;

        let payment = FeePayment {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice.id.clone(),
            receipt_number,
            method: input.method,
            amount_cents: amount.cents(),
            status: PaymentStatus::Success,
            reference: input.reference.clone(),
            checkout_reference: None,
            payer_phone: None,
            failure_reason: None,
            recorded_by: input.recorded_by.clone(),
            created_at: now,
            completed_at: Some(now),
        };

        insert_payment(&mut tx, &payment).await?;
        store_payment_outcome(&mut tx, &invoice.id, &outcome).await?;

        tx.commit().await?;

        invoice.paid_cents = outcome.paid.cents();
        invoice.balance_cents = outcome.balance.cents();
        invoice.status = outcome.status;
        invoice.updated_at = now;

        info!(
            receipt_number = %payment.receipt_number,
            invoice_number = %invoice.invoice_number,
            amount = %amount,
            balance = %outcome.balance,
            status = invoice.status.as_str(),
            "Payment recorded"
        );

        self.notify_received(&invoice, &payment).await;
        Ok(PaymentReceipt { payment, invoice })
    }

    /// Opens a pending mobile-money payment. The push request to the
    /// payer's phone is sent by the caller using the returned
    /// checkout reference.
    pub async fn initiate_mobile(&self, input: &MobilePaymentRequest) -> DbResult<FeePayment> {
        validate_payment_amount(input.amount_cents)?;
        validate_phone("phone", &input.phone)?;
        let amount = Money::from_cents(input.amount_cents);

        let mut tx = self.pool.begin().await?;

        let invoice = fetch_invoice(&mut tx, &input.invoice_id).await?;
        // Reject now rather than after the payer has been charged.
        apply_payment(&invoice, amount)?;

        let now = Utc::now();
        let receipt_number = next_code(&mut tx, SequenceKind::MobileReceipt, now.date_naive()).await?;

        let payment = FeePayment {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice.id.clone(),
            receipt_number,
            method: PaymentMethod::MobileMoney,
            amount_cents: amount.cents(),
            status: PaymentStatus::Pending,
            reference: None,
            checkout_reference: Some(Uuid::new_v4().to_string()),
            payer_phone: Some(input.phone.trim().to_string()),
            failure_reason: None,
            recorded_by: None,
            created_at: now,
            completed_at: None,
        };

        insert_payment(&mut tx, &payment).await?;
        tx.commit().await?;

        info!(
            receipt_number = %payment.receipt_number,
            invoice_number = %invoice.invoice_number,
            amount = %amount,
            "Mobile payment initiated"
        );
        Ok(payment)
    }

    /// Applies the gateway's verdict to a pending mobile payment.
    ///
    /// A confirmed payment that no longer fits the invoice (paid in the
    /// meantime, or balance reduced below the amount) is stored as failed
    /// with the reason, and the invoice is left unchanged.
    ///
    /// ## Errors
    /// - NotFound: unknown checkout reference
    /// - Conflict: payment already completed
    pub async fn complete_mobile(&self, confirmation: &MobileConfirmation) -> DbResult<PaymentReceipt> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM fee_payments WHERE checkout_reference = ?1");
        let mut payment = sqlx::query_as::<_, FeePayment>(&sql)
            .bind(&confirmation.checkout_reference)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", &confirmation.checkout_reference))?;

        if payment.status != PaymentStatus::Pending {
            return Err(CoreError::InvalidState {
                entity: "Payment".to_string(),
                id: payment.receipt_number.clone(),
                status: payment.status.as_str().to_string(),
            }
            .into());
        }

        let mut invoice = fetch_invoice(&mut tx, &payment.invoice_id).await?;
        let now = Utc::now();
        payment.completed_at = Some(now);
        payment.reference = confirmation.gateway_reference.clone();

        let outcome = if confirmation.success {
            match apply_payment(&invoice, payment.amount()) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(
                        receipt_number = %payment.receipt_number,
                        error = %e,
                        "Confirmed mobile payment no longer fits invoice"
                    );
                    payment.failure_reason = Some(e.to_string());
                    None
                }
            }
        } else {
            payment.failure_reason = Some(
                confirmation
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "Declined by gateway".to_string()),
            );
            None
        };

        payment.status = match outcome {
            Some(_) => PaymentStatus::Success,
            None => PaymentStatus::Failed,
        };

        sqlx::query(
            r#"
            UPDATE fee_payments
            SET status = ?2, reference = ?3, failure_reason = ?4, completed_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&payment.id)
        .bind(payment.status)
        .bind(&payment.reference)
        .bind(&payment.failure_reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(outcome) = &outcome {
            store_payment_outcome(&mut tx, &invoice.id, outcome).await?;
            invoice.paid_cents = outcome.paid.cents();
            invoice.balance_cents = outcome.balance.cents();
            invoice.status = outcome.status;
            invoice.updated_at = now;
        }

        tx.commit().await?;

        info!(
            receipt_number = %payment.receipt_number,
            status = payment.status.as_str(),
            "Mobile payment completed"
        );

        if outcome.is_some() {
            self.notify_received(&invoice, &payment).await;
        }
        Ok(PaymentReceipt { payment, invoice })
    }

    /// Payments on an invoice, oldest first.
    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<FeePayment>> {
        {
            let mut conn = self.pool.acquire().await?;
            ensure_exists(&mut conn, "fee_invoices", "Invoice", invoice_id).await?;
        }
        payments_for_invoice(&self.pool, invoice_id).await
    }

    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<FeePayment> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM fee_payments WHERE receipt_number = ?1");
        sqlx::query_as::<_, FeePayment>(&sql)
            .bind(receipt_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", receipt_number))
    }

    async fn notify_received(&self, invoice: &FeeInvoice, payment: &FeePayment) {
        let notice = NewNotification {
            recipient_id: invoice.student_id.clone(),
            kind: "payment_received".to_string(),
            title: "Payment received".to_string(),
            message: format!(
                "Payment of {} received for invoice {} (receipt {}). Balance: {}.",
                payment.amount(),
                invoice.invoice_number,
                payment.receipt_number,
                invoice.balance()
            ),
        };

        if let Err(e) = NotificationRepository::new(self.pool.clone()).create(&notice).await {
            warn!(
                receipt_number = %payment.receipt_number,
                error = %e,
                "Failed to write payment notification"
            );
        }
    }
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &FeePayment) -> DbResult<()> {
    debug!(receipt_number = %payment.receipt_number, "Inserting payment");

    sqlx::query(
        r#"
        INSERT INTO fee_payments (
            id, invoice_id, receipt_number, method, amount_cents, status,
            reference, checkout_reference, payer_phone, failure_reason,
            recorded_by, created_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.invoice_id)
    .bind(&payment.receipt_number)
    .bind(payment.method)
    .bind(payment.amount_cents)
    .bind(payment.status)
    .bind(&payment.reference)
    .bind(&payment.checkout_reference)
    .bind(&payment.payer_phone)
    .bind(&payment.failure_reason)
    .bind(&payment.recorded_by)
    .bind(payment.created_at)
    .bind(payment.completed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn payments_for_invoice(pool: &SqlitePool, invoice_id: &str) -> DbResult<Vec<FeePayment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM fee_payments WHERE invoice_id = ?1 ORDER BY created_at, receipt_number"
    );
    let payments = sqlx::query_as::<_, FeePayment>(&sql)
        .bind(invoice_id)
        .fetch_all(pool)
        .await?;
    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::invoice::tests::{billing, march};
    use campus_core::{ErrorKind, InvoiceStatus};

    fn cash(invoice_id: &str, units: i64) -> NewPayment {
        NewPayment {
            invoice_id: invoice_id.to_string(),
            amount_cents: Money::from_units(units).cents(),
            method: PaymentMethod::Cash,
            reference: None,
            recorded_by: Some("bursar".to_string()),
        }
    }

    fn mobile(invoice_id: &str, units: i64) -> MobilePaymentRequest {
        MobilePaymentRequest {
            invoice_id: invoice_id.to_string(),
            amount_cents: Money::from_units(units).cents(),
            phone: "0712345678".to_string(),
        }
    }

    fn confirmed(payment: &FeePayment) -> MobileConfirmation {
        MobileConfirmation {
            checkout_reference: payment.checkout_reference.clone().unwrap(),
            success: true,
            gateway_reference: Some("QGH7X2K9LM".to_string()),
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn test_full_payment_settles_invoice() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;

        let receipt = b.db.payments().record(&cash(&invoice.id, 11_400)).await.unwrap();
        assert!(receipt.payment.receipt_number.starts_with("REC"));
        assert_eq!(receipt.payment.receipt_number.len(), "REC".len() + 2 + 6);
        assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);
        assert_eq!(receipt.invoice.balance_cents, 0);

        let stored = b.db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(stored.invoice.status, InvoiceStatus::Paid);
        assert_eq!(stored.invoice.paid_cents, invoice.net_cents);
        assert_eq!(stored.payments.len(), 1);

        let notices = b.db.notifications().list(&b.student.id, true).await.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, "payment_received");
    }

    #[tokio::test]
    async fn test_partial_then_paid_invoice_conflicts() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;

        let first = b.db.payments().record(&cash(&invoice.id, 4_000)).await.unwrap();
        assert_eq!(first.invoice.status, InvoiceStatus::Partial);
        assert_eq!(first.invoice.balance_cents, Money::from_units(7_400).cents());

        let second = b.db.payments().record(&cash(&invoice.id, 7_400)).await.unwrap();
        assert_eq!(second.invoice.status, InvoiceStatus::Paid);
        assert!(second.payment.receipt_number > first.payment.receipt_number);

        let err = b.db.payments().record(&cash(&invoice.id, 1)).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));

        let stored = b.db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(stored.invoice.paid_cents, invoice.net_cents);
        assert_eq!(stored.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_rejected_without_side_effects() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;

        let err = b.db.payments().record(&cash(&invoice.id, 11_401)).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));

        assert!(b.db.payments().list_for_invoice(&invoice.id).await.unwrap().is_empty());
        let prefix = SequenceKind::Receipt.prefix(Utc::now().date_naive());
        assert_eq!(b.db.sequences().current(&prefix).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mobile_payment_lifecycle() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;

        let pending = b.db.payments().initiate_mobile(&mobile(&invoice.id, 11_400)).await.unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);
        assert!(pending.receipt_number.starts_with("MREC"));

        // Nothing moves until the gateway confirms.
        let before = b.db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(before.invoice.paid_cents, 0);

        let receipt = b.db.payments().complete_mobile(&confirmed(&pending)).await.unwrap();
        assert_eq!(receipt.payment.status, PaymentStatus::Success);
        assert_eq!(receipt.payment.reference.as_deref(), Some("QGH7X2K9LM"));
        assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);

        // A replayed callback is refused.
        let err = b.db.payments().complete_mobile(&confirmed(&pending)).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn test_mobile_confirmation_that_would_overpay_fails() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;

        let pending = b.db.payments().initiate_mobile(&mobile(&invoice.id, 10_000)).await.unwrap();
        b.db.payments().record(&cash(&invoice.id, 5_000)).await.unwrap();

        let receipt = b.db.payments().complete_mobile(&confirmed(&pending)).await.unwrap();
        assert_eq!(receipt.payment.status, PaymentStatus::Failed);
        assert!(receipt.payment.failure_reason.is_some());
        assert_eq!(receipt.invoice.paid_cents, Money::from_units(5_000).cents());
        assert_eq!(receipt.invoice.status, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn test_declined_mobile_payment() {
        let b = billing().await;
        let invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap().invoice;
        let pending = b.db.payments().initiate_mobile(&mobile(&invoice.id, 1_000)).await.unwrap();

        let mut declined = confirmed(&pending);
        declined.success = false;
        declined.failure_reason = Some("Request cancelled by user".to_string());

        let receipt = b.db.payments().complete_mobile(&declined).await.unwrap();
        assert_eq!(receipt.payment.status, PaymentStatus::Failed);
        assert_eq!(receipt.invoice.paid_cents, 0);
        assert!(b.db.notifications().list(&b.student.id, false).await.unwrap().is_empty());

        let stored = b.db.payments().get_by_receipt(&pending.receipt_number).await.unwrap();
        assert_eq!(stored.failure_reason.as_deref(), Some("Request cancelled by user"));
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let b = billing().await;
        let err = b.db.payments().record(&cash("missing", 100)).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));

        let err = b.db.payments().list_for_invoice("missing").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }
}
