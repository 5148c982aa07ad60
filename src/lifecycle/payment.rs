//! Payment proof submission for manual bank transfers.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use super::begin_write;
use super::checkout::find_order;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{OrderStatus, PaymentProof, PaymentStatus, ProofStatus, SubmitPaymentProof};
use crate::util::clean_optional_text;

const MAX_FIELD_LEN: usize = 255;
const MAX_NOTES_LEN: usize = 1000;

/// Proof fields after trimming and validation.
#[derive(Debug)]
struct CleanProof {
    bank_name: String,
    account_number: String,
    account_name: String,
    transfer_amount: i64,
    transfer_date: String,
    notes: Option<String>,
}

fn required(name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            name, MAX_FIELD_LEN
        )));
    }
    Ok(value.to_string())
}

fn validate_proof(input: &SubmitPaymentProof, now: i64) -> Result<CleanProof> {
    if input.transfer_amount <= 0 {
        return Err(AppError::Validation(
            "transfer_amount must be greater than zero".into(),
        ));
    }

    let date = NaiveDate::parse_from_str(input.transfer_date.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation("transfer_date must be a date in YYYY-MM-DD format".into())
    })?;
    let today = DateTime::<Utc>::from_timestamp(now, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| AppError::Internal("Clock out of range".into()))?;
    if date > today {
        return Err(AppError::Validation(
            "transfer_date cannot be in the future".into(),
        ));
    }

    Ok(CleanProof {
        bank_name: required("bank_name", &input.bank_name)?,
        account_number: required("account_number", &input.account_number)?,
        account_name: required("account_name", &input.account_name)?,
        transfer_amount: input.transfer_amount,
        transfer_date: date.format("%Y-%m-%d").to_string(),
        notes: clean_optional_text(input.notes.as_deref(), MAX_NOTES_LEN),
    })
}

/// Attach a payment proof to one of the user's orders and queue it for review.
///
/// Accepted from `unpaid` (before the deadline) and `rejected`; the new proof
/// becomes the order's current proof and earlier ones stay on record.
pub fn submit_proof(
    conn: &mut Connection,
    user_id: &str,
    order_number: &str,
    input: &SubmitPaymentProof,
    image_ref: &str,
    now: i64,
) -> Result<PaymentProof> {
    let fields = validate_proof(input, now)?;
    if image_ref.trim().is_empty() {
        return Err(AppError::Validation("Payment proof image is required".into()));
    }

    let tx = begin_write(conn)?;
    let order = find_order(&tx, order_number, Some(user_id))?;

    if order.status.is_terminal() {
        return Err(AppError::StateConflict(format!(
            "Order {} is {} and no longer accepts payment proofs",
            order.order_number,
            order.status.as_ref()
        )));
    }
    match order.payment_status {
        PaymentStatus::Unpaid if now > order.payment_deadline => {
            return Err(AppError::DeadlineExpired);
        }
        PaymentStatus::Unpaid | PaymentStatus::Rejected => {}
        PaymentStatus::PendingVerification | PaymentStatus::Paid => {
            return Err(AppError::StateConflict(format!(
                "Order {} already has a payment under review or accepted",
                order.order_number
            )));
        }
    }

    if !queries::try_transition_payment(
        &tx,
        &order.id,
        order.payment_status,
        PaymentStatus::PendingVerification,
        OrderStatus::AwaitingVerification,
        now,
    )? {
        return Err(AppError::StateConflict(format!(
            "Order {} changed while submitting the proof",
            order.order_number
        )));
    }

    let proof = PaymentProof {
        id: queries::gen_id(),
        order_id: order.id.clone(),
        bank_name: fields.bank_name,
        account_number: fields.account_number,
        account_name: fields.account_name,
        transfer_amount: fields.transfer_amount,
        transfer_date: fields.transfer_date,
        image_ref: image_ref.to_string(),
        notes: fields.notes,
        status: ProofStatus::Pending,
        verified_by: None,
        verified_at: None,
        rejection_reason: None,
        created_at: now,
    };
    queries::insert_payment_proof(&tx, &proof)?;
    queries::set_current_proof(&tx, &order.id, &proof.id, now)?;

    let note = match order.payment_status {
        PaymentStatus::Rejected => "Payment proof resubmitted",
        _ => "Payment proof submitted",
    };
    queries::record_order_event(
        &tx,
        &order.id,
        Some(order.status),
        OrderStatus::AwaitingVerification,
        PaymentStatus::PendingVerification,
        Some(user_id),
        Some(note),
        now,
    )?;
    tx.commit()?;

    if proof.transfer_amount != order.total_amount {
        tracing::warn!(
            order_number = %order.order_number,
            expected = order.total_amount,
            reported = proof.transfer_amount,
            "Payment proof amount differs from order total"
        );
    }
    tracing::info!(order_number = %order.order_number, proof_id = %proof.id, "Payment proof submitted");

    Ok(proof)
}

/// Proof history for an order, newest first.
pub fn list_proofs(
    conn: &Connection,
    order_number: &str,
    owner: Option<&str>,
) -> Result<Vec<PaymentProof>> {
    let order = find_order(conn, order_number, owner)?;
    queries::list_payment_proofs_for_order(conn, &order.id)
}
