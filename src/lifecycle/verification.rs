//! Admin decision on a submitted payment proof.
//!
//! Both decisions start with a compare-and-swap on `payment_status`, so when two
//! admins act on the same order only the first one's write lands; the other
//! sees zero affected rows and gets a state conflict.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use super::begin_write;
use super::checkout::{find_order, with_lines};
use super::issuance::issue_licenses;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{License, Order, OrderStatus, OrderWithLines, PaymentStatus, ProofStatus};
use crate::notify::{NotificationEvent, Notifier};

pub const MAX_REJECTION_REASON_LEN: usize = 500;

#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub order: OrderWithLines,
    pub licenses: Vec<License>,
}

fn already_decided(order: &Order) -> AppError {
    AppError::StateConflict(format!(
        "Order {} is not awaiting payment verification",
        order.order_number
    ))
}

/// Orders with a proof waiting for review, oldest first.
pub fn review_queue(conn: &Connection) -> Result<Vec<Order>> {
    queries::list_orders_by_payment_status(conn, PaymentStatus::PendingVerification)
}

/// Accept the current proof, issue licenses for every line and complete the
/// order. Everything happens in one transaction; an error anywhere leaves the
/// order awaiting verification.
pub fn approve_order(
    conn: &mut Connection,
    order_number: &str,
    admin_id: &str,
    now: i64,
    notifier: &dyn Notifier,
) -> Result<ApprovalOutcome> {
    let tx = begin_write(conn)?;
    let order = find_order(&tx, order_number, None)?;

    if !queries::try_transition_payment(
        &tx,
        &order.id,
        PaymentStatus::PendingVerification,
        PaymentStatus::Paid,
        OrderStatus::Processing,
        now,
    )? {
        return Err(already_decided(&order));
    }

    let proof_id = order
        .current_proof_id
        .as_deref()
        .ok_or_else(|| AppError::Internal("Order under review has no payment proof".into()))?;
    if !queries::decide_payment_proof(&tx, proof_id, ProofStatus::Verified, admin_id, None, now)? {
        return Err(already_decided(&order));
    }
    queries::record_order_event(
        &tx,
        &order.id,
        Some(order.status),
        OrderStatus::Processing,
        PaymentStatus::Paid,
        Some(admin_id),
        Some("Payment verified"),
        now,
    )?;

    let lines = queries::list_order_lines(&tx, &order.id)?;
    let licenses = issue_licenses(&tx, &order, &lines, now)?;

    if !queries::try_set_order_status(
        &tx,
        &order.id,
        OrderStatus::Processing,
        OrderStatus::Completed,
        now,
    )? {
        return Err(AppError::Internal(
            "Order left processing during approval".into(),
        ));
    }
    queries::record_order_event(
        &tx,
        &order.id,
        Some(OrderStatus::Processing),
        OrderStatus::Completed,
        PaymentStatus::Paid,
        Some(admin_id),
        Some("Licenses issued"),
        now,
    )?;

    let completed = queries::get_order_by_id(&tx, &order.id)?
        .ok_or_else(|| AppError::Internal("Order vanished during approval".into()))?;
    let completed = with_lines(&tx, completed, now)?;
    tx.commit()?;

    tracing::info!(
        order_number = %order.order_number,
        admin_id = %admin_id,
        licenses = licenses.len(),
        "Payment approved and licenses issued"
    );

    notifier.notify(
        &order.user_id,
        NotificationEvent::OrderCompleted,
        json!({
            "order_number": order.order_number,
            "total_amount": order.total_amount,
        }),
    );
    notifier.notify(
        &order.user_id,
        NotificationEvent::LicensesIssued,
        json!({
            "order_number": order.order_number,
            "licenses": licenses
                .iter()
                .map(|l| json!({
                    "license_key": l.license_key,
                    "product_id": l.product_id,
                    "license_type": l.license_type,
                    "license_duration": l.license_duration,
                    "expires_at": l.expires_at,
                }))
                .collect::<Vec<_>>(),
        }),
    );

    Ok(ApprovalOutcome {
        order: completed,
        licenses,
    })
}

fn validate_reason(reason: &str) -> Result<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("A rejection reason is required".into()));
    }
    if reason.chars().count() > MAX_REJECTION_REASON_LEN {
        return Err(AppError::Validation(format!(
            "Rejection reason must be at most {} characters",
            MAX_REJECTION_REASON_LEN
        )));
    }
    Ok(reason)
}

/// Reject the current proof. The customer may resubmit afterwards under the
/// same order number.
pub fn reject_order(
    conn: &mut Connection,
    order_number: &str,
    admin_id: &str,
    reason: &str,
    now: i64,
    notifier: &dyn Notifier,
) -> Result<OrderWithLines> {
    let reason = validate_reason(reason)?;

    let tx = begin_write(conn)?;
    let order = find_order(&tx, order_number, None)?;

    if !queries::try_transition_payment(
        &tx,
        &order.id,
        PaymentStatus::PendingVerification,
        PaymentStatus::Rejected,
        OrderStatus::PaymentRejected,
        now,
    )? {
        return Err(already_decided(&order));
    }

    if let Some(proof_id) = order.current_proof_id.as_deref() {
        let decided = queries::decide_payment_proof(
            &tx,
            proof_id,
            ProofStatus::Rejected,
            admin_id,
            Some(reason),
            now,
        )?;
        if !decided {
            return Err(already_decided(&order));
        }
    }
    queries::record_order_event(
        &tx,
        &order.id,
        Some(order.status),
        OrderStatus::PaymentRejected,
        PaymentStatus::Rejected,
        Some(admin_id),
        Some(reason),
        now,
    )?;

    let rejected = queries::get_order_by_id(&tx, &order.id)?
        .ok_or_else(|| AppError::Internal("Order vanished during rejection".into()))?;
    let rejected = with_lines(&tx, rejected, now)?;
    tx.commit()?;

    tracing::info!(
        order_number = %order.order_number,
        admin_id = %admin_id,
        "Payment proof rejected"
    );

    notifier.notify(
        &order.user_id,
        NotificationEvent::PaymentRejected,
        json!({
            "order_number": order.order_number,
            "reason": reason,
        }),
    );

    Ok(rejected)
}
