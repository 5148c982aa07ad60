//! Housekeeping for unpaid orders past their payment deadline.
//!
//! The deadline is enforced live at proof submission; this sweep only tidies
//! the order list, so skipping it never changes what a customer may do.

use rusqlite::Connection;
use serde_json::json;

use super::begin_write;
use crate::db::queries;
use crate::error::Result;
use crate::models::{OrderStatus, PaymentStatus};
use crate::notify::{NotificationEvent, Notifier};

/// Cancel every unpaid, pending order whose deadline has passed. Returns the
/// order numbers that were cancelled.
pub fn sweep_lapsed_orders(
    conn: &mut Connection,
    now: i64,
    notifier: &dyn Notifier,
) -> Result<Vec<String>> {
    let tx = begin_write(conn)?;
    let lapsed = queries::list_lapsed_unpaid_orders(&tx, now)?;

    let mut cancelled = Vec::with_capacity(lapsed.len());
    for order in lapsed {
        if !queries::try_cancel_order(&tx, &order.id, now)? {
            continue;
        }
        queries::record_order_event(
            &tx,
            &order.id,
            Some(order.status),
            OrderStatus::Cancelled,
            PaymentStatus::Unpaid,
            None,
            Some("Payment deadline passed"),
            now,
        )?;
        cancelled.push(order);
    }
    tx.commit()?;

    if !cancelled.is_empty() {
        tracing::info!(count = cancelled.len(), "Cancelled orders past their payment deadline");
    }

    for order in &cancelled {
        notifier.notify(
            &order.user_id,
            NotificationEvent::OrderExpired,
            json!({
                "order_number": order.order_number,
                "payment_deadline": order.payment_deadline,
            }),
        );
    }

    Ok(cancelled.into_iter().map(|o| o.order_number).collect())
}
