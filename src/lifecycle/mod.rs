//! The order → payment → license lifecycle.
//!
//! Every mutating operation here runs in a single SQLite transaction opened
//! with IMMEDIATE behaviour, so the write lock is held from the first read and
//! no other writer can interleave between a check and the write it guards.
//! Notifications are sent only after commit.
//!
//! # PostgreSQL Migration Note
//! The guards are written as conditional UPDATEs (`WHERE payment_status = ?`,
//! `WHERE activated_count < max_activations`) so they stay correct under row
//! locking; SQLite's IMMEDIATE transactions additionally serialise all writers.

pub mod activation;
pub mod cart;
pub mod checkout;
pub mod deadline;
pub mod issuance;
pub mod payment;
pub mod verification;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::Result;

/// Checkout parameters injected by the caller (never read from globals), so
/// tests can pin them.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Flat tax rate in basis points (11% = 1100)
    pub tax_basis_points: i64,
    /// Time from order creation to payment deadline
    pub payment_window_secs: i64,
    pub order_number_prefix: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            tax_basis_points: 0,
            payment_window_secs: 3 * crate::util::SECONDS_PER_DAY,
            order_number_prefix: "ORD".to_string(),
        }
    }
}

/// Open a write transaction that takes the database write lock immediately.
pub(crate) fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}
