//! Row mapping for the query layer. Each model has a column list constant and a
//! `FromRow` impl that reads the columns in that order.

use std::str::FromStr;

use rusqlite::{Connection, Params, Row, types::Type};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Read a TEXT column into a strum enum.
fn get_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_opt_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| {
        r.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub const USER_COLS: &str = "id, email, name, role, api_key_hash, created_at";

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: get_enum(row, 3)?,
            api_key_hash: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub const PRODUCT_COLS: &str = "id, name, base_price, sale_price, active, created_at, updated_at";

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            base_price: row.get(2)?,
            sale_price: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

pub const CART_LINE_COLS: &str =
    "id, product_id, license_type, license_duration, quantity, unit_price, added_at";

impl FromRow for CartLine {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CartLine {
            id: row.get(0)?,
            product_id: row.get(1)?,
            license_type: get_enum(row, 2)?,
            license_duration: get_enum(row, 3)?,
            quantity: row.get(4)?,
            unit_price: row.get(5)?,
            added_at: row.get(6)?,
        })
    }
}

pub const ORDER_COLS: &str = "id, order_number, user_id, subtotal, tax, discount, total_amount, status, payment_status, payment_deadline, idempotency_key, billing, current_proof_id, created_at, updated_at";

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let billing_json: String = row.get(11)?;
        let billing = serde_json::from_str(&billing_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;
        Ok(Order {
            id: row.get(0)?,
            order_number: row.get(1)?,
            user_id: row.get(2)?,
            subtotal: row.get(3)?,
            tax: row.get(4)?,
            discount: row.get(5)?,
            total_amount: row.get(6)?,
            status: get_enum(row, 7)?,
            payment_status: get_enum(row, 8)?,
            payment_deadline: row.get(9)?,
            idempotency_key: row.get(10)?,
            billing,
            current_proof_id: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

pub const ORDER_LINE_COLS: &str = "id, order_id, position, product_id, product_name, license_type, license_duration, quantity, unit_price, line_total";

impl FromRow for OrderLine {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderLine {
            id: row.get(0)?,
            order_id: row.get(1)?,
            position: row.get(2)?,
            product_id: row.get(3)?,
            product_name: row.get(4)?,
            license_type: get_enum(row, 5)?,
            license_duration: get_enum(row, 6)?,
            quantity: row.get(7)?,
            unit_price: row.get(8)?,
            line_total: row.get(9)?,
        })
    }
}

pub const ORDER_EVENT_COLS: &str =
    "id, order_id, from_status, to_status, payment_status, actor, note, created_at";

impl FromRow for OrderEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderEvent {
            id: row.get(0)?,
            order_id: row.get(1)?,
            from_status: get_opt_enum(row, 2)?,
            to_status: get_enum(row, 3)?,
            payment_status: get_enum(row, 4)?,
            actor: row.get(5)?,
            note: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

pub const PAYMENT_PROOF_COLS: &str = "id, order_id, bank_name, account_number, account_name, transfer_amount, transfer_date, image_ref, notes, status, verified_by, verified_at, rejection_reason, created_at";

impl FromRow for PaymentProof {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentProof {
            id: row.get(0)?,
            order_id: row.get(1)?,
            bank_name: row.get(2)?,
            account_number: row.get(3)?,
            account_name: row.get(4)?,
            transfer_amount: row.get(5)?,
            transfer_date: row.get(6)?,
            image_ref: row.get(7)?,
            notes: row.get(8)?,
            status: get_enum(row, 9)?,
            verified_by: row.get(10)?,
            verified_at: row.get(11)?,
            rejection_reason: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

pub const LICENSE_COLS: &str = "id, license_key, order_id, order_line_id, product_id, user_id, license_type, license_duration, max_activations, activated_count, status, activated_at, expires_at, created_at";

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key: row.get(1)?,
            order_id: row.get(2)?,
            order_line_id: row.get(3)?,
            product_id: row.get(4)?,
            user_id: row.get(5)?,
            license_type: get_enum(row, 6)?,
            license_duration: get_enum(row, 7)?,
            max_activations: row.get::<_, Option<i32>>(8)?.into(),
            activated_count: row.get(9)?,
            status: get_enum(row, 10)?,
            activated_at: row.get(11)?,
            expires_at: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

pub const ACTIVATION_COLS: &str = "id, license_id, domain, journal_path, ip_address, product_version, activated_at, last_check_at";

impl FromRow for LicenseActivation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        // journal_path is stored as '' when absent so the unique index covers it
        let journal_path: String = row.get(3)?;
        Ok(LicenseActivation {
            id: row.get(0)?,
            license_id: row.get(1)?,
            domain: row.get(2)?,
            journal_path: (!journal_path.is_empty()).then_some(journal_path),
            ip_address: row.get(4)?,
            product_version: row.get(5)?,
            activated_at: row.get(6)?,
            last_check_at: row.get(7)?,
        })
    }
}
