use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, types::Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    ACTIVATION_COLS, CART_LINE_COLS, LICENSE_COLS, ORDER_COLS, ORDER_EVENT_COLS, ORDER_LINE_COLS,
    PAYMENT_PROOF_COLS, PRODUCT_COLS, USER_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Hash a bearer secret for storage/lookup.
pub fn hash_secret(secret: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"storefront-api-key-v1:");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Unambiguous alphabet for human-typed codes (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_code(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Some(v) sets the column to v, None sets it to NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

/// Generate an API key with sf_ prefix
pub fn generate_api_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sf_{}", hex::encode(bytes))
}

/// Create a user and return it with its plaintext API key (shown once).
pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<(User, String)> {
    let id = gen_id();
    let now = now();
    let api_key = generate_api_key();
    let api_key_hash = hash_secret(&api_key);
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, role, api_key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &email, &input.name, input.role.as_ref(), &api_key_hash, now],
    )?;

    Ok((
        User {
            id,
            email,
            name: input.name.clone(),
            role: input.role,
            api_key_hash,
            created_at: now,
        },
        api_key,
    ))
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<User>> {
    let hash = hash_secret(api_key);
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE api_key_hash = ?1", USER_COLS),
        &[&hash],
    )
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO products (id, name, base_price, sale_price, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![&id, &input.name, input.base_price, input.sale_price, input.active, now, now],
    )?;

    Ok(Product {
        id,
        name: input.name.clone(),
        base_price: input.base_price,
        sale_price: input.sale_price,
        active: input.active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn list_products(conn: &Connection, active_only: bool) -> Result<Vec<Product>> {
    let filter = if active_only { "WHERE active = 1" } else { "" };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM products {} ORDER BY name",
            PRODUCT_COLS, filter
        ),
        [],
    )
}

pub fn update_product(conn: &Connection, id: &str, input: &UpdateProduct) -> Result<bool> {
    let mut builder = UpdateBuilder::new("products", id)
        .with_updated_at()
        .set_opt("name", input.name.clone())
        .set_opt("base_price", input.base_price)
        .set_opt("active", input.active);
    if let Some(sale_price) = input.sale_price {
        builder = builder.set_nullable("sale_price", sale_price);
    }
    builder.execute(conn)
}

// ============ Cart ============

pub fn list_cart_lines(conn: &Connection, user_id: &str) -> Result<Vec<CartLine>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM cart_lines WHERE user_id = ?1 ORDER BY added_at, id",
            CART_LINE_COLS
        ),
        &[&user_id],
    )
}

/// Replace a user's cart with `lines`. Callers run this inside a transaction.
pub fn replace_cart_lines(conn: &Connection, user_id: &str, lines: &[CartLine]) -> Result<()> {
    conn.execute("DELETE FROM cart_lines WHERE user_id = ?1", params![user_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO cart_lines (id, user_id, product_id, license_type, license_duration, quantity, unit_price, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for line in lines {
        stmt.execute(params![
            &line.id,
            user_id,
            &line.product_id,
            line.license_type.as_ref(),
            line.license_duration.as_ref(),
            line.quantity,
            line.unit_price,
            line.added_at,
        ])?;
    }
    Ok(())
}

pub fn clear_cart(conn: &Connection, user_id: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM cart_lines WHERE user_id = ?1", params![user_id])?;
    Ok(deleted)
}

// ============ Orders ============

pub fn insert_order(conn: &Connection, order: &Order) -> Result<()> {
    let billing = serde_json::to_string(&order.billing)?;
    conn.execute(
        "INSERT INTO orders (id, order_number, user_id, subtotal, tax, discount, total_amount, status, payment_status, payment_deadline, idempotency_key, billing, current_proof_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            &order.id,
            &order.order_number,
            &order.user_id,
            order.subtotal,
            order.tax,
            order.discount,
            order.total_amount,
            order.status.as_ref(),
            order.payment_status.as_ref(),
            order.payment_deadline,
            &order.idempotency_key,
            billing,
            &order.current_proof_id,
            order.created_at,
            order.updated_at,
        ],
    )?;
    Ok(())
}

pub fn insert_order_line(conn: &Connection, line: &OrderLine) -> Result<()> {
    conn.execute(
        "INSERT INTO order_lines (id, order_id, position, product_id, product_name, license_type, license_duration, quantity, unit_price, line_total)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &line.id,
            &line.order_id,
            line.position,
            &line.product_id,
            &line.product_name,
            line.license_type.as_ref(),
            line.license_duration.as_ref(),
            line.quantity,
            line.unit_price,
            line.line_total,
        ],
    )?;
    Ok(())
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn get_order_by_number(conn: &Connection, order_number: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_number = ?1", ORDER_COLS),
        &[&order_number],
    )
}

pub fn get_order_by_idempotency_key(
    conn: &Connection,
    user_id: &str,
    idempotency_key: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 AND idempotency_key = ?2",
            ORDER_COLS
        ),
        &[&user_id, &idempotency_key],
    )
}

pub fn order_number_exists(conn: &Connection, order_number: &str) -> Result<bool> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM orders WHERE order_number = ?1",
            params![order_number],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Generate an order number: PREFIX-YYYYMMDD-XXXXXX
pub fn generate_order_number(prefix: &str, timestamp: i64) -> String {
    let date = chrono::DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "00000000".to_string());
    format!("{}-{}-{}", prefix, date, random_code(6))
}

pub fn list_order_lines(conn: &Connection, order_id: &str) -> Result<Vec<OrderLine>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_lines WHERE order_id = ?1 ORDER BY position",
            ORDER_LINE_COLS
        ),
        &[&order_id],
    )
}

pub fn list_orders_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, order_number",
            ORDER_COLS
        ),
        &[&user_id],
    )
}

/// Orders in a given payment state, oldest first (the admin review queue).
pub fn list_orders_by_payment_status(
    conn: &Connection,
    payment_status: PaymentStatus,
) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE payment_status = ?1 ORDER BY updated_at, order_number",
            ORDER_COLS
        ),
        &[&payment_status.as_ref()],
    )
}

/// Compare-and-swap on `payment_status`. Moves the order to
/// `(new_payment, new_status)` only if its payment status is still `expected`.
///
/// Returns `Ok(false)` when another request already moved the order, which is
/// how concurrent admin decisions are made exclusive.
pub fn try_transition_payment(
    conn: &Connection,
    order_id: &str,
    expected: PaymentStatus,
    new_payment: PaymentStatus,
    new_status: OrderStatus,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_status = ?1, status = ?2, updated_at = ?3
         WHERE id = ?4 AND payment_status = ?5",
        params![
            new_payment.as_ref(),
            new_status.as_ref(),
            now,
            order_id,
            expected.as_ref()
        ],
    )?;
    Ok(affected > 0)
}

/// Move `status` forward only if it still holds `expected`.
pub fn try_set_order_status(
    conn: &Connection,
    order_id: &str,
    expected: OrderStatus,
    new_status: OrderStatus,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![new_status.as_ref(), now, order_id, expected.as_ref()],
    )?;
    Ok(affected > 0)
}

pub fn set_current_proof(conn: &Connection, order_id: &str, proof_id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE orders SET current_proof_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![proof_id, now, order_id],
    )?;
    Ok(())
}

/// Cancel an order that hasn't been paid and isn't being reviewed.
pub fn try_cancel_order(conn: &Connection, order_id: &str, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'cancelled', updated_at = ?1
         WHERE id = ?2
           AND payment_status IN ('unpaid', 'rejected')
           AND status NOT IN ('completed', 'cancelled')",
        params![now, order_id],
    )?;
    Ok(affected > 0)
}

/// Unpaid, non-cancelled orders whose payment deadline is before `now`.
pub fn list_lapsed_unpaid_orders(conn: &Connection, now: i64) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE payment_status = 'unpaid' AND status = 'pending' AND payment_deadline < ?1
             ORDER BY payment_deadline",
            ORDER_COLS
        ),
        params![now],
    )
}

// ============ Order Events ============

#[allow(clippy::too_many_arguments)]
pub fn record_order_event(
    conn: &Connection,
    order_id: &str,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    payment_status: PaymentStatus,
    actor: Option<&str>,
    note: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO order_events (id, order_id, from_status, to_status, payment_status, actor, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            gen_id(),
            order_id,
            from_status.map(|s| s.as_ref().to_string()),
            to_status.as_ref(),
            payment_status.as_ref(),
            actor,
            note,
            now
        ],
    )?;
    Ok(())
}

pub fn list_order_events(conn: &Connection, order_id: &str) -> Result<Vec<OrderEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_events WHERE order_id = ?1 ORDER BY created_at, rowid",
            ORDER_EVENT_COLS
        ),
        &[&order_id],
    )
}

// ============ Payment Proofs ============

pub fn insert_payment_proof(conn: &Connection, proof: &PaymentProof) -> Result<()> {
    conn.execute(
        "INSERT INTO payment_proofs (id, order_id, bank_name, account_number, account_name, transfer_amount, transfer_date, image_ref, notes, status, verified_by, verified_at, rejection_reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, NULL, NULL, ?11)",
        params![
            &proof.id,
            &proof.order_id,
            &proof.bank_name,
            &proof.account_number,
            &proof.account_name,
            proof.transfer_amount,
            &proof.transfer_date,
            &proof.image_ref,
            &proof.notes,
            proof.status.as_ref(),
            proof.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_payment_proof_by_id(conn: &Connection, id: &str) -> Result<Option<PaymentProof>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payment_proofs WHERE id = ?1", PAYMENT_PROOF_COLS),
        &[&id],
    )
}

/// All proofs ever submitted for an order, newest first.
pub fn list_payment_proofs_for_order(conn: &Connection, order_id: &str) -> Result<Vec<PaymentProof>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_proofs WHERE order_id = ?1 ORDER BY created_at DESC, rowid DESC",
            PAYMENT_PROOF_COLS
        ),
        &[&order_id],
    )
}

/// Record an admin decision on a pending proof.
pub fn decide_payment_proof(
    conn: &Connection,
    proof_id: &str,
    status: ProofStatus,
    verified_by: &str,
    rejection_reason: Option<&str>,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_proofs
         SET status = ?1, verified_by = ?2, verified_at = ?3, rejection_reason = ?4
         WHERE id = ?5 AND status = 'pending'",
        params![status.as_ref(), verified_by, now, rejection_reason, proof_id],
    )?;
    Ok(affected > 0)
}

// ============ Licenses ============

/// Generate a license key in XXXX-XXXX-XXXX-XXXX format
pub fn generate_license_key() -> String {
    format!(
        "{}-{}-{}-{}",
        random_code(4),
        random_code(4),
        random_code(4),
        random_code(4)
    )
}

pub fn license_key_exists(conn: &Connection, license_key: &str) -> Result<bool> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM licenses WHERE license_key = ?1",
            params![license_key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_license(conn: &Connection, license: &License) -> Result<()> {
    conn.execute(
        "INSERT INTO licenses (id, license_key, order_id, order_line_id, product_id, user_id, license_type, license_duration, max_activations, activated_count, status, activated_at, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            &license.id,
            &license.license_key,
            &license.order_id,
            &license.order_line_id,
            &license.product_id,
            &license.user_id,
            license.license_type.as_ref(),
            license.license_duration.as_ref(),
            license.max_activations.as_column(),
            license.activated_count,
            license.status.as_ref(),
            license.activated_at,
            license.expires_at,
            license.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&id],
    )
}

pub fn get_license_by_key(conn: &Connection, license_key: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_key = ?1", LICENSE_COLS),
        &[&license_key],
    )
}

pub fn get_license_by_order_line(conn: &Connection, order_line_id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE order_line_id = ?1", LICENSE_COLS),
        &[&order_line_id],
    )
}

pub fn list_licenses_for_order(conn: &Connection, order_id: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE order_id = ?1 ORDER BY created_at, rowid",
            LICENSE_COLS
        ),
        &[&order_id],
    )
}

pub fn list_licenses_for_user(conn: &Connection, user_id: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            LICENSE_COLS
        ),
        &[&user_id],
    )
}

pub fn set_license_status(conn: &Connection, id: &str, status: LicenseStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET status = ?1 WHERE id = ?2",
        params![status.as_ref(), id],
    )?;
    Ok(affected > 0)
}

/// Consume one unit of quota if any is left. The condition and the increment
/// are one statement, so two callers can never both take the last unit.
pub fn try_increment_activation_count(conn: &Connection, license_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET activated_count = activated_count + 1
         WHERE id = ?1 AND (max_activations IS NULL OR activated_count < max_activations)",
        params![license_id],
    )?;
    Ok(affected > 0)
}

// ============ Activations ============

pub fn get_activation(
    conn: &Connection,
    license_id: &str,
    domain: &str,
    journal_path: Option<&str>,
) -> Result<Option<LicenseActivation>> {
    let journal_path = journal_path.unwrap_or("");
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_activations
             WHERE license_id = ?1 AND domain = ?2 AND journal_path = ?3",
            ACTIVATION_COLS
        ),
        &[&license_id, &domain, &journal_path],
    )
}

pub fn insert_activation(conn: &Connection, activation: &LicenseActivation) -> Result<()> {
    conn.execute(
        "INSERT INTO license_activations (id, license_id, domain, journal_path, ip_address, product_version, activated_at, last_check_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &activation.id,
            &activation.license_id,
            &activation.domain,
            activation.journal_path.as_deref().unwrap_or(""),
            &activation.ip_address,
            &activation.product_version,
            activation.activated_at,
            activation.last_check_at,
        ],
    )?;
    Ok(())
}

/// Heartbeat: refresh last_check_at and the reported client details.
pub fn touch_activation(
    conn: &Connection,
    id: &str,
    ip_address: Option<&str>,
    product_version: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE license_activations
         SET last_check_at = ?1,
             ip_address = COALESCE(?2, ip_address),
             product_version = COALESCE(?3, product_version)
         WHERE id = ?4",
        params![now, ip_address, product_version, id],
    )?;
    Ok(())
}

pub fn list_activations_for_license(
    conn: &Connection,
    license_id: &str,
) -> Result<Vec<LicenseActivation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_activations WHERE license_id = ?1 ORDER BY activated_at, rowid",
            ACTIVATION_COLS
        ),
        &[&license_id],
    )
}
