//! Order builder: turns a user's cart into an immutable, priced order.

use rusqlite::Connection;

use super::{CheckoutSettings, begin_write};
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    BillingInfo, CreateOrder, MAX_PRICE, Order, OrderLine, OrderStatus, OrderWithLines,
    PaymentStatus,
};
use crate::pricing;

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
const MAX_BILLING_FIELD_LEN: usize = 255;
const ORDER_NUMBER_ATTEMPTS: usize = 5;

fn total_too_large() -> AppError {
    AppError::Validation("Order total is too large".into())
}

/// `round(subtotal × rate)` with the rate in basis points, half-up.
pub fn compute_tax(subtotal: i64, tax_basis_points: i64) -> i64 {
    let scaled = i128::from(subtotal) * i128::from(tax_basis_points.max(0));
    i64::try_from((scaled + 5_000) / 10_000).unwrap_or(i64::MAX)
}

fn validate_idempotency_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() || key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::Validation(format!(
            "idempotency_key must be 1-{} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(key)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Trim every field, check the required ones, and normalise blank optionals to None.
pub fn validate_billing(billing: &BillingInfo) -> Result<BillingInfo> {
    let required = |name: &str, value: &str| -> Result<String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(format!("billing.{} is required", name)));
        }
        if value.chars().count() > MAX_BILLING_FIELD_LEN {
            return Err(AppError::Validation(format!(
                "billing.{} must be at most {} characters",
                name, MAX_BILLING_FIELD_LEN
            )));
        }
        Ok(value.to_string())
    };

    let cleaned = BillingInfo {
        name: required("name", &billing.name)?,
        email: required("email", &billing.email)?.to_lowercase(),
        phone: required("phone", &billing.phone)?,
        country: required("country", &billing.country)?,
        address: required("address", &billing.address)?,
        city: required("city", &billing.city)?,
        company: crate::util::clean_optional_text(billing.company.as_deref(), MAX_BILLING_FIELD_LEN),
        postal_code: crate::util::clean_optional_text(
            billing.postal_code.as_deref(),
            MAX_BILLING_FIELD_LEN,
        ),
    };

    if !looks_like_email(&cleaned.email) {
        return Err(AppError::Validation("billing.email is not a valid address".into()));
    }
    Ok(cleaned)
}

pub(crate) fn with_lines(conn: &Connection, order: Order, now: i64) -> Result<OrderWithLines> {
    let lines = queries::list_order_lines(conn, &order.id)?;
    let payment_expired = order.is_payment_expired(now);
    Ok(OrderWithLines {
        order,
        lines,
        payment_expired,
    })
}

fn allocate_order_number(conn: &Connection, prefix: &str, now: i64) -> Result<String> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = queries::generate_order_number(prefix, now);
        if !queries::order_number_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(order_number = %candidate, "Order number collision, regenerating");
    }
    Err(AppError::Internal(
        "Could not allocate a unique order number".into(),
    ))
}

/// Create an order from the user's cart.
///
/// Replaying the same idempotency key returns the order created the first
/// time, even after the cart has been emptied by that first call.
pub fn create_order(
    conn: &mut Connection,
    user_id: &str,
    input: &CreateOrder,
    settings: &CheckoutSettings,
    now: i64,
) -> Result<OrderWithLines> {
    let key = validate_idempotency_key(&input.idempotency_key)?;

    let tx = begin_write(conn)?;
    if let Some(existing) = queries::get_order_by_idempotency_key(&tx, user_id, key)? {
        tracing::debug!(order_number = %existing.order_number, "Idempotent order replay");
        return with_lines(&tx, existing, now);
    }

    let billing = validate_billing(&input.billing)?;
    let cart_lines = queries::list_cart_lines(&tx, user_id)?;
    if cart_lines.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    let order_id = queries::gen_id();
    let mut lines = Vec::with_capacity(cart_lines.len());
    for (position, cart_line) in cart_lines.iter().enumerate() {
        let product = queries::get_product_by_id(&tx, &cart_line.product_id)?
            .filter(|p| p.active && pricing::effective_base_price(p) <= MAX_PRICE)
            .ok_or_else(|| {
                AppError::Validation(
                    "A product in your cart is no longer available. Please remove it and try again."
                        .into(),
                )
            })?;

        let unit_price = pricing::quote(&product, cart_line.license_type, cart_line.license_duration);
        lines.push(OrderLine {
            id: queries::gen_id(),
            order_id: order_id.clone(),
            position: position as i32,
            product_id: product.id,
            product_name: product.name,
            license_type: cart_line.license_type,
            license_duration: cart_line.license_duration,
            quantity: cart_line.quantity,
            unit_price,
            line_total: unit_price
                .checked_mul(i64::from(cart_line.quantity))
                .ok_or_else(total_too_large)?,
        });
    }

    let subtotal = lines
        .iter()
        .try_fold(0_i64, |acc, l| acc.checked_add(l.line_total))
        .ok_or_else(total_too_large)?;
    let tax = compute_tax(subtotal, settings.tax_basis_points);
    let discount = 0;
    let total_amount = subtotal
        .checked_add(tax)
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(total_too_large)?;

    let order = Order {
        id: order_id,
        order_number: allocate_order_number(&tx, &settings.order_number_prefix, now)?,
        user_id: user_id.to_string(),
        subtotal,
        tax,
        discount,
        total_amount,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        payment_deadline: now.saturating_add(settings.payment_window_secs),
        idempotency_key: key.to_string(),
        billing,
        current_proof_id: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::insert_order(&tx, &order) {
        if e.is_constraint_violation() {
            drop(tx);
            if let Some(existing) = queries::get_order_by_idempotency_key(conn, user_id, key)? {
                return with_lines(conn, existing, now);
            }
        }
        return Err(e);
    }
    for line in &lines {
        queries::insert_order_line(&tx, line)?;
    }
    queries::record_order_event(
        &tx,
        &order.id,
        None,
        OrderStatus::Pending,
        PaymentStatus::Unpaid,
        Some(user_id),
        None,
        now,
    )?;
    queries::clear_cart(&tx, user_id)?;
    tx.commit()?;

    tracing::info!(
        order_number = %order.order_number,
        user_id = %user_id,
        total_amount = order.total_amount,
        lines = lines.len(),
        "Order created"
    );

    let payment_expired = order.is_payment_expired(now);
    Ok(OrderWithLines {
        order,
        lines,
        payment_expired,
    })
}

/// Look up an order by number. `owner` restricts the lookup to one user's
/// orders; other users' orders are reported as not found.
pub fn find_order(conn: &Connection, order_number: &str, owner: Option<&str>) -> Result<Order> {
    queries::get_order_by_number(conn, order_number)?
        .filter(|o| owner.is_none_or(|user_id| o.user_id == user_id))
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

pub fn get_order(
    conn: &Connection,
    order_number: &str,
    owner: Option<&str>,
    now: i64,
) -> Result<OrderWithLines> {
    let order = find_order(conn, order_number, owner)?;
    with_lines(conn, order, now)
}

/// Customer cancellation, allowed until a proof is under review or accepted.
pub fn cancel_order(
    conn: &mut Connection,
    user_id: &str,
    order_number: &str,
    now: i64,
) -> Result<OrderWithLines> {
    let tx = begin_write(conn)?;
    let order = find_order(&tx, order_number, Some(user_id))?;

    if !queries::try_cancel_order(&tx, &order.id, now)? {
        return Err(AppError::StateConflict(format!(
            "Order {} can no longer be cancelled",
            order.order_number
        )));
    }
    queries::record_order_event(
        &tx,
        &order.id,
        Some(order.status),
        OrderStatus::Cancelled,
        order.payment_status,
        Some(user_id),
        Some("Cancelled by customer"),
        now,
    )?;
    let cancelled = queries::get_order_by_id(&tx, &order.id)?
        .ok_or_else(|| AppError::Internal("Order vanished during cancel".into()))?;
    let result = with_lines(&tx, cancelled, now)?;
    tx.commit()?;

    tracing::info!(order_number = %order.order_number, "Order cancelled by customer");
    Ok(result)
}
