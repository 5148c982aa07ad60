//! Cart aggregate: one set of lines per user, re-priced through the pricing
//! engine whenever a line's license options change.

use rusqlite::Connection;

use super::begin_write;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    AddCartLine, CartLine, CartSnapshot, LicenseDuration, LicenseType, MAX_LINE_QUANTITY,
    MAX_PRICE, MIN_LINE_QUANTITY, Product, UpdateCartLine,
};
use crate::pricing;

/// Reject (never clamp) a requested quantity outside `[1, 10]`.
pub fn validate_quantity(quantity: i32) -> Result<()> {
    if !(MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(AppError::Validation(format!(
            "Quantity must be between {} and {}",
            MIN_LINE_QUANTITY, MAX_LINE_QUANTITY
        )));
    }
    Ok(())
}

fn ensure_purchasable(product: &Product) -> Result<()> {
    if !product.active {
        return Err(AppError::Validation(format!(
            "{} is no longer available",
            product.name
        )));
    }
    if pricing::effective_base_price(product) > MAX_PRICE {
        return Err(AppError::Validation(format!(
            "{} is not priced for sale",
            product.name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Cart {
    user_id: String,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(user_id: impl Into<String>, lines: Vec<CartLine>) -> Self {
        Self {
            user_id: user_id.into(),
            lines,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` of a product. A line with the same product, type and
    /// duration absorbs the quantity (capped at the per-line maximum) instead of
    /// a second line being created.
    pub fn add(
        &mut self,
        product: &Product,
        license_type: LicenseType,
        license_duration: LicenseDuration,
        quantity: i32,
        now: i64,
    ) -> Result<&CartLine> {
        validate_quantity(quantity)?;
        ensure_purchasable(product)?;
        let unit_price = pricing::quote(product, license_type, license_duration);

        let idx = match self
            .lines
            .iter()
            .position(|l| l.same_item(&product.id, license_type, license_duration))
        {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = (line.quantity + quantity).min(MAX_LINE_QUANTITY);
                line.unit_price = unit_price;
                idx
            }
            None => {
                self.lines.push(CartLine {
                    id: queries::gen_id(),
                    product_id: product.id.clone(),
                    license_type,
                    license_duration,
                    quantity,
                    unit_price,
                    added_at: now,
                });
                self.lines.len() - 1
            }
        };
        Ok(&self.lines[idx])
    }

    /// Apply a partial update to a line. Changing the license type or duration
    /// re-prices the line from `product`; a quantity-only change keeps the
    /// cached unit price. If the new options match another line, the two merge.
    pub fn update(
        &mut self,
        line_id: &str,
        changes: &UpdateCartLine,
        product: &Product,
    ) -> Result<()> {
        let idx = self.position(line_id)?;
        if let Some(quantity) = changes.quantity {
            validate_quantity(quantity)?;
        }

        let current = &self.lines[idx];
        if current.product_id != product.id {
            return Err(AppError::Internal("Cart line priced against wrong product".into()));
        }
        let license_type = changes.license_type.unwrap_or(current.license_type);
        let license_duration = changes.license_duration.unwrap_or(current.license_duration);
        let quantity = changes.quantity.unwrap_or(current.quantity);
        let options_changed =
            license_type != current.license_type || license_duration != current.license_duration;

        if !options_changed {
            self.lines[idx].quantity = quantity;
            return Ok(());
        }

        ensure_purchasable(product)?;
        let unit_price = pricing::quote(product, license_type, license_duration);

        let twin = self.lines.iter().enumerate().position(|(i, l)| {
            i != idx && l.same_item(&product.id, license_type, license_duration)
        });
        match twin {
            Some(twin) => {
                let other = &mut self.lines[twin];
                other.quantity = (other.quantity + quantity).min(MAX_LINE_QUANTITY);
                other.unit_price = unit_price;
                self.lines.remove(idx);
            }
            None => {
                let line = &mut self.lines[idx];
                line.license_type = license_type;
                line.license_duration = license_duration;
                line.quantity = quantity;
                line.unit_price = unit_price;
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, line_id: &str) -> Result<()> {
        let idx = self.position(line_id)?;
        self.lines.remove(idx);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Lines plus totals, computed from the current line set.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            subtotal: self
                .lines
                .iter()
                .fold(0, |acc: i64, l| acc.saturating_add(l.line_total())),
            item_count: self.lines.iter().map(|l| l.quantity).sum(),
        }
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    fn position(&self, line_id: &str) -> Result<usize> {
        self.lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| AppError::NotFound("Cart line not found".into()))
    }
}

pub fn load_cart(conn: &Connection, user_id: &str) -> Result<Cart> {
    Ok(Cart::new(user_id, queries::list_cart_lines(conn, user_id)?))
}

pub fn cart_snapshot(conn: &Connection, user_id: &str) -> Result<CartSnapshot> {
    Ok(load_cart(conn, user_id)?.snapshot())
}

pub fn add_to_cart(
    conn: &mut Connection,
    user_id: &str,
    input: &AddCartLine,
    now: i64,
) -> Result<CartSnapshot> {
    let tx = begin_write(conn)?;
    let product = queries::get_product_by_id(&tx, &input.product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    let mut cart = load_cart(&tx, user_id)?;
    cart.add(
        &product,
        input.license_type,
        input.license_duration,
        input.quantity,
        now,
    )?;
    queries::replace_cart_lines(&tx, user_id, cart.lines())?;
    tx.commit()?;

    Ok(cart.snapshot())
}

pub fn update_cart_line(
    conn: &mut Connection,
    user_id: &str,
    line_id: &str,
    changes: &UpdateCartLine,
) -> Result<CartSnapshot> {
    let tx = begin_write(conn)?;
    let mut cart = load_cart(&tx, user_id)?;
    let product_id = cart
        .line(line_id)
        .map(|l| l.product_id.clone())
        .ok_or_else(|| AppError::NotFound("Cart line not found".into()))?;
    let product = queries::get_product_by_id(&tx, &product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    cart.update(line_id, changes, &product)?;
    queries::replace_cart_lines(&tx, user_id, cart.lines())?;
    tx.commit()?;

    Ok(cart.snapshot())
}

pub fn remove_cart_line(conn: &mut Connection, user_id: &str, line_id: &str) -> Result<CartSnapshot> {
    let tx = begin_write(conn)?;
    let mut cart = load_cart(&tx, user_id)?;
    cart.remove(line_id)?;
    queries::replace_cart_lines(&tx, user_id, cart.lines())?;
    tx.commit()?;

    Ok(cart.snapshot())
}

pub fn clear_cart(conn: &Connection, user_id: &str) -> Result<CartSnapshot> {
    queries::clear_cart(conn, user_id)?;
    Ok(Cart::new(user_id, Vec::new()).snapshot())
}
