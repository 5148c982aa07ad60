use serde::{Deserialize, Serialize};

use super::{LicenseDuration, LicenseType};

pub const MIN_LINE_QUANTITY: i32 = 1;
pub const MAX_LINE_QUANTITY: i32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub license_type: LicenseType,
    pub license_duration: LicenseDuration,
    pub quantity: i32,
    /// Priced when the line was added or its type/duration last changed
    pub unit_price: i64,
    pub added_at: i64,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }

    pub fn same_item(
        &self,
        product_id: &str,
        license_type: LicenseType,
        license_duration: LicenseDuration,
    ) -> bool {
        self.product_id == product_id
            && self.license_type == license_type
            && self.license_duration == license_duration
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartLine {
    pub product_id: String,
    pub license_type: LicenseType,
    pub license_duration: LicenseDuration,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Partial update of a cart line. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCartLine {
    pub license_type: Option<LicenseType>,
    pub license_duration: Option<LicenseDuration>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub subtotal: i64,
    /// Sum of quantities across lines
    pub item_count: i32,
}
