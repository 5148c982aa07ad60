//! Line pricing from a product's base price and the license options.
//!
//! Multipliers are kept in tenths so that the whole computation stays in exact
//! integer arithmetic on cents: `price = round(base × type × duration, 2)` becomes
//! `(base_cents × type_tenths × duration_tenths) / 100`, rounded half-up.

use crate::models::{LicenseDuration, LicenseType, Product};

/// Type multiplier in tenths (single-site = 1.0 = 10).
pub fn type_multiplier_tenths(license_type: LicenseType) -> i64 {
    match license_type {
        LicenseType::SingleSite => 10,
        LicenseType::SingleJournal => 7,
        LicenseType::MultiSite => 25,
        LicenseType::MultiJournal => 20,
        LicenseType::Unlimited => 40,
    }
}

/// Duration multiplier in tenths (1-year = 1.0 = 10).
pub fn duration_multiplier_tenths(duration: LicenseDuration) -> i64 {
    match duration {
        LicenseDuration::OneYear => 10,
        LicenseDuration::TwoYears => 18,
        LicenseDuration::Lifetime => 25,
    }
}

/// The price a product is sold at before license options: sale price when set,
/// list price otherwise.
pub fn effective_base_price(product: &Product) -> i64 {
    product.sale_price.unwrap_or(product.base_price)
}

/// Price of one unit in cents. Negative bases are treated as zero; the catalog
/// never stores them.
pub fn line_price(base_price: i64, license_type: LicenseType, duration: LicenseDuration) -> i64 {
    let scaled = i128::from(base_price.max(0))
        * i128::from(type_multiplier_tenths(license_type))
        * i128::from(duration_multiplier_tenths(duration));
    let rounded = (scaled + 50) / 100;
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

/// Current unit price for `product` with the given options.
pub fn quote(product: &Product, license_type: LicenseType, duration: LicenseDuration) -> i64 {
    line_price(effective_base_price(product), license_type, duration)
}
