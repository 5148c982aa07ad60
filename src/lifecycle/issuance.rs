//! License issuance for a paid order.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    ActivationLimit, License, LicenseDuration, LicenseStatus, LicenseType, Order, OrderLine,
};
use crate::util::SECONDS_PER_DAY;

const LICENSE_KEY_ATTEMPTS: usize = 5;

pub fn max_activations_for(license_type: LicenseType) -> ActivationLimit {
    match license_type {
        LicenseType::SingleSite | LicenseType::SingleJournal => ActivationLimit::Limited(1),
        LicenseType::MultiSite | LicenseType::MultiJournal => ActivationLimit::Limited(5),
        LicenseType::Unlimited => ActivationLimit::Unlimited,
    }
}

/// Expiry timestamp, None for lifetime licenses.
pub fn expires_at_for(duration: LicenseDuration, issued_at: i64) -> Option<i64> {
    match duration {
        LicenseDuration::OneYear => Some(issued_at + 365 * SECONDS_PER_DAY),
        LicenseDuration::TwoYears => Some(issued_at + 730 * SECONDS_PER_DAY),
        LicenseDuration::Lifetime => None,
    }
}

fn allocate_license_key(conn: &Connection) -> Result<String> {
    for _ in 0..LICENSE_KEY_ATTEMPTS {
        let key = queries::generate_license_key();
        if !queries::license_key_exists(conn, &key)? {
            return Ok(key);
        }
        tracing::warn!("License key collision, regenerating");
    }
    Err(AppError::Internal("Could not allocate a unique license key".into()))
}

/// Issue one license per order line. Must run inside the caller's write
/// transaction. Lines that already have a license keep it, so calling this
/// twice for the same order never duplicates.
pub fn issue_licenses(
    conn: &Connection,
    order: &Order,
    lines: &[OrderLine],
    now: i64,
) -> Result<Vec<License>> {
    let mut licenses = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(existing) = queries::get_license_by_order_line(conn, &line.id)? {
            licenses.push(existing);
            continue;
        }

        let license = License {
            id: queries::gen_id(),
            license_key: allocate_license_key(conn)?,
            order_id: order.id.clone(),
            order_line_id: line.id.clone(),
            product_id: line.product_id.clone(),
            user_id: order.user_id.clone(),
            license_type: line.license_type,
            license_duration: line.license_duration,
            max_activations: max_activations_for(line.license_type),
            activated_count: 0,
            status: LicenseStatus::Active,
            activated_at: Some(now),
            expires_at: expires_at_for(line.license_duration, now),
            created_at: now,
        };
        queries::insert_license(conn, &license)?;
        licenses.push(license);
    }
    Ok(licenses)
}
