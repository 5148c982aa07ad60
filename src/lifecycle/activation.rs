//! Activation ledger: per-site installs counted against a license's quota.

use rusqlite::Connection;
use serde::Serialize;

use super::begin_write;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    ActivationLimit, ActivationMetadata, License, LicenseActivation, LicenseStatus,
    LicenseStatusView, LicenseWithStatus,
};
use crate::util::{clean_optional_text, normalize_domain, normalize_journal_path};

const MAX_METADATA_LEN: usize = 64;

#[derive(Debug, Serialize)]
pub struct ActivationOutcome {
    pub activation: LicenseActivation,
    /// False when this was a heartbeat from an already-activated site
    pub created: bool,
    /// None when the license is unlimited
    pub remaining_activations: Option<i32>,
}

fn find_license(conn: &Connection, license_key: &str) -> Result<License> {
    let key = license_key.trim().to_uppercase();
    queries::get_license_by_key(conn, &key)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))
}

/// Fail unless the license is usable at `now`.
fn ensure_usable(license: &License, now: i64) -> Result<()> {
    match license.effective_status(now) {
        LicenseStatus::Active => Ok(()),
        LicenseStatus::Suspended => Err(AppError::LicenseSuspended),
        LicenseStatus::Expired => Err(AppError::LicenseExpired),
        LicenseStatus::Pending => Err(AppError::StateConflict(
            "License has not been activated yet".into(),
        )),
    }
}

/// Register (or refresh) an install of a license on `domain` and optional
/// `journal_path`.
///
/// A site that is already activated only gets its `last_check_at` refreshed and
/// never consumes quota again. A new site takes one unit of quota; the count
/// check and the increment share a write transaction, and the increment is
/// itself conditional, so two sites racing for the last slot cannot both win.
pub fn activate(
    conn: &mut Connection,
    license_key: &str,
    domain: &str,
    journal_path: Option<&str>,
    metadata: &ActivationMetadata,
    now: i64,
) -> Result<ActivationOutcome> {
    let domain = normalize_domain(domain)
        .ok_or_else(|| AppError::Validation("A valid domain is required".into()))?;
    let journal_path = normalize_journal_path(journal_path);
    let ip_address = clean_optional_text(metadata.ip_address.as_deref(), MAX_METADATA_LEN);
    let product_version =
        clean_optional_text(metadata.product_version.as_deref(), MAX_METADATA_LEN);

    let tx = begin_write(conn)?;
    let license = find_license(&tx, license_key)?;
    ensure_usable(&license, now)?;

    if let Some(existing) =
        queries::get_activation(&tx, &license.id, &domain, journal_path.as_deref())?
    {
        queries::touch_activation(
            &tx,
            &existing.id,
            ip_address.as_deref(),
            product_version.as_deref(),
            now,
        )?;
        tx.commit()?;

        tracing::debug!(license_key = %license.license_key, domain = %domain, "Activation heartbeat");
        return Ok(ActivationOutcome {
            activation: LicenseActivation {
                ip_address: ip_address.or(existing.ip_address),
                product_version: product_version.or(existing.product_version),
                last_check_at: now,
                ..existing
            },
            created: false,
            remaining_activations: license.max_activations.remaining(license.activated_count),
        });
    }

    match license.max_activations {
        ActivationLimit::Limited(max) => {
            if !license.max_activations.allows(license.activated_count)
                || !queries::try_increment_activation_count(&tx, &license.id)?
            {
                return Err(AppError::QuotaExceeded {
                    used: license.activated_count,
                    max,
                });
            }
        }
        ActivationLimit::Unlimited => {
            queries::try_increment_activation_count(&tx, &license.id)?;
        }
    }

    let activation = LicenseActivation {
        id: queries::gen_id(),
        license_id: license.id.clone(),
        domain,
        journal_path,
        ip_address,
        product_version,
        activated_at: now,
        last_check_at: now,
    };
    queries::insert_activation(&tx, &activation)?;
    tx.commit()?;

    let activated_count = license.activated_count + 1;
    tracing::info!(
        license_key = %license.license_key,
        domain = %activation.domain,
        journal_path = activation.journal_path.as_deref().unwrap_or(""),
        activated_count,
        "License activated"
    );

    Ok(ActivationOutcome {
        activation,
        created: true,
        remaining_activations: license.max_activations.remaining(activated_count),
    })
}

fn status_view(conn: &Connection, license: License, now: i64) -> Result<LicenseStatusView> {
    let activations = queries::list_activations_for_license(conn, &license.id)?;
    Ok(LicenseStatusView {
        status: license.effective_status(now),
        remaining_activations: license.max_activations.remaining(license.activated_count),
        license_key: license.license_key,
        activated_count: license.activated_count,
        max_activations: license.max_activations,
        expires_at: license.expires_at,
        activations,
    })
}

/// Current status of a license with its activations. Expiry is derived here;
/// nothing writes `expired` to storage.
pub fn license_status(conn: &Connection, license_key: &str, now: i64) -> Result<LicenseStatusView> {
    let license = find_license(conn, license_key)?;
    status_view(conn, license, now)
}

fn set_suspended(
    conn: &mut Connection,
    license_key: &str,
    from: LicenseStatus,
    to: LicenseStatus,
    now: i64,
) -> Result<LicenseStatusView> {
    let tx = begin_write(conn)?;
    let mut license = find_license(&tx, license_key)?;
    if license.status != from {
        return Err(AppError::StateConflict(format!(
            "License is {}, expected {}",
            license.status.as_ref(),
            from.as_ref()
        )));
    }
    queries::set_license_status(&tx, &license.id, to)?;
    license.status = to;
    let view = status_view(&tx, license, now)?;
    tx.commit()?;

    tracing::info!(license_key = %view.license_key, status = to.as_ref(), "License status changed by admin");
    Ok(view)
}

/// Admin override: block all further activations and mark the license suspended.
pub fn suspend_license(conn: &mut Connection, license_key: &str, now: i64) -> Result<LicenseStatusView> {
    set_suspended(conn, license_key, LicenseStatus::Active, LicenseStatus::Suspended, now)
}

pub fn reinstate_license(conn: &mut Connection, license_key: &str, now: i64) -> Result<LicenseStatusView> {
    set_suspended(conn, license_key, LicenseStatus::Suspended, LicenseStatus::Active, now)
}

/// All licenses owned by a user.
pub fn licenses_for_user(conn: &Connection, user_id: &str, now: i64) -> Result<Vec<LicenseWithStatus>> {
    Ok(queries::list_licenses_for_user(conn, user_id)?
        .into_iter()
        .map(|license| LicenseWithStatus {
            effective_status: license.effective_status(now),
            license,
        })
        .collect())
}
