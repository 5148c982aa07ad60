use std::sync::{Arc, Barrier};
use std::thread;

use storefront::lifecycle::activation;

use crate::common::*;

const ISSUED_AT: i64 = T0 + 120;

fn issue(license_type: LicenseType, license_duration: LicenseDuration) -> (TestDb, License) {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (customer, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let (admin, _) = create_test_user(&conn, "admin@example.org", UserRole::Admin);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    let mut licenses = paid_order(
        &mut conn,
        &customer,
        &admin,
        &product,
        license_type,
        license_duration,
        "activation",
    );
    drop(conn);
    (db, licenses.remove(0))
}

fn meta() -> ActivationMetadata {
    ActivationMetadata {
        ip_address: Some("203.0.113.7".to_string()),
        product_version: Some("3.4.0".to_string()),
    }
}

#[test]
fn test_quota_is_enforced_and_heartbeats_are_free() {
    let (db, license) = issue(LicenseType::MultiSite, LicenseDuration::OneYear);
    let mut conn = db.pool.get().unwrap();
    let now = ISSUED_AT + DAY;

    for i in 0..5 {
        let outcome = activation::activate(
            &mut conn,
            &license.license_key,
            &format!("journal{}.example.org", i),
            None,
            &meta(),
            now,
        )
        .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.remaining_activations, Some(4 - i));
    }

    let result = activation::activate(
        &mut conn,
        &license.license_key,
        "journal5.example.org",
        None,
        &meta(),
        now,
    );
    assert!(matches!(
        result,
        Err(AppError::QuotaExceeded { used: 5, max: 5 })
    ));

    // Same site again, spelled differently: heartbeat only
    let heartbeat = activation::activate(
        &mut conn,
        &license.license_key,
        "https://Journal0.example.org/",
        None,
        &ActivationMetadata {
            ip_address: None,
            product_version: Some("3.5.0".to_string()),
        },
        now + 3600,
    )
    .unwrap();
    assert!(!heartbeat.created);
    assert_eq!(heartbeat.activation.last_check_at, now + 3600);
    assert_eq!(heartbeat.activation.activated_at, now);
    assert_eq!(heartbeat.activation.product_version.as_deref(), Some("3.5.0"));
    assert_eq!(heartbeat.activation.ip_address.as_deref(), Some("203.0.113.7"));

    let status = activation::license_status(&conn, &license.license_key, now).unwrap();
    assert_eq!(status.activated_count, 5);
    assert_eq!(status.remaining_activations, Some(0));
    assert_eq!(status.activations.len(), 5);
}

#[test]
fn test_journal_path_distinguishes_installs() {
    let (db, license) = issue(LicenseType::SingleJournal, LicenseDuration::OneYear);
    let mut conn = db.pool.get().unwrap();
    let now = ISSUED_AT + DAY;

    let first = activation::activate(
        &mut conn,
        &license.license_key,
        "ojs.example.org",
        Some("/jbio/"),
        &meta(),
        now,
    )
    .unwrap();
    assert!(first.created);
    assert_eq!(first.activation.journal_path.as_deref(), Some("jbio"));

    let again = activation::activate(
        &mut conn,
        &license.license_key,
        "ojs.example.org",
        Some("jbio"),
        &meta(),
        now,
    )
    .unwrap();
    assert!(!again.created);

    let other = activation::activate(
        &mut conn,
        &license.license_key,
        "ojs.example.org",
        Some("jchem"),
        &meta(),
        now,
    );
    assert!(matches!(other, Err(AppError::QuotaExceeded { used: 1, max: 1 })));
}

#[test]
fn test_unlimited_license_never_runs_out() {
    let (db, license) = issue(LicenseType::Unlimited, LicenseDuration::Lifetime);
    let mut conn = db.pool.get().unwrap();

    for i in 0..25_i64 {
        let outcome = activation::activate(
            &mut conn,
            &license.license_key,
            &format!("site{}.example.org", i),
            None,
            &meta(),
            ISSUED_AT + i,
        )
        .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.remaining_activations, None);
    }

    let status = activation::license_status(&conn, &license.license_key, ISSUED_AT).unwrap();
    assert_eq!(status.activated_count, 25);
    assert_eq!(status.max_activations, ActivationLimit::Unlimited);
}

#[test]
fn test_one_year_license_expires_after_365_days() {
    let (db, license) = issue(LicenseType::SingleSite, LicenseDuration::OneYear);
    let mut conn = db.pool.get().unwrap();
    let expires_at = ISSUED_AT + 365 * DAY;
    assert_eq!(license.expires_at, Some(expires_at));

    let status = activation::license_status(&conn, &license.license_key, expires_at).unwrap();
    assert_eq!(status.status, LicenseStatus::Active);
    let status = activation::license_status(&conn, &license.license_key, expires_at + 1).unwrap();
    assert_eq!(status.status, LicenseStatus::Expired);

    let result = activation::activate(
        &mut conn,
        &license.license_key,
        "late.example.org",
        None,
        &meta(),
        expires_at + 1,
    );
    assert!(matches!(result, Err(AppError::LicenseExpired)));

    // Nothing was written: the stored status is still active
    let stored = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert_eq!(stored.status, LicenseStatus::Active);
    assert_eq!(stored.activated_count, 0);
}

#[test]
fn test_lifetime_license_never_expires() {
    let (db, license) = issue(LicenseType::SingleSite, LicenseDuration::Lifetime);
    let mut conn = db.pool.get().unwrap();
    let far_future = ISSUED_AT + 100 * 365 * DAY;

    let status = activation::license_status(&conn, &license.license_key, far_future).unwrap();
    assert_eq!(status.status, LicenseStatus::Active);
    assert_eq!(status.expires_at, None);
    assert!(
        activation::activate(
            &mut conn,
            &license.license_key,
            "forever.example.org",
            None,
            &meta(),
            far_future,
        )
        .is_ok()
    );
}

#[test]
fn test_suspended_license_refuses_activation_until_reinstated() {
    let (db, license) = issue(LicenseType::MultiSite, LicenseDuration::OneYear);
    let mut conn = db.pool.get().unwrap();
    let now = ISSUED_AT + DAY;

    let view = activation::suspend_license(&mut conn, &license.license_key, now).unwrap();
    assert_eq!(view.status, LicenseStatus::Suspended);
    assert!(matches!(
        activation::activate(&mut conn, &license.license_key, "a.example.org", None, &meta(), now),
        Err(AppError::LicenseSuspended)
    ));
    assert!(matches!(
        activation::suspend_license(&mut conn, &license.license_key, now),
        Err(AppError::StateConflict(_))
    ));

    activation::reinstate_license(&mut conn, &license.license_key, now).unwrap();
    assert!(
        activation::activate(&mut conn, &license.license_key, "a.example.org", None, &meta(), now)
            .is_ok()
    );
}

#[test]
fn test_unknown_key_and_bad_domain() {
    let (db, license) = issue(LicenseType::SingleSite, LicenseDuration::OneYear);
    let mut conn = db.pool.get().unwrap();

    assert!(matches!(
        activation::activate(&mut conn, "AAAA-BBBB-CCCC-DDDD", "a.example.org", None, &meta(), T0),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        activation::license_status(&conn, "AAAA-BBBB-CCCC-DDDD", T0),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        activation::activate(&mut conn, &license.license_key, "not a domain", None, &meta(), T0),
        Err(AppError::Validation(_))
    ));
    // Keys are matched case-insensitively
    assert!(
        activation::license_status(&conn, &license.license_key.to_lowercase(), T0).is_ok()
    );
}

#[test]
fn test_racing_for_the_last_slot_has_one_winner() {
    let (db, license) = issue(LicenseType::SingleSite, LicenseDuration::OneYear);
    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let pool = db.pool.clone();
            let barrier = barrier.clone();
            let key = license.license_key.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                barrier.wait();
                activation::activate(
                    &mut conn,
                    &key,
                    &format!("racer{}.example.org", i),
                    None,
                    &ActivationMetadata::default(),
                    ISSUED_AT + DAY,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(AppError::QuotaExceeded { .. })))
    );

    let conn = db.pool.get().unwrap();
    let stored = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert_eq!(stored.activated_count, 1);
}
