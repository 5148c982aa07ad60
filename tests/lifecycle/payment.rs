use storefront::lifecycle::{checkout, payment};

use crate::common::*;

fn setup_order(key: &str) -> (TestDb, User, Order) {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    let order = place_order(
        &mut conn,
        &user.id,
        &product,
        LicenseType::SingleSite,
        LicenseDuration::OneYear,
        key,
    )
    .order;
    drop(conn);
    (db, user, order)
}

#[test]
fn test_proof_before_deadline_moves_to_verification() {
    let (db, user, order) = setup_order("pay-1");
    let mut conn = db.pool.get().unwrap();

    let proof = submit(&mut conn, &order, T0 + 3 * DAY).unwrap();
    assert_eq!(proof.status, ProofStatus::Pending);
    assert_eq!(proof.transfer_amount, order.total_amount);

    let reloaded = checkout::get_order(&conn, &order.order_number, Some(&user.id), T0).unwrap();
    assert_eq!(reloaded.order.payment_status, PaymentStatus::PendingVerification);
    assert_eq!(reloaded.order.status, OrderStatus::AwaitingVerification);
    assert_eq!(reloaded.order.current_proof_id.as_deref(), Some(proof.id.as_str()));
}

#[test]
fn test_proof_after_deadline_is_refused() {
    let (db, user, order) = setup_order("pay-late");
    let mut conn = db.pool.get().unwrap();

    let result = submit(&mut conn, &order, T0 + 3 * DAY + 1);
    assert!(matches!(result, Err(AppError::DeadlineExpired)));

    let reloaded = checkout::get_order(&conn, &order.order_number, Some(&user.id), T0).unwrap();
    assert_eq!(reloaded.order.payment_status, PaymentStatus::Unpaid);
    assert!(reloaded.order.current_proof_id.is_none());
    assert!(queries::list_payment_proofs_for_order(&conn, &order.id).unwrap().is_empty());
}

#[test]
fn test_second_proof_while_pending_conflicts() {
    let (db, _user, order) = setup_order("pay-twice");
    let mut conn = db.pool.get().unwrap();

    submit(&mut conn, &order, T0 + 60).unwrap();
    let result = submit(&mut conn, &order, T0 + 120);
    assert!(matches!(result, Err(AppError::StateConflict(_))));
    assert_eq!(
        queries::list_payment_proofs_for_order(&conn, &order.id).unwrap().len(),
        1
    );
}

#[test]
fn test_only_the_owner_can_submit() {
    let (db, _user, order) = setup_order("pay-owner");
    let mut conn = db.pool.get().unwrap();
    let (stranger, _) = create_test_user(&conn, "stranger@example.org", UserRole::Customer);

    let result = payment::submit_proof(
        &mut conn,
        &stranger.id,
        &order.order_number,
        &proof_input(order.total_amount),
        "ref.png",
        T0 + 60,
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_invalid_proof_fields_are_rejected() {
    let (db, user, order) = setup_order("pay-invalid");
    let mut conn = db.pool.get().unwrap();

    let mut future = proof_input(order.total_amount);
    future.transfer_date = "2026-03-16".to_string();
    let result = payment::submit_proof(
        &mut conn,
        &user.id,
        &order.order_number,
        &future,
        "ref.png",
        T0,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = payment::submit_proof(
        &mut conn,
        &user.id,
        &order.order_number,
        &proof_input(order.total_amount),
        "  ",
        T0,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));

    let reloaded = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(reloaded.payment_status, PaymentStatus::Unpaid);
}
