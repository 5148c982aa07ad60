use storefront::lifecycle::{cart, checkout};

use crate::common::*;

#[test]
fn test_order_totals_and_initial_state() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);

    let order = place_order(
        &mut conn,
        &user.id,
        &product,
        LicenseType::MultiJournal,
        LicenseDuration::TwoYears,
        "checkout-1",
    );

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].unit_price, 360_000);
    assert_eq!(order.lines[0].product_name, "OJS Plugin");
    assert_eq!(order.order.subtotal, 360_000);
    assert_eq!(order.order.tax, 39_600);
    assert_eq!(order.order.discount, 0);
    assert_eq!(order.order.total_amount, 399_600);
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.order.payment_deadline, T0 + 3 * DAY);
    assert!(!order.payment_expired);

    let number = &order.order.order_number;
    assert!(number.starts_with("ORD-20260315-"), "{}", number);
    assert_eq!(number.len(), "ORD-20260315-XXXXXX".len());

    // Cart emptied in the same transaction
    assert!(cart::cart_snapshot(&conn, &user.id).unwrap().lines.is_empty());
}

#[test]
fn test_same_idempotency_key_returns_same_order() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);

    let first = place_order(
        &mut conn,
        &user.id,
        &product,
        LicenseType::SingleSite,
        LicenseDuration::OneYear,
        "same-key",
    );
    // Cart is empty now; the replay must still succeed
    let second = checkout::create_order(
        &mut conn,
        &user.id,
        &order_request("same-key"),
        &test_settings(),
        T0 + 5,
    )
    .unwrap();

    assert_eq!(first.order.order_number, second.order.order_number);
    assert_eq!(second.lines.len(), 1);
    assert_eq!(queries::list_orders_for_user(&conn, &user.id).unwrap().len(), 1);
}

#[test]
fn test_empty_cart_is_rejected_without_creating_an_order() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);

    let result = checkout::create_order(
        &mut conn,
        &user.id,
        &order_request("empty"),
        &test_settings(),
        T0,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(queries::list_orders_for_user(&conn, &user.id).unwrap().is_empty());
}

#[test]
fn test_missing_billing_field_is_rejected() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    add_line(&mut conn, &user.id, &product, LicenseType::SingleSite, LicenseDuration::OneYear, 1);

    let mut request = order_request("bad-billing");
    request.billing.phone = "  ".to_string();
    let result = checkout::create_order(&mut conn, &user.id, &request, &test_settings(), T0);

    assert!(matches!(result, Err(AppError::Validation(_))));
    // Nothing was consumed
    assert_eq!(cart::cart_snapshot(&conn, &user.id).unwrap().lines.len(), 1);
}

#[test]
fn test_order_is_repriced_from_current_catalog() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    add_line(&mut conn, &user.id, &product, LicenseType::SingleSite, LicenseDuration::OneYear, 2);

    queries::update_product(
        &conn,
        &product.id,
        &UpdateProduct {
            sale_price: Some(Some(80_000)),
            ..Default::default()
        },
    )
    .unwrap();

    let order = checkout::create_order(
        &mut conn,
        &user.id,
        &order_request("repriced"),
        &test_settings(),
        T0,
    )
    .unwrap();
    assert_eq!(order.lines[0].unit_price, 80_000);
    assert_eq!(order.lines[0].line_total, 160_000);
    assert_eq!(order.order.subtotal, 160_000);

    // Later catalog changes never touch the frozen order
    queries::update_product(
        &conn,
        &product.id,
        &UpdateProduct {
            base_price: Some(1),
            sale_price: Some(None),
            ..Default::default()
        },
    )
    .unwrap();
    let reloaded =
        checkout::get_order(&conn, &order.order.order_number, Some(&user.id), T0).unwrap();
    assert_eq!(reloaded.lines[0].unit_price, 80_000);
    assert_eq!(reloaded.order.total_amount, order.order.total_amount);
}

#[test]
fn test_inactive_product_blocks_checkout() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    add_line(&mut conn, &user.id, &product, LicenseType::SingleSite, LicenseDuration::OneYear, 1);

    queries::update_product(
        &conn,
        &product.id,
        &UpdateProduct {
            active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    let result = checkout::create_order(
        &mut conn,
        &user.id,
        &order_request("inactive"),
        &test_settings(),
        T0,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(queries::list_orders_for_user(&conn, &user.id).unwrap().is_empty());
}

#[test]
fn test_orders_are_private_to_their_owner() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (alice, _) = create_test_user(&conn, "alice@example.org", UserRole::Customer);
    let (bob, _) = create_test_user(&conn, "bob@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    let order = place_order(
        &mut conn,
        &alice.id,
        &product,
        LicenseType::SingleSite,
        LicenseDuration::OneYear,
        "alice-1",
    );

    let result = checkout::get_order(&conn, &order.order.order_number, Some(&bob.id), T0);
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(checkout::get_order(&conn, &order.order.order_number, None, T0).is_ok());
}

#[test]
fn test_payment_expired_is_derived_on_read() {
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
        "expiring",
    );

    let number = &order.order.order_number;
    let at_deadline = checkout::get_order(&conn, number, None, T0 + 3 * DAY).unwrap();
    assert!(!at_deadline.payment_expired);
    let after = checkout::get_order(&conn, number, None, T0 + 3 * DAY + 1).unwrap();
    assert!(after.payment_expired);
    assert_eq!(after.order.status, OrderStatus::Pending);
}

#[test]
fn test_cancel_unpaid_order() {
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
        "to-cancel",
    );

    let cancelled =
        checkout::cancel_order(&mut conn, &user.id, &order.order.order_number, T0 + 10).unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    // Terminal: no second cancel, no proof
    assert!(matches!(
        checkout::cancel_order(&mut conn, &user.id, &order.order.order_number, T0 + 20),
        Err(AppError::StateConflict(_))
    ));
    assert!(matches!(
        submit(&mut conn, &cancelled.order, T0 + 30),
        Err(AppError::StateConflict(_))
    ));

    let events = queries::list_order_events(&conn, &order.order.id).unwrap();
    assert_eq!(events.last().unwrap().to_status, OrderStatus::Cancelled);
}

#[test]
fn test_price_raised_past_limit_fails_checkout_cleanly() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);
    add_line(
        &mut conn,
        &user.id,
        &product,
        LicenseType::Unlimited,
        LicenseDuration::Lifetime,
        3,
    );

    // Written straight to storage, bypassing catalog validation
    conn.execute(
        "UPDATE products SET base_price = ?1 WHERE id = ?2",
        rusqlite::params![400_000_000_000_000_000_i64, &product.id],
    )
    .unwrap();

    let err = checkout::create_order(
        &mut conn,
        &user.id,
        &order_request("huge"),
        &test_settings(),
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(
        queries::get_order_by_idempotency_key(&conn, &user.id, "huge")
            .unwrap()
            .is_none()
    );

    // Adding the overpriced product is refused too, and the cart snapshot
    // still renders
    let err = cart::add_to_cart(
        &mut conn,
        &user.id,
        &AddCartLine {
            product_id: product.id.clone(),
            license_type: LicenseType::MultiSite,
            license_duration: LicenseDuration::OneYear,
            quantity: 1,
        },
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(cart::cart_snapshot(&conn, &user.id).unwrap().lines.len(), 1);
}
