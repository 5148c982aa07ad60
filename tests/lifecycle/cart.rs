use storefront::lifecycle::cart;

use crate::common::*;

#[test]
fn test_adding_same_item_twice_merges() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);

    add_line(&mut conn, &user.id, &product, LicenseType::SingleSite, LicenseDuration::OneYear, 1);
    let snapshot = add_line(
        &mut conn,
        &user.id,
        &product,
        LicenseType::SingleSite,
        LicenseDuration::OneYear,
        1,
    );

    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.lines[0].quantity, 2);
    assert_eq!(snapshot.item_count, 2);
    assert_eq!(snapshot.subtotal, 200_000);

    // Persisted the same way
    let stored = cart::cart_snapshot(&conn, &user.id).unwrap();
    assert_eq!(stored.lines.len(), 1);
    assert_eq!(stored.lines[0].quantity, 2);
}

#[test]
fn test_quantity_out_of_range_is_rejected() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);

    let result = cart::add_to_cart(
        &mut conn,
        &user.id,
        &AddCartLine {
            product_id: product.id.clone(),
            license_type: LicenseType::SingleSite,
            license_duration: LicenseDuration::OneYear,
            quantity: 11,
        },
        T0,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(cart::cart_snapshot(&conn, &user.id).unwrap().lines.is_empty());
}

#[test]
fn test_unknown_product_is_not_found() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);

    let result = cart::add_to_cart(
        &mut conn,
        &user.id,
        &AddCartLine {
            product_id: "missing".to_string(),
            license_type: LicenseType::SingleSite,
            license_duration: LicenseDuration::OneYear,
            quantity: 1,
        },
        T0,
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_update_remove_and_clear() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (user, _) = create_test_user(&conn, "buyer@example.org", UserRole::Customer);
    let a = create_test_product(&conn, "Plugin A", 10_000);
    let b = create_test_product(&conn, "Plugin B", 20_000);

    add_line(&mut conn, &user.id, &a, LicenseType::SingleSite, LicenseDuration::OneYear, 1);
    let snapshot = add_line(&mut conn, &user.id, &b, LicenseType::SingleSite, LicenseDuration::OneYear, 1);
    let line_a = snapshot
        .lines
        .iter()
        .find(|l| l.product_id == a.id)
        .unwrap()
        .id
        .clone();

    let snapshot = cart::update_cart_line(
        &mut conn,
        &user.id,
        &line_a,
        &UpdateCartLine {
            license_duration: Some(LicenseDuration::Lifetime),
            quantity: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    let updated = snapshot.lines.iter().find(|l| l.id == line_a).unwrap();
    assert_eq!(updated.unit_price, 25_000);
    assert_eq!(updated.quantity, 3);
    assert_eq!(snapshot.subtotal, 75_000 + 20_000);

    let snapshot = cart::remove_cart_line(&mut conn, &user.id, &line_a).unwrap();
    assert_eq!(snapshot.lines.len(), 1);
    assert!(matches!(
        cart::remove_cart_line(&mut conn, &user.id, &line_a),
        Err(AppError::NotFound(_))
    ));

    let snapshot = cart::clear_cart(&conn, &user.id).unwrap();
    assert!(snapshot.lines.is_empty());
    assert_eq!(snapshot.subtotal, 0);
    assert!(cart::cart_snapshot(&conn, &user.id).unwrap().lines.is_empty());
}

#[test]
fn test_carts_are_per_user() {
    let db = setup_db();
    let mut conn = db.pool.get().unwrap();
    let (alice, _) = create_test_user(&conn, "alice@example.org", UserRole::Customer);
    let (bob, _) = create_test_user(&conn, "bob@example.org", UserRole::Customer);
    let product = create_test_product(&conn, "OJS Plugin", 100_000);

    let snapshot = add_line(&mut conn, &alice.id, &product, LicenseType::SingleSite, LicenseDuration::OneYear, 1);
    let line_id = snapshot.lines[0].id.clone();

    assert!(cart::cart_snapshot(&conn, &bob.id).unwrap().lines.is_empty());
    assert!(matches!(
        cart::remove_cart_line(&mut conn, &bob.id, &line_id),
        Err(AppError::NotFound(_))
    ));
}
