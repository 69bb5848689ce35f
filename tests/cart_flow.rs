mod common;

use rust_decimal::Decimal;
use storefront_api::{
    dto::cart::{AddToCartRequest, CartDto, UpdateCartItemRequest},
    error::AppError,
    services::cart_service,
};
use uuid::Uuid;

// The cached total must always equal the derived sum of the line items.
fn assert_total_derived(cart: &CartDto) {
    let derived: Decimal = cart
        .items
        .iter()
        .map(|line| Decimal::from(line.quantity) * line.unit_price)
        .sum();
    assert_eq!(cart.total, derived);
}

// Single sequential flow: the suite shares one database, so the cart
// manager's contract is exercised end to end in one test.
#[tokio::test]
async fn cart_manager_contract() -> anyhow::Result<()> {
    let Some((state, _gateway)) = common::setup_state().await? else {
        return Ok(());
    };

    let user = common::create_user(&state, "customer", "cart-user@example.com").await?;

    // Viewing before any add returns the empty sentinel, not an error.
    let cart = cart_service::view_cart(&state.pool, &user)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, Decimal::ZERO);

    // Adding an unknown product fails with NotFound.
    let err = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: Some(1),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let product_a =
        common::create_product(&state, "Product A", Decimal::from(100), 3).await?;
    let product_b = common::create_product(&state, "Product B", Decimal::from(50), 10).await?;

    // Add A twice: quantities accumulate into one line, no duplicate lines.
    let cart = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: product_a,
            quantity: Some(1),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 1);
    assert_eq!(cart.items[0].unit_price, Decimal::from(100));
    assert_eq!(cart.total, Decimal::from(100));
    assert_total_derived(&cart);

    let cart = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: product_a,
            quantity: Some(1),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.total, Decimal::from(200));
    assert_total_derived(&cart);

    let cart = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: product_b,
            quantity: Some(1),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, Decimal::from(250));
    assert_total_derived(&cart);

    // Setting a quantity above stock fails and mutates nothing: the
    // {A: 2 x 100, B: 1 x 50} cart stays at 250.
    let err = cart_service::update_cart_item(
        &state.pool,
        &user,
        UpdateCartItemRequest {
            product_id: product_a,
            quantity: 5,
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::InsufficientStock { available } => assert_eq!(available, 3),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    let cart = cart_service::view_cart(&state.pool, &user)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.total, Decimal::from(250));
    let line_a = cart
        .items
        .iter()
        .find(|line| line.product_id == product_a)
        .unwrap();
    assert_eq!(line_a.quantity, 2);

    // A valid quantity update recomputes the total; the snapshot price is
    // untouched by set-quantity.
    let cart = cart_service::update_cart_item(
        &state.pool,
        &user,
        UpdateCartItemRequest {
            product_id: product_a,
            quantity: 3,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.total, Decimal::from(350));
    assert_total_derived(&cart);

    // Re-adding after an admin price change refreshes the snapshot for the
    // whole line: the line is repriced, not split across price points.
    sqlx::query("UPDATE products SET price = $2 WHERE id = $1")
        .bind(product_a)
        .bind(Decimal::from(120))
        .execute(&state.pool)
        .await?;
    // Stock check is only applied on explicit quantity updates, so the add
    // itself still goes through.
    let cart = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: product_a,
            quantity: Some(1),
        },
    )
    .await?
    .data
    .unwrap();
    let line_a = cart
        .items
        .iter()
        .find(|line| line.product_id == product_a)
        .unwrap();
    assert_eq!(line_a.quantity, 4);
    assert_eq!(line_a.unit_price, Decimal::from(120));
    assert_eq!(cart.total, Decimal::from(4 * 120 + 50));
    assert_total_derived(&cart);

    // Quantity zero removes the line; repeating it is idempotent.
    let cart = cart_service::update_cart_item(
        &state.pool,
        &user,
        UpdateCartItemRequest {
            product_id: product_a,
            quantity: 0,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(cart.items.iter().all(|line| line.product_id != product_a));
    assert_eq!(cart.total, Decimal::from(50));
    assert_total_derived(&cart);

    let cart = cart_service::update_cart_item(
        &state.pool,
        &user,
        UpdateCartItemRequest {
            product_id: product_a,
            quantity: 0,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total, Decimal::from(50));

    // Updating a product that was never in the cart fails with NotFound.
    let product_c = common::create_product(&state, "Product C", Decimal::from(10), 5).await?;
    let err = cart_service::update_cart_item(
        &state.pool,
        &user,
        UpdateCartItemRequest {
            product_id: product_c,
            quantity: 2,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Clear deletes the cart row wholesale; the next view is the sentinel
    // and the next add recreates the cart from scratch.
    cart_service::clear_cart(&state.pool, &user).await?;
    let cart = cart_service::view_cart(&state.pool, &user)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, Decimal::ZERO);

    let cart = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id: product_b,
            quantity: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 1);
    assert_eq!(cart.total, Decimal::from(50));

    Ok(())
}
