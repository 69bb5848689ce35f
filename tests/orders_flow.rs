mod common;

use rust_decimal::Decimal;
use storefront_api::{
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    dto::orders::{CreatePaymentIntentRequest, PlaceOrderRequest},
    error::AppError,
    models::OrderStatus,
    payments::PaymentIntentStatus,
    routes::admin::UpdateOrderStatusRequest,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, cart_service, order_service},
};
use uuid::Uuid;

fn order_list_query(status: Option<&str>) -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination {
            page: Some(1),
            per_page: Some(20),
        },
        status: status.map(String::from),
        sort_order: None,
    }
}

// Full cart-to-order sequence against one database: payment verification,
// snapshot freezing, cart retirement, duplicate placement and the status
// workflow.
#[tokio::test]
async fn placement_and_status_workflow() -> anyhow::Result<()> {
    let Some((state, gateway)) = common::setup_state().await? else {
        return Ok(());
    };

    let customer = common::create_user(&state, "customer", "buyer@example.com").await?;
    let other = common::create_user(&state, "customer", "other@example.com").await?;
    let admin = common::create_user(&state, "admin", "admin@example.com").await?;

    let product_a = common::create_product(&state, "Product A", Decimal::from(100), 5).await?;
    let product_b = common::create_product(&state, "Product B", Decimal::from(50), 5).await?;

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product_a,
            quantity: Some(2),
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product_b,
            quantity: Some(1),
        },
    )
    .await?;

    // Every authorization state other than `succeeded` is rejected, and the
    // cart is left untouched.
    for status in [
        PaymentIntentStatus::RequiresPaymentMethod,
        PaymentIntentStatus::RequiresConfirmation,
        PaymentIntentStatus::RequiresCapture,
        PaymentIntentStatus::Canceled,
        PaymentIntentStatus::Failed,
    ] {
        let intent_id = format!("pi_{}", status.as_str());
        gateway.insert_intent(&intent_id, status, 25_000);
        let err = order_service::place_order(
            &state,
            &customer,
            PlaceOrderRequest {
                payment_intent_id: intent_id,
                address: "42 Test Lane".to_string(),
            },
        )
        .await
        .unwrap_err();
        match &err {
            AppError::PaymentNotVerified(observed) => assert_eq!(observed, status.as_str()),
            other => panic!("expected PaymentNotVerified, got {other:?}"),
        }
    }
    let cart = cart_service::view_cart(&state.pool, &customer)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, Decimal::from(250));

    // An authorization the processor does not know is a gateway error.
    gateway.insert_intent("pi_paid", PaymentIntentStatus::Succeeded, 25_000);
    let err = order_service::place_order(
        &state,
        &other,
        PlaceOrderRequest {
            payment_intent_id: "pi_missing".to_string(),
            address: "nowhere".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::PaymentGateway(_)));

    // Placing with no cart row at all, and with a cart row whose items are
    // gone, both fail with EmptyCart.
    let err = order_service::place_order(
        &state,
        &other,
        PlaceOrderRequest {
            payment_intent_id: "pi_paid".to_string(),
            address: "nowhere".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    cart_service::add_to_cart(
        &state.pool,
        &other,
        AddToCartRequest {
            product_id: product_a,
            quantity: Some(1),
        },
    )
    .await?;
    cart_service::update_cart_item(
        &state.pool,
        &other,
        UpdateCartItemRequest {
            product_id: product_a,
            quantity: 0,
        },
    )
    .await?;
    let err = order_service::place_order(
        &state,
        &other,
        PlaceOrderRequest {
            payment_intent_id: "pi_paid".to_string(),
            address: "nowhere".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    // Intent creation defaults to the cart total and returns the processor's
    // client secret. An explicit non-positive amount is rejected, and a
    // caller without cart contents cannot default the amount.
    let intent = order_service::create_payment_intent(
        &state,
        &customer,
        CreatePaymentIntentRequest {
            amount: None,
            currency: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(intent.amount, Decimal::from(250));
    assert!(!intent.client_secret.is_empty());

    let err = order_service::create_payment_intent(
        &state,
        &customer,
        CreatePaymentIntentRequest {
            amount: Some(Decimal::ZERO),
            currency: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = order_service::create_payment_intent(
        &state,
        &other,
        CreatePaymentIntentRequest {
            amount: None,
            currency: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    // Successful placement freezes the cart into the order and retires the
    // cart. The recorded amount is the pre-placement cart total.
    gateway.set_status(&intent.id, PaymentIntentStatus::Succeeded);
    let placed = order_service::place_order(
        &state,
        &customer,
        PlaceOrderRequest {
            payment_intent_id: intent.id.clone(),
            address: "42 Test Lane".to_string(),
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(placed.order.amount, Decimal::from(250));
    assert_eq!(placed.order.status, OrderStatus::Placed);
    assert_eq!(placed.order.payment_intent_id, intent.id);
    assert_eq!(placed.order.address, "42 Test Lane");
    assert_eq!(placed.items.len(), 2);
    let item_a = placed
        .items
        .iter()
        .find(|item| item.product_id == product_a)
        .unwrap();
    assert_eq!(item_a.title, "Product A");
    assert_eq!(item_a.quantity, 2);
    assert_eq!(item_a.unit_price, Decimal::from(100));

    let cart = cart_service::view_cart(&state.pool, &customer)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, Decimal::ZERO);

    // The frozen copies do not follow later catalog edits.
    sqlx::query("UPDATE products SET price = $2, title = 'Renamed A' WHERE id = $1")
        .bind(product_a)
        .bind(Decimal::from(999))
        .execute(&state.pool)
        .await?;
    let fetched = order_service::get_order(&state, &customer, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.amount, Decimal::from(250));
    let item_a = fetched
        .items
        .iter()
        .find(|item| item.product_id == product_a)
        .unwrap();
    assert_eq!(item_a.title, "Product A");
    assert_eq!(item_a.unit_price, Decimal::from(100));

    // Owner-or-admin read access.
    let err = order_service::get_order(&state, &other, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert!(
        order_service::get_order(&state, &admin, placed.order.id)
            .await
            .is_ok()
    );
    let err = order_service::get_order(&state, &customer, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // No idempotency key ties an authorization to a single order: once a
    // cart exists again, re-submitting the same succeeded authorization
    // creates a second order charging the same payment.
    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product_b,
            quantity: Some(1),
        },
    )
    .await?;
    let duplicate = order_service::place_order(
        &state,
        &customer,
        PlaceOrderRequest {
            payment_intent_id: intent.id.clone(),
            address: "42 Test Lane".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_ne!(duplicate.order.id, placed.order.id);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE payment_intent_id = $1")
            .bind(&intent.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(count, 2);

    // Status workflow: non-admins are rejected, unknown statuses are
    // rejected, jumps between non-terminal states are allowed and terminal
    // states are frozen.
    let err = admin_service::update_order_status(
        &state,
        &customer,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "refunded".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let updated = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);

    let err = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "processing".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::TerminalState(_)));

    // The console offers direct jumps such as placed -> delivered.
    let updated = admin_service::update_order_status(
        &state,
        &admin,
        duplicate.order.id,
        UpdateOrderStatusRequest {
            status: "delivered".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.status, OrderStatus::Delivered);

    for next in ["delivered", "placed", "cancelled"] {
        let err = admin_service::update_order_status(
            &state,
            &admin,
            duplicate.order.id,
            UpdateOrderStatusRequest {
                status: next.to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::TerminalState(_)), "{next}");
    }

    // Admin listing with per-status stats; customers stay locked out.
    let listing = admin_service::list_all_orders(&state, &admin, order_list_query(None)).await?;
    let data = listing.data.unwrap();
    assert_eq!(data.items.len(), 2);
    assert!(!data.stats.is_empty());

    let cancelled_only = admin_service::list_all_orders(
        &state,
        &admin,
        order_list_query(Some("cancelled")),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled_only.items.len(), 1);
    assert_eq!(cancelled_only.items[0].id, placed.order.id);

    let err = admin_service::list_all_orders(&state, &admin, order_list_query(Some("bogus")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin_service::list_all_orders(&state, &customer, order_list_query(None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // The customer sees both of their orders.
    let mine = order_service::list_orders(&state, &customer, order_list_query(None))
        .await?
        .data
        .unwrap();
    assert_eq!(mine.items.len(), 2);

    Ok(())
}
