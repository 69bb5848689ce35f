use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreatePaymentIntentRequest, OrderList, OrderWithItems, PaymentIntentResponse,
        PlaceOrderRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    payments::PaymentIntentStatus,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const DEFAULT_CURRENCY: &str = "inr";

#[derive(Debug, FromRow)]
struct CartSnapshotRow {
    cart_id: Uuid,
    total: Decimal,
    product_id: Uuid,
    title: String,
    quantity: i32,
    unit_price: Decimal,
}

/// Create a payment authorization for the given amount, defaulting to the
/// caller's current cart total. No local side effects: the cart and orders
/// are untouched.
pub async fn create_payment_intent(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentIntentRequest,
) -> AppResult<ApiResponse<PaymentIntentResponse>> {
    let currency = payload
        .currency
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let amount = match payload.amount {
        Some(amount) => amount,
        None => {
            let cart: Option<(Uuid, Decimal)> =
                sqlx::query_as("SELECT id, total FROM carts WHERE user_id = $1")
                    .bind(user.user_id)
                    .fetch_optional(&state.pool)
                    .await?;
            let (cart_id, total) = cart.ok_or(AppError::EmptyCart)?;

            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
                    .bind(cart_id)
                    .fetch_one(&state.pool)
                    .await?;
            if count == 0 {
                return Err(AppError::EmptyCart);
            }
            total
        }
    };

    let intent = state
        .payments
        .create_intent(amount, &currency, user.user_id)
        .await?;

    let client_secret = intent.client_secret.ok_or_else(|| {
        AppError::PaymentGateway("processor response missing client secret".to_string())
    })?;

    Ok(ApiResponse::success(
        "Payment intent created",
        PaymentIntentResponse {
            id: intent.id,
            client_secret,
            amount,
        },
        None,
    ))
}

/// Convert a confirmed payment plus the caller's current cart into a
/// durable order, then retire the cart.
///
/// The order and its frozen items are committed in one transaction so no
/// partially-built order is ever visible; the cart is deleted only after
/// that commit. A crash in between leaves a stale cart next to an
/// already-placed order, which the user can re-clear; the reverse ordering
/// would lose the cart if order creation failed.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let intent = state
        .payments
        .retrieve_intent(&payload.payment_intent_id)
        .await?;
    if intent.status != PaymentIntentStatus::Succeeded {
        return Err(AppError::PaymentNotVerified(intent.status.as_str().to_string()));
    }

    // Snapshot the cart with titles resolved from live products. Prices come
    // from the cart lines, not a fresh lookup: the amount recorded must match
    // what the customer already authorized.
    let rows = sqlx::query_as::<_, CartSnapshotRow>(
        r#"
        SELECT c.id AS cart_id, c.total, ci.product_id, p.title, ci.quantity, ci.unit_price
        FROM carts c
        JOIN cart_items ci ON ci.cart_id = c.id
        JOIN products p ON p.id = ci.product_id
        WHERE c.user_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let cart_id = rows[0].cart_id;
    let amount = rows[0].total;

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        amount: Set(amount),
        payment_intent_id: Set(payload.payment_intent_id.clone()),
        status: Set(OrderStatus::Placed.as_str().to_string()),
        address: Set(payload.address),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(rows.len());
    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            title: Set(row.title.clone()),
            quantity: Set(row.quantity),
            unit_price: Set(row.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    // The order is durable from here on; retiring the cart comes second.
    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(cart_id)
        .execute(&state.pool)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_placed",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_intent_id": order.payment_intent_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let order = order_from_entity(order)?;
    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest("Invalid order status".to_string()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Fetch one order. Customers may only read their own; admins may read any.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !user.is_admin() && order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let order = order_from_entity(order)?;
    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = OrderStatus::parse(&model.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status {:?}", model.status))
    })?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        amount: model.amount,
        payment_intent_id: model.payment_intent_id,
        status,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        title: model.title,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
