use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartDto, CartLineDto, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartLineRow {
    product_id: Uuid,
    title: String,
    images: Json<Vec<String>>,
    quantity: i32,
    unit_price: Decimal,
}

/// Load the caller's cart with lines resolved against live products for
/// display. Returns the empty sentinel instead of failing when no cart row
/// exists yet.
async fn fetch_cart(pool: &DbPool, user: &AuthUser) -> AppResult<CartDto> {
    let cart: Option<(Uuid, Decimal)> =
        sqlx::query_as("SELECT id, total FROM carts WHERE user_id = $1")
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;

    let (cart_id, total) = match cart {
        Some(row) => row,
        None => return Ok(CartDto::empty()),
    };

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.product_id, p.title, p.images, ci.quantity, ci.unit_price
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartLineDto {
            product_id: row.product_id,
            title: row.title,
            images: row.images.0,
            quantity: row.quantity,
            unit_price: row.unit_price,
        })
        .collect();

    Ok(CartDto { items, total })
}

/// Recompute the cached total from the line items after a mutation. The
/// total is always derived server-side, never taken from client input.
async fn recompute_total(pool: &DbPool, cart_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE carts
        SET total = COALESCE(
                (SELECT SUM(quantity * unit_price) FROM cart_items WHERE cart_id = $1), 0),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(cart_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn view_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart = fetch_cart(pool, user).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartDto>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<(Uuid, Decimal)> =
        sqlx::query_as("SELECT id, price FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    let (product_id, price) = product.ok_or(AppError::NotFound)?;

    // Lazily create the cart row on first add.
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let cart_id = match cart {
        Some((id,)) => id,
        None => {
            let (id,): (Uuid,) = sqlx::query_as(
                "INSERT INTO carts (id, user_id, total) VALUES ($1, $2, 0) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(user.user_id)
            .fetch_one(pool)
            .await?;
            id
        }
    };

    let existing: Option<(Uuid, i32)> = sqlx::query_as(
        "SELECT id, quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2",
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some((line_id, current)) => {
            // Re-adding refreshes the snapshot to the current price, so the
            // whole line is repriced on every add.
            sqlx::query("UPDATE cart_items SET quantity = $2, unit_price = $3 WHERE id = $1")
                .bind(line_id)
                .bind(current + quantity)
                .bind(price)
                .execute(pool)
                .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(cart_id)
            .bind(product_id)
            .bind(quantity)
            .bind(price)
            .execute(pool)
            .await?;
        }
    }

    recompute_total(pool, cart_id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = fetch_cart(pool, user).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let (cart_id,) = cart.ok_or(AppError::NotFound)?;

    let product: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    let (stock,) = product.ok_or(AppError::NotFound)?;

    if payload.quantity <= 0 {
        // Removal is idempotent: deleting an already-absent line is fine.
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(payload.product_id)
            .execute(pool)
            .await?;
    } else {
        let line: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM cart_items WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
        let (line_id,) = line.ok_or(AppError::NotFound)?;

        if payload.quantity > stock {
            return Err(AppError::InsufficientStock { available: stock });
        }

        sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(line_id)
            .bind(payload.quantity)
            .execute(pool)
            .await?;
    }

    recompute_total(pool, cart_id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = fetch_cart(pool, user).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

/// Deletes the cart row wholesale (items cascade). The next add recreates it.
pub async fn clear_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_clear",
        Some("carts"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
