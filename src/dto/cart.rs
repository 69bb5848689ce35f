use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Defaults to 1 when omitted.
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub product_id: Uuid,
    /// Zero or negative removes the line item.
    pub quantity: i32,
}

/// The full cart as returned by every cart operation. `view` returns the
/// empty sentinel (`items: [], total: 0`) when no cart row exists yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartDto {
    pub items: Vec<CartLineDto>,
    pub total: Decimal,
}

impl CartDto {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineDto {
    pub product_id: Uuid,
    pub title: String,
    pub images: Vec<String>,
    pub quantity: i32,
    /// Price captured when the line was last added, not the live price.
    pub unit_price: Decimal,
}
