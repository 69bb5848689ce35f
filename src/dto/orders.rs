use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    /// Major currency units. Defaults to the caller's cart total.
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub id: String,
    pub client_secret: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub payment_intent_id: String,
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Per-status order counts and totals shown on the admin dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatusStat {
    pub status: String,
    pub count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderList {
    pub items: Vec<Order>,
    pub stats: Vec<OrderStatusStat>,
}
