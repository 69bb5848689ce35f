use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartDto, CartLineDto, UpdateCartItemRequest},
        orders::{
            AdminOrderList, CreatePaymentIntentRequest, OrderList, OrderStatusStat,
            OrderWithItems, PaymentIntentResponse, PlaceOrderRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest, UploadResponse},
    },
    models::{Order, OrderItem, OrderStatus, Product, User},
    payments::PaymentIntentStatus,
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::get_product,
        cart::view_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::clear_cart,
        orders::create_payment_intent,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_products_admin,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::upload_image
    ),
    components(
        schemas(
            User,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            PaymentIntentStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CartDto,
            CartLineDto,
            AddToCartRequest,
            UpdateCartItemRequest,
            CreatePaymentIntentRequest,
            PaymentIntentResponse,
            PlaceOrderRequest,
            OrderWithItems,
            OrderList,
            AdminOrderList,
            OrderStatusStat,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            UploadResponse,
            admin::UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartDto>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<AdminOrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Public catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Admin", description = "Back office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
