#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use storefront_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    error::{AppError, AppResult},
    media::MediaStore,
    middleware::auth::AuthUser,
    payments::{PaymentGateway, PaymentIntent, PaymentIntentStatus, to_minor_units},
    state::AppState,
};

/// In-memory stand-in for the payment processor. Tests drive intent state
/// directly instead of going over the network.
pub struct FakeGateway {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    counter: AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn insert_intent(&self, id: &str, status: PaymentIntentStatus, amount: i64) {
        self.intents.lock().unwrap().insert(
            id.to_string(),
            PaymentIntent {
                id: id.to_string(),
                client_secret: Some(format!("{id}_secret")),
                status,
                amount,
                currency: "inr".to_string(),
            },
        );
    }

    pub fn set_status(&self, id: &str, status: PaymentIntentStatus) {
        let mut intents = self.intents.lock().unwrap();
        if let Some(intent) = intents.get_mut(id) {
            intent.status = status;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        _user_id: Uuid,
    ) -> AppResult<PaymentIntent> {
        let minor_units = to_minor_units(amount)?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("pi_test_{n}");
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            status: PaymentIntentStatus::RequiresConfirmation,
            amount: minor_units,
            currency: currency.to_string(),
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| AppError::PaymentGateway("no such payment intent".to_string()))
    }
}

pub struct FakeMedia;

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(&self, _bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        Ok(format!("https://media.test/{filename}"))
    }
}

/// Connect to the test database, apply migrations and wipe all tables.
/// Returns `None` (and a skip notice) when no database is configured so the
/// suite can run without one.
pub async fn setup_state() -> anyhow::Result<Option<(AppState, Arc<FakeGateway>)>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, carts, audit_logs, products, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let gateway = Arc::new(FakeGateway::new());
    let state = AppState {
        pool,
        orm,
        payments: gateway.clone(),
        media: Arc::new(FakeMedia),
    };

    Ok(Some((state, gateway)))
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: role.to_string(),
    })
}

pub async fn create_product(
    state: &AppState,
    title: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        description: Set(Some(format!("{title} for testing"))),
        price: Set(price),
        category: Set(Some("testing".to_string())),
        images: Set(serde_json::json!([])),
        stock: Set(stock),
        status: Set("active".to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
