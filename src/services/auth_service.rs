use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_CUSTOMER},
    models::User,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest { email, password } = payload;
    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id, email, password_hash, role, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(ROLE_CUSTOMER)
    .fetch_one(pool)
    .await?;

    let user = row.into_user();

    if let Err(err) = log_audit(pool, Some(user.id), "user_register", Some("users"), None).await {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Registered",
        user,
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
    )
    .bind(payload.email.as_str())
    .fetch_optional(pool)
    .await?;
    let row = row.ok_or(AppError::BadRequest("Invalid credentials".to_string()))?;

    let parsed = PasswordHash::new(&row.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed)
        .map_err(|_| AppError::BadRequest("Invalid credentials".to_string()))?;

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let claims = Claims {
        sub: row.id.to_string(),
        role: row.role.clone(),
        exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { token },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(pool: &DbPool, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1",
    )
    .bind(auth.user_id)
    .fetch_optional(pool)
    .await?;
    let row = row.ok_or(AppError::Unauthenticated)?;

    Ok(ApiResponse::success("OK", row.into_user(), None))
}
