// src/services/accounts.rs
use std::fmt;
use std::str::FromStr;

use actix_web::HttpRequest;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::schema::users;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("Unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(auth: &AuthConfig, user_id: Uuid, role: Role) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now,
        exp: now + auth.token_ttl_hours * 3600,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        log::debug!("Rejected token: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })
}

/// `Authorization: Bearer` wins over the cookie.
pub fn token_from_request(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    let bearer = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => req
            .cookie(cookie_name)
            .map(|c| c.value().to_string())
            .filter(|token| !token.is_empty()),
    }
}

pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    bcrypt::hash(password, cost).map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| AppError::BadRequest("A valid email is required".to_string()))?;
    if local.is_empty() || !domain.contains('.') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

pub async fn find_by_email(conn: &mut AsyncPgConnection, email: &str) -> AppResult<Option<User>> {
    let user = users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first::<User>(conn)
        .await
        .optional()?;
    Ok(user)
}

/// Creates the configured admin account if it does not exist yet.
/// The role currently stored for `id`, or `None` once the account is gone.
pub async fn stored_role(conn: &mut AsyncPgConnection, id: Uuid) -> AppResult<Option<Role>> {
    let role = users::table
        .find(id)
        .select(users::role)
        .first::<String>(conn)
        .await
        .optional()?;
    role.map(|r| r.parse()).transpose()
}

pub async fn ensure_bootstrap_admin(
    conn: &mut AsyncPgConnection,
    auth: &AuthConfig,
) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (
        auth.bootstrap_admin_email.as_deref(),
        auth.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };
    let email = normalize_email(email);

    if let Some(existing) = find_by_email(conn, &email).await? {
        if existing.role != Role::Admin.as_str() {
            diesel::update(users::table.filter(users::id.eq(existing.id)))
                .set((
                    users::role.eq(Role::Admin.as_str()),
                    users::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
                .await?;
            log::info!("Promoted {} to admin", email);
        }
        return Ok(());
    }

    let password = password.to_string();
    let password_hash =
        tokio::task::spawn_blocking(move || hash_password(&password, bcrypt::DEFAULT_COST))
            .await??;

    let now = Utc::now().naive_utc();
    let admin = User {
        id: Uuid::new_v4(),
        name: "Administrator".to_string(),
        email: email.clone(),
        password_hash,
        role: Role::Admin.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(users::table)
        .values(&admin)
        .execute(conn)
        .await?;

    log::info!("Created bootstrap admin {}", email);
    Ok(())
}
