use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use futures::future::{ready, LocalBoxFuture, Ready};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::shared::{created, ok};
use crate::config::{AppConfig, AuthConfig};
use crate::db::models::{User, UserProfile};
use crate::db::schema::users;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::accounts::{self, Claims, Role};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}

/// Any request carrying a valid token.
#[derive(Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// A valid token whose account is still an admin in the database, so a
/// demotion or deletion takes effect before the token expires.
#[derive(Debug)]
pub struct AdminUser(pub AuthUser);

fn authenticate(req: &HttpRequest) -> AppResult<AuthUser> {
    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(|| AppError::Internal("AppConfig is not registered".to_string()))?;

    let token = accounts::token_from_request(req, &config.auth.cookie_name)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let Claims { sub, role, .. } = accounts::verify_token(&config.auth, &token)?;

    Ok(AuthUser { id: sub, role })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claimed = authenticate(req);
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        Box::pin(async move {
            let forbidden = || AppError::Forbidden("Admin access required".to_string());
            let user = claimed?;
            // A user token never reaches the database.
            if user.role != Role::Admin {
                return Err(forbidden());
            }

            let pool =
                pool.ok_or_else(|| AppError::Internal("DbPool is not registered".to_string()))?;
            let mut conn = pool.get().await?;
            let role = accounts::stored_role(&mut conn, user.id)
                .await?
                .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

            match role {
                Role::Admin => Ok(AdminUser(AuthUser { id: user.id, role })),
                Role::User => {
                    log::info!("Rejected stale admin token for demoted user {}", user.id);
                    Err(forbidden())
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

fn session_cookie(auth: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build(auth.cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .secure(auth.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(auth.token_ttl_hours))
        .finish()
}

pub async fn register(
    body: web::Json<RegisterRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    let email = accounts::normalize_email(&body.email);
    accounts::validate_credentials(&email, &body.password)?;

    let password = body.password;
    let password_hash =
        web::block(move || accounts::hash_password(&password, bcrypt::DEFAULT_COST)).await??;

    let now = Utc::now().naive_utc();
    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash,
        role: Role::User.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut conn = pool.get().await?;
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .await?;

    log::info!("Registered user {}", user.id);
    Ok(created(UserProfile::from(user)))
}

pub async fn login(
    body: web::Json<LoginRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let email = accounts::normalize_email(&body.email);

    let mut conn = pool.get().await?;
    let user = accounts::find_by_email(&mut conn, &email).await?;
    drop(conn);

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let user = user.ok_or_else(invalid)?;

    let password = body.password;
    let hash = user.password_hash.clone();
    if !web::block(move || accounts::verify_password(&password, &hash)).await? {
        return Err(invalid());
    }

    let role: Role = user.role.parse()?;
    let token = accounts::issue_token(&config.auth, user.id, role)?;
    let cookie = session_cookie(&config.auth, token.clone());

    Ok(HttpResponse::Ok().cookie(cookie).json(crate::api::shared::ResponseType::ok(Session {
        token,
        user: UserProfile::from(user),
    })))
}

pub async fn logout(config: web::Data<AppConfig>) -> HttpResponse {
    let mut cookie = session_cookie(&config.auth, String::new());
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(crate::api::shared::ResponseType::ok(serde_json::json!({ "loggedOut": true })))
}

pub async fn me(user: AuthUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let found = users::table
        .find(user.id)
        .select(User::as_select())
        .first::<User>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(ok(UserProfile::from(found)))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::api::testing;
    use crate::services::accounts::Role;

    #[actix_web::test]
    async fn me_requires_a_token() {
        let app = test::init_service(testing::app(testing::config())).await;
        let req = test::TestRequest::get().uri("/api/v1/auth/me").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["cause"], "unauthorized");
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        let app = test::init_service(testing::app(testing::config())).await;
        let req = test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn admin_claim_is_checked_against_the_database() {
        let config = testing::config();
        let app = test::init_service(testing::app(config.clone())).await;
        let req = test::TestRequest::get()
            .uri("/api/v1/users")
            .insert_header(testing::bearer(&config, Role::Admin))
            .to_request();
        let resp = test::call_service(&app, req).await;

        // Nothing listens on the test database, so only a lookup can fail here.
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["cause"], "database");
    }

    #[actix_web::test]
    async fn register_validates_before_touching_the_database() {
        let app = test::init_service(testing::app(testing::config())).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(serde_json::json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "short"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn logout_clears_cookie() {
        let config = testing::config();
        let app = test::init_service(testing::app(config.clone())).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/logout")
            .insert_header(testing::bearer(&config, Role::User))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == config.auth.cookie_name)
            .expect("removal cookie");
        assert_eq!(cookie.value(), "");
    }
}
