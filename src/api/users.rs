use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{ok, ListMeta, ListQueryParams, Page};
use crate::db::models::{User, UserProfile};
use crate::db::schema::users;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::accounts::Role;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/{id}/role", web::put().to(set_role)),
    );
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub async fn list_users(
    _admin: AdminUser,
    query: web::Query<ListQueryParams>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = query.window();
    let mut conn = pool.get().await?;

    let items: Vec<UserProfile> = users::table
        .order_by(users::created_at.desc())
        .offset(offset)
        .limit(per_page)
        .select(User::as_select())
        .load::<User>(&mut conn)
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();
    let total: i64 = users::table.count().get_result(&mut conn).await?;

    Ok(ok(Page {
        items,
        meta: ListMeta::new(total, page, per_page),
    }))
}

pub async fn set_role(
    admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<RoleUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    if id == admin.0.id && body.role != Role::Admin {
        return Err(AppError::BadRequest(
            "Admins cannot demote themselves".to_string(),
        ));
    }

    let mut conn = pool.get().await?;
    let user = diesel::update(users::table.find(id))
        .set((
            users::role.eq(body.role.as_str()),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    log::info!("User {} role set to {} by {}", id, body.role, admin.0.id);
    Ok(ok(UserProfile::from(user)))
}
