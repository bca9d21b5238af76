use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted, ListMeta, ListQueryParams, Page};
use crate::db::models::{Channel, ChannelChanges, ChannelWithCourses};
use crate::db::schema::channels;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::membership::{self, Owner};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/channels")
            .route("", web::get().to(list_channels))
            .route("", web::post().to(create_channel))
            .route("/{id}", web::get().to(get_channel))
            .route("/{id}", web::put().to(update_channel))
            .route("/{id}", web::delete().to(delete_channel)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChannel {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub courses: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    /// `None` leaves memberships alone; `Some(vec![])` clears them.
    pub courses: Option<Vec<Uuid>>,
}

async fn load_channel(conn: &mut AsyncPgConnection, id: Uuid) -> AppResult<ChannelWithCourses> {
    let channel = channels::table
        .find(id)
        .select(Channel::as_select())
        .first::<Channel>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Channel".to_string()))?;
    let courses = membership::linked(conn, Owner::Channel(id)).await?;

    Ok(ChannelWithCourses { channel, courses })
}

pub async fn list_channels(
    query: web::Query<ListQueryParams>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = query.window();
    let mut conn = pool.get().await?;

    let channel_list = channels::table
        .order_by(channels::created_at.desc())
        .offset(offset)
        .limit(per_page)
        .select(Channel::as_select())
        .load::<Channel>(&mut conn)
        .await?;

    let ids: Vec<Uuid> = channel_list.iter().map(|c| c.id).collect();
    let mut courses = membership::linked_many(&mut conn, ids, true).await?;

    let items: Vec<ChannelWithCourses> = channel_list
        .into_iter()
        .map(|channel| ChannelWithCourses {
            courses: courses.remove(&channel.id).unwrap_or_default(),
            channel,
        })
        .collect();

    let total: i64 = channels::table.count().get_result(&mut conn).await?;

    Ok(ok(Page {
        items,
        meta: ListMeta::new(total, page, per_page),
    }))
}

pub async fn get_channel(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    Ok(ok(load_channel(&mut conn, path.into_inner()).await?))
}

pub async fn create_channel(
    _admin: AdminUser,
    body: web::Json<NewChannel>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let now = Utc::now().naive_utc();
    let channel = Channel {
        id: Uuid::new_v4(),
        name: required("name", &body.name)?,
        description: body.description,
        image_url: body.image_url,
        link: body.link,
        created_at: now,
        updated_at: now,
    };
    let courses = body.courses;

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let result = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                diesel::insert_into(channels::table)
                    .values(&channel)
                    .execute(conn)
                    .await?;
                membership::sync(conn, Owner::Channel(channel.id), &courses).await?;
                load_channel(conn, channel.id).await
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Created channel {}", result.channel.id);
    Ok(created(result))
}

pub async fn update_channel(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<ChannelUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let body = body.into_inner();
    let changes = ChannelChanges {
        name: body
            .name
            .as_deref()
            .map(|n| required("name", n))
            .transpose()?,
        description: body.description,
        image_url: body.image_url,
        link: body.link,
        updated_at: Some(Utc::now().naive_utc()),
    };
    let courses = body.courses;

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let result = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let updated = diesel::update(channels::table.find(id))
                    .set(&changes)
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Err(AppError::NotFound("Channel".to_string()));
                }
                if let Some(courses) = courses {
                    membership::sync(conn, Owner::Channel(id), &courses).await?;
                }
                load_channel(conn, id).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(ok(result))
}

pub async fn delete_channel(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let pulled = membership::detach_all(conn, Owner::Channel(id)).await?;
            let deleted = diesel::delete(channels::table.find(id))
                .execute(conn)
                .await?;
            if deleted == 0 {
                return Err(AppError::NotFound("Channel".to_string()));
            }
            log::info!("Deleted channel {} (pulled from {} courses)", id, pulled);
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    Ok(ok(Deleted { id }))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::api::testing;
    use crate::services::accounts::Role;

    #[actix_web::test]
    async fn mutations_require_a_token() {
        let app = test::init_service(testing::app(testing::config())).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/channels")
            .set_json(serde_json::json!({ "name": "Fireship" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn mutations_require_admin_role() {
        let config = testing::config();
        let app = test::init_service(testing::app(config.clone())).await;
        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/channels/{}", uuid::Uuid::new_v4()))
            .insert_header(testing::bearer(&config, Role::User))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn malformed_id_is_bad_request() {
        let app = test::init_service(testing::app(testing::config())).await;
        let req = test::TestRequest::get()
            .uri("/api/v1/channels/not-a-uuid")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
