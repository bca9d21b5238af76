use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted, ListMeta, ListQueryParams, Page};
use crate::db::models::{Playlist, PlaylistChanges};
use crate::db::schema::{playlists, videos};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/playlists")
            .route("", web::get().to(list_playlists))
            .route("", web::post().to(create_playlist))
            .route("/{id}", web::get().to(get_playlist))
            .route("/{id}", web::put().to(update_playlist))
            .route("/{id}", web::delete().to(delete_playlist)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlaylist {
    #[serde(rename = "type")]
    pub playlist_type: String,
    pub link: String,
    pub channel_id: Uuid,
    pub course_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistUpdate {
    #[serde(rename = "type")]
    pub playlist_type: Option<String>,
    pub link: Option<String>,
    pub channel_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistFilter {
    pub channel_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_playlists(
    query: web::Query<PlaylistFilter>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = ListQueryParams {
        page: query.page,
        per_page: query.per_page,
    }
    .window();
    let mut conn = pool.get().await?;

    let mut listing = playlists::table.into_boxed();
    let mut counting = playlists::table.into_boxed();
    if let Some(channel_id) = query.channel_id {
        listing = listing.filter(playlists::channel_id.eq(channel_id));
        counting = counting.filter(playlists::channel_id.eq(channel_id));
    }
    if let Some(course_id) = query.course_id {
        listing = listing.filter(playlists::course_id.eq(course_id));
        counting = counting.filter(playlists::course_id.eq(course_id));
    }

    let items = listing
        .order_by(playlists::created_at.desc())
        .offset(offset)
        .limit(per_page)
        .select(Playlist::as_select())
        .load::<Playlist>(&mut conn)
        .await?;
    let total: i64 = counting.count().get_result(&mut conn).await?;

    Ok(ok(Page {
        items,
        meta: ListMeta::new(total, page, per_page),
    }))
}

pub async fn get_playlist(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let playlist = playlists::table
        .find(path.into_inner())
        .select(Playlist::as_select())
        .first::<Playlist>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Playlist".to_string()))?;

    Ok(ok(playlist))
}

pub async fn create_playlist(
    _admin: AdminUser,
    body: web::Json<NewPlaylist>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let now = Utc::now().naive_utc();
    let playlist = Playlist {
        id: Uuid::new_v4(),
        playlist_type: required("type", &body.playlist_type)?,
        link: required("link", &body.link)?,
        channel_id: body.channel_id,
        course_id: body.course_id,
        created_at: now,
        updated_at: now,
    };

    let mut conn = pool.get().await?;
    // A duplicate link surfaces as 409 through the unique constraint.
    diesel::insert_into(playlists::table)
        .values(&playlist)
        .execute(&mut conn)
        .await?;

    log::info!("Created playlist {} ({})", playlist.id, playlist.link);
    Ok(created(playlist))
}

pub async fn update_playlist(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<PlaylistUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let changes = PlaylistChanges {
        playlist_type: body
            .playlist_type
            .as_deref()
            .map(|t| required("type", t))
            .transpose()?,
        link: body.link.as_deref().map(|l| required("link", l)).transpose()?,
        channel_id: body.channel_id,
        course_id: body.course_id,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let id = path.into_inner();
    let moved = changes.channel_id.is_some() || changes.course_id.is_some();

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let playlist = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let playlist = diesel::update(playlists::table.find(id))
                    .set(&changes)
                    .returning(Playlist::as_returning())
                    .get_result::<Playlist>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::NotFound("Playlist".to_string()))?;

                // Videos carry the playlist's channel and course; keep them in step.
                if moved {
                    let updated = diesel::update(videos::table.filter(videos::playlist_id.eq(id)))
                        .set((
                            videos::channel_id.eq(playlist.channel_id),
                            videos::course_id.eq(playlist.course_id),
                        ))
                        .execute(conn)
                        .await?;
                    log::info!("Moved playlist {} with {} videos", id, updated);
                }
                Ok(playlist)
            }
            .scope_boxed()
        })
        .await?;

    Ok(ok(playlist))
}

pub async fn delete_playlist(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let mut conn = pool.get().await?;

    // Videos and the playlist's quiz go with it (ON DELETE CASCADE).
    let deleted = diesel::delete(playlists::table.find(id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Playlist".to_string()));
    }

    log::info!("Deleted playlist {}", id);
    Ok(ok(Deleted { id }))
}
