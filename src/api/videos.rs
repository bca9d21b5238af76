use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted, ListMeta, ListQueryParams, Page};
use crate::db::models::{Playlist, Video, VideoChanges};
use crate::db::schema::{playlists, videos};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

const MAX_BULK_VIDEOS: usize = 500;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/videos")
            .route("", web::get().to(list_videos))
            .route("", web::post().to(create_video))
            .route("/bulk", web::post().to(create_videos_bulk))
            .route("/{id}", web::get().to(get_video))
            .route("/{id}", web::put().to(update_video))
            .route("/{id}", web::delete().to(delete_video)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub title: String,
    pub link: String,
    pub playlist_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct VideoEntry {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVideos {
    pub playlist_id: Uuid,
    pub videos: Vec<VideoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFilter {
    pub playlist_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

async fn find_playlist(conn: &mut AsyncPgConnection, id: Uuid) -> AppResult<Playlist> {
    playlists::table
        .find(id)
        .select(Playlist::as_select())
        .first::<Playlist>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Playlist".to_string()))
}

/// Channel and course are copied from the playlist.
fn video_in(playlist: &Playlist, title: &str, link: &str) -> AppResult<Video> {
    let now = Utc::now().naive_utc();
    Ok(Video {
        id: Uuid::new_v4(),
        title: required("title", title)?,
        link: required("link", link)?,
        playlist_id: playlist.id,
        channel_id: playlist.channel_id,
        course_id: playlist.course_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_videos(
    query: web::Query<VideoFilter>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = ListQueryParams {
        page: query.page,
        per_page: query.per_page,
    }
    .window();
    let mut conn = pool.get().await?;

    let mut listing = videos::table.into_boxed();
    let mut counting = videos::table.into_boxed();
    if let Some(playlist_id) = query.playlist_id {
        listing = listing.filter(videos::playlist_id.eq(playlist_id));
        counting = counting.filter(videos::playlist_id.eq(playlist_id));
    }

    let items = listing
        .order_by(videos::created_at.asc())
        .offset(offset)
        .limit(per_page)
        .select(Video::as_select())
        .load::<Video>(&mut conn)
        .await?;
    let total: i64 = counting.count().get_result(&mut conn).await?;

    Ok(ok(Page {
        items,
        meta: ListMeta::new(total, page, per_page),
    }))
}

pub async fn get_video(path: web::Path<Uuid>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let video = videos::table
        .find(path.into_inner())
        .select(Video::as_select())
        .first::<Video>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Video".to_string()))?;

    Ok(ok(video))
}

pub async fn create_video(
    _admin: AdminUser,
    body: web::Json<NewVideo>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    required("title", &body.title)?;
    required("link", &body.link)?;

    let mut conn = pool.get().await?;
    let playlist = find_playlist(&mut conn, body.playlist_id).await?;
    let video = video_in(&playlist, &body.title, &body.link)?;

    diesel::insert_into(videos::table)
        .values(&video)
        .execute(&mut conn)
        .await?;

    Ok(created(video))
}

pub async fn create_videos_bulk(
    _admin: AdminUser,
    body: web::Json<BulkVideos>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if body.videos.is_empty() {
        return Err(AppError::BadRequest("videos must not be empty".to_string()));
    }
    if body.videos.len() > MAX_BULK_VIDEOS {
        return Err(AppError::BadRequest(format!(
            "At most {} videos per request",
            MAX_BULK_VIDEOS
        )));
    }

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let inserted = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let playlist = find_playlist(conn, body.playlist_id).await?;
                let rows = body
                    .videos
                    .iter()
                    .map(|v| video_in(&playlist, &v.title, &v.link))
                    .collect::<AppResult<Vec<Video>>>()?;

                diesel::insert_into(videos::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;
                Ok(rows)
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Imported {} videos", inserted.len());
    Ok(created(inserted))
}

pub async fn update_video(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<VideoUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let changes = VideoChanges {
        title: body.title.as_deref().map(|t| required("title", t)).transpose()?,
        link: body.link.as_deref().map(|l| required("link", l)).transpose()?,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let mut conn = pool.get().await?;
    let video = diesel::update(videos::table.find(path.into_inner()))
        .set(&changes)
        .returning(Video::as_returning())
        .get_result::<Video>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Video".to_string()))?;

    Ok(ok(video))
}

pub async fn delete_video(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let mut conn = pool.get().await?;

    let deleted = diesel::delete(videos::table.find(id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Video".to_string()));
    }

    Ok(ok(Deleted { id }))
}
