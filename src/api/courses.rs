use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted, ListMeta, ListQueryParams, Page};
use crate::db::models::{Course, CourseChanges, CourseWithChannels};
use crate::db::schema::courses;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::membership::{self, Owner};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/courses")
            .route("", web::get().to(list_courses))
            .route("", web::post().to(create_course))
            .route("/{id}", web::get().to(get_course))
            .route("/{id}", web::put().to(update_course))
            .route("/{id}", web::delete().to(delete_course)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub channels: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub channels: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFilter {
    pub category: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

async fn load_course(conn: &mut AsyncPgConnection, id: Uuid) -> AppResult<CourseWithChannels> {
    let course = courses::table
        .find(id)
        .select(Course::as_select())
        .first::<Course>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Course".to_string()))?;
    let channels = membership::linked(conn, Owner::Course(id)).await?;

    Ok(CourseWithChannels { course, channels })
}

pub async fn list_courses(
    query: web::Query<CourseFilter>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = ListQueryParams {
        page: query.page,
        per_page: query.per_page,
    }
    .window();
    let mut conn = pool.get().await?;

    let mut listing = courses::table.into_boxed();
    let mut counting = courses::table.into_boxed();
    if let Some(category) = query.category {
        listing = listing.filter(courses::category.eq(category.clone()));
        counting = counting.filter(courses::category.eq(category));
    }

    let course_list = listing
        .order_by(courses::created_at.desc())
        .offset(offset)
        .limit(per_page)
        .select(Course::as_select())
        .load::<Course>(&mut conn)
        .await?;

    let ids: Vec<Uuid> = course_list.iter().map(|c| c.id).collect();
    let mut channels = membership::linked_many(&mut conn, ids, false).await?;

    let items: Vec<CourseWithChannels> = course_list
        .into_iter()
        .map(|course| CourseWithChannels {
            channels: channels.remove(&course.id).unwrap_or_default(),
            course,
        })
        .collect();

    let total: i64 = counting.count().get_result(&mut conn).await?;

    Ok(ok(Page {
        items,
        meta: ListMeta::new(total, page, per_page),
    }))
}

pub async fn get_course(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    Ok(ok(load_course(&mut conn, path.into_inner()).await?))
}

pub async fn create_course(
    _admin: AdminUser,
    body: web::Json<NewCourse>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let now = Utc::now().naive_utc();
    let course = Course {
        id: Uuid::new_v4(),
        name: required("name", &body.name)?,
        description: body.description,
        category: body.category,
        created_at: now,
        updated_at: now,
    };
    let channels = body.channels;

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let result = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                diesel::insert_into(courses::table)
                    .values(&course)
                    .execute(conn)
                    .await?;
                membership::sync(conn, Owner::Course(course.id), &channels).await?;
                load_course(conn, course.id).await
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Created course {}", result.course.id);
    Ok(created(result))
}

pub async fn update_course(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<CourseUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let body = body.into_inner();
    let changes = CourseChanges {
        name: body
            .name
            .as_deref()
            .map(|n| required("name", n))
            .transpose()?,
        description: body.description,
        category: body.category,
        updated_at: Some(Utc::now().naive_utc()),
    };
    let channels = body.channels;

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let result = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let updated = diesel::update(courses::table.find(id))
                    .set(&changes)
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Err(AppError::NotFound("Course".to_string()));
                }
                if let Some(channels) = channels {
                    membership::sync(conn, Owner::Course(id), &channels).await?;
                }
                load_course(conn, id).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(ok(result))
}

pub async fn delete_course(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let pulled = membership::detach_all(conn, Owner::Course(id)).await?;
            let deleted = diesel::delete(courses::table.find(id))
                .execute(conn)
                .await?;
            if deleted == 0 {
                return Err(AppError::NotFound("Course".to_string()));
            }
            log::info!("Deleted course {} (pulled from {} channels)", id, pulled);
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    Ok(ok(Deleted { id }))
}
