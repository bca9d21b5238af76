use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted};
use crate::config::AppConfig;
use crate::db::models::{Service, ServiceChanges};
use crate::db::schema::services;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::slug::slugify;
use crate::services::uploads::{self, ServiceForm};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/services")
            .route("", web::get().to(list_services))
            .route("", web::post().to(create_service))
            .route("/slug/{slug}", web::get().to(get_service_by_slug))
            .route("/{id}", web::get().to(get_service))
            .route("/{id}", web::put().to(update_service))
            .route("/{id}", web::delete().to(delete_service)),
    );
}

fn slug_for(title: &str) -> AppResult<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "title must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

pub async fn list_services(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let items = services::table
        .order_by(services::created_at.desc())
        .select(Service::as_select())
        .load::<Service>(&mut conn)
        .await?;

    Ok(ok(items))
}

pub async fn get_service(path: web::Path<Uuid>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let service = services::table
        .find(path.into_inner())
        .select(Service::as_select())
        .first::<Service>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Service".to_string()))?;

    Ok(ok(service))
}

pub async fn get_service_by_slug(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let service = services::table
        .filter(services::slug.eq(path.into_inner()))
        .select(Service::as_select())
        .first::<Service>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Service".to_string()))?;

    Ok(ok(service))
}

pub async fn create_service(
    _admin: AdminUser,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> AppResult<HttpResponse> {
    let upload_root = &config.storage.upload_path;
    let form =
        uploads::read_service_form(payload, upload_root, config.storage.max_file_size).await?;

    match insert_service(&form, &pool).await {
        Ok(service) => {
            log::info!("Created service {} ({})", service.id, service.slug);
            Ok(created(service))
        }
        Err(e) => {
            uploads::remove_images(upload_root, &form.images).await;
            Err(e)
        }
    }
}

async fn insert_service(form: &ServiceForm, pool: &DbPool) -> AppResult<Service> {
    let title = required("title", form.title.as_deref().unwrap_or_default())?;
    let slug = slug_for(&title)?;
    let now = Utc::now().naive_utc();
    let service = Service {
        id: Uuid::new_v4(),
        title,
        description: form.description.clone(),
        slug,
        images: form.images.clone(),
        created_at: now,
        updated_at: now,
    };

    let mut conn = pool.get().await?;
    // A duplicate slug surfaces as 409 through the unique constraint.
    diesel::insert_into(services::table)
        .values(&service)
        .execute(&mut conn)
        .await?;
    Ok(service)
}

/// New images, when any are sent, replace the old ones.
pub async fn update_service(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let upload_root = &config.storage.upload_path;
    let form =
        uploads::read_service_form(payload, upload_root, config.storage.max_file_size).await?;

    match apply_update(id, &form, &pool).await {
        Ok((service, replaced)) => {
            uploads::remove_images(upload_root, &replaced).await;
            Ok(ok(service))
        }
        Err(e) => {
            uploads::remove_images(upload_root, &form.images).await;
            Err(e)
        }
    }
}

async fn apply_update(id: Uuid, form: &ServiceForm, pool: &DbPool) -> AppResult<(Service, Vec<String>)> {
    let title = form
        .title
        .as_deref()
        .map(|t| required("title", t))
        .transpose()?;
    let slug = title.as_deref().map(slug_for).transpose()?;

    let mut conn = pool.get().await?;
    let existing = services::table
        .find(id)
        .select(Service::as_select())
        .first::<Service>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Service".to_string()))?;

    let (images, replaced) = if form.images.is_empty() {
        (None, Vec::new())
    } else {
        (Some(form.images.clone()), existing.images)
    };
    let changes = ServiceChanges {
        title,
        description: form.description.clone(),
        slug,
        images,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let service = diesel::update(services::table.find(id))
        .set(&changes)
        .returning(Service::as_returning())
        .get_result::<Service>(&mut conn)
        .await?;
    Ok((service, replaced))
}

pub async fn delete_service(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let mut conn = pool.get().await?;

    let images = diesel::delete(services::table.find(id))
        .returning(services::images)
        .get_result::<Vec<String>>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Service".to_string()))?;
    uploads::remove_images(&config.storage.upload_path, &images).await;

    log::info!("Deleted service {}", id);
    Ok(ok(Deleted { id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    use crate::api::testing;
    use crate::services::accounts::Role;

    #[test]
    fn slug_requires_alphanumerics() {
        assert_eq!(slug_for("Resume Review").unwrap(), "resume-review");
        assert!(matches!(slug_for("!!!"), Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn create_requires_admin() {
        let config = testing::config();
        let app = actix_test::init_service(testing::app(config.clone())).await;
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/services")
            .insert_header(testing::bearer(&config, Role::User))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
