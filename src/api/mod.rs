// src/api/mod.rs
pub mod auth;
pub mod channels;
pub mod courses;
pub mod health;
pub mod interview;
pub mod playlists;
pub mod quizzes;
pub mod services;
pub mod shared;
pub mod users;
pub mod videos;

use actix_web::{error, web};

use crate::error::AppError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::BadRequest(format!("Invalid path: {}", err)))
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::BadRequest(format!("Invalid JSON body: {}", err)))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::BadRequest(format!("Invalid query: {}", err)))
    }))
    .service(
        web::scope("/api/v1")
            .configure(auth::configure)
            .configure(users::configure)
            .configure(channels::configure)
            .configure(courses::configure)
            .configure(playlists::configure)
            .configure(videos::configure)
            .configure(quizzes::configure)
            .configure(services::configure)
            .configure(interview::configure)
            .configure(health::configure),
    );
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use actix_web::{web, App};
    use uuid::Uuid;

    use crate::config::AppConfig;
    use crate::db;
    use crate::services::accounts::{issue_token, Role};
    use crate::services::interview::LlmClient;

    pub fn config() -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "api-test-secret".into();
        // Nothing listens here; tests only reach code paths that fail before a checkout.
        config.database.url = "postgres://nobody@127.0.0.1:1/none".into();
        Arc::new(config)
    }

    pub fn app(
        config: Arc<AppConfig>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let pool = db::create_pool(&config.database.url, 1).unwrap();
        let llm = LlmClient::new(config.llm.clone()).unwrap();
        App::new()
            .app_data(web::Data::new(pool))
            .app_data(web::Data::from(config))
            .app_data(web::Data::new(llm))
            .configure(super::configure)
    }

    pub fn bearer(config: &AppConfig, role: Role) -> (&'static str, String) {
        let token = issue_token(&config.auth, Uuid::new_v4(), role).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }
}
