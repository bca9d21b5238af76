use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

use prepdesk::{api, config, db, services};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists
    dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    let config = config::AppConfig::new().expect("Failed to load configuration");
    let config = Arc::new(config);

    if config.uses_dev_secret() {
        log::warn!("Using the development JWT secret; set APP__AUTH__JWT_SECRET in production");
    }
    if config.llm.api_key.trim().is_empty() {
        log::warn!("APP__LLM__API_KEY is not set; interview endpoints will answer 503");
    }

    log::info!(
        "Starting server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Create upload directory if it doesn't exist
    tokio::fs::create_dir_all(&config.storage.upload_path)
        .await
        .expect("Failed to create upload directory");

    // Create DB pool
    let pool = db::create_pool(&config.database.url, config.database.max_connections)
        .expect("Failed to create database pool");

    {
        let mut conn = pool.get().await.expect("Failed to connect to database");
        services::accounts::ensure_bootstrap_admin(&mut conn, &config.auth)
            .await
            .expect("Failed to create bootstrap admin");
    }

    let llm = services::interview::LlmClient::new(config.llm.clone())
        .expect("Failed to build LLM client");

    let c = config.clone();
    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/uploads", &c.storage.upload_path))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(c.clone()))
            .app_data(web::Data::new(llm.clone()))
            .wrap(actix_cors::Cors::permissive()) // Configure properly in production
            .configure(api::configure)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run()
    .await
}
