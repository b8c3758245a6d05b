use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{middleware::from_fn, middleware::Logger, web, App, HttpServer};
use chrono::Local;
use std::time::Duration;

mod config;
mod db;
mod handlers;
mod middleware;
mod migrations;
mod models;
mod services;

use config::Config;
use db::Database;
use services::retention::{self, SweepConfig};

async fn index(state: web::Data<models::AppState>) -> actix_web::Result<NamedFile> {
    let static_path = state.config.static_files_path.as_deref().unwrap_or("./static");
    Ok(NamedFile::open(format!("{}/index.html", static_path))?)
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    log::info!("Starting server at {}:{}", config.host, config.port);

    if let Some(ref path) = config.static_files_path {
        log::info!("Serving static files from: {}", path);
    }

    // Open database
    let db = Database::connect(&config)
        .await
        .map_err(|e| startup_error("Failed to open database", e))?;

    // Bring the schema up to date before anything else touches it
    let generation = migrations::detect_generation(db.pool())
        .await
        .map_err(|e| startup_error("Failed to inspect database schema", e))?;
    log::info!("Found schema generation {:?}", generation);

    let version = migrations::run(db.pool())
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    log::info!("Database migrations completed, schema version {}", version);

    // Sweep once before serving, then periodically
    let sweep_config = SweepConfig {
        retention_months: config.retention_months,
        interval: Duration::from_secs(config.sweep_interval_hours.saturating_mul(60 * 60)),
    };
    retention::sweep_best_effort(&db, Local::now().date_naive(), sweep_config.retention_months)
        .await;
    let db_for_sweeper = db.clone();
    tokio::spawn(async move {
        retention::start_sweeper(db_for_sweeper, sweep_config).await;
    });
    log::info!("Retention sweeper started");

    // Create app state
    let app_state = web::Data::new(models::AppState {
        db,
        config: config.clone(),
    });

    let static_files_path = config.static_files_path.clone();
    let allowed_origins = config.cors_origins.clone();

    // Start HTTP server
    HttpServer::new(move || {
        let allowed_origins = allowed_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origin_str = origin.to_str().unwrap_or("");
                allowed_origins.iter().any(|allowed| origin_str == allowed)
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Content-Type"])
            .supports_credentials()
            .max_age(3600);

        let mut app = App::new()
            .app_data(app_state.clone())
            .wrap(from_fn(middleware::assign_identity))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(handlers::configure_routes);

        // Serve static files if path is configured
        if let Some(ref path) = static_files_path {
            app = app
                .service(Files::new("/assets", format!("{}/assets", path)))
                .default_service(web::route().to(index));
        }

        app
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
