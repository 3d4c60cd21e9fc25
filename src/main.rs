mod config;
mod core;
mod engine;
mod models;
mod routes;
mod services;

use actix_cors::Cors;
use actix_multipart::form::MultipartFormConfig;
use actix_web::{http, middleware, web, App, HttpServer};
use config::Settings;
use engine::{FaceInference, OnnxFaceEngine};
use routes::{handle_json_payload_error, handle_multipart_error, AppState};
use services::{DriveClient, ImageFetcher};
use std::sync::Arc;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt().with_target(false).with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting Facefind service...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    if settings.google.api_key.is_none() {
        error!("MY_GOOGLE_API_KEY is not set; Drive listing requests will fail");
    }

    // Preload the face models; they are read-only afterwards
    let engine = OnnxFaceEngine::load(&settings.models).unwrap_or_else(|e| {
        error!("Failed to load face models: {}", e);
        panic!("Face engine error: {}", e);
    });
    let engine: Arc<dyn FaceInference> = Arc::new(engine);

    info!("Face engine initialized");

    // Initialize the Drive client
    let drive = Arc::new(DriveClient::new(
        settings.google.drive_endpoint.clone(),
        settings.google.api_key.clone(),
        settings.google.timeout_secs,
    ));

    info!("Drive client initialized");

    // Initialize the target-image fetcher
    let fetcher = Arc::new(ImageFetcher::new(settings.fetch.timeout_secs));

    info!(
        "Image fetcher initialized (timeout: {}s)",
        settings.fetch.timeout_secs
    );

    // Build application state
    let app_state = AppState {
        drive,
        fetcher,
        engine,
        max_upload_bytes: settings.upload.max_bytes,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let allowed_origin = settings.cors.allowed_origin.clone();

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        // Preflight requests are answered by the CORS middleware with an
        // empty success response; only the configured origin is accepted.
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(MultipartFormConfig::default().error_handler(handle_multipart_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
