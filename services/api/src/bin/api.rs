//! services/api/src/bin/api.rs

use api_lib::{
    adapters::SqliteStore,
    config::Config,
    error::ApiError,
    web::{
        access_share_handler, clone_share_handler, create_share_handler, delete_form_handler,
        get_form_handler, list_forms_handler, list_shares_handler, publish_form_handler,
        purge_forms_handler, share_info_handler, state::AppState, unlock_share_handler,
        verify_form_handler, ApiDoc,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use pawforms_core::service::FormService;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    let store = Arc::new(SqliteStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        service: FormService::new(store),
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/forms", get(list_forms_handler).delete(purge_forms_handler))
        .route(
            "/forms/{id}",
            post(publish_form_handler)
                .get(get_form_handler)
                .delete(delete_form_handler),
        )
        .route("/forms/{id}/verify", post(verify_form_handler))
        .route(
            "/forms/{id}/share",
            post(create_share_handler).get(list_shares_handler),
        )
        .route(
            "/share/{share_id}",
            get(access_share_handler).post(unlock_share_handler),
        )
        .route("/share/{share_id}/info", get(share_info_handler))
        .route("/share/{share_id}/clone", post(clone_share_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
