//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{HttpSmsSender, LoggingSmsSender, PgStore},
    config::Config,
    error::ApiError,
    web::{
        available_numbers_handler, create_poll_handler, delete_poll_handler, get_poll_handler,
        list_polls_handler, register_voter_handler, require_auth, state::AppState,
        update_poll_handler, verify_voter_handler, vote_webhook_handler, ApiDoc,
    },
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use textpoll_core::ports::SmsSender;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    if config.phone_numbers.is_empty() {
        warn!("PHONE_NUMBERS is empty; polls cannot enable SMS voting");
    }

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone(), config.jwt_secret.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the SMS Adapter ---
    // Without full gateway credentials, verification codes are logged
    // instead of delivered.
    let sms: Arc<dyn SmsSender> = match (
        config.sms_api_url.clone(),
        config.sms_account_sid.clone(),
        config.sms_auth_token.clone(),
        config.sms_from_number.clone(),
    ) {
        (Some(api_url), Some(account_sid), Some(auth_token), Some(from_number)) => Arc::new(
            HttpSmsSender::new(api_url, account_sid, auth_token, from_number),
        ),
        _ => {
            warn!("SMS gateway credentials incomplete; using the logging sender");
            Arc::new(LoggingSmsSender)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        sms,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required): the webhook authenticates by
    // signature, registration by code, and poll pages are shareable.
    let public_routes = Router::new()
        .route("/webhooks/vote", post(vote_webhook_handler))
        .route("/voters/register", post(register_voter_handler))
        .route("/voters/verify", post(verify_voter_handler))
        .route("/polls/{id}", get(get_poll_handler));

    // Protected routes (author token required)
    let protected_routes = Router::new()
        .route("/polls", post(create_poll_handler).get(list_polls_handler))
        .route(
            "/polls/{id}",
            put(update_poll_handler).delete(delete_poll_handler),
        )
        .route("/phone-numbers", get(available_numbers_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
