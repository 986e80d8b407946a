use axum::http::{HeaderName, Method};
use roomchat_server::{config::Config, db, routes, ws, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomchat_server=info".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = db::init_pool(&config.database_path)
        .await
        .expect("Failed to initialize database");

    let terms = config.load_terms().expect("Failed to read moderation terms");
    tracing::info!("Loaded {} moderation terms", terms.len());

    let state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        gateway: Arc::new(ws::gateway::GatewayState::new()),
        terms,
    });

    let app = routes::build_router(state.clone()).layer(
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                HeaderName::from_static("content-type"),
                HeaderName::from_static("cookie"),
                HeaderName::from_static("authorization"),
            ])
            .allow_credentials(true),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");

    tracing::info!("Roomchat server running on {}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
