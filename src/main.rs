//! Yatube Backend
//!
//! Content, social graph and feed core of a blogging platform, served as a
//! JSON API over SQLite to the presentation layer.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod feed;
mod models;
mod policy;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::FeedCache;
use config::Config;
use db::{ContentStore, SocialGraph};
use errors::AppError;
use feed::FeedComposer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentStore>,
    pub social: Arc<SocialGraph>,
    pub feeds: Arc<FeedComposer>,
    pub cache: Arc<FeedCache>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the stores, the feed composer and the cache over one pool.
    pub fn new(pool: sqlx::SqlitePool, config: Config) -> Self {
        let content = ContentStore::new(pool.clone());
        let social = SocialGraph::new(pool);
        let feeds = FeedComposer::new(content.clone(), social.clone(), config.page_size);

        Self {
            content: Arc::new(content),
            social: Arc::new(social),
            feeds: Arc::new(feeds),
            cache: Arc::new(FeedCache::new(config.feed_cache)),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, fallbacks) = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    for note in &fallbacks {
        tracing::warn!("{}", note);
    }

    tracing::info!("Starting Yatube Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Page size: {}, feed cache: {}",
        config.page_size,
        if config.feed_cache { "on" } else { "off" }
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (YATUBE_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let bind_addr = config.bind_addr;
    let state = AppState::new(pool, config);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Posts
        .route("/posts", get(api::global_feed).post(api::create_post))
        .route("/posts/cache", get(api::feed_cache_stats))
        // Groups
        .route("/groups", get(api::list_groups).post(api::create_group))
        .route(
            "/groups/{slug}",
            get(api::group_feed).delete(api::delete_group),
        )
        // Following feed
        .route("/follow", get(api::follow_feed))
        // Users and profiles
        .route(
            "/users/{username}",
            get(api::get_profile)
                .put(api::register_user)
                .delete(api::delete_user),
        )
        .route("/users/{username}/follow", post(api::follow_author))
        .route("/users/{username}/unfollow", post(api::unfollow_author))
        .route(
            "/users/{username}/posts/{id}",
            get(api::get_post).put(api::edit_post),
        )
        .route(
            "/users/{username}/posts/{id}/comments",
            post(api::add_comment),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}
