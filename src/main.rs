//! Bookstore Assistant - HTTP server
//!
//! Serves the chat assistant as a small JSON API over a SQLite catalog.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstore_assistant::config::Config;
use bookstore_assistant::store::{BookStore, SqliteStore};
use bookstore_assistant::{routes, AppState, Assistant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookstore_assistant=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let assistant_config = config.load_assistant_config()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let store = Arc::new(SqliteStore::new(&config.db_path).await?);
    let stats = store.statistics().await?;
    tracing::info!(
        db = %config.db_path.display(),
        books = stats.books,
        orders = stats.orders,
        "catalog opened"
    );

    let cleanup_interval = assistant_config.session.cleanup_interval();
    let assistant = Arc::new(Assistant::new(store, assistant_config));
    let _cleanup = Arc::clone(assistant.sessions()).spawn_cleanup(cleanup_interval);

    let state = AppState { assistant };

    let app = Router::new()
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    tracing::info!("Bookstore assistant running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
