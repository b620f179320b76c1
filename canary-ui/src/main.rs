//! Canary UI server - HTTP surface for a producing-test session.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use canary::controller::SessionController;
use canary::io::client::HttpTestRepository;
use canary::io::config::load_config;
use canary::logging;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "canary-ui")]
#[command(about = "Web UI backend for message-producing conformance tests")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Client config (TOML); missing file means defaults
    #[arg(long, default_value = "canary.toml")]
    config: PathBuf,

    /// Override the test service base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Directory containing UI static files (defaults to ./ui/dist)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_with(logging::SERVER_DIRECTIVES);

    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    let repository = HttpTestRepository::new(&config)?;
    info!(api_url = %config.api_url, "starting canary-ui");

    let state = AppState::new(SessionController::new(
        repository,
        config.message_type_table(),
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router::<HttpTestRepository>())
        .route("/events", get(sse::events_handler::<HttpTestRepository>))
        .layer(cors)
        .with_state(state);

    let ui_dir = args.ui_dir.unwrap_or_else(|| PathBuf::from("ui").join("dist"));
    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
