use std::{
    env, thread,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::routing::get;
use log::{info, warn};
use oktv_collab::{store::MemoryStore, Collab, CollabConfig, YouTubeSearch};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod context;
mod docs;
mod errors;
mod logging;
mod rooms;
mod schemas;
mod search;
mod serialized;
mod sse;

pub use logging::init_logger;

use context::ServerContext;
use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type OkTv = Collab<MemoryStore, YouTubeSearch>;
pub type Router = axum::Router<ServerContext>;

/// Starts the OkTV server
pub async fn run_server() {
    let port = env::var("OKTV_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let config = config_from_env();

    if config.youtube_api_key.is_empty() {
        warn!("OKTV_YOUTUBE_API_KEY is not set, search will be unavailable");
    }

    let provider = YouTubeSearch::new(&config.youtube_api_key, config.search_limit);
    let collab = Arc::new(Collab::new(MemoryStore::new(), provider, config));
    let sse = ServerSentEvents::new();

    spawn_event_pump(collab.clone(), sse.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext { collab, sse };

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/search", search::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .unwrap();
}

fn config_from_env() -> CollabConfig {
    let defaults = CollabConfig::default();

    CollabConfig {
        public_url: env::var("OKTV_PUBLIC_URL").unwrap_or(defaults.public_url),
        youtube_api_key: env::var("OKTV_YOUTUBE_API_KEY").unwrap_or(defaults.youtube_api_key),
        search_limit: defaults.search_limit,
        stale_user_timeout: env::var("OKTV_STALE_USER_SECONDS")
            .ok()
            .map(|x| x.parse::<u64>().expect("Staleness window must be a number"))
            .map(Duration::from_secs),
    }
}

/// Drains the collab event bus into the SSE connection manager.
fn spawn_event_pump(collab: Arc<OkTv>, sse: Arc<ServerSentEvents>) {
    thread::spawn(move || loop {
        sse.broadcast(collab.wait_for_event().into())
    });
}
