mod auth;
mod context;
mod docs;
mod errors;
mod logging;
mod rooms;
mod schemas;
mod serialized;
mod sse;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use auxbox_collab::{Collab, MemoryDatabase};
use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use logging::init_logger;
pub use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// The storage engine the server runs against.
pub type Database = MemoryDatabase;

pub type Router = axum::Router<ServerContext>;

/// Starts the auxbox server
pub async fn run_server(collab: Arc<Collab<Database>>) {
    let port = env::var("AUXBOX_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sse = ServerSentEvents::new();

    let context = ServerContext {
        collab: collab.clone(),
        sse: sse.clone(),
    };

    run_event_pump(collab, sse);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/rooms", rooms::router().merge(sse::router()));

    let app = axum::Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("serves requests");
}

/// Forwards collab events to the SSE connections watching each room.
fn run_event_pump(collab: Arc<Collab<Database>>, sse: Arc<ServerSentEvents>) {
    tokio::task::spawn_blocking(move || loop {
        let event = collab.wait_for_event();
        sse.broadcast(event.into());
    });
}
