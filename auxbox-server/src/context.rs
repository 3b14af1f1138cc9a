use std::sync::Arc;

use auxbox_collab::Collab;
use axum::extract::FromRef;

use crate::{sse::ServerSentEvents, Database};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab<Database>>,
    pub sse: Arc<ServerSentEvents>,
}
