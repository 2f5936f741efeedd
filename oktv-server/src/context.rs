use std::sync::Arc;

use axum::extract::FromRef;

use crate::{sse::ServerSentEvents, OkTv};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<OkTv>,
    pub sse: Arc<ServerSentEvents>,
}
