use axum::{
    extract::{Query, State},
    routing::get,
    Json,
};
use oktv_collab::SearchProvider;
use validator::Validate;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::SearchQuery,
    serialized::{SearchResult, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/search",
    tag = "search",
    params(SearchQuery),
    responses(
        (status = 200, body = Vec<SearchResult>),
        (status = 502, description = "The search provider failed")
    )
)]
async fn search(
    State(context): State<ServerContext>,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<Vec<SearchResult>>> {
    query
        .validate()
        .map_err(|err| ServerError::BadRequest(err.to_string()))?;

    let results = context.collab.search.search(&query.query).await?;

    Ok(Json(results.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/", get(search))
}
