/// Handle resolution endpoint
use crate::{context::AppContext, error::ServerResult, identity::ResolvedUser};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

/// Build resolution routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/v1/resolve", get(resolve_handle))
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub handle: String,
}

/// GET /api/v1/resolve?handle=
///
/// Accepts `username`, `@username`, `username@domain` and `@username@domain`.
pub async fn resolve_handle(
    State(ctx): State<AppContext>,
    Query(params): Query<ResolveParams>,
) -> ServerResult<Json<ResolvedUser>> {
    let resolved = ctx.resolver.resolve(&params.handle).await?;
    Ok(Json(resolved))
}
