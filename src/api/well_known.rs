/// Well-known endpoints
/// Handles /.well-known/federation, the discovery document other instances fetch
use crate::{
    context::AppContext, error::ServerResult, federation::DiscoveryDocument,
    federation::DISCOVERY_PATH,
};
use axum::{extract::State, response::Json, routing::get, Router};

/// Build well-known routes
pub fn routes() -> Router<AppContext> {
    Router::new().route(DISCOVERY_PATH, get(discovery_document))
}

/// /.well-known/federation
///
/// Describes this instance. The federation mode is read from the database so
/// runtime changes are advertised immediately.
pub async fn discovery_document(
    State(ctx): State<AppContext>,
) -> ServerResult<Json<DiscoveryDocument>> {
    let local = &ctx.local_instance;
    let federation_mode = ctx.instances.federation_mode(&local.id).await?;

    Ok(Json(DiscoveryDocument {
        instance_id: local.id.clone(),
        domain: local.domain.clone(),
        public_key: local.public_key.clone(),
        name: local.name.clone(),
        software: local.software.clone(),
        federation_mode,
    }))
}
