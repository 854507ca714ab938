/// Federation lookup endpoint
/// Serves local users to other instances in the same shape this instance consumes
use crate::{
    context::AppContext,
    db::FederationMode,
    error::{ServerError, ServerResult},
    federation::{handle::validate_username, RemoteUserPayload, LOOKUP_PATH},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::SecondsFormat;
use serde::Deserialize;

/// Build federation routes
pub fn routes() -> Router<AppContext> {
    Router::new().route(LOOKUP_PATH, get(lookup_user))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub username: String,
}

/// GET /federation/v1/users/lookup?username=
///
/// 200 with the user's public profile, or 404 with an empty body. Refused
/// with 403 while this instance's federation mode is closed.
pub async fn lookup_user(
    State(ctx): State<AppContext>,
    Query(params): Query<LookupParams>,
) -> ServerResult<Response> {
    let mode = ctx.instances.federation_mode(&ctx.local_instance.id).await?;
    if mode == FederationMode::Closed {
        return Err(ServerError::FederationDisabled);
    }

    validate_username(&params.username)?;

    let Some(user) = ctx.resolver.local().find(&params.username).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    Ok(Json(RemoteUserPayload {
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        avatar_id: user.avatar_id,
        bio: user.bio,
        created_at: Some(user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
    .into_response())
}
