/// API routes and handlers
pub mod federation;
pub mod health;
pub mod middleware;
pub mod resolve;
pub mod well_known;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(well_known::routes())
        .merge(federation::routes())
        .merge(resolve::routes())
        .merge(health::routes())
}
