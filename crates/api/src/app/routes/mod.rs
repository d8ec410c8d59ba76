use axum::{Router, routing::get};

pub mod common;
pub mod me;
pub mod outings;
pub mod societies;
pub mod system;

/// Router for all participant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/me/summary", get(me::summary))
        .nest("/societies", societies::router().merge(outings::router()))
}
