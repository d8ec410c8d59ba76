use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ParticipantContext;

/// The caller's totals across every society they belong to.
pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
) -> Result<Response, Response> {
    let me = caller.participant_id();
    let memberships = services
        .directory()
        .memberships(me)
        .map_err(errors::dispatch_error_to_response)?;
    let summary = services
        .queries()
        .participant_summary(me, &memberships)
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::OK,
        Json(dto::participant_summary_to_json(&summary, services.currency_scale())),
    )
        .into_response())
}
