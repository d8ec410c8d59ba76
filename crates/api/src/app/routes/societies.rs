use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use compass_core::SocietyId;
use compass_outings::CreateSociety;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ParticipantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_society).get(list_societies))
        .route("/join", post(join_by_code))
        .route("/:society_id", get(get_society))
        .route("/:society_id/join", post(join_society))
        .route("/:society_id/summary", get(society_summary))
}

pub async fn create_society(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Json(body): Json<dto::CreateSocietyRequest>,
) -> Response {
    let cmd = CreateSociety {
        society_id: SocietyId::new(),
        name: body.name,
        code: body.code,
        created_by: caller.participant_id(),
        occurred_at: Utc::now(),
    };

    match services.create_society(cmd) {
        Ok(s) => (StatusCode::CREATED, Json(dto::society_to_json(&s))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Societies the caller belongs to, with their own standing in each.
pub async fn list_societies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
) -> Result<Response, Response> {
    let me = caller.participant_id();
    let memberships = services
        .directory()
        .memberships(me)
        .map_err(errors::dispatch_error_to_response)?;

    let mut items = Vec::with_capacity(memberships.len());
    for society in &memberships {
        let outing_count = services
            .queries()
            .outings(society.id_typed())
            .map_err(errors::dispatch_error_to_response)?
            .len();
        items.push(dto::membership_to_json(society, &me, outing_count));
    }

    Ok((StatusCode::OK, Json(items)).into_response())
}

pub async fn get_society(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path(society_id): Path<String>,
) -> Response {
    let society_id = match common::society_id(&society_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.require_member(society_id, caller.participant_id()) {
        Ok(s) => (StatusCode::OK, Json(dto::society_to_json(&s))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Join with nothing but the code; the society is looked up from it.
pub async fn join_by_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Json(body): Json<dto::JoinSocietyRequest>,
) -> Response {
    match services.join_by_code(caller.participant_id(), body.code) {
        Ok(s) => (StatusCode::OK, Json(dto::society_to_json(&s))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn join_society(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path(society_id): Path<String>,
    Json(body): Json<dto::JoinSocietyRequest>,
) -> Response {
    let society_id = match common::society_id(&society_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.join_society(society_id, caller.participant_id(), body.code) {
        Ok(s) => (StatusCode::OK, Json(dto::society_to_json(&s))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn society_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path(society_id): Path<String>,
) -> Response {
    let society_id = match common::society_id(&society_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = services.require_member(society_id, caller.participant_id()) {
        return errors::dispatch_error_to_response(e);
    }

    match services.queries().society_summary(society_id) {
        Ok(summary) => (
            StatusCode::OK,
            Json(dto::summary_to_json(&summary, services.currency_scale())),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
