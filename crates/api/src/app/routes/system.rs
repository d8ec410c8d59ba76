use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::ParticipantContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(participant): Extension<ParticipantContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "participant_id": participant.participant_id().to_string(),
    }))
}
