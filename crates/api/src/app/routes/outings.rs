use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use compass_core::{AggregateId, DomainError, InstanceId, Money, ParticipantId, SocietyId};
use compass_ledger::ExpenseInstance;
use compass_outings::{
    AddParticipant, CompleteOuting, CreateOuting, Outing, OutingCommand, OutingId, RecordInstance,
    Society, outing,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ParticipantContext;

pub fn router() -> Router {
    Router::new()
        .route("/:society_id/outings", post(create_outing).get(list_outings))
        .route("/:society_id/outings/:outing_id", get(get_outing))
        .route(
            "/:society_id/outings/:outing_id/participants",
            post(add_participant),
        )
        .route(
            "/:society_id/outings/:outing_id/instances",
            post(record_instance),
        )
        .route(
            "/:society_id/outings/:outing_id/complete",
            post(complete_outing),
        )
        .route(
            "/:society_id/outings/:outing_id/settlement",
            get(get_settlement),
        )
        .route(
            "/:society_id/outings/:outing_id/balances/me",
            get(get_my_balance),
        )
}

/// Parse the path and require the caller to belong to the society.
fn member_scope(
    services: &AppServices,
    caller: ParticipantContext,
    society_id: &str,
) -> Result<(SocietyId, Society), Response> {
    let society_id = common::society_id(society_id)?;
    let society = services
        .require_member(society_id, caller.participant_id())
        .map_err(errors::dispatch_error_to_response)?;
    Ok((society_id, society))
}

fn ensure_members(society: &Society, participants: &[ParticipantId]) -> Result<(), Response> {
    match participants.iter().find(|p| !society.is_member(p)) {
        Some(p) => Err(errors::domain_error_to_response(DomainError::validation(format!(
            "participant {p} is not a member of the society"
        )))),
        None => Ok(()),
    }
}

fn dispatch_outing(
    services: &AppServices,
    society_id: SocietyId,
    outing_id: OutingId,
    cmd: OutingCommand,
) -> Result<(), Response> {
    services
        .dispatch::<Outing>(
            society_id,
            outing_id.0,
            outing::AGGREGATE_TYPE,
            cmd,
            |_, id| Outing::empty(OutingId::new(id)),
        )
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

fn load_outing(
    services: &AppServices,
    society_id: SocietyId,
    outing_id: OutingId,
) -> Result<Outing, Response> {
    services
        .queries()
        .outing(society_id, outing_id)
        .map_err(errors::dispatch_error_to_response)
}

pub async fn create_outing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path(society_id): Path<String>,
    Json(body): Json<dto::CreateOutingRequest>,
) -> Result<Response, Response> {
    let (society_id, society) = member_scope(&services, caller, &society_id)?;
    let participants = common::participant_ids(&body.participants)?;
    ensure_members(&society, &participants)?;

    let outing_id = OutingId::new(AggregateId::new());
    let cmd = OutingCommand::CreateOuting(CreateOuting {
        society_id,
        outing_id,
        name: body.name.clone(),
        created_by: caller.participant_id(),
        participants,
        occurred_at: Utc::now(),
    });
    dispatch_outing(&services, society_id, outing_id, cmd)?;

    let created = load_outing(&services, society_id, outing_id)?;
    Ok((
        StatusCode::CREATED,
        Json(dto::outing_to_json(&created, services.currency_scale())),
    )
        .into_response())
}

pub async fn list_outings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path(society_id): Path<String>,
) -> Response {
    let (society_id, _) = match member_scope(&services, caller, &society_id) {
        Ok(scope) => scope,
        Err(resp) => return resp,
    };

    match services.queries().outings(society_id) {
        Ok(outings) => {
            let scale = services.currency_scale();
            let items = outings
                .iter()
                .map(|o| dto::outing_summary_to_json(o, scale))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_outing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
) -> Result<Response, Response> {
    let (society_id, _) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;
    let loaded = load_outing(&services, society_id, outing_id)?;
    Ok((
        StatusCode::OK,
        Json(dto::outing_to_json(&loaded, services.currency_scale())),
    )
        .into_response())
}

pub async fn add_participant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
    Json(body): Json<dto::AddParticipantRequest>,
) -> Result<Response, Response> {
    let (society_id, society) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;
    let participant_id = common::parse_id::<ParticipantId>(&body.participant_id)?;
    ensure_members(&society, &[participant_id])?;

    let cmd = OutingCommand::AddParticipant(AddParticipant {
        society_id,
        outing_id,
        participant_id,
        occurred_at: Utc::now(),
    });
    dispatch_outing(&services, society_id, outing_id, cmd)?;

    let updated = load_outing(&services, society_id, outing_id)?;
    Ok((
        StatusCode::OK,
        Json(dto::outing_to_json(&updated, services.currency_scale())),
    )
        .into_response())
}

pub async fn record_instance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
    Json(body): Json<dto::RecordInstanceRequest>,
) -> Result<Response, Response> {
    let scale = services.currency_scale();
    let (society_id, _) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;
    let current = load_outing(&services, society_id, outing_id)?;

    let amount =
        Money::parse_decimal(&body.amount, scale).map_err(errors::domain_error_to_response)?;
    let paid_by = match &body.paid_by {
        Some(raw) => common::parse_id::<ParticipantId>(raw)?,
        None => caller.participant_id(),
    };
    let participants = match &body.participants {
        Some(raw) => common::participant_ids(raw)?,
        None => current.roster(),
    };

    let instance = ExpenseInstance {
        id: InstanceId::new(),
        name: body.name.trim().to_string(),
        amount,
        paid_by,
        participants,
        description: body.description.clone(),
        created_at: Utc::now(),
    };
    let recorded = dto::instance_to_json(&instance, scale);

    let cmd = OutingCommand::RecordInstance(RecordInstance {
        society_id,
        outing_id,
        instance,
        occurred_at: Utc::now(),
    });
    dispatch_outing(&services, society_id, outing_id, cmd)?;

    // Every recorded instance returns the freshly recomputed settlement.
    let settlement = services
        .queries()
        .outing_settlement(society_id, outing_id)
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "instance": recorded,
            "settlement": dto::settlement_to_json(&settlement, scale),
        })),
    )
        .into_response())
}

pub async fn complete_outing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
) -> Result<Response, Response> {
    let (society_id, _) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;

    let cmd = OutingCommand::CompleteOuting(CompleteOuting {
        society_id,
        outing_id,
        occurred_at: Utc::now(),
    });
    dispatch_outing(&services, society_id, outing_id, cmd)?;

    let settlement = services
        .queries()
        .outing_settlement(society_id, outing_id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok((
        StatusCode::OK,
        Json(dto::settlement_to_json(&settlement, services.currency_scale())),
    )
        .into_response())
}

pub async fn get_settlement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
) -> Result<Response, Response> {
    let (society_id, _) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;
    let settlement = services
        .queries()
        .outing_settlement(society_id, outing_id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok((
        StatusCode::OK,
        Json(dto::settlement_to_json(&settlement, services.currency_scale())),
    )
        .into_response())
}

pub async fn get_my_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<ParticipantContext>,
    Path((society_id, outing_id)): Path<(String, String)>,
) -> Result<Response, Response> {
    let (society_id, _) = member_scope(&services, caller, &society_id)?;
    let outing_id = common::outing_id(&outing_id)?;
    let me = caller.participant_id();

    let position = services
        .queries()
        .participant_position(society_id, outing_id, me)
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::OK,
        Json(dto::my_balance_to_json(&position, &me, services.currency_scale())),
    )
        .into_response())
}
