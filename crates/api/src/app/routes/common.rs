use std::str::FromStr;

use axum::response::Response;

use compass_core::{AggregateId, DomainError, ParticipantId, SocietyId};
use compass_outings::OutingId;

use crate::app::errors;

/// Parse an id from a path segment or body field; malformed ids are a 400.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(errors::domain_error_to_response)
}

pub fn society_id(raw: &str) -> Result<SocietyId, Response> {
    parse_id(raw)
}

pub fn outing_id(raw: &str) -> Result<OutingId, Response> {
    parse_id::<AggregateId>(raw).map(OutingId::new)
}

pub fn participant_ids(raw: &[String]) -> Result<Vec<ParticipantId>, Response> {
    raw.iter().map(|r| parse_id(r)).collect()
}
