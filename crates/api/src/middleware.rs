use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use compass_core::ParticipantId;

use crate::app::errors;
use crate::context::{PARTICIPANT_HEADER, ParticipantContext};

/// Resolve the acting participant from the request headers.
///
/// Identity is asserted by the caller; verifying it (sessions, tokens) is the
/// job of whatever fronts this service.
pub async fn participant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let participant_id = match extract_participant(req.headers()) {
        Ok(id) => id,
        Err(message) => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message);
        }
    };

    req.extensions_mut()
        .insert(ParticipantContext::new(participant_id));

    next.run(req).await
}

fn extract_participant(headers: &HeaderMap) -> Result<ParticipantId, String> {
    let header = headers
        .get(PARTICIPANT_HEADER)
        .ok_or_else(|| format!("missing {PARTICIPANT_HEADER} header"))?;

    let header = header
        .to_str()
        .map_err(|_| format!("{PARTICIPANT_HEADER} is not valid text"))?;

    header
        .trim()
        .parse::<ParticipantId>()
        .map_err(|e| format!("{PARTICIPANT_HEADER}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_rejected() {
        assert!(extract_participant(&HeaderMap::new()).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(PARTICIPANT_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(extract_participant(&headers).is_err());
    }

    #[test]
    fn valid_header_is_parsed() {
        let id = ParticipantId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            PARTICIPANT_HEADER,
            HeaderValue::from_str(&format!(" {id} ")).unwrap(),
        );
        assert_eq!(extract_participant(&headers).unwrap(), id);
    }
}
