//! Portal API handlers

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::approval::{ApprovalError, VerifyError};
use crate::store::{ClientStatus, Proposal};
use crate::token::{IssueError, ValidationError};

use super::AppState;

/// Issuance request body
#[derive(Debug, Default, Deserialize)]
pub struct IssueRequest {
    /// Expiry hint ("7d"/"14d"/"30d"/"60d"/"90d"); unrecognized values
    /// fall back to the default window
    #[serde(rename = "customExpiry")]
    pub custom_expiry: Option<String>,
}

/// Decision submission body
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub decision: Option<String>,
    pub comment: Option<String>,
    #[serde(rename = "clientName")]
    pub client_name: Option<String>,
}

/// Proposal subset exposed through the portal
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: String,
    pub name: String,
    pub client_name: String,
    pub client_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub client_status: ClientStatus,
}

impl From<&Proposal> for ProposalSummary {
    fn from(p: &Proposal) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            client_name: p.client_name.clone(),
            client_email: p.client_email.clone(),
            total_amount: p.total_amount,
            status: p.status.clone(),
            client_status: p.client_status,
        }
    }
}

/// Limiter key for the presenting client; shared bucket when the socket
/// address is unavailable (e.g. behind a test harness)
fn client_key(connect_info: &Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .as_ref()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limited(remaining: std::time::Duration) -> (StatusCode, Json<Value>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "rate_limited",
            "message": "Too many invalid attempts. Please try again later.",
            "retryAfterSecs": remaining.as_secs().max(1),
        })),
    )
}

/// One generic body for every token failure mode: malformed, unknown,
/// superseded, and expired must be indistinguishable to the caller
fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": "This portal link is invalid or has expired.",
        })),
    )
}

/// `POST /proposals/:proposal_id/portal`
///
/// Internal issuance: mint a portal token for a proposal and return the
/// portal URL. A store failure is 503, never a synthesized success.
pub async fn issue_portal(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
    body: Option<Json<IssueRequest>>,
) -> (StatusCode, Json<Value>) {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    match state
        .issuer
        .issue(&proposal_id, request.custom_expiry.as_deref())
        .await
    {
        Ok(issued) => (
            StatusCode::OK,
            Json(json!({
                "portalUrl": issued.portal_url,
                "token": issued.token,
                "expiresAt": issued.expires_at,
                "proposal": ProposalSummary::from(&issued.proposal),
            })),
        ),
        Err(IssueError::ProposalNotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": format!("No proposal with id {}", id),
            })),
        ),
        Err(IssueError::Unavailable(e)) => {
            error!(error = %e, proposal_id = %proposal_id, "issuance failed: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "service_unavailable",
                    "message": "The service cannot reach its data store. No portal link was issued.",
                })),
            )
        }
        Err(IssueError::Codec(e)) => {
            error!(error = %e, proposal_id = %proposal_id, "issuance failed: codec");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal",
                    "message": "Failed to issue a portal link.",
                })),
            )
        }
    }
}

/// `GET /portal/:token`
///
/// External portal view: resolve the token to its proposal summary. A
/// successful validation here counts as a view.
pub async fn view_portal(
    State(state): State<AppState>,
    Path(token): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> (StatusCode, Json<Value>) {
    let client = client_key(&connect_info);
    if let Err(remaining) = state.limiter.check(&client) {
        return rate_limited(remaining);
    }

    let access = match state.validator.validate(&token).await {
        Ok(access) => access,
        Err(ValidationError::Invalid) => {
            state.limiter.record_failure(&client);
            return unauthorized();
        }
        Err(ValidationError::Store(e)) => {
            error!(error = %e, "portal view failed: store");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "persistence_failure",
                    "message": "The portal is temporarily unavailable.",
                })),
            );
        }
    };
    state.limiter.record_success(&client);

    // Best-effort view accounting; never blocks the response
    state.validator.note_view(&token).await;

    match state.proposals.fetch(&access.proposal_id).await {
        Ok(Some(proposal)) => (
            StatusCode::OK,
            Json(json!({
                "proposal": ProposalSummary::from(&proposal),
                "expiresAt": access.expires_at,
            })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": "The proposal behind this link no longer exists.",
            })),
        ),
        Err(e) => {
            error!(error = %e, "portal view failed: proposal read");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "persistence_failure",
                    "message": "The portal is temporarily unavailable.",
                })),
            )
        }
    }
}

/// `POST /portal/:token/approve`
///
/// External decision submission. Success is only reported after the write
/// has been independently verified; verification problems are 500s whose
/// bodies carry operator diagnostics (`expected`/`actual`), not client UI.
pub async fn submit_decision(
    State(state): State<AppState>,
    Path(token): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Option<Json<DecisionRequest>>,
) -> (StatusCode, Json<Value>) {
    let client = client_key(&connect_info);
    if let Err(remaining) = state.limiter.check(&client) {
        return rate_limited(remaining);
    }

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let decision_raw = request.decision.unwrap_or_default();

    let outcome = state
        .engine
        .submit_decision(
            &token,
            &decision_raw,
            request.comment,
            request.client_name,
        )
        .await;

    match outcome {
        Ok(outcome) => {
            state.limiter.record_success(&client);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": outcome.message,
                    "nextSteps": outcome.next_steps,
                    "proposalId": outcome.proposal_id,
                    "decision": outcome.decision.as_str(),
                    "timestamp": outcome.timestamp,
                    "clientFeedback": outcome.client_feedback,
                    "verified": true,
                })),
            )
        }
        Err(ApprovalError::InvalidDecision(raw)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_decision",
                "message": format!(
                    "decision must be one of approved, changes-requested, rejected; got {:?}",
                    raw
                ),
            })),
        ),
        Err(ApprovalError::Unauthorized) => {
            state.limiter.record_failure(&client);
            unauthorized()
        }
        Err(ApprovalError::ProposalNotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": format!("No proposal with id {}", id),
            })),
        ),
        Err(ApprovalError::Persistence(detail)) => {
            error!(detail = %detail, "decision submission failed: persistence");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "persistence_failure",
                    "message": "Your decision could not be saved. Please try again.",
                })),
            )
        }
        Err(ApprovalError::Verification(VerifyError::Mismatch { expected, actual })) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "verification_failed",
                "message": "Your decision was submitted but could not be confirmed. Please contact us to confirm it was received.",
                "expected": expected.as_str(),
                "actual": actual.as_str(),
            })),
        ),
        Err(ApprovalError::Verification(e)) => {
            error!(error = %e, "decision submission failed: verification");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "verification_failed",
                    "message": "Your decision was submitted but could not be confirmed. Please contact us to confirm it was received.",
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_request_deserialize() {
        let req: IssueRequest = serde_json::from_str(r#"{"customExpiry": "7d"}"#).unwrap();
        assert_eq!(req.custom_expiry.as_deref(), Some("7d"));

        let req: IssueRequest = serde_json::from_str("{}").unwrap();
        assert!(req.custom_expiry.is_none());
    }

    #[test]
    fn test_decision_request_deserialize() {
        let req: DecisionRequest = serde_json::from_str(
            r#"{"decision": "approved", "comment": "Looks great", "clientName": "Jane Doe"}"#,
        )
        .unwrap();
        assert_eq!(req.decision.as_deref(), Some("approved"));
        assert_eq!(req.comment.as_deref(), Some("Looks great"));
        assert_eq!(req.client_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_proposal_summary_omits_absent_fields() {
        let proposal = Proposal::new("Deal", "Jane Doe", "jane@example.com");
        let value = serde_json::to_value(ProposalSummary::from(&proposal)).unwrap();

        assert_eq!(value["clientName"], "Jane Doe");
        assert_eq!(value["clientStatus"], "pending");
        assert!(value.get("totalAmount").is_none(), "absent amount is omitted");
        assert!(value.get("status").is_none(), "absent status is omitted");
    }

    #[test]
    fn test_client_key_falls_back_to_shared_bucket() {
        assert_eq!(client_key(&None), "unknown");
        let addr: SocketAddr = "10.1.2.3:55000".parse().unwrap();
        assert_eq!(client_key(&Some(ConnectInfo(addr))), "10.1.2.3");
    }
}
