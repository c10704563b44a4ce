//! Authentication-device endpoint handlers.
//!
//! Devices poll their pending backchannel requests and post the user's
//! decision. Calls authenticate with a device secret JWT carried as a
//! bearer token (`iss` = `device:<device_id>`).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::ciba::{CibaService, CibaStatus};
use crate::error::OidcError;
use crate::interaction::{InteractionStatus, InteractionType, verify_device_secret_jwt};
use crate::oauth::service::AuthorizationService;

/// State for the device endpoints.
#[derive(Clone)]
pub struct DeviceState {
    /// The CIBA service.
    pub ciba: Arc<CibaService>,
    /// The authorization service driving the companion transactions.
    pub authorization: Arc<AuthorizationService>,
    /// Secret provisioned to authentication devices at registration.
    pub device_secret: String,
}

/// Decision body posted by the device.
#[derive(Debug, Deserialize)]
pub struct DeviceDecision {
    /// `approve` or `deny`.
    pub action: String,
}

/// Handler for
/// `GET /{tenant_id}/v1/authentication-devices/{device_id}/backchannel/authentications`.
pub async fn pending_requests_handler(
    State(state): State<DeviceState>,
    Path((tenant_id, device_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, OidcError> {
    authenticate_device(&headers, &device_id, &state.device_secret)?;
    let pending = state.ciba.pending_for_device(&tenant_id, &device_id).await?;
    let body: Vec<serde_json::Value> = pending
        .iter()
        .map(|r| {
            json!({
                "auth_req_id": r.auth_req_id,
                "client_id": r.client_id,
                "scope": r.scopes.join(" "),
                "binding_message": r.binding_message,
                "expires_at": r.expires_at.unix_timestamp(),
            })
        })
        .collect();
    Ok(Json(json!({"authentications": body})).into_response())
}

/// Handler for
/// `POST /{tenant_id}/v1/authentication-devices/{device_id}/backchannel/authentications/{auth_req_id}`.
///
/// Runs the device interaction against the companion transaction and
/// settles the backchannel request once its authentication policy is
/// satisfied or the user denied.
pub async fn decision_handler(
    State(state): State<DeviceState>,
    Path((tenant_id, device_id, auth_req_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(decision): Json<DeviceDecision>,
) -> Result<Response, OidcError> {
    authenticate_device(&headers, &device_id, &state.device_secret)?;

    let request = state
        .ciba
        .pending_for_device(&tenant_id, &device_id)
        .await?
        .into_iter()
        .find(|r| r.auth_req_id == auth_req_id)
        .ok_or_else(|| {
            OidcError::not_found(format!(
                "backchannel authentication request is not found ({auth_req_id})"
            ))
        })?;

    let interaction_type = match decision.action.as_str() {
        "approve" => InteractionType::AuthenticationDeviceApprove,
        "deny" => InteractionType::AuthenticationDeviceDeny,
        other => {
            return Err(OidcError::invalid_request(format!(
                "authentication device decision must be approve or deny ({other})"
            )));
        }
    };
    let payload = json!({"device_id": device_id});
    let (outcome, satisfied) = state
        .authorization
        .submit_device_interaction(&tenant_id, request.transaction_id, interaction_type, &payload)
        .await?;

    match outcome.status {
        InteractionStatus::Success if satisfied => {
            state
                .ciba
                .settle(&tenant_id, &auth_req_id, CibaStatus::Granted)
                .await?;
        }
        InteractionStatus::Deny => {
            state
                .ciba
                .settle(&tenant_id, &auth_req_id, CibaStatus::Denied)
                .await?;
        }
        _ => {}
    }
    Ok(Json(outcome.response).into_response())
}

fn authenticate_device(
    headers: &HeaderMap,
    device_id: &str,
    secret: &str,
) -> Result<(), OidcError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            OidcError::invalid_client("device request must contains a bearer device secret jwt")
        })?;
    verify_device_secret_jwt(token, device_id, secret)?;
    Ok(())
}
