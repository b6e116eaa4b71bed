//! Route handler functions for all API endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use wayfarer_chat::validate_input;
use wayfarer_core::RequestContext;
use wayfarer_form::{FormRecord, FormTurn};

use crate::client_ip::ClientIp;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

/// Body for POST /form. `form` is the record returned by the previous
/// turn; omit it to start a new booking.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormRequest {
    pub input: String,
    #[serde(default)]
    pub form: Option<FormRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /ask - route a message to capabilities and return the combined reply.
pub async fn ask(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let context = RequestContext::new(client_ip);
    let request_id = context.request_id;
    tracing::info!(request_id = %request_id, "Ask request received");

    let response = state.agent.handle_message(&req.input, context).await?;

    tracing::info!(request_id = %request_id, chars = response.chars().count(), "Ask request answered");
    Ok(Json(AskResponse { response }))
}

/// POST /form - one booking-form turn over a client-held record.
pub async fn form(
    State(state): State<AppState>,
    Json(req): Json<FormRequest>,
) -> Result<Json<FormTurn>, ApiError> {
    let input = validate_input(&req.input, state.config.orchestration.max_message_length)?;
    let record = req.form.unwrap_or_default();
    tracing::info!(known_fields = record.fields().len(), "Form turn received");

    let turn = state.form.turn(input, record).await?;
    Ok(Json(turn))
}

/// GET /health - liveness check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::debug!(uptime_secs = state.start_time.elapsed().as_secs(), "Health check");
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: format!("{} is running", state.config.server.app_name),
    })
}
