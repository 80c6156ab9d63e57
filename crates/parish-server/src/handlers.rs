//! HTTP Handlers

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use parish_core::WebhookPayload;
use parish_flow::{
    ConfirmationFlow, Disposition, ExemptParams, FlowError, FulfillmentOutcome, LinkFlow,
    RegistrationEmailResult, RegistrationFlow, RegistrationParams, StoreLinkFlow,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store_configured: bool,
    pub mailer_configured: bool,
    pub paylinks_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SkippedResponse {
    message: &'static str,
    event_type: String,
    payment_status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoggedResponse {
    message: &'static str,
    is_event_payment: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedResponse {
    message: String,
    inscription_id: String,
    #[serde(flatten)]
    outcome: FulfillmentOutcome,
}

#[derive(Serialize)]
pub struct PaymentLinkResponse {
    pub id: String,
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEmailResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: FulfillmentOutcome,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            code: code.into(),
        }),
    )
}

fn missing_parameters() -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, "MISSING_PARAMETERS", "Missing parameters")
}

/// Map a flow error onto the HTTP surface. Dependency failures carry the
/// provider's response body through to the caller.
fn flow_error(error: FlowError) -> HandlerError {
    match error {
        FlowError::Config(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG_ERROR",
            "API keys not configured",
        ),
        error @ FlowError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, "NOT_FOUND", error.to_string())
        }
        error @ FlowError::MissingEmail => {
            error_response(StatusCode::BAD_REQUEST, "MISSING_EMAIL", error.to_string())
        }
        FlowError::Client(error) => {
            error_response(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", error.to_string())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store_configured: state.store.is_some(),
        mailer_configured: state.mailer.is_some(),
        paylinks_configured: state.paylinks.is_some(),
    })
}

/// Payment provider webhook
pub async fn payment_webhook(
    State(state): State<AppState>,
    body: String,
) -> Result<Response, HandlerError> {
    let payload: WebhookPayload = serde_json::from_str(&body).map_err(|error| {
        tracing::warn!("malformed webhook payload: {error}");
        error_response(StatusCode::BAD_REQUEST, "INVALID_JSON", "Invalid JSON payload")
    })?;

    let flow = ConfirmationFlow::new(
        state.store.clone(),
        state.mailer.clone(),
        state.sink.clone(),
        state.config.schema.clone(),
        state.config.email_sender.clone(),
    );

    match flow.handle(&payload).await {
        Ok(Disposition::NotConfirmed { event_type, status }) => Ok(Json(SkippedResponse {
            message: "Payment not confirmed yet, skipping",
            event_type,
            payment_status: status,
        })
        .into_response()),

        Ok(Disposition::NotRegistration) => Ok(Json(LoggedResponse {
            message: "Payment logged successfully",
            is_event_payment: false,
        })
        .into_response()),

        Ok(Disposition::Processed {
            inscription_id,
            outcome,
        }) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            let message = match &outcome.error {
                None => "Payment confirmed and processed successfully".to_owned(),
                Some(error) => error.clone(),
            };

            Ok((
                status,
                Json(ProcessedResponse {
                    message,
                    inscription_id,
                    outcome,
                }),
            )
                .into_response())
        }

        Err(error @ FlowError::Config(_)) => Err(flow_error(error)),

        Err(error) => {
            tracing::error!("webhook processing failed: {error}");
            state
                .sink
                .post(&parish_clients::PaymentLogEntry {
                    error: Some(format!("Internal server error: {error}")),
                    ..Default::default()
                })
                .await;
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkParams {
    pub id: Option<String>,
    pub name: Option<String>,
    pub age: Option<u8>,
}

/// Create a priced registration payment link
pub async fn payment_link(
    State(state): State<AppState>,
    Query(params): Query<PaymentLinkParams>,
) -> Result<Json<PaymentLinkResponse>, HandlerError> {
    let (Some(id), Some(name), Some(age)) = (params.id, params.name, params.age) else {
        return Err(missing_parameters());
    };

    let flow = link_flow(&state)?;
    let link = flow
        .registration_link(&id, &name, age)
        .await
        .map_err(flow_error)?;

    Ok(Json(PaymentLinkResponse {
        id: link.id,
        url: link.url,
    }))
}

/// Create the open-amount donation link
pub async fn donation_link(
    State(state): State<AppState>,
) -> Result<Json<PaymentLinkResponse>, HandlerError> {
    let flow = link_flow(&state)?;
    let link = flow.donation_link().await.map_err(flow_error)?;

    Ok(Json(PaymentLinkResponse {
        id: link.id,
        url: link.url,
    }))
}

fn link_flow(state: &AppState) -> Result<LinkFlow, HandlerError> {
    let paylinks = state
        .paylinks
        .clone()
        .ok_or_else(|| flow_error(FlowError::Config("payment provider API key not set".into())))?;

    Ok(LinkFlow::new(
        paylinks,
        state.config.event.clone(),
        state.config.donation.clone(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StoreLinkParams {
    pub id: Option<String>,
    pub payment_link: Option<String>,
}

/// Write a generated payment link back onto the registration record
pub async fn store_payment_link(
    State(state): State<AppState>,
    Query(params): Query<StoreLinkParams>,
) -> Result<Json<MessageResponse>, HandlerError> {
    let (Some(id), Some(link)) = (params.id, params.payment_link) else {
        return Err(missing_parameters());
    };

    let store = configured_store(&state)?;
    let flow = StoreLinkFlow::new(store, state.config.schema.clone(), state.retry);
    flow.store_payment_link(&id, &link).await.map_err(flow_error)?;

    Ok(Json(MessageResponse {
        message: "Payment link stored successfully",
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegistrationEmailParams {
    pub id: Option<String>,
    pub name: Option<String>,
    pub event: Option<String>,
    pub payment_link: Option<String>,
}

/// Send the payment-link email for a fresh registration
pub async fn registration_email(
    State(state): State<AppState>,
    Query(params): Query<RegistrationEmailParams>,
) -> Result<Json<RegistrationEmailResponse>, HandlerError> {
    let (Some(id), Some(name), Some(event), Some(payment_link)) =
        (params.id, params.name, params.event, params.payment_link)
    else {
        return Err(missing_parameters());
    };

    let flow = registration_flow(&state)?;
    let result = flow
        .send_registration_email(&RegistrationParams {
            id,
            name,
            event,
            payment_link,
        })
        .await
        .map_err(flow_error)?;

    Ok(Json(match result {
        RegistrationEmailResult::Skipped => RegistrationEmailResponse {
            message: "Registration email already sent, skipping",
            message_id: None,
            recipient: None,
        },
        RegistrationEmailResult::Sent {
            message_id,
            recipient,
        } => RegistrationEmailResponse {
            message: "Registration email sent successfully",
            message_id: Some(message_id),
            recipient: Some(recipient),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExemptRegistrationParams {
    pub id: Option<String>,
    pub name: Option<String>,
    pub event: Option<String>,
}

/// Fulfill a payment-exempt registration
pub async fn exempt_registration(
    State(state): State<AppState>,
    Query(params): Query<ExemptRegistrationParams>,
) -> Result<Response, HandlerError> {
    let (Some(id), Some(name)) = (params.id, params.name) else {
        return Err(missing_parameters());
    };

    let flow = registration_flow(&state)?;
    let outcome = flow
        .fulfill_exempt(&ExemptParams {
            id,
            name,
            event: params.event,
        })
        .await
        .map_err(flow_error)?;

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let message = if outcome.success {
        "Exempt registration confirmed successfully"
    } else {
        "Exempt registration partially processed"
    };

    Ok((status, Json(ExemptResponse { message, outcome })).into_response())
}

fn registration_flow(state: &AppState) -> Result<RegistrationFlow, HandlerError> {
    let store = configured_store(state)?;
    let mailer = state
        .mailer
        .clone()
        .ok_or_else(|| flow_error(FlowError::Config("email API key not set".into())))?;

    Ok(RegistrationFlow::new(
        store,
        mailer,
        state.config.schema.clone(),
        state.retry,
        state.config.email_sender.clone(),
    ))
}

fn configured_store(
    state: &AppState,
) -> Result<std::sync::Arc<dyn parish_clients::RecordStore>, HandlerError> {
    state
        .store
        .clone()
        .ok_or_else(|| flow_error(FlowError::Config("record store API key not set".into())))
}
