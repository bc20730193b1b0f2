//! Admission webhook server.
//!
//! Provides HTTP endpoints for Kubernetes admission webhooks:
//! - `/validate-shoot` for create, update and delete of Shoots
//! - `/validate-shoot-status` for the `status` subresource
//!
//! The ValidatingWebhookConfiguration must point at these paths, and the
//! TLS certificate secret must be mounted at the configured paths.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crd::Shoot;
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::validation::ErrorList;
use crate::webhooks::policies::{ValidationContext, validate_all};

/// Shared state for webhook handlers
pub struct WebhookState {
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(health: Arc<HealthState>) -> Self {
        Self { health }
    }
}

/// Outcome of one admission review.
pub struct ReviewOutcome {
    pub response: AdmissionReview<DynamicObject>,
    pub allowed: bool,
    pub errors: ErrorList,
}

impl ReviewOutcome {
    fn allow(request: &AdmissionRequest<Shoot>) -> Self {
        Self {
            response: AdmissionResponse::from(request).into_review(),
            allowed: true,
            errors: ErrorList::new(),
        }
    }

    fn deny(request: &AdmissionRequest<Shoot>, reason: &str, message: &str, errors: ErrorList) -> Self {
        Self {
            response: deny_with_reason(request, message, reason),
            allowed: false,
            errors,
        }
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<Shoot>,
    message: &str,
    reason: &str,
) -> AdmissionReview<DynamicObject> {
    let full_message = format!("[{}] {}", reason, message);
    AdmissionResponse::from(request)
        .deny(full_message)
        .into_review()
}

pub fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Decide one admission request.
///
/// `status_endpoint` marks requests arriving through the status webhook;
/// those are validated as status updates even when the API server omits
/// the subresource field.
pub fn review_shoot(request: &AdmissionRequest<Shoot>, status_endpoint: bool) -> ReviewOutcome {
    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        subresource = ?request.sub_resource,
        "Processing admission request"
    );

    // DELETE operations are always allowed
    if request.operation == Operation::Delete {
        info!(uid = %uid, "Admission request allowed (DELETE)");
        return ReviewOutcome::allow(request);
    }

    let Some(shoot) = request.object.as_ref() else {
        error!(uid = %uid, "Missing object in request");
        return ReviewOutcome::deny(request, "InvalidRequest", "Missing object in request", ErrorList::new());
    };

    let subresource = if status_endpoint {
        Some(super::policies::STATUS_SUBRESOURCE)
    } else {
        request.sub_resource.as_deref()
    };

    let ctx = ValidationContext {
        shoot,
        old_shoot: request.old_object.as_ref(),
        subresource,
        dry_run: request.dry_run,
        namespace: request.namespace.as_deref(),
    };

    let result = validate_all(&ctx);

    if !result.allowed {
        let reason = result
            .reason
            .unwrap_or_else(|| "ValidationFailed".to_string());
        let message = result
            .message
            .unwrap_or_else(|| "Validation failed".to_string());
        warn!(
            uid = %uid,
            reason = %reason,
            errors = result.errors.len(),
            dry_run = ctx.dry_run,
            message = %message,
            "Admission request denied"
        );
        return ReviewOutcome::deny(request, &reason, &message, result.errors);
    }

    info!(uid = %uid, dry_run = ctx.dry_run, "Admission request allowed");
    ReviewOutcome::allow(request)
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate-shoot", post(validate_shoot))
        .route("/validate-shoot-status", post(validate_shoot_status))
        .with_state(state)
}

async fn validate_shoot(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Shoot>>,
) -> impl IntoResponse {
    handle_review(&state, review, false)
}

async fn validate_shoot_status(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Shoot>>,
) -> impl IntoResponse {
    handle_review(&state, review, true)
}

fn handle_review(
    state: &WebhookState,
    review: AdmissionReview<Shoot>,
    status_endpoint: bool,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<Shoot> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let started = Instant::now();
    let outcome = review_shoot(&request, status_endpoint);
    state.health.metrics.record_review(
        operation_label(&request.operation),
        outcome.allowed,
        &outcome.errors,
        started.elapsed().as_secs_f64(),
    );

    (StatusCode::OK, Json(outcome.response))
}

/// Run the webhook server with TLS on `0.0.0.0:<webhook_port>`.
pub async fn run_webhook_server(config: &Config, health: Arc<HealthState>) -> Result<()> {
    let state = Arc::new(WebhookState::new(health));
    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(config.cert_path.clone(), config.key_path.clone())
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    Ok(())
}
