//! # Admission Webhooks
//!
//! - `instance_index.rs` - mutating webhook adding `CF_INSTANCE_INDEX` to LRP pods
//! - `lrp_validator.rs` - validating webhook guarding immutable LRP fields
//!
//! Both are served by one axum router, over TLS when a certificate directory
//! is configured.

mod instance_index;
mod lrp_validator;

pub use instance_index::inject_instance_index;
pub use lrp_validator::{immutable_field_changes, validate_lrp_update};

use crate::config::ServerConfig;
use crate::observability::metrics;
use anyhow::{anyhow, Context, Result};
use axum::{routing::post, Json, Router};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const INSTANCE_INDEX_PATH: &str = "/mutate-pod-instance-index";
pub const LRP_VALIDATION_PATH: &str = "/validate-lrp";

type Handler = fn(&AdmissionRequest<DynamicObject>) -> AdmissionResponse;

pub fn router() -> Router {
    Router::new()
        .route(INSTANCE_INDEX_PATH, post(mutate_instance_index))
        .route(LRP_VALIDATION_PATH, post(validate_lrp))
        .layer(TraceLayer::new_for_http())
}

/// Serve the webhooks until the process stops
pub async fn start_webhook_server(config: &ServerConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    match config.webhook_tls_paths() {
        Some((cert, key)) => {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
                .await
                .with_context(|| format!("failed to load webhook certificate from {}", cert.display()))?;
            info!("Webhook server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(router().into_make_service())
                .await?;
        }
        None => {
            warn!("No webhook certificate directory configured, serving webhooks over plain HTTP");
            let listener = TcpListener::bind(addr).await?;
            info!("Webhook server listening on http://{}", addr);
            axum::serve(listener, router()).await?;
        }
    }

    Ok(())
}

async fn mutate_instance_index(
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit("mutate-pod-instance-index", review, inject_instance_index))
}

async fn validate_lrp(
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit("validate-lrp", review, validate_lrp_update))
}

fn admit(
    webhook: &str,
    review: AdmissionReview<DynamicObject>,
    handler: Handler,
) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            error!(webhook, "invalid admission review: {}", err);
            metrics::increment_admission_requests(webhook, false);
            return AdmissionResponse::invalid(err.to_string()).into_review();
        }
    };

    let res = handler(&req);
    metrics::increment_admission_requests(webhook, res.allowed);
    if res.allowed {
        debug!(webhook, operation = ?req.operation, name = %req.name, "admitted");
    } else {
        warn!(
            webhook,
            operation = ?req.operation,
            name = %req.name,
            reason = %res.result.message,
            "denied"
        );
    }
    res.into_review()
}

/// Decode the raw object of an admission request into a typed resource
pub(crate) fn decode<K: DeserializeOwned>(obj: Option<&DynamicObject>) -> Result<K> {
    let obj = obj.ok_or_else(|| anyhow!("admission request carries no object"))?;
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Deny with a 400 `BadRequest` status
pub(crate) fn bad_request(res: AdmissionResponse, message: impl ToString) -> AdmissionResponse {
    let mut res = res.deny(message);
    res.result.code = 400;
    res.result.reason = "BadRequest".to_string();
    res
}
