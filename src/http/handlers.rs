//! Request handlers.
//!
//! Each handler parses its request, invokes the resilience core, and maps
//! the outcome to a wire-level response. Rate-limit denials and open
//! circuits propagate here unchanged and are mapped deliberately; store
//! problems never reach this layer.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::downstream::DownstreamSample;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::ingest::{MetricRecord, MetricSummary, Period};
use crate::observability::metrics;
use crate::resilience::{BreakerError, ResultCache};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_connected: bool,
    pub timestamp: DateTime<Utc>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(error = %error, "Store health check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if store_connected { "healthy" } else { "degraded" },
        store_connected,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/metrics
///
/// Admission control is applied per client IP before the record is stored.
pub async fn ingest_metric(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(record): Json<MetricRecord>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if record.kind.is_empty() || record.kind.len() > 100 {
        return Err(ApiError::InvalidParameter(
            "type must be between 1 and 100 characters".to_string(),
        ));
    }

    let client_key = addr.ip().to_string();
    let decision = state.admission.admit(&client_key).await;
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after: decision.retry_after.map_or(1, |d| d.as_secs().max(1)),
        });
    }

    tracing::info!(kind = %record.kind, value = record.value, "Metric stored");
    metrics::record_ingested(&record.kind);
    let kind = record.kind.clone();
    state.records.append(record);

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            message: "Metric received",
            kind,
            timestamp: Utc::now(),
        }),
    ))
}

#[derive(Deserialize)]
pub struct SummaryParams {
    #[serde(rename = "type")]
    kind: String,
    period: Option<String>,
}

/// GET /api/metrics/summary
///
/// Read-through cached aggregation. The compute path also consults the
/// downstream through the circuit breaker; its failure or an open circuit
/// is absorbed and the summary is served from local data.
pub async fn metrics_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<MetricSummary>, ApiError> {
    let raw_period = params.period.as_deref().unwrap_or("all");
    let period = Period::parse(raw_period).ok_or_else(|| {
        ApiError::InvalidParameter("period must be one of: all, daily, hourly".to_string())
    })?;

    let key = ResultCache::summary_key(&params.kind, period.as_str());
    let records = state.records.clone();
    let breaker = state.breaker.clone();
    let external = state.external.clone();
    let kind = params.kind.clone();

    let summary = state
        .cache
        .get_or_compute(&key, move || async move {
            let summary = records.summarize(&kind, period);

            match breaker.call(|| external.fetch(&kind)).await {
                Ok(sample) => {
                    tracing::debug!(kind = %sample.kind, value = sample.sample_value, "Downstream data received")
                }
                Err(BreakerError::Open) => {
                    tracing::warn!("Circuit open, serving local data only")
                }
                Err(BreakerError::Inner(error)) => {
                    tracing::error!(error = %error, "Downstream call failed, serving local data only")
                }
            }

            Ok::<_, ApiError>(summary)
        })
        .await?;

    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    limit: Option<usize>,
}

/// GET /api/metrics/list
pub async fn list_metrics(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<MetricRecord>> {
    let limit = params.limit.unwrap_or(100);
    Json(state.records.recent(params.kind.as_deref(), limit))
}

/// GET /api/breaker/status
///
/// Read-only; does not mutate breaker state or count as a trial.
pub async fn breaker_status(State(state): State<AppState>) -> Response {
    Json(state.breaker.status()).into_response()
}

#[derive(Serialize)]
pub struct ExternalResponse {
    pub status: &'static str,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DownstreamSample>,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/external
///
/// Breaker-guarded downstream call. An open circuit maps to a fallback
/// payload; a genuine downstream failure maps to 503.
pub async fn call_external(State(state): State<AppState>) -> Result<Json<ExternalResponse>, ApiError> {
    match state
        .breaker
        .call(|| state.external.fetch("external_request"))
        .await
    {
        Ok(sample) => Ok(Json(ExternalResponse {
            status: "success",
            source: "external_service",
            message: None,
            data: Some(sample),
            timestamp: Utc::now(),
        })),
        Err(BreakerError::Open) => {
            tracing::warn!("Circuit open, returning fallback");
            Ok(Json(ExternalResponse {
                status: "fallback",
                source: "circuit_breaker_fallback",
                message: Some("External service unavailable, using fallback"),
                data: None,
                timestamp: Utc::now(),
            }))
        }
        Err(BreakerError::Inner(error)) => {
            tracing::error!(error = %error, "External service call failed");
            Err(ApiError::DownstreamUnavailable)
        }
    }
}
