//! HTTP endpoints for the fleet agent

use crate::agent::RegistrationService;
use crate::node::NodeMetricsService;
use crate::store::{LivenessStore, ServiceMetricsStore};
use crate::types::{LivenessStatus, ServiceInfo, ServiceMetrics};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// HTTP server exposing the agent's registration and metrics surface
#[derive(Clone)]
pub struct HttpServer {
    registration: RegistrationService,
    liveness: Arc<LivenessStore>,
    samples: Arc<ServiceMetricsStore>,
    node_metrics: Arc<NodeMetricsService>,
}

impl HttpServer {
    /// Create new HTTP server
    pub fn new(
        registration: RegistrationService,
        liveness: Arc<LivenessStore>,
        samples: Arc<ServiceMetricsStore>,
        node_metrics: Arc<NodeMetricsService>,
    ) -> Self {
        Self {
            registration,
            liveness,
            samples,
            node_metrics,
        }
    }

    /// Create router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .route("/agent/api/v1/services", get(Self::list_services))
            .route("/agent/api/v1/services/register", post(Self::register_service))
            .route(
                "/agent/api/v1/services/:deployment_id/metrics",
                put(Self::record_service_metrics),
            )
            .route("/agent/api/v1/node/metrics", get(Self::node_metrics))
            .route("/api/v1/health", get(Self::all_liveness))
            .route(
                "/api/v1/health/:deployment_id",
                get(Self::liveness_for).put(Self::update_liveness),
            )
            .with_state(Arc::new(self.clone()))
    }

    /// Agent's own liveness probe
    async fn health(State(_server): State<Arc<Self>>) -> impl IntoResponse {
        let response = json!({
            "status": "UP",
            "service": crate::AGENT_NAME,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (StatusCode::OK, Json(response))
    }

    /// All locally registered services
    async fn list_services(State(server): State<Arc<Self>>) -> impl IntoResponse {
        let services = server.registration.all_services();
        let response = json!({
            "services": services,
            "total": services.len(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (StatusCode::OK, Json(response))
    }

    /// Register a service locally and announce it to the master.
    ///
    /// The response is 202 regardless of the master outcome: an unreachable
    /// master is handled by the retry path and is not a caller-visible error.
    async fn register_service(
        State(server): State<Arc<Self>>,
        Json(service): Json<ServiceInfo>,
    ) -> impl IntoResponse {
        if let Err(e) = server.registration.register_locally(service.clone()) {
            error!(error = %e, "rejected local service registration");
            let response = json!({
                "error": e.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            return (StatusCode::BAD_REQUEST, Json(response));
        }

        let outcome = server.registration.register_with_master(&service).await;
        let response = json!({
            "deployment_id": service.deployment_id,
            "outcome": outcome,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (StatusCode::ACCEPTED, Json(response))
    }

    /// Ingest a resource metrics sample for a deployment
    async fn record_service_metrics(
        State(server): State<Arc<Self>>,
        Path(deployment_id): Path<String>,
        Json(sample): Json<ServiceMetrics>,
    ) -> impl IntoResponse {
        server.samples.record(&deployment_id, sample);
        StatusCode::NO_CONTENT
    }

    /// Latest node metrics summary
    async fn node_metrics(State(server): State<Arc<Self>>) -> impl IntoResponse {
        match server.node_metrics.latest().await {
            Some(summary) => {
                let response = json!({
                    "node_metrics": &*summary,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::OK, Json(response))
            }
            None => {
                let response = json!({
                    "error": "no node metrics computed yet",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::NOT_FOUND, Json(response))
            }
        }
    }

    /// All liveness statuses
    async fn all_liveness(State(server): State<Arc<Self>>) -> impl IntoResponse {
        let statuses = server.liveness.all_statuses();
        let response = json!({
            "statuses": statuses,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (StatusCode::OK, Json(response))
    }

    /// Liveness status of one deployment
    async fn liveness_for(
        State(server): State<Arc<Self>>,
        Path(deployment_id): Path<String>,
    ) -> impl IntoResponse {
        match server.liveness.status(&deployment_id) {
            Some(status) => (StatusCode::OK, Json(json!({ "status": status }))),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("unknown deployment: {}", deployment_id),
                })),
            ),
        }
    }

    /// Ingest a liveness status for a deployment
    async fn update_liveness(
        State(server): State<Arc<Self>>,
        Path(deployment_id): Path<String>,
        Json(status): Json<LivenessStatus>,
    ) -> impl IntoResponse {
        server.liveness.update(&deployment_id, status);
        StatusCode::NO_CONTENT
    }
}
