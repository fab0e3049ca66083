// 🌐 HTTP API (feature = "server")
//
// POST /api/invoices/reconcile-stuck   x-reconcile-secret required
// POST /api/wire-batches/fund
// POST /api/budget/match
// GET  /api/health
//
// One SQLite connection behind a mutex; each request holds it for the whole
// engine call and never across an await.

use crate::auth::{verify_shared_secret, RECONCILE_SECRET_HEADER};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::db::SqliteStore;
use crate::entities::BudgetLine;
use crate::error::EngineError;
use crate::funding::{FundingRequest, FundingResult, WireBatchFunder};
use crate::matcher::CategoryMatcher;
use crate::stuck_invoices::{StuckInvoiceFilter, StuckProcessReconciler, StuckReconcileReport};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<SqliteStore>>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(store: SqliteStore, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            clock,
            config: Arc::new(config),
        }
    }

    // A panic mid-request leaves the connection itself usable
    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// `success: true` with the payload's fields inlined
#[derive(Serialize)]
struct FlatResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T> FlatResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::MissingField(_)
        | EngineError::InvalidDate(_)
        | EngineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        EngineError::Unauthorized | EngineError::SecretNotConfigured => StatusCode::UNAUTHORIZED,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidDrawStatus { .. } | EngineError::InvalidTransition(_) => {
            StatusCode::CONFLICT
        }
        EngineError::DrawCountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(reason = self.reason(), error = %self, "request rejected");
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "reason": self.reason(),
        });
        match &self {
            EngineError::DrawCountMismatch {
                expected,
                found,
                missing,
            } => {
                body["expected"] = json!(expected);
                body["found"] = json!(found);
                body["missing"] = json!(missing);
            }
            EngineError::InvalidDrawStatus { ids } => {
                body["ids"] = json!(ids);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Empty body reads as `{}`; anything unparseable is a 400 with a reason.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, EngineError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw)
        .map_err(|e| EngineError::InvalidArgument(format!("request body: {}", e)))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileStuckRequest {
    #[serde(default)]
    draw_request_id: Option<String>,
    #[serde(default)]
    older_than_minutes: Option<f64>,
    #[serde(default)]
    auto_retry_once: Option<bool>,
}

/// POST /api/invoices/reconcile-stuck
async fn reconcile_stuck(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FlatResponse<StuckReconcileReport>>, EngineError> {
    let presented = headers
        .get(RECONCILE_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_shared_secret(state.config.reconcile_secret(), presented)?;

    let request: ReconcileStuckRequest = parse_body(&body)?;
    let filter = StuckInvoiceFilter {
        draw_request_id: request.draw_request_id.filter(|id| !id.trim().is_empty()),
        older_than_minutes: request
            .older_than_minutes
            .unwrap_or(state.config.stuck_after_minutes as f64),
        auto_retry_once: request.auto_retry_once.unwrap_or(false),
    };

    let store = state.store();
    let report = StuckProcessReconciler::new(&*store, state.clock.as_ref()).reconcile(&filter)?;
    Ok(Json(FlatResponse::ok(report)))
}

/// POST /api/wire-batches/fund
async fn fund_wire_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FlatResponse<FundingResult>>, EngineError> {
    let request: FundingRequest = parse_body(&body)?;

    let store = state.store();
    let result = WireBatchFunder::new(&*store, state.clock.as_ref())
        .with_actor(&state.config.actor)
        .fund(&request)?;
    Ok(Json(FlatResponse::ok(result)))
}

#[derive(Debug, Deserialize)]
struct BudgetMatchRequest {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    candidates: Vec<BudgetLine>,
    #[serde(default)]
    threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BudgetMatchResponse {
    budget: BudgetLine,
    score: f64,
}

/// POST /api/budget/match - pure computation, no store access
async fn match_budget(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<Option<BudgetMatchResponse>>>, EngineError> {
    let request: BudgetMatchRequest = parse_body(&body)?;
    let category = request.category.ok_or(EngineError::MissingField("category"))?;

    let threshold = request.threshold.unwrap_or(state.config.match_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::InvalidArgument(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )));
    }

    let found = CategoryMatcher::with_threshold(threshold)
        .find_best_match(&category, &request.candidates)
        .map(|m| BudgetMatchResponse {
            budget: m.candidate.clone(),
            score: m.score,
        });
    Ok(Json(ApiResponse::ok(found)))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/invoices/reconcile-stuck", post(reconcile_stuck))
        .route("/wire-batches/fund", post(fund_wire_batch))
        .route("/budget/match", post(match_budget))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
