//! HTTP API: axum router over the analysis flows.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::analysis::batch::{BatchOrchestrator, BatchResult};
use crate::analysis::confidence::{self, ConfidenceBreakdown};
use crate::analysis::master::{AnalysisRequest, MasterAnalysis, MasterReport};
use crate::analysis::payload::AnalysisPayload;
use crate::auth::{HeaderSession, Session};
use crate::betting::ev::{self, PricedOutcome, ValueBet};
use crate::betting::kelly::{kelly_stake, stake_amount};
use crate::config::{BettingConfig, QuotaConfig, ScoringConfig};
use crate::data::schedule::{Match, ScheduleClient};
use crate::error::{AnalysisError, Result};
use crate::schema;
use crate::store::sqlite::{ApiCostRecord, HistoryRecord, Store};
use crate::store::{ProfileStore, UserProfile};

const MAX_SCHEDULE_DAYS: u32 = 14;
const MAX_HISTORY: i64 = 100;

/// Shared state for every route handler.
#[derive(Clone)]
pub struct AppState {
    store: Store,
    profiles: Arc<dyn ProfileStore>,
    batch: Option<Arc<BatchOrchestrator>>,
    master: Option<Arc<MasterAnalysis>>,
    schedule: Option<Arc<ScheduleClient>>,
    scoring: Arc<ScoringConfig>,
    betting: Arc<BettingConfig>,
    quota: QuotaConfig,
    lookahead_days: u32,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Store,
        profiles: Arc<dyn ProfileStore>,
        scoring: ScoringConfig,
        betting: BettingConfig,
        quota: QuotaConfig,
        lookahead_days: u32,
    ) -> Self {
        Self {
            store,
            profiles,
            batch: None,
            master: None,
            schedule: None,
            scoring: Arc::new(scoring),
            betting: Arc::new(betting),
            quota,
            lookahead_days,
            started_at: Utc::now(),
        }
    }

    pub fn with_batch(mut self, batch: BatchOrchestrator) -> Self {
        self.batch = Some(Arc::new(batch));
        self
    }

    pub fn with_master(mut self, master: MasterAnalysis) -> Self {
        self.master = Some(Arc::new(master));
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleClient) -> Self {
        self.schedule = Some(Arc::new(schedule));
        self
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/profile", get(profile_handler))
        .route("/api/batch", post(batch_handler))
        .route("/api/analysis", post(analysis_handler))
        .route("/api/confidence", post(confidence_handler))
        .route("/api/value-bets", post(value_bets_handler))
        .route("/api/schedule", get(schedule_handler))
        .route("/api/history", get(history_handler))
        .route("/api/costs", get(costs_handler))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: AppState, bind: &str, port: u16) -> anyhow::Result<()> {
    use anyhow::Context;

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("API server error")
}

// -- Route Handlers --

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "llm": state.batch.is_some(),
        "schedule": state.schedule.is_some(),
    }))
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    profile: UserProfile,
    remaining: Option<i64>,
}

async fn profile_handler(
    State(state): State<AppState>,
    session: HeaderSession,
) -> Result<Json<ProfileResponse>> {
    let uid = session.user_id().ok_or(AnalysisError::Auth)?;
    // Not persisted here; the first batch call bootstraps it
    let profile = match state.profiles.load(&uid).await? {
        Some(stored) => stored.profile,
        None => UserProfile::new_default(
            &uid,
            session.email().as_deref(),
            state.quota.default_analysis_limit,
        ),
    };
    let remaining = (!profile.is_premium)
        .then(|| (profile.analysis_limit - profile.analysis_count).max(0));
    Ok(Json(ProfileResponse { profile, remaining }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    matches_text: String,
    #[serde(default)]
    sport_key: Option<String>,
}

async fn batch_handler(
    State(state): State<AppState>,
    session: HeaderSession,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResult>> {
    let batch = state.batch.as_ref().ok_or(AnalysisError::Unavailable {
        feature: "batch analysis",
    })?;
    let result = batch
        .calculate_batch_value_bets(&session, &request.matches_text, request.sport_key.as_deref())
        .await?;

    if let Some(uid) = session.user_id() {
        if !result.analyzed_matches.is_empty() {
            save_batch_history(&state.store, &uid, &result).await;
        }
    }
    Ok(Json(result))
}

async fn save_batch_history(store: &Store, uid: &str, result: &BatchResult) {
    let payload = match serde_json::to_string(result) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize batch for history");
            return;
        }
    };
    let value_bets = result
        .analyzed_matches
        .iter()
        .filter(|m| m.value_bet_found)
        .count();
    let record = HistoryRecord {
        id: uuid::Uuid::new_v4().to_string(),
        uid: uid.to_string(),
        kind: "batch".to_string(),
        title: format!("{} matches", result.analyzed_matches.len()),
        confidence_score: None,
        payload,
        report: format!("{value_bets} value bets found"),
        created_at: None,
    };
    if let Err(e) = store.insert_history(&record).await {
        warn!(uid, error = %e, "Failed to save batch history");
    }
}

async fn analysis_handler(
    State(state): State<AppState>,
    session: HeaderSession,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<MasterReport>> {
    let master = state.master.as_ref().ok_or(AnalysisError::Unavailable {
        feature: "match analysis",
    })?;
    Ok(Json(master.run(&session, request).await?))
}

async fn confidence_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ConfidenceBreakdown>> {
    let payload: AnalysisPayload = schema::validate(body, "request")
        .map_err(|e| AnalysisError::InvalidInput(e.to_string()))?;
    Ok(Json(confidence::breakdown(&payload, &state.scoring)))
}

#[derive(Debug, Deserialize)]
struct ValueBetsRequest {
    outcomes: serde_json::Value,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    bankroll: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StakedBet {
    #[serde(flatten)]
    bet: ValueBet,
    #[serde(with = "rust_decimal::serde::float_option")]
    stake_amount: Option<Decimal>,
}

async fn value_bets_handler(
    State(state): State<AppState>,
    Json(request): Json<ValueBetsRequest>,
) -> Result<Json<Vec<StakedBet>>> {
    let outcomes: Vec<PricedOutcome> = schema::validate(request.outcomes, "request")
        .map_err(|e| AnalysisError::InvalidInput(e.to_string()))?;

    let bets = ev::value_bets(&outcomes, &state.betting)
        .into_iter()
        .map(|bet| {
            let stake = request.bankroll.map(|bankroll| {
                let kelly = kelly_stake(bet.probability, bet.odds, &state.betting);
                stake_amount(&kelly, bankroll)
            });
            StakedBet {
                bet,
                stake_amount: stake,
            }
        })
        .collect();
    Ok(Json(bets))
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    days: Option<u32>,
}

async fn schedule_handler(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<Match>>> {
    let schedule = state.schedule.as_ref().ok_or(AnalysisError::Unavailable {
        feature: "schedule",
    })?;
    let days = query
        .days
        .unwrap_or(state.lookahead_days)
        .min(MAX_SCHEDULE_DAYS);
    Ok(Json(schedule.fetch_upcoming(days).await))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn history_handler(
    State(state): State<AppState>,
    session: HeaderSession,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>> {
    let uid = session.user_id().ok_or(AnalysisError::Auth)?;
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_HISTORY);
    Ok(Json(state.store.get_history(&uid, limit).await?))
}

#[derive(Debug, Serialize)]
struct CostsResponse {
    total: String,
    calls: Vec<ApiCostRecord>,
}

async fn costs_handler(State(state): State<AppState>) -> Result<Json<CostsResponse>> {
    let total = state.store.get_total_api_cost().await?;
    let calls = state.store.get_all_api_costs().await?;
    Ok(Json(CostsResponse {
        total: total.to_string(),
        calls,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn state() -> AppState {
        let store = Store::new(":memory:").await.unwrap();
        AppState::new(
            store.clone(),
            Arc::new(store),
            ScoringConfig::default(),
            BettingConfig::default(),
            QuotaConfig::default(),
            3,
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_profile_requires_user() {
        let response = router(state().await)
            .oneshot(Request::get("/api/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn test_profile_defaults_for_new_user() {
        let response = router(state().await)
            .oneshot(
                Request::get("/api/profile")
                    .header(USER_ID_HEADER, "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["analysis_limit"], 10);
        assert_eq!(json["remaining"], 10);
    }

    #[tokio::test]
    async fn test_batch_without_llm_is_unavailable() {
        let response = router(state().await)
            .oneshot(
                Request::post("/api/batch")
                    .header(USER_ID_HEADER, "u1")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"matchesText": "Arsenal v Chelsea"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_value_bets_with_bankroll() {
        let body = serde_json::json!({
            "outcomes": [
                {"market": "Arsenal win", "probability": 0.55, "odds": 2.10},
                {"market": "Chelsea win", "probability": 0.20, "odds": 3.50}
            ],
            "bankroll": 1000
        });
        let response = router(state().await)
            .oneshot(
                Request::post("/api/value-bets")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["market"], "Arsenal win");
        assert_eq!(json[0]["stakeAmount"], 35.2);
    }

    #[tokio::test]
    async fn test_confidence_rejects_bad_payload() {
        let response = router(state().await)
            .oneshot(
                Request::post("/api/confidence")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"match_info": {"sport": "soccer"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
