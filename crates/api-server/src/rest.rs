//! REST handlers for journey administration, user queries and operational
//! endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use journey_engine::types::{JourneyMember, JourneySummary, UserJourneySummary};
use journey_engine::Journey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::warn;

use crate::definition::JourneyDefinition;
use crate::facade::{
    CurrentStageResponse, ErrorResponse, EvaluationResponse, JourneyApi, OnboardedResponse,
    StateUpdateResponse,
};

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub api: JourneyApi,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub active: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub journeys: usize,
}

/// Maps an error code to its HTTP status.
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "JOURNEY_NOT_FOUND" | "USER_NOT_ONBOARDED" => StatusCode::NOT_FOUND,
        "JOURNEY_ALREADY_EXISTS" | "USER_ALREADY_ONBOARDED" => StatusCode::CONFLICT,
        "INVALID_STAGE_TRANSITION" => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn reject(err: ErrorResponse) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err.error);
    if status != StatusCode::NOT_FOUND {
        warn!(error = %err.error, message = %err.message, "Request rejected");
    }
    metrics::counter!("api.errors", "code" => err.error.clone()).increment(1);
    (status, Json(err))
}

/// GET /v1/journeys
pub async fn list_journeys(State(state): State<AppState>) -> Json<Vec<JourneySummary>> {
    Json(state.api.list_journeys())
}

/// GET /v1/journeys/:journey_id
pub async fn get_journey(
    State(state): State<AppState>,
    Path(journey_id): Path<String>,
) -> ApiResult<Journey> {
    state.api.get_journey(&journey_id).map(Json).map_err(reject)
}

/// POST /v1/journeys
pub async fn create_journey(
    State(state): State<AppState>,
    Json(definition): Json<JourneyDefinition>,
) -> Result<(StatusCode, Json<Journey>), (StatusCode, Json<ErrorResponse>)> {
    let journey = state.api.create_journey(definition).map_err(reject)?;
    metrics::counter!("api.journeys_created").increment(1);
    Ok((StatusCode::CREATED, Json(journey)))
}

/// PUT /v1/journeys/:journey_id/state
pub async fn update_journey_state(
    State(state): State<AppState>,
    Path(journey_id): Path<String>,
    Json(request): Json<UpdateStateRequest>,
) -> ApiResult<StateUpdateResponse> {
    state
        .api
        .update_journey_state(&journey_id, request.active)
        .map(Json)
        .map_err(reject)
}

/// GET /v1/journeys/:journey_id/users
pub async fn get_users_in_journey(
    State(state): State<AppState>,
    Path(journey_id): Path<String>,
) -> ApiResult<Vec<JourneyMember>> {
    state
        .api
        .get_users_in_journey(&journey_id)
        .map(Json)
        .map_err(reject)
}

/// GET /v1/users/:user_id/journeys
pub async fn get_user_journeys(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<UserJourneySummary>> {
    Json(state.api.get_user_journeys(&user_id))
}

/// GET /v1/users/:user_id/journeys/:journey_id/stage
pub async fn get_user_current_stage(
    State(state): State<AppState>,
    Path((user_id, journey_id)): Path<(String, String)>,
) -> ApiResult<CurrentStageResponse> {
    state
        .api
        .get_user_current_stage(&user_id, &journey_id)
        .map(Json)
        .map_err(reject)
}

/// GET /v1/users/:user_id/journeys/:journey_id/onboarded
pub async fn is_user_onboarded(
    State(state): State<AppState>,
    Path((user_id, journey_id)): Path<(String, String)>,
) -> ApiResult<OnboardedResponse> {
    state
        .api
        .is_user_onboarded(&user_id, &journey_id)
        .map(Json)
        .map_err(reject)
}

/// POST /v1/users/:user_id/events
pub async fn evaluate_user_event(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<EvaluationResponse> {
    metrics::counter!("api.events_received").increment(1);
    state
        .api
        .evaluate_user_event(&user_id, &payload)
        .map(Json)
        .map_err(reject)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        journeys: state.api.list_journeys().len(),
    })
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_engine::{JourneyEngine, PredicateRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn state() -> AppState {
        let engine = JourneyEngine::new();
        engine.seed_demo_journeys().unwrap();
        AppState {
            api: JourneyApi::new(engine, Arc::new(PredicateRegistry::new())),
            node_id: "test-node".into(),
            start_time: Instant::now(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for("JOURNEY_NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("USER_NOT_ONBOARDED"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("JOURNEY_ALREADY_EXISTS"), StatusCode::CONFLICT);
        assert_eq!(status_for("USER_ALREADY_ONBOARDED"), StatusCode::CONFLICT);
        assert_eq!(status_for("INVALID_JOURNEY"), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for("UNKNOWN_PREDICATE"), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_get_missing_journey_is_404() {
        let (status, Json(body)) = get_journey(State(state()), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "JOURNEY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_journey_returns_created() {
        let definition: JourneyDefinition = serde_json::from_value(json!({
            "id": "ref1",
            "name": "Referral",
            "stages": [
                {"id": "a", "name": "Invite", "condition": {"op": "always"}, "is_onboarding": true},
                {"id": "b", "name": "Signup", "condition": {"op": "exists", "field": "referrer"}, "is_terminal": true}
            ],
            "connections": [{"source_id": "a", "target_id": "b"}]
        }))
        .unwrap();

        let state = state();
        let (status, Json(journey)) = create_journey(State(state.clone()), Json(definition.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(journey.id, "ref1");

        let (status, _) = create_journey(State(state), Json(definition)).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_event_then_stage_query() {
        let state = state();
        let Json(response) = evaluate_user_event(
            State(state.clone()),
            Path("user1".into()),
            Json(json!({"event": "login"})),
        )
        .await
        .unwrap();
        assert_eq!(response.transitions.len(), 1);

        let Json(stage) = get_user_current_stage(
            State(state.clone()),
            Path(("user1".into(), "j1".into())),
        )
        .await
        .unwrap();
        assert_eq!(stage.stage_name, "Login");

        let (status, _) = get_user_current_stage(State(state), Path(("user2".into(), "j1".into())))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deactivate_and_health() {
        let state = state();
        let Json(update) = update_journey_state(
            State(state.clone()),
            Path("j2".into()),
            Json(UpdateStateRequest { active: false }),
        )
        .await
        .unwrap();
        assert!(!update.is_active);

        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.journeys, 3);
        assert_eq!(liveness().await, StatusCode::OK);
    }
}
