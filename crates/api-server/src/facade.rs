//! Administrative facade over the journey engine.
//!
//! Every operation returns a serializable value or an [`ErrorResponse`]
//! carrying the engine error's stable code and message. The HTTP layer maps
//! the code to a status; other front-ends can use the facade directly.

use std::sync::Arc;

use journey_core::JourneyError;
use journey_engine::types::{JourneyMember, JourneySummary, TransitionResult, UserJourneySummary};
use journey_engine::{Journey, JourneyEngine, PredicateRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::definition::JourneyDefinition;

pub type FacadeResult<T> = Result<T, ErrorResponse>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<JourneyError> for ErrorResponse {
    fn from(err: JourneyError) -> Self {
        Self {
            error: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdateResponse {
    pub journey_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStageResponse {
    pub user_id: String,
    pub journey_id: String,
    pub stage_id: String,
    pub stage_name: String,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardedResponse {
    pub user_id: String,
    pub journey_id: String,
    pub is_onboarded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub user_id: String,
    pub transitions: Vec<TransitionResult>,
}

#[derive(Clone)]
pub struct JourneyApi {
    engine: JourneyEngine,
    registry: Arc<PredicateRegistry>,
}

impl JourneyApi {
    pub fn new(engine: JourneyEngine, registry: Arc<PredicateRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn engine(&self) -> &JourneyEngine {
        &self.engine
    }

    pub fn list_journeys(&self) -> Vec<JourneySummary> {
        self.engine
            .list_journeys()
            .iter()
            .map(Journey::summary)
            .collect()
    }

    pub fn get_journey(&self, journey_id: &str) -> FacadeResult<Journey> {
        Ok(self.engine.get_journey(journey_id)?)
    }

    /// Builds and registers a journey from its declarative form. The new
    /// journey is inactive until its state is updated.
    pub fn create_journey(&self, definition: JourneyDefinition) -> FacadeResult<Journey> {
        let journey = definition.build(&self.registry).map_err(|e| {
            warn!(journey_id = %definition.id, error = %e, "Rejected journey definition");
            e
        })?;
        Ok(self.engine.create_journey(journey)?)
    }

    pub fn update_journey_state(
        &self,
        journey_id: &str,
        active: bool,
    ) -> FacadeResult<StateUpdateResponse> {
        self.engine.update_state(journey_id, active)?;
        Ok(StateUpdateResponse {
            journey_id: journey_id.to_string(),
            is_active: active,
        })
    }

    pub fn get_user_current_stage(
        &self,
        user_id: &str,
        journey_id: &str,
    ) -> FacadeResult<CurrentStageResponse> {
        let stage = self.engine.get_current_stage(user_id, journey_id)?;
        Ok(CurrentStageResponse {
            user_id: user_id.to_string(),
            journey_id: journey_id.to_string(),
            stage_id: stage.id,
            stage_name: stage.name,
            is_terminal: stage.is_terminal,
        })
    }

    pub fn is_user_onboarded(&self, user_id: &str, journey_id: &str) -> FacadeResult<OnboardedResponse> {
        let is_onboarded = self.engine.is_onboarded(user_id, journey_id)?;
        Ok(OnboardedResponse {
            user_id: user_id.to_string(),
            journey_id: journey_id.to_string(),
            is_onboarded,
        })
    }

    pub fn get_user_journeys(&self, user_id: &str) -> Vec<UserJourneySummary> {
        self.engine.get_user_journeys(user_id)
    }

    pub fn get_users_in_journey(&self, journey_id: &str) -> FacadeResult<Vec<JourneyMember>> {
        Ok(self.engine.get_users_in_journey(journey_id)?)
    }

    /// Runs one event through the engine synchronously, bypassing the queue.
    pub fn evaluate_user_event(&self, user_id: &str, payload: &Value) -> FacadeResult<EvaluationResponse> {
        let transitions = self.engine.evaluate(user_id, payload)?;
        info!(user_id = %user_id, transitions = transitions.len(), "Evaluated user event");
        Ok(EvaluationResponse {
            user_id: user_id.to_string(),
            transitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_engine::types::TransitionAction;
    use serde_json::json;

    fn api() -> JourneyApi {
        let engine = JourneyEngine::new();
        engine.seed_demo_journeys().unwrap();
        JourneyApi::new(engine, Arc::new(PredicateRegistry::new()))
    }

    fn two_stage_definition(id: &str) -> JourneyDefinition {
        serde_json::from_value(json!({
            "id": id,
            "name": "Referral",
            "stages": [
                {"id": "a", "name": "Invite", "condition": {"op": "equals", "field": "event", "value": "invite"}, "is_onboarding": true},
                {"id": "b", "name": "Signup", "condition": {"op": "equals", "field": "event", "value": "signup"}, "is_terminal": true}
            ],
            "connections": [{"source_id": "a", "target_id": "b"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_list_journeys_in_registration_order() {
        let ids: Vec<String> = api().list_journeys().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["j1", "j2", "promo1"]);
    }

    #[test]
    fn test_unknown_journey_maps_to_error_code() {
        let err = api().get_journey("nope").unwrap_err();
        assert_eq!(err.error, "JOURNEY_NOT_FOUND");
        assert_eq!(err.message, "Journey with ID nope not found");
    }

    #[test]
    fn test_create_then_activate() {
        let api = api();
        let journey = api.create_journey(two_stage_definition("ref1")).unwrap();
        assert!(!journey.is_active());

        let update = api.update_journey_state("ref1", true).unwrap();
        assert!(update.is_active);
        assert!(api.get_journey("ref1").unwrap().is_active());

        let err = api.create_journey(two_stage_definition("ref1")).unwrap_err();
        assert_eq!(err.error, "JOURNEY_ALREADY_EXISTS");
    }

    #[test]
    fn test_create_without_path_is_invalid() {
        let mut def = two_stage_definition("ref2");
        def.connections.clear();
        let err = api().create_journey(def).unwrap_err();
        assert_eq!(err.error, "INVALID_JOURNEY");
        assert!(err.message.contains("no valid path"));
    }

    #[test]
    fn test_evaluate_and_query_user() {
        let api = api();
        let response = api
            .evaluate_user_event("user1", &json!({"event": "login"}))
            .unwrap();
        assert_eq!(response.transitions.len(), 1);
        assert_eq!(response.transitions[0].action, TransitionAction::Onboarded);

        let stage = api.get_user_current_stage("user1", "j1").unwrap();
        assert_eq!(stage.stage_id, "s1_j1");
        assert!(!stage.is_terminal);
        assert!(api.is_user_onboarded("user1", "j1").unwrap().is_onboarded);
        assert!(!api.is_user_onboarded("user1", "j2").unwrap().is_onboarded);

        let journeys = api.get_user_journeys("user1");
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].journey_id, "j1");
        assert_eq!(api.get_users_in_journey("j1").unwrap()[0].user_id, "user1");
    }

    #[test]
    fn test_current_stage_for_stranger() {
        let err = api().get_user_current_stage("ghost", "j1").unwrap_err();
        assert_eq!(err.error, "USER_NOT_ONBOARDED");
        let err = api().get_users_in_journey("missing").unwrap_err();
        assert_eq!(err.error, "JOURNEY_NOT_FOUND");
    }
}
