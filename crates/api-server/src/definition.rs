//! Declarative journey descriptions accepted by the administrative surface.

use chrono::{DateTime, Utc};
use journey_core::{JourneyError, JourneyResult};
use journey_engine::{Condition, Journey, PredicateRegistry, Stage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_time_bound: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    pub name: String,
    pub condition: Condition,
    #[serde(default)]
    pub is_onboarding: bool,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub notify_on_transition: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    pub source_id: String,
    pub target_id: String,
}

impl JourneyDefinition {
    /// Builds the journey graph, binding named predicates through
    /// `registry`. Structural errors surface as they occur; validation is
    /// left to registration. Dates on a journey that is not time-bound are
    /// rejected rather than ignored.
    pub fn build(&self, registry: &PredicateRegistry) -> JourneyResult<Journey> {
        if !self.is_time_bound && (self.start_date.is_some() || self.end_date.is_some()) {
            return Err(JourneyError::InvalidJourney(format!(
                "Journey {} has a start or end date but is not time-bound",
                self.id
            )));
        }

        let mut journey = Journey::new(&self.id, &self.name).recurring(self.is_recurring);
        if self.is_time_bound {
            journey = journey.time_bound(self.start_date, self.end_date);
        }

        for def in &self.stages {
            let mut stage = Stage::new(&def.id, &def.name, registry.resolve(def.condition.clone())?)
                .notify_on_transition(def.notify_on_transition);
            if def.is_onboarding {
                stage = stage.onboarding();
            }
            if def.is_terminal {
                stage = stage.terminal();
            }
            journey.add_stage(stage)?;
        }

        for conn in &self.connections {
            journey.connect_stages(&conn.source_id, &conn.target_id)?;
        }

        Ok(journey)
    }
}
