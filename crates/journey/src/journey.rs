use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use journey_core::{JourneyError, JourneyResult};
use serde::Serialize;

use crate::stage::Stage;
use crate::types::JourneySummary;

/// A directed graph of stages with one onboarding entry point and one
/// terminal exit point.
#[derive(Debug, Clone, Serialize)]
pub struct Journey {
    pub id: String,
    pub name: String,
    stages: IndexMap<String, Stage>,
    is_active: bool,
    pub is_time_bound: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    onboarding_stage_id: Option<String>,
    terminal_stage_id: Option<String>,
}

impl Journey {
    /// Creates an empty, inactive, perpetual, non-recurring journey.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stages: IndexMap::new(),
            is_active: false,
            is_time_bound: false,
            start_date: None,
            end_date: None,
            is_recurring: false,
            onboarding_stage_id: None,
            terminal_stage_id: None,
        }
    }

    /// Restricts the journey to `[start, end]`. Either bound may be open.
    pub fn time_bound(
        mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.is_time_bound = true;
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.is_recurring = recurring;
        self
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// Registers a stage. On error the journey is left unchanged.
    pub fn add_stage(&mut self, stage: Stage) -> JourneyResult<&mut Self> {
        if self.stages.contains_key(&stage.id) {
            return Err(JourneyError::DuplicateStageId(stage.id));
        }
        if stage.is_onboarding && self.onboarding_stage_id.is_some() {
            return Err(JourneyError::DuplicateOnboardingStage(stage.id));
        }
        if stage.is_terminal && self.terminal_stage_id.is_some() {
            return Err(JourneyError::DuplicateTerminalStage(stage.id));
        }

        if stage.is_onboarding {
            self.onboarding_stage_id = Some(stage.id.clone());
        }
        if stage.is_terminal {
            self.terminal_stage_id = Some(stage.id.clone());
        }
        self.stages.insert(stage.id.clone(), stage);
        Ok(self)
    }

    /// Adds the edge `source -> target`. Returns whether an edge was added.
    pub fn connect_stages(&mut self, source_id: &str, target_id: &str) -> JourneyResult<bool> {
        if !self.stages.contains_key(target_id) {
            return Err(JourneyError::UnknownStage(target_id.to_string()));
        }
        let source = self
            .stages
            .get_mut(source_id)
            .ok_or_else(|| JourneyError::UnknownStage(source_id.to_string()))?;
        Ok(source.add_next_stage(target_id))
    }

    /// Checks the structural invariants: one onboarding stage, one terminal
    /// stage, and a walk of outgoing edges between them.
    ///
    /// Breadth-first from the onboarding stage; cycles and converging edges
    /// are handled by the visited set, so each stage and edge is touched at
    /// most once.
    pub fn validate(&self) -> JourneyResult<()> {
        let onboarding = self
            .onboarding_stage_id
            .as_deref()
            .ok_or_else(|| JourneyError::NoOnboardingStage(self.id.clone()))?;
        let terminal = self
            .terminal_stage_id
            .as_deref()
            .ok_or_else(|| JourneyError::NoTerminalStage(self.id.clone()))?;

        let mut visited: HashSet<&str> = HashSet::with_capacity(self.stages.len());
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(onboarding);
        queue.push_back(onboarding);

        while let Some(current) = queue.pop_front() {
            if current == terminal {
                return Ok(());
            }
            let Some(stage) = self.stages.get(current) else {
                continue;
            };
            for next in stage.next_stage_ids() {
                if visited.insert(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }

        Err(JourneyError::NoPathToTerminal(self.id.clone()))
    }

    /// Active, and inside the time window when time-bound. Both bounds are
    /// inclusive.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if !self.is_time_bound {
            return true;
        }
        self.start_date.map_or(true, |start| at >= start)
            && self.end_date.map_or(true, |end| at <= end)
    }

    /// True once `end_date` lies strictly before `at`.
    pub fn has_ended(&self, at: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| at > end)
    }

    /// True once `start_date` is set and reached.
    pub fn has_started(&self, at: DateTime<Utc>) -> bool {
        self.start_date.is_some_and(|start| at >= start)
    }

    pub fn onboarding_stage(&self) -> Option<&Stage> {
        self.onboarding_stage_id
            .as_deref()
            .and_then(|id| self.stages.get(id))
    }

    pub fn terminal_stage(&self) -> Option<&Stage> {
        self.terminal_stage_id
            .as_deref()
            .and_then(|id| self.stages.get(id))
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.get(stage_id)
    }

    /// Stages in definition order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Successors of `stage_id` in edge-insertion order; empty for an
    /// unknown stage.
    pub fn next_stages(&self, stage_id: &str) -> Vec<&Stage> {
        self.stages
            .get(stage_id)
            .map(|stage| {
                stage
                    .next_stage_ids()
                    .iter()
                    .filter_map(|id| self.stages.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summary(&self) -> JourneySummary {
        JourneySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            is_active: self.is_active,
            is_time_bound: self.is_time_bound,
            start_date: self.start_date,
            end_date: self.end_date,
            is_recurring: self.is_recurring,
        }
    }
}
