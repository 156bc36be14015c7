use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use journey_core::event_bus::{make_event, noop_sink, EventSink};
use journey_core::notify::{noop_notifier, NotificationDispatcher};
use journey_core::types::{AnalyticsEvent, EventType};
use journey_core::{JourneyError, JourneyResult};

use crate::condition::Condition;
use crate::journey::Journey;
use crate::stage::Stage;
use crate::types::{
    ActivationChange, JourneyMember, TransitionAction, TransitionResult, UserJourneyState,
    UserJourneySummary,
};

/// `(user_id, journey_id)`
type StateKey = (String, String);

fn state_key(user_id: &str, journey_id: &str) -> StateKey {
    (user_id.to_string(), journey_id.to_string())
}

fn not_found(journey_id: &str) -> JourneyError {
    JourneyError::JourneyNotFound(journey_id.to_string())
}

/// Per-(user, journey) progress records.
#[derive(Default)]
struct UserStates {
    entries: IndexMap<StateKey, UserJourneyState>,
}

impl UserStates {
    fn get(&self, user_id: &str, journey_id: &str) -> Option<&UserJourneyState> {
        self.entries.get(&state_key(user_id, journey_id))
    }

    /// Places the user at the journey's onboarding stage. A recurring journey
    /// replaces any earlier state; otherwise an existing state is an error.
    fn onboard(&mut self, user_id: &str, journey: &Journey, at: DateTime<Utc>) -> JourneyResult<()> {
        let key = state_key(user_id, &journey.id);
        if self.entries.contains_key(&key) && !journey.is_recurring {
            return Err(JourneyError::UserAlreadyOnboarded {
                user_id: user_id.to_string(),
                journey_id: journey.id.clone(),
            });
        }
        let onboarding = journey
            .onboarding_stage()
            .ok_or_else(|| JourneyError::NoOnboardingStage(journey.id.clone()))?;

        self.entries.insert(
            key,
            UserJourneyState::new(user_id, &journey.id, &onboarding.id, at),
        );
        Ok(())
    }

    /// Moves the user along one outgoing edge of their current stage.
    fn advance(
        &mut self,
        user_id: &str,
        journey: &Journey,
        next_stage_id: &str,
        at: DateTime<Utc>,
    ) -> JourneyResult<()> {
        let state = self
            .entries
            .get_mut(&state_key(user_id, &journey.id))
            .ok_or_else(|| JourneyError::UserNotOnboarded {
                user_id: user_id.to_string(),
                journey_id: journey.id.clone(),
            })?;
        let current = journey
            .stage(&state.current_stage_id)
            .ok_or_else(|| JourneyError::UnknownStage(state.current_stage_id.clone()))?;
        if !current.has_next_stage(next_stage_id) {
            return Err(JourneyError::InvalidStageTransition {
                from: current.id.clone(),
                to: next_stage_id.to_string(),
            });
        }

        state.move_to_stage(next_stage_id, at);
        Ok(())
    }

    fn restore(&mut self, user_id: &str, journey_id: &str, snapshot: Option<UserJourneyState>) {
        let key = state_key(user_id, journey_id);
        match snapshot {
            Some(state) => {
                self.entries.insert(key, state);
            }
            None => {
                self.entries.shift_remove(&key);
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = &UserJourneyState> {
        self.entries.values()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Side effects collected under the lock and dispatched after it is released.
struct Outbox {
    node_id: String,
    events: Vec<AnalyticsEvent>,
    notifications: Vec<(String, String)>,
}

impl Outbox {
    fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            events: Vec::new(),
            notifications: Vec::new(),
        }
    }

    fn record(
        &mut self,
        user_id: &str,
        journey: &Journey,
        transition: &TransitionResult,
        at: DateTime<Utc>,
    ) {
        let Some(stage) = journey.stage(&transition.stage_id) else {
            return;
        };
        let event_type = match transition.action {
            TransitionAction::Onboarded => EventType::JourneyEntered,
            TransitionAction::Moved => EventType::JourneyStepCompleted,
        };
        self.events.push(make_event(
            event_type,
            &self.node_id,
            &journey.id,
            user_id,
            &stage.id,
            at,
        ));
        if transition.action == TransitionAction::Moved && stage.is_terminal {
            self.events.push(make_event(
                EventType::JourneyCompleted,
                &self.node_id,
                &journey.id,
                user_id,
                &stage.id,
                at,
            ));
        }
        if stage.notify_on_transition {
            self.notifications.push((
                user_id.to_string(),
                format!("You have reached \"{}\" in {}", stage.name, journey.name),
            ));
        }
    }
}

#[derive(Default)]
struct EngineState {
    journeys: IndexMap<String, Journey>,
    states: UserStates,
}

impl EngineState {
    fn journey(&self, journey_id: &str) -> JourneyResult<&Journey> {
        self.journeys
            .get(journey_id)
            .ok_or_else(|| not_found(journey_id))
    }

    fn evaluate(
        &mut self,
        user_id: &str,
        payload: &Value,
        at: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> JourneyResult<Vec<TransitionResult>> {
        let EngineState { journeys, states } = self;
        let mut results = Vec::new();

        for journey in journeys.values() {
            if !journey.is_valid_at(at) {
                continue;
            }

            // Each journey is one unit: on failure its state is rolled back,
            // transitions already applied to earlier journeys stay.
            let snapshot = states.get(user_id, &journey.id).cloned();
            match evaluate_journey(states, journey, user_id, payload, at) {
                Ok(transitions) => {
                    for transition in &transitions {
                        outbox.record(user_id, journey, transition, at);
                    }
                    results.extend(transitions);
                }
                Err(err) => {
                    states.restore(user_id, &journey.id, snapshot);
                    warn!(
                        journey_id = %journey.id,
                        user_id = %user_id,
                        error = %err,
                        "Journey evaluation failed"
                    );
                    return Err(err);
                }
            }
        }

        Ok(results)
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> Vec<ActivationChange> {
        let mut changes = Vec::new();

        for journey in self.journeys.values_mut() {
            if !journey.is_time_bound {
                continue;
            }
            let ended = journey.has_ended(now);

            if journey.is_active() && ended {
                journey.set_active(false);
                info!(
                    journey_id = %journey.id,
                    "Journey automatically marked inactive due to end date passing"
                );
                changes.push(ActivationChange {
                    journey_id: journey.id.clone(),
                    active: false,
                });
            } else if !journey.is_active() && !ended && journey.has_started(now) {
                journey.set_active(true);
                info!(
                    journey_id = %journey.id,
                    "Journey automatically marked active due to start date arriving"
                );
                changes.push(ActivationChange {
                    journey_id: journey.id.clone(),
                    active: true,
                });
            }
        }

        changes
    }
}

/// Onboarding check followed by advancement check for one journey.
///
/// Advancement re-reads the state because onboarding may have just created
/// it, so a single event can both onboard and advance. Outgoing edges are
/// scanned in insertion order and the first matching stage wins; at most one
/// move happens per journey per event.
fn evaluate_journey(
    states: &mut UserStates,
    journey: &Journey,
    user_id: &str,
    payload: &Value,
    at: DateTime<Utc>,
) -> JourneyResult<Vec<TransitionResult>> {
    let mut transitions = Vec::new();
    let onboarding = journey
        .onboarding_stage()
        .ok_or_else(|| JourneyError::NoOnboardingStage(journey.id.clone()))?;

    let has_state = states.get(user_id, &journey.id).is_some();
    if (!has_state || journey.is_recurring) && onboarding.evaluate_condition(payload) {
        match states.onboard(user_id, journey, at) {
            Ok(()) => {
                info!(
                    journey_id = %journey.id,
                    user_id = %user_id,
                    stage_id = %onboarding.id,
                    "User onboarded to journey"
                );
                transitions.push(TransitionResult {
                    journey_id: journey.id.clone(),
                    action: TransitionAction::Onboarded,
                    stage_id: onboarding.id.clone(),
                });
            }
            Err(JourneyError::UserAlreadyOnboarded { .. }) => {
                debug!(journey_id = %journey.id, user_id = %user_id, "User already onboarded");
            }
            Err(err) => return Err(err),
        }
    }

    let next_stage_id = match states.get(user_id, &journey.id) {
        Some(state) => {
            let current = journey
                .stage(&state.current_stage_id)
                .ok_or_else(|| JourneyError::UnknownStage(state.current_stage_id.clone()))?;
            if current.is_terminal {
                None
            } else {
                journey
                    .next_stages(&current.id)
                    .into_iter()
                    .find(|candidate| candidate.evaluate_condition(payload))
                    .map(|stage| stage.id.clone())
            }
        }
        None => None,
    };

    if let Some(next_stage_id) = next_stage_id {
        states.advance(user_id, journey, &next_stage_id, at)?;
        info!(
            journey_id = %journey.id,
            user_id = %user_id,
            stage_id = %next_stage_id,
            "User moved to next stage"
        );
        transitions.push(TransitionResult {
            journey_id: journey.id.clone(),
            action: TransitionAction::Moved,
            stage_id: next_stage_id,
        });
    }

    Ok(transitions)
}

/// Owns every journey definition and every user's per-journey state.
///
/// All operations run under one lock, so an evaluation never interleaves
/// with an activation change, a sweep, or another evaluation.
#[derive(Clone)]
pub struct JourneyEngine {
    inner: Arc<Mutex<EngineState>>,
    notifier: Arc<dyn NotificationDispatcher>,
    event_sink: Arc<dyn EventSink>,
    node_id: String,
}

impl std::fmt::Debug for JourneyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("JourneyEngine")
            .field("journeys", &inner.journeys.len())
            .field("user_states", &inner.states.len())
            .field("node_id", &self.node_id)
            .finish()
    }
}

impl JourneyEngine {
    /// Creates an empty engine with no-op collaborators.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineState::default())),
            notifier: noop_notifier(),
            event_sink: noop_sink(),
            node_id: "local".to_string(),
        }
    }

    /// Node identifier stamped on emitted analytics events.
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    /// Attach a dispatcher for transition notifications.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Validates and registers a journey. Registered journeys start
    /// inactive; activation is a separate [`update_state`](Self::update_state).
    pub fn create_journey(&self, mut journey: Journey) -> JourneyResult<Journey> {
        let mut inner = self.inner.lock();
        if inner.journeys.contains_key(&journey.id) {
            return Err(JourneyError::JourneyAlreadyExists(journey.id));
        }
        journey
            .validate()
            .map_err(|e| JourneyError::InvalidJourney(e.to_string()))?;

        journey.set_active(false);
        info!(
            journey_id = %journey.id,
            name = %journey.name,
            stages = journey.stage_count(),
            "Creating journey"
        );
        metrics::counter!("journey.created").increment(1);
        inner.journeys.insert(journey.id.clone(), journey.clone());
        Ok(journey)
    }

    /// Sets the activation flag. Time-window consistency is left to the sweep.
    pub fn update_state(&self, journey_id: &str, active: bool) -> JourneyResult<()> {
        let mut inner = self.inner.lock();
        let journey = inner
            .journeys
            .get_mut(journey_id)
            .ok_or_else(|| not_found(journey_id))?;

        journey.set_active(active);
        info!(journey_id = %journey_id, active, "Updating journey state");
        if !active && journey.is_time_bound && journey.has_ended(Utc::now()) {
            info!(journey_id = %journey_id, "Journey deactivated after its end date");
        }
        Ok(())
    }

    pub fn get_journey(&self, journey_id: &str) -> JourneyResult<Journey> {
        self.inner.lock().journey(journey_id).cloned()
    }

    /// All journeys in registration order.
    pub fn list_journeys(&self) -> Vec<Journey> {
        self.inner.lock().journeys.values().cloned().collect()
    }

    /// Evaluates one inbound event for `user_id` against every journey.
    pub fn evaluate(&self, user_id: &str, payload: &Value) -> JourneyResult<Vec<TransitionResult>> {
        self.evaluate_at(user_id, payload, Utc::now())
    }

    /// [`evaluate`](Self::evaluate) with an explicit timestamp shared by
    /// every transition of this call.
    pub fn evaluate_at(
        &self,
        user_id: &str,
        payload: &Value,
        at: DateTime<Utc>,
    ) -> JourneyResult<Vec<TransitionResult>> {
        let mut outbox = Outbox::new(&self.node_id);
        let outcome = self
            .inner
            .lock()
            .evaluate(user_id, payload, at, &mut outbox);

        // Committed transitions get their side effects even if a later
        // journey failed.
        self.dispatch(outbox);

        metrics::counter!("journey.evaluations").increment(1);
        match &outcome {
            Ok(results) => {
                for result in results {
                    metrics::counter!("journey.transitions", "action" => result.action.as_str())
                        .increment(1);
                }
            }
            Err(_) => metrics::counter!("journey.evaluation_errors").increment(1),
        }
        outcome
    }

    fn dispatch(&self, outbox: Outbox) {
        for event in outbox.events {
            self.event_sink.emit(event);
        }
        for (user_id, message) in outbox.notifications {
            if !self.notifier.send(&user_id, &message) {
                warn!(user_id = %user_id, "Transition notification was not delivered");
                metrics::counter!("journey.notification_failures").increment(1);
            }
        }
    }

    /// Deactivates time-bound journeys past their end date and activates
    /// inactive ones whose start date has arrived. Idempotent.
    pub fn check_and_update_time_based_journeys(&self) -> Vec<ActivationChange> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<ActivationChange> {
        let changes = self.inner.lock().sweep(now);
        debug!(changes = changes.len(), "Time-window sweep finished");
        changes
    }

    /// Whether the user has a state in the journey.
    pub fn is_onboarded(&self, user_id: &str, journey_id: &str) -> JourneyResult<bool> {
        let inner = self.inner.lock();
        inner.journey(journey_id)?;
        Ok(inner.states.get(user_id, journey_id).is_some())
    }

    pub fn get_current_stage(&self, user_id: &str, journey_id: &str) -> JourneyResult<Stage> {
        let inner = self.inner.lock();
        let state = inner
            .states
            .get(user_id, journey_id)
            .ok_or_else(|| JourneyError::UserNotOnboarded {
                user_id: user_id.to_string(),
                journey_id: journey_id.to_string(),
            })?;
        let journey = inner.journey(journey_id)?;
        journey
            .stage(&state.current_stage_id)
            .cloned()
            .ok_or_else(|| JourneyError::UnknownStage(state.current_stage_id.clone()))
    }

    /// Full progress record, history included.
    pub fn get_user_state(&self, user_id: &str, journey_id: &str) -> JourneyResult<UserJourneyState> {
        self.inner
            .lock()
            .states
            .get(user_id, journey_id)
            .cloned()
            .ok_or_else(|| JourneyError::UserNotOnboarded {
                user_id: user_id.to_string(),
                journey_id: journey_id.to_string(),
            })
    }

    pub fn get_users_in_journey(&self, journey_id: &str) -> JourneyResult<Vec<JourneyMember>> {
        let inner = self.inner.lock();
        inner.journey(journey_id)?;
        Ok(inner
            .states
            .iter()
            .filter(|state| state.journey_id == journey_id)
            .map(|state| JourneyMember {
                user_id: state.user_id.clone(),
                current_stage_id: state.current_stage_id.clone(),
                onboarded_at: state.onboarded_at,
            })
            .collect())
    }

    pub fn get_user_journeys(&self, user_id: &str) -> Vec<UserJourneySummary> {
        let inner = self.inner.lock();
        inner
            .states
            .iter()
            .filter(|state| state.user_id == user_id)
            .filter_map(|state| {
                let journey = inner.journeys.get(&state.journey_id)?;
                Some(UserJourneySummary {
                    journey_id: journey.id.clone(),
                    journey_name: journey.name.clone(),
                    current_stage_id: state.current_stage_id.clone(),
                    onboarded_at: state.onboarded_at,
                })
            })
            .collect()
    }

    /// Registers and activates the bundled demo journeys: a recharge funnel,
    /// a UPI Lite funnel and a one-week promotion.
    pub fn seed_demo_journeys(&self) -> JourneyResult<Vec<String>> {
        info!("Seeding demo journeys");
        let now = Utc::now();

        // ---- 1. First time user recharge ----
        let mut recharge = Journey::new("j1", "First Time User Recharge Journey");
        recharge
            .add_stage(Stage::new("s1_j1", "Login", Condition::event("login")).onboarding())?
            .add_stage(Stage::new(
                "s2_j1",
                "Recharge Page View",
                Condition::all(vec![
                    Condition::event("page_view"),
                    Condition::field_equals("details.page", "recharge"),
                ]),
            ))?
            .add_stage(
                Stage::new(
                    "s3_j1",
                    "Recharge Transaction",
                    Condition::all(vec![
                        Condition::event("transaction"),
                        Condition::field_equals("details.type", "recharge"),
                    ]),
                )
                .terminal()
                .notify_on_transition(true),
            )?;
        recharge.connect_stages("s1_j1", "s2_j1")?;
        recharge.connect_stages("s2_j1", "s3_j1")?;

        // ---- 2. UPI Lite account ----
        let mut upi_lite = Journey::new("j2", "UPI Lite Account Journey");
        upi_lite
            .add_stage(
                Stage::new(
                    "s1_j2",
                    "UPI Lite Account Opening",
                    Condition::all(vec![
                        Condition::event("account_open"),
                        Condition::field_equals("details.type", "upi_lite"),
                    ]),
                )
                .onboarding(),
            )?
            .add_stage(
                Stage::new(
                    "s2_j2",
                    "UPI Lite Top Up",
                    Condition::all(vec![
                        Condition::event("transaction"),
                        Condition::field_equals("details.type", "upi_lite_topup"),
                    ]),
                )
                .terminal(),
            )?;
        upi_lite.connect_stages("s1_j2", "s2_j2")?;

        // ---- 3. One week promotion ----
        let mut promo = Journey::new("promo1", "One Week Special Promotion")
            .time_bound(Some(now), Some(now + Duration::days(7)));
        promo
            .add_stage(
                Stage::new(
                    "s1_promo",
                    "Promo Banner View",
                    Condition::all(vec![
                        Condition::event("banner_view"),
                        Condition::field_equals("details.banner", "special_promo"),
                    ]),
                )
                .onboarding(),
            )?
            .add_stage(Stage::new(
                "s2_promo",
                "Promo Page View",
                Condition::all(vec![
                    Condition::event("page_view"),
                    Condition::field_equals("details.page", "special_promo"),
                ]),
            ))?
            .add_stage(
                Stage::new("s3_promo", "Promo Redemption", Condition::event("redeem_promo"))
                    .terminal()
                    .notify_on_transition(true),
            )?;
        promo.connect_stages("s1_promo", "s2_promo")?;
        promo.connect_stages("s2_promo", "s3_promo")?;

        let mut ids = Vec::new();
        for journey in [recharge, upi_lite, promo] {
            let created = self.create_journey(journey)?;
            self.update_state(&created.id, true)?;
            ids.push(created.id);
        }

        info!(count = ids.len(), "Seeded demo journeys");
        Ok(ids)
    }
}

impl Default for JourneyEngine {
    fn default() -> Self {
        Self::new()
    }
}
