//! Stage entry conditions.
//!
//! A [`Condition`] is plain data: it serializes to a tagged JSON object and
//! can be shipped in a declarative journey definition. Logic that cannot be
//! expressed with the built-in variants is registered by name in a
//! [`PredicateRegistry`] at start-up and referenced with
//! [`Condition::Predicate`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use journey_core::{JourneyError, JourneyResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A named predicate function over an event payload.
#[derive(Clone)]
pub struct PredicateFn(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl PredicateFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, payload: &Value) -> bool {
        (self.0)(payload)
    }
}

impl fmt::Debug for PredicateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PredicateFn(..)")
    }
}

/// Entry rule of a stage, evaluated against an event payload.
///
/// Field paths are dotted (`details.page`). A path that is missing, or that
/// steps into a non-object, resolves to "absent" and the condition is simply
/// false.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    Equals {
        field: String,
        value: Value,
    },
    Exists {
        field: String,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    Predicate {
        name: String,
        #[serde(skip)]
        func: Option<PredicateFn>,
    },
}

impl Condition {
    /// `payload.event == name`
    pub fn event(name: impl Into<String>) -> Self {
        Self::field_equals("event", Value::String(name.into()))
    }

    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::All { conditions }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::Any { conditions }
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// A predicate bound in place, for journeys defined in code.
    pub fn predicate<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            name: name.into(),
            func: Some(PredicateFn::new(f)),
        }
    }

    /// A predicate reference to be bound later by [`PredicateRegistry::resolve`].
    pub fn named(name: impl Into<String>) -> Self {
        Self::Predicate {
            name: name.into(),
            func: None,
        }
    }

    /// Evaluates the condition. Never panics on payload shape.
    pub fn evaluate(&self, payload: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Equals { field, value } => {
                lookup(payload, field).is_some_and(|found| values_equal(found, value))
            }
            Self::Exists { field } => lookup(payload, field).is_some_and(|v| !v.is_null()),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(payload)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(payload)),
            Self::Not { condition } => !condition.evaluate(payload),
            Self::Predicate { name, func } => match func {
                Some(f) => f.call(payload),
                None => {
                    warn!(predicate = %name, "Unbound predicate evaluated as false");
                    false
                }
            },
        }
    }
}

/// JSON equality where numbers compare by value, so `100` matches `100.0`.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}

/// Resolves a dotted path inside a JSON payload.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(payload, |node, segment| node.as_object()?.get(segment))
}

/// Startup-populated table of predicates addressable by name.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateFn>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a predicate under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), PredicateFn::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Binds every `Predicate` node in `condition` to its registered
    /// function. Fails on the first unknown name.
    pub fn resolve(&self, condition: Condition) -> JourneyResult<Condition> {
        Ok(match condition {
            Condition::Predicate { name, .. } => {
                let func = self
                    .predicates
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| JourneyError::UnknownPredicate(name.clone()))?;
                Condition::Predicate {
                    name,
                    func: Some(func),
                }
            }
            Condition::All { conditions } => Condition::All {
                conditions: self.resolve_all(conditions)?,
            },
            Condition::Any { conditions } => Condition::Any {
                conditions: self.resolve_all(conditions)?,
            },
            Condition::Not { condition } => Condition::Not {
                condition: Box::new(self.resolve(*condition)?),
            },
            other => other,
        })
    }

    fn resolve_all(&self, conditions: Vec<Condition>) -> JourneyResult<Vec<Condition>> {
        conditions.into_iter().map(|c| self.resolve(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_equality() {
        let cond = Condition::event("login");
        assert!(cond.evaluate(&json!({"event": "login"})));
        assert!(!cond.evaluate(&json!({"event": "logout"})));
        assert!(!cond.evaluate(&json!({})));
    }

    #[test]
    fn test_nested_field_is_null_safe() {
        let cond = Condition::all(vec![
            Condition::event("page_view"),
            Condition::field_equals("details.page", "recharge"),
        ]);
        assert!(cond.evaluate(&json!({"event": "page_view", "details": {"page": "recharge"}})));
        // Missing details, non-object details, non-object payload.
        assert!(!cond.evaluate(&json!({"event": "page_view"})));
        assert!(!cond.evaluate(&json!({"event": "page_view", "details": "recharge"})));
        assert!(!cond.evaluate(&json!(42)));
        assert!(!cond.evaluate(&Value::Null));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let cond = Condition::field_equals("details.amount", 100);
        assert!(cond.evaluate(&json!({"details": {"amount": 100}})));
        assert!(cond.evaluate(&json!({"details": {"amount": 100.0}})));
        assert!(!cond.evaluate(&json!({"details": {"amount": 100.5}})));
        assert!(!cond.evaluate(&json!({"details": {"amount": "100"}})));

        let parsed: Condition =
            serde_json::from_value(json!({"op": "equals", "field": "amount", "value": 2.5})).unwrap();
        assert!(parsed.evaluate(&json!({"amount": 2.5})));
        assert!(!parsed.evaluate(&json!({"amount": 2})));
    }

    #[test]
    fn test_exists_treats_null_as_absent() {
        let cond = Condition::exists("details.amount");
        assert!(cond.evaluate(&json!({"details": {"amount": 0}})));
        assert!(!cond.evaluate(&json!({"details": {"amount": null}})));
        assert!(!cond.evaluate(&json!({"details": {}})));
    }

    #[test]
    fn test_composites() {
        assert!(Condition::all(vec![]).evaluate(&json!({})));
        assert!(!Condition::any(vec![]).evaluate(&json!({})));
        let cond = Condition::any(vec![Condition::Never, Condition::event("a")]);
        assert!(cond.evaluate(&json!({"event": "a"})));
        assert!(Condition::negate(Condition::Never).evaluate(&json!({})));
    }

    #[test]
    fn test_serde_shape() {
        let cond = Condition::all(vec![Condition::event("login"), Condition::named("vip")]);
        let value = serde_json::to_value(&cond).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "all",
                "conditions": [
                    {"op": "equals", "field": "event", "value": "login"},
                    {"op": "predicate", "name": "vip"}
                ]
            })
        );

        let back: Condition = serde_json::from_value(value).unwrap();
        assert!(matches!(back, Condition::All { ref conditions } if conditions.len() == 2));
    }

    #[test]
    fn test_unbound_predicate_is_false() {
        let cond = Condition::named("vip");
        assert!(!cond.evaluate(&json!({"vip": true})));
    }

    #[test]
    fn test_registry_resolves_nested_predicates() {
        let mut registry = PredicateRegistry::new();
        registry.register("big_spender", |p| {
            p.pointer("/details/amount")
                .and_then(Value::as_f64)
                .is_some_and(|a| a >= 100.0)
        });

        let cond = registry
            .resolve(Condition::all(vec![
                Condition::event("transaction"),
                Condition::negate(Condition::named("big_spender")),
            ]))
            .unwrap();

        assert!(cond.evaluate(&json!({"event": "transaction", "details": {"amount": 5}})));
        assert!(!cond.evaluate(&json!({"event": "transaction", "details": {"amount": 500}})));
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let registry = PredicateRegistry::new();
        let err = registry
            .resolve(Condition::any(vec![Condition::named("missing")]))
            .unwrap_err();
        assert_eq!(err, JourneyError::UnknownPredicate("missing".into()));
    }
}
