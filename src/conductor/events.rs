use serde_json::Value;

use crate::{
    foundation::error::BeatlineResult,
    scene::entity::Entity,
    sequence::engine::Sequence,
    sequence::view::SequenceView,
};

/// Action run against the target entity with the event's props.
pub type EventAction = Box<dyn FnMut(&mut Entity, &Value) -> BeatlineResult<()>>;
/// Extra gate evaluated after a threshold is met.
pub type EventCriteria = Box<dyn Fn(&SequenceView<'_>) -> bool>;

/// How often an event may fire once its threshold has been crossed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirePolicy {
    /// Fire the first time the threshold is met and the target resolves.
    #[default]
    Once,
    /// Fire on every evaluation past the threshold.
    EveryFrame,
}

/// A time, beat or bar triggered action against a named entity in the
/// current scene.
pub struct TimelineEvent {
    target_key: String,
    at_time_ms: Option<f64>,
    at_beat_count: Option<u64>,
    at_bar_count: Option<u64>,
    criteria: Option<EventCriteria>,
    action: EventAction,
    props: Value,
    policy: FirePolicy,
    fired: bool,
}

impl TimelineEvent {
    /// Event against `target_key` with no threshold yet. Fires once by default.
    pub fn new<F>(target_key: impl Into<String>, action: F) -> Self
    where
        F: FnMut(&mut Entity, &Value) -> BeatlineResult<()> + 'static,
    {
        Self {
            target_key: target_key.into(),
            at_time_ms: None,
            at_beat_count: None,
            at_bar_count: None,
            criteria: None,
            action: Box::new(action),
            props: Value::Null,
            policy: FirePolicy::Once,
            fired: false,
        }
    }

    /// Threshold on timeline time.
    pub fn at_time_ms(mut self, t: f64) -> Self {
        self.at_time_ms = Some(t);
        self
    }

    /// Threshold on the monotonic beat counter.
    pub fn at_beat_count(mut self, beats: u64) -> Self {
        self.at_beat_count = Some(beats);
        self
    }

    /// Threshold on completed bars.
    pub fn at_bar_count(mut self, bars: u64) -> Self {
        self.at_bar_count = Some(bars);
        self
    }

    /// Extra condition checked once a threshold is met.
    pub fn when(mut self, criteria: impl Fn(&SequenceView<'_>) -> bool + 'static) -> Self {
        self.criteria = Some(Box::new(criteria));
        self
    }

    /// Props handed to the action.
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Override the fire policy.
    pub fn repeat(mut self, policy: FirePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Key of the entity the action targets.
    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    /// Whether the event has fired since the last rearm.
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Any configured threshold reached (`>=`) and criteria passing. An event
    /// without thresholds never triggers.
    pub fn is_due(&self, view: &SequenceView<'_>) -> bool {
        if self.policy == FirePolicy::Once && self.fired {
            return false;
        }
        let by_time = self.at_time_ms.is_some_and(|t| view.time_ms >= t);
        let by_beat = self
            .at_beat_count
            .is_some_and(|b| view.position.beat_counter >= b);
        let by_bar = self.at_bar_count.is_some_and(|b| view.position.bar >= b);
        if !(by_time || by_beat || by_bar) {
            return false;
        }
        self.criteria.as_ref().is_none_or(|c| c(view))
    }
}

impl std::fmt::Debug for TimelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEvent")
            .field("target_key", &self.target_key)
            .field("at_time_ms", &self.at_time_ms)
            .field("at_beat_count", &self.at_beat_count)
            .field("at_bar_count", &self.at_bar_count)
            .field("has_criteria", &self.criteria.is_some())
            .field("policy", &self.policy)
            .field("fired", &self.fired)
            .finish()
    }
}

/// Declarative event list, evaluated by the driver once per frame.
#[derive(Debug, Default)]
pub struct Conductor {
    events: Vec<TimelineEvent>,
}

impl Conductor {
    /// Empty conductor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Events evaluate in insertion order.
    pub fn add_event(&mut self, event: TimelineEvent) {
        self.events.push(event);
    }

    /// Events in evaluation order.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear fired flags, e.g. after a stop or a backwards seek.
    pub fn rearm(&mut self) {
        for e in &mut self.events {
            e.fired = false;
        }
    }

    /// Evaluate every event against `sequence` and run the due ones. Returns
    /// how many actions ran. A target missing from the current scene leaves the
    /// event armed; a failing action is logged and still counts as fired.
    pub fn trigger_events(&mut self, sequence: &mut Sequence) -> usize {
        let mut fired = 0;
        for (index, event) in self.events.iter_mut().enumerate() {
            if !event.is_due(&sequence.view()) {
                continue;
            }
            let Some(entity) = sequence
                .current_scene_mut()
                .and_then(|s| s.get_entity_mut(&event.target_key))
            else {
                tracing::trace!(index, target = %event.target_key, "event target not in current scene");
                continue;
            };
            tracing::debug!(index, target = %event.target_key, "timeline event");
            if let Err(err) = (event.action)(entity, &event.props) {
                tracing::warn!(index, target = %event.target_key, %err, "timeline event failed");
            }
            event.fired = true;
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
#[path = "../../tests/unit/conductor/events.rs"]
mod tests;
