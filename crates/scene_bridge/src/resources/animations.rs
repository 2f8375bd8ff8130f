//! Animation definitions and per-node run state

use crate::error::{BridgeError, BridgeResult};
use crate::events::Handler;
use crate::foundation::ids::{CallbackId, NodeId};
use crate::foundation::props::PropMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Timing curve of an animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Constant speed
    #[default]
    Linear,
    /// Accelerate from rest
    EaseIn,
    /// Decelerate to rest
    EaseOut,
    /// Accelerate then decelerate
    EaseInEaseOut,
    /// Overshoot and settle
    Bounce,
}

/// Named animation as registered with the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDefinition {
    /// Target prop values, e.g. `{"positionX": 1.0}`
    pub properties: PropMap,
    /// Duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    /// Start delay in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f32>,
    /// Restart when finished
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    /// Timing curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
}

impl AnimationDefinition {
    /// Animation over `properties` with engine defaults for everything else
    pub fn new(properties: PropMap) -> Self {
        Self {
            properties,
            duration: None,
            delay: None,
            looping: None,
            easing: None,
        }
    }

    /// Set the duration in milliseconds
    pub fn with_duration(mut self, millis: f32) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Set the easing curve
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    /// Decode a definition from host JSON
    pub fn from_json(name: &str, value: Value) -> BridgeResult<Self> {
        let definition: Self = serde_json::from_value(value)
            .map_err(|e| BridgeError::validation(format!("animation {name}"), e.to_string()))?;
        definition.validate(name)?;
        Ok(definition)
    }

    /// Check that timings are usable
    pub fn validate(&self, name: &str) -> BridgeResult<()> {
        if self.properties.is_empty() {
            return Err(BridgeError::validation(
                format!("animation {name}"),
                "properties must not be empty",
            ));
        }
        for (field, value) in [("duration", self.duration), ("delay", self.delay)] {
            if let Some(v) = value {
                if v < 0.0 || !v.is_finite() {
                    return Err(BridgeError::validation(
                        format!("animation {name}"),
                        format!("{field} must be a non-negative number, got {v}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Host-side options for one animation run
#[derive(Clone, Default)]
pub struct AnimationOptions {
    /// Override the definition's loop flag
    pub looping: Option<bool>,
    /// Override the definition's delay
    pub delay: Option<f32>,
    /// Invoked when the engine starts the run
    pub on_start: Option<Handler>,
    /// Invoked when the engine finishes the run
    pub on_finish: Option<Handler>,
}

impl AnimationOptions {
    /// Loop the run
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    /// Delay the run
    pub fn delay(mut self, millis: f32) -> Self {
        self.delay = Some(millis);
        self
    }

    /// Handler for the start notification
    pub fn on_start(mut self, handler: Handler) -> Self {
        self.on_start = Some(handler);
        self
    }

    /// Handler for the finish notification
    pub fn on_finish(mut self, handler: Handler) -> Self {
        self.on_finish = Some(handler);
        self
    }
}

impl fmt::Debug for AnimationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationOptions")
            .field("looping", &self.looping)
            .field("delay", &self.delay)
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

/// Run options as sent to the engine; handlers travel as callback ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationRunOptions {
    /// Loop override
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    /// Delay override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f32>,
    /// Callback fired on start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_start: Option<CallbackId>,
    /// Callback fired on finish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_finish: Option<CallbackId>,
}

impl AnimationRunOptions {
    /// Callback ids carried by these options
    pub fn callbacks(&self) -> Vec<CallbackId> {
        self.on_start.iter().chain(self.on_finish.iter()).cloned().collect()
    }
}

/// Whether a run is progressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationRunState {
    /// Playing
    Running,
    /// Suspended, resumable
    Paused,
}

#[derive(Debug)]
struct RunEntry {
    state: AnimationRunState,
    callbacks: Vec<CallbackId>,
    finish: Option<CallbackId>,
}

/// Animation runs keyed by (node, animation name)
#[derive(Debug, Default)]
pub struct AnimationRuns {
    runs: HashMap<(NodeId, String), RunEntry>,
}

impl AnimationRuns {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a started run
    ///
    /// `finish` is the callback whose delivery ends the run; looping runs have
    /// none. Restarting a run returns the callbacks owned by the previous one.
    pub fn start(
        &mut self,
        node: &NodeId,
        name: &str,
        callbacks: Vec<CallbackId>,
        finish: Option<CallbackId>,
    ) -> Vec<CallbackId> {
        let entry = RunEntry {
            state: AnimationRunState::Running,
            callbacks,
            finish,
        };
        self.runs
            .insert((node.clone(), name.to_string()), entry)
            .map(|previous| previous.callbacks)
            .unwrap_or_default()
    }

    /// Forget a run, returning the callbacks it owned
    pub fn stop(&mut self, node: &NodeId, name: &str) -> Option<Vec<CallbackId>> {
        self.runs
            .remove(&(node.clone(), name.to_string()))
            .map(|entry| entry.callbacks)
    }

    /// Forget the run that `callback` finishes
    ///
    /// Returns the run's key and the callbacks it owned.
    pub fn finish(&mut self, callback: &CallbackId) -> Option<(NodeId, String, Vec<CallbackId>)> {
        let key = self
            .runs
            .iter()
            .find(|(_, entry)| entry.finish.as_ref() == Some(callback))
            .map(|(key, _)| key.clone())?;
        let entry = self.runs.remove(&key)?;
        Some((key.0, key.1, entry.callbacks))
    }

    /// Move a running run to `Paused`; `false` if it was not running
    pub fn pause(&mut self, node: &NodeId, name: &str) -> bool {
        self.transition(node, name, AnimationRunState::Running, AnimationRunState::Paused)
    }

    /// Move a paused run back to `Running`; `false` if it was not paused
    pub fn resume(&mut self, node: &NodeId, name: &str) -> bool {
        self.transition(node, name, AnimationRunState::Paused, AnimationRunState::Running)
    }

    fn transition(&mut self, node: &NodeId, name: &str, from: AnimationRunState, to: AnimationRunState) -> bool {
        match self.runs.get_mut(&(node.clone(), name.to_string())) {
            Some(entry) if entry.state == from => {
                entry.state = to;
                true
            }
            _ => false,
        }
    }

    /// State of a run
    pub fn state(&self, node: &NodeId, name: &str) -> Option<AnimationRunState> {
        self.runs
            .get(&(node.clone(), name.to_string()))
            .map(|entry| entry.state)
    }

    /// Drop every run on `node`, returning the callbacks they owned
    pub fn remove_node(&mut self, node: &NodeId) -> Vec<CallbackId> {
        let mut released = Vec::new();
        self.runs.retain(|(owner, _), entry| {
            if owner == node {
                released.append(&mut entry.callbacks);
                false
            } else {
                true
            }
        });
        released
    }

    /// Number of tracked runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no run is tracked
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Drop every run
    pub fn clear(&mut self) {
        self.runs.clear();
    }
}
