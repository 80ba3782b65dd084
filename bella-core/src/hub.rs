//! Single source of truth for the avatar's visible state

use crate::config::HubConfig;
use crate::expression::{blend_expressions, Expression};
use crate::gesture::GestureDescriptor;
use crate::observer::{ObserverList, SubscriptionId};
use crate::types::{Emotion, Vec3};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarState {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub emotion: Emotion,
    pub emotion_intensity: f32,
    pub expression: Expression,
    pub gesture: Option<GestureDescriptor>,
    pub is_visible: bool,
    pub animation: Option<String>,
    pub last_update: DateTime<Utc>,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            emotion: Emotion::Neutral,
            emotion_intensity: 0.0,
            expression: Expression::new(),
            gesture: None,
            is_visible: true,
            animation: None,
            last_update: Utc::now(),
        }
    }
}

/// Which part of the state a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateField {
    Position,
    Rotation,
    Scale,
    Emotion,
    Expression,
    Gesture,
    Animation,
    Visibility,
    /// Whole state replaced from history
    Revert,
    /// Whole state replaced from an external snapshot
    Snapshot,
    Reset,
}

impl StateField {
    pub const ALL: [StateField; 11] = [
        StateField::Position,
        StateField::Rotation,
        StateField::Scale,
        StateField::Emotion,
        StateField::Expression,
        StateField::Gesture,
        StateField::Animation,
        StateField::Visibility,
        StateField::Revert,
        StateField::Snapshot,
        StateField::Reset,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub field: StateField,
    pub state: AvatarState,
}

/// History entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: AvatarState,
    pub timestamp: DateTime<Utc>,
}

/// Portable export of the current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub state: AvatarState,
    pub timestamp: DateTime<Utc>,
    pub history_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubStatistics {
    pub history_len: usize,
    pub subscriber_count: usize,
    pub last_update: DateTime<Utc>,
}

struct HubInner {
    state: AvatarState,
    history: VecDeque<StateSnapshot>,
    last_stamp: Option<DateTime<Utc>>,
}

impl HubInner {
    /// Strictly increasing timestamps even when the clock stalls
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Every setter stamps the state, appends a snapshot to the bounded history
/// and notifies field subscribers plus any-change subscribers before
/// returning.
pub struct StateSyncHub {
    max_history: usize,
    inner: RwLock<HubInner>,
    field_observers: HashMap<StateField, ObserverList<StateChange>>,
    all_observers: ObserverList<StateChange>,
}

impl StateSyncHub {
    pub fn new(config: HubConfig) -> Self {
        let field_observers = StateField::ALL
            .iter()
            .map(|field| (*field, ObserverList::new("hub-field")))
            .collect();
        Self {
            max_history: config.max_history.max(1),
            inner: RwLock::new(HubInner {
                state: AvatarState::default(),
                history: VecDeque::new(),
                last_stamp: None,
            }),
            field_observers,
            all_observers: ObserverList::new("hub-all"),
        }
    }

    fn mutate<F: FnOnce(&mut AvatarState)>(&self, field: StateField, apply: F) {
        let state = {
            let mut inner = self.inner.write();
            apply(&mut inner.state);
            let stamp = inner.next_stamp();
            inner.state.last_update = stamp;
            let snapshot = StateSnapshot {
                state: inner.state.clone(),
                timestamp: stamp,
            };
            inner.history.push_back(snapshot);
            while inner.history.len() > self.max_history {
                inner.history.pop_front();
            }
            inner.state.clone()
        };
        self.notify(field, state);
    }

    fn notify(&self, field: StateField, state: AvatarState) {
        let change = StateChange { field, state };
        if let Some(observers) = self.field_observers.get(&field) {
            observers.notify(&change);
        }
        self.all_observers.notify(&change);
    }

    pub fn state(&self) -> AvatarState {
        self.inner.read().state.clone()
    }

    pub fn update_position(&self, position: Vec3) {
        self.mutate(StateField::Position, |s| s.position = position);
    }

    pub fn update_rotation(&self, rotation: Vec3) {
        self.mutate(StateField::Rotation, |s| s.rotation = rotation);
    }

    pub fn update_scale(&self, scale: Vec3) {
        self.mutate(StateField::Scale, |s| s.scale = scale);
    }

    pub fn set_emotion(&self, emotion: Emotion, intensity: f32) {
        let intensity = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
        self.mutate(StateField::Emotion, |s| {
            s.emotion = emotion;
            s.emotion_intensity = intensity;
        });
    }

    pub fn set_expression(&self, expression: Expression) {
        let expression: Expression = expression
            .into_iter()
            .map(|(name, value)| (name, value.clamp(0.0, 1.0)))
            .collect();
        self.mutate(StateField::Expression, |s| s.expression = expression);
    }

    pub fn set_gesture(&self, gesture: Option<GestureDescriptor>) {
        self.mutate(StateField::Gesture, |s| s.gesture = gesture);
    }

    pub fn set_animation(&self, animation: Option<String>) {
        self.mutate(StateField::Animation, |s| s.animation = animation);
    }

    pub fn set_visibility(&self, visible: bool) {
        self.mutate(StateField::Visibility, |s| s.is_visible = visible);
    }

    /// Full history, oldest first
    pub fn all_history(&self) -> Vec<StateSnapshot> {
        self.inner.read().history.iter().cloned().collect()
    }

    /// Snapshots recorded within `window` of now
    pub fn history(&self, window: Duration) -> Vec<StateSnapshot> {
        let cutoff = Utc::now() - window;
        self.inner
            .read()
            .history
            .iter()
            .filter(|entry| entry.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    pub fn changes_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<StateSnapshot> {
        self.inner
            .read()
            .history
            .iter()
            .filter(|entry| entry.timestamp >= start && entry.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Restore the latest snapshot at or before `timestamp`.
    /// The revert itself is not recorded in history.
    pub fn revert_to(&self, timestamp: DateTime<Utc>) -> bool {
        let state = {
            let mut inner = self.inner.write();
            let Some(entry) = inner
                .history
                .iter()
                .rev()
                .find(|entry| entry.timestamp <= timestamp)
                .cloned()
            else {
                return false;
            };
            inner.state = entry.state;
            inner.state.clone()
        };
        debug!(%timestamp, "Avatar state reverted");
        self.notify(StateField::Revert, state);
        true
    }

    /// Blend between the snapshots bounding `from` and `to`.
    ///
    /// Position, rotation, scale, emotion intensity and expression are
    /// interpolated; emotion, gesture, animation and visibility snap to the
    /// end snapshot. Returns `None` when history does not bound the range.
    pub fn interpolate(&self, from: DateTime<Utc>, to: DateTime<Utc>, progress: f32) -> Option<AvatarState> {
        let inner = self.inner.read();
        let start = inner.history.iter().rev().find(|e| e.timestamp <= from)?;
        let end = inner.history.iter().find(|e| e.timestamp >= to)?;
        let t = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };

        let a = &start.state;
        let b = &end.state;
        Some(AvatarState {
            position: a.position.lerp(&b.position, t),
            rotation: a.rotation.lerp(&b.rotation, t),
            scale: a.scale.lerp(&b.scale, t),
            emotion: b.emotion,
            emotion_intensity: a.emotion_intensity + (b.emotion_intensity - a.emotion_intensity) * t,
            expression: blend_expressions(&a.expression, &b.expression, t),
            gesture: b.gesture.clone(),
            is_visible: b.is_visible,
            animation: b.animation.clone(),
            last_update: b.last_update,
        })
    }

    pub fn snapshot(&self) -> HubSnapshot {
        let inner = self.inner.read();
        HubSnapshot {
            state: inner.state.clone(),
            timestamp: Utc::now(),
            history_size: inner.history.len(),
        }
    }

    pub fn load_snapshot(&self, snapshot: HubSnapshot) {
        let state = {
            let mut inner = self.inner.write();
            inner.state = snapshot.state;
            inner.state.clone()
        };
        self.notify(StateField::Snapshot, state);
    }

    /// Back to the default pose; history is kept
    pub fn reset(&self) {
        let state = {
            let mut inner = self.inner.write();
            let stamp = inner.next_stamp();
            inner.state = AvatarState {
                last_update: stamp,
                ..AvatarState::default()
            };
            inner.state.clone()
        };
        self.notify(StateField::Reset, state);
    }

    pub fn clear_history(&self) {
        self.inner.write().history.clear();
    }

    pub fn subscribe<F>(&self, field: StateField, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        match self.field_observers.get(&field) {
            Some(observers) => observers.subscribe(callback),
            None => self.all_observers.subscribe(move |change: &StateChange| {
                if change.field == field {
                    callback(change)
                }
            }),
        }
    }

    /// Called for every change regardless of field
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.all_observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.all_observers.unsubscribe(id)
            || self.field_observers.values().any(|observers| observers.unsubscribe(id))
    }

    pub fn subscriber_count(&self) -> usize {
        self.all_observers.len() + self.field_observers.values().map(|o| o.len()).sum::<usize>()
    }

    pub fn statistics(&self) -> HubStatistics {
        let inner = self.inner.read();
        HubStatistics {
            history_len: inner.history.len(),
            subscriber_count: self.subscriber_count(),
            last_update: inner.state.last_update,
        }
    }
}

impl Default for StateSyncHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
