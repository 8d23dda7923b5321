use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::MAX_PENDING_PRESENCE_DIFFS;

#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceMeta {
    pub phx_ref: Option<String>,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceEntries {
    pub metas: Vec<RawPresenceMeta>,
}

pub type RawPresenceState = HashMap<String, RawPresenceEntries>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceMeta {
    pub presence_ref: String,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

pub type PresenceState = HashMap<String, Vec<PresenceMeta>>;

#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceDiff {
    #[serde(default)]
    pub joins: RawPresenceState,
    #[serde(default)]
    pub leaves: RawPresenceState,
}

/// Change notifications produced while syncing presence.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// A state or diff was fully applied
    Sync,
    Join {
        key: String,
        current: Vec<PresenceMeta>,
        new: Vec<PresenceMeta>,
    },
    Leave {
        key: String,
        current: Vec<PresenceMeta>,
        left: Vec<PresenceMeta>,
    },
}

impl PresenceEvent {
    /// Payload delivered to `presence` listeners
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Sync => json!({ "event": "sync" }),
            Self::Join { key, current, new } => json!({
                "event": "join",
                "key": key,
                "currentPresences": current,
                "newPresences": new,
            }),
            Self::Leave { key, current, left } => json!({
                "event": "leave",
                "key": key,
                "currentPresences": current,
                "leftPresences": left,
            }),
        }
    }
}

/// Client-side presence replica for one channel.
///
/// Diffs received before the first full state of the current join are held
/// back and applied right after that state arrives.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    state: PresenceState,
    pending_diffs: Vec<RawPresenceDiff>,
    join_ref: Option<String>,
}

impl Presence {
    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn list(&self) -> Vec<(&String, &Vec<PresenceMeta>)> {
        let mut entries: Vec<_> = self.state.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// True until a full state has been synced for `channel_join_ref`
    pub fn in_pending_sync_state(&self, channel_join_ref: Option<&str>) -> bool {
        self.join_ref.is_none() || self.join_ref.as_deref() != channel_join_ref
    }

    /// Queues a diff until the state arrives; the oldest is dropped once the
    /// queue is full
    pub fn add_pending_diff(&mut self, diff: RawPresenceDiff) {
        if self.pending_diffs.len() >= MAX_PENDING_PRESENCE_DIFFS {
            tracing::warn!("Presence diff queue full, dropping oldest diff");
            self.pending_diffs.remove(0);
        }
        self.pending_diffs.push(diff);
    }

    pub fn clear(&mut self) {
        self.state.clear();
        self.pending_diffs.clear();
        self.join_ref = None;
    }

    /// Replaces the replica with a full server state.
    pub fn sync_state(&mut self, new_state: RawPresenceState, join_ref: String) -> Vec<PresenceEvent> {
        let new_state: PresenceState = Self::transform_state(new_state);

        let mut joins = PresenceState::new();
        let mut leaves = PresenceState::new();

        for (key, current) in &self.state {
            if !new_state.contains_key(key) {
                leaves.insert(key.clone(), current.clone());
            }
        }

        for (key, new_metas) in &new_state {
            match self.state.get(key) {
                Some(current) => {
                    let new_refs = Self::refs(new_metas);
                    let current_refs = Self::refs(current);

                    let joined: Vec<PresenceMeta> = new_metas
                        .iter()
                        .filter(|meta| !current_refs.contains(&meta.presence_ref))
                        .cloned()
                        .collect();
                    let left: Vec<PresenceMeta> = current
                        .iter()
                        .filter(|meta| !new_refs.contains(&meta.presence_ref))
                        .cloned()
                        .collect();

                    if !joined.is_empty() {
                        joins.insert(key.clone(), joined);
                    }
                    if !left.is_empty() {
                        leaves.insert(key.clone(), left);
                    }
                }
                None => {
                    joins.insert(key.clone(), new_metas.clone());
                }
            }
        }

        let mut events = self.apply_diff(joins, leaves);
        self.join_ref = Some(join_ref);

        for diff in std::mem::take(&mut self.pending_diffs) {
            events.extend(self.apply_diff(
                Self::transform_state(diff.joins),
                Self::transform_state(diff.leaves),
            ));
        }

        events.push(PresenceEvent::Sync);
        events
    }

    /// Applies an incremental join/leave diff.
    pub fn sync_diff(&mut self, diff: RawPresenceDiff) -> Vec<PresenceEvent> {
        let mut events = self.apply_diff(
            Self::transform_state(diff.joins),
            Self::transform_state(diff.leaves),
        );
        events.push(PresenceEvent::Sync);
        events
    }

    fn apply_diff(&mut self, joins: PresenceState, leaves: PresenceState) -> Vec<PresenceEvent> {
        let mut events = Vec::new();

        for (key, new_metas) in Self::sorted(joins) {
            let current = self.state.get(&key).cloned().unwrap_or_default();
            let joined_refs = Self::refs(&new_metas);
            let mut merged: Vec<PresenceMeta> = current
                .iter()
                .filter(|meta| !joined_refs.contains(&meta.presence_ref))
                .cloned()
                .collect();
            merged.extend(new_metas.iter().cloned());
            self.state.insert(key.clone(), merged);

            events.push(PresenceEvent::Join {
                key,
                current,
                new: new_metas,
            });
        }

        for (key, left_metas) in Self::sorted(leaves) {
            let Some(current) = self.state.get_mut(&key) else {
                continue;
            };
            let left_refs = Self::refs(&left_metas);
            current.retain(|meta| !left_refs.contains(&meta.presence_ref));
            let remaining = current.clone();
            if remaining.is_empty() {
                self.state.remove(&key);
            }

            events.push(PresenceEvent::Leave {
                key,
                current: remaining,
                left: left_metas,
            });
        }

        events
    }

    fn refs(metas: &[PresenceMeta]) -> HashSet<String> {
        metas.iter().map(|meta| meta.presence_ref.clone()).collect()
    }

    fn sorted(state: PresenceState) -> Vec<(String, Vec<PresenceMeta>)> {
        let mut entries: Vec<_> = state.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn transform_state(raw_state: RawPresenceState) -> PresenceState {
        raw_state
            .into_iter()
            .map(|(key, raw_entries)| {
                let entries: Vec<PresenceMeta> = raw_entries
                    .metas
                    .into_iter()
                    .map(|raw_meta| PresenceMeta {
                        presence_ref: raw_meta.phx_ref.unwrap_or_default(),
                        data: raw_meta.data,
                    })
                    .collect();
                (key, entries)
            })
            .collect()
    }
}
