use aoc_core::{ActivityCategory, ActivityEvent};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const DEFAULT_ACTIVITY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDraft {
    pub category: ActivityCategory,
    pub message: String,
    pub icon_ref: Option<String>,
    pub color_ref: Option<String>,
}

impl ActivityDraft {
    pub fn new(category: ActivityCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            icon_ref: None,
            color_ref: None,
        }
    }

    pub fn with_icon(mut self, icon_ref: impl Into<String>) -> Self {
        self.icon_ref = Some(icon_ref.into());
        self
    }

    pub fn with_color(mut self, color_ref: impl Into<String>) -> Self {
        self.color_ref = Some(color_ref.into());
        self
    }
}

/// Most recent first. Ids come from a counter that survives eviction, so an
/// id is never handed out twice.
#[derive(Debug, Clone)]
pub struct ActivityEventLog {
    capacity: usize,
    entries: VecDeque<ActivityEvent>,
    next_id: u64,
}

impl Default for ActivityEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityEventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
            next_id: 1,
        }
    }

    pub fn append(&mut self, draft: ActivityDraft, now: DateTime<Utc>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let event = ActivityEvent {
            id,
            category: draft.category,
            icon_ref: draft
                .icon_ref
                .unwrap_or_else(|| draft.category.icon_ref().to_string()),
            color_ref: draft
                .color_ref
                .unwrap_or_else(|| draft.category.color_ref().to_string()),
            message: draft.message,
            timestamp: now,
        };
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEvent> + '_ {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ActivityEvent> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&ActivityEvent> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<ActivityEvent> {
        self.entries.iter().cloned().collect()
    }
}
