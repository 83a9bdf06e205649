#![allow(dead_code)]
//! Events queued while stepping.
//!
//! Delivery is up to the host: the runtime only queues. Lifecycle and frame
//! events are queued when a listener for their kind is registered; sound
//! events are always queued.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::ActionData;
use crate::ids::StateId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    LoopComplete,
    Complete,
    FadeIn,
    FadeInComplete,
    FadeOut,
    FadeOutComplete,
    FrameEvent,
    SoundEvent,
}

impl EventKind {
    #[inline]
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// One queued event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventObject {
    pub kind: EventKind,
    /// Seconds into the clip; for frame events the keyframe position.
    pub time: f64,
    pub state: Option<StateId>,
    pub animation: Arc<str>,
    pub action: Option<Arc<ActionData>>,
}

impl EventObject {
    pub fn lifecycle(kind: EventKind, state: StateId, animation: &Arc<str>) -> Self {
        Self {
            kind,
            time: 0.0,
            state: Some(state),
            animation: Arc::clone(animation),
            action: None,
        }
    }

    /// Name of the attached action, if any.
    pub fn name(&self) -> Option<&str> {
        self.action.as_deref().map(|a| a.name.as_str())
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    listeners: u16,
    queued: Vec<EventObject>,
    max_events: Option<usize>,
}

impl EventQueue {
    pub fn with_limit(max_events: usize) -> Self {
        Self {
            listeners: 0,
            queued: Vec::new(),
            max_events: Some(max_events),
        }
    }

    pub fn add_listener(&mut self, kind: EventKind) {
        self.listeners |= kind.bit();
    }

    pub fn remove_listener(&mut self, kind: EventKind) {
        self.listeners &= !kind.bit();
    }

    #[inline]
    pub fn has_listener(&self, kind: EventKind) -> bool {
        self.listeners & kind.bit() != 0
    }

    pub fn queue(&mut self, event: EventObject) {
        if let Some(max) = self.max_events {
            if self.queued.len() >= max {
                log::warn!("event queue full ({max}); dropping {:?}", event.kind);
                return;
            }
        }
        self.queued.push(event);
    }

    pub fn queued(&self) -> &[EventObject] {
        &self.queued
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, EventObject> {
        self.queued.drain(..)
    }

    pub fn clear(&mut self) {
        self.queued.clear();
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
