//! Action timeline: drives a state's playhead and fires lifecycle, frame,
//! sound and play actions for every keyframe crossed since the last tick.

use std::sync::Arc;

use crate::data::{offsets, ActionKind, TimelineData};
use crate::events::{EventKind, EventObject};

use super::{PlayState, PlayheadView, TimelineContext, TimelineState};

impl TimelineState {
    /// Advances the action timeline. Crossed keyframes are visited in play
    /// direction, wrapping at the clip end; `LoopComplete` is emitted right
    /// after keyframe 0 is visited, `Complete` after everything else.
    pub(crate) fn update_action(
        &mut self,
        passed_time: f64,
        view: &PlayheadView,
        cx: &mut TimelineContext<'_>,
    ) {
        let prev_state = self.play_state;
        let mut prev_play_times = self.current_play_times;
        let prev_time = self.current_time;

        if !self.set_current_time(passed_time, view) {
            return;
        }

        let events = view.events_enabled;
        if prev_state == PlayState::NotStarted {
            if self.play_state == prev_state {
                return;
            }
            if view.reset_z_order {
                cx.rig.sort_z_order(None);
            }
            prev_play_times = self.current_play_times;
            if events && cx.rig.events.has_listener(EventKind::Start) {
                cx.rig
                    .events
                    .queue(EventObject::lifecycle(EventKind::Start, view.state, cx.state_name));
            }
        }

        let mut loop_complete = None;
        let mut complete = None;
        if events && self.current_play_times != prev_play_times {
            if cx.rig.events.has_listener(EventKind::LoopComplete) {
                loop_complete = Some(EventObject::lifecycle(
                    EventKind::LoopComplete,
                    view.state,
                    cx.state_name,
                ));
            }
            if self.play_state == PlayState::Completed && cx.rig.events.has_listener(EventKind::Complete) {
                complete = Some(EventObject::lifecycle(EventKind::Complete, view.state, cx.state_name));
            }
        }

        if let Some(td) = self.data {
            if self.frame_count > 1 {
                let bucket = (self.current_time * self.frame_rate).floor() as i64;
                let frame_index = cx.clip.key_frame_at(&td, bucket) as i32;
                if self.frame_index != frame_index {
                    let crossed = self.frame_index;
                    self.frame_index = frame_index;
                    self.frame_offset = cx.clip.frame_position_of(&td, frame_index as usize);
                    if view.reverse {
                        self.walk_reverse(&td, crossed, prev_time, prev_play_times, view, cx, &mut loop_complete);
                    } else {
                        self.walk_forward(&td, crossed, prev_time, prev_play_times, view, cx, &mut loop_complete);
                    }
                }
            } else if self.frame_index < 0 {
                self.frame_index = 0;
                self.frame_offset = cx.clip.frame_position_of(&td, 0);
                let position = self.key_position(cx, 0);
                if self.current_play_times == prev_play_times {
                    if prev_time <= position {
                        self.cross_frame(0, view, cx);
                    }
                } else if self.position <= position {
                    if !view.reverse {
                        if let Some(event) = loop_complete.take() {
                            cx.rig.events.queue(event);
                        }
                    }
                    self.cross_frame(0, view, cx);
                }
            }
        } else if self.frame_index < 0 {
            self.frame_index = 0;
        }

        if let Some(event) = loop_complete {
            cx.rig.events.queue(event);
        }
        if let Some(event) = complete {
            cx.rig.events.queue(event);
        }
    }

    /// Scrubs the action timeline; the next update re-walks from scratch.
    pub(crate) fn seek_action(&mut self, time: f64, view: &PlayheadView) {
        self.set_current_time(time, view);
        self.frame_index = -1;
    }

    fn key_position(&self, cx: &TimelineContext<'_>, index: usize) -> f64 {
        let Some(td) = self.data else {
            return 0.0;
        };
        let offset = cx.clip.frame_position_of(&td, index);
        cx.clip.frame(offset + offsets::FRAME_POSITION) as f64 * self.frame_rate_r
    }

    #[inline]
    fn in_window(&self, position: f64) -> bool {
        self.position <= position && position <= self.position + self.duration
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_forward(
        &mut self,
        td: &TimelineData,
        mut crossed: i32,
        prev_time: f64,
        prev_play_times: i32,
        view: &PlayheadView,
        cx: &mut TimelineContext<'_>,
        loop_complete: &mut Option<EventObject>,
    ) {
        let last = self.frame_count as i32 - 1;
        if crossed < 0 {
            let bucket = (prev_time * self.frame_rate).floor() as i64;
            crossed = cx.clip.key_frame_at(td, bucket) as i32;
            let position = self.key_position(cx, crossed as usize);
            if self.current_play_times == prev_play_times {
                if prev_time <= position {
                    crossed = if crossed > 0 { crossed - 1 } else { last };
                } else if crossed == self.frame_index {
                    crossed = -1;
                }
            }
        }

        while crossed >= 0 {
            crossed = if crossed < last { crossed + 1 } else { 0 };
            let position = self.key_position(cx, crossed as usize);
            if self.in_window(position) {
                self.cross_frame(crossed as usize, view, cx);
            }
            if crossed == 0 {
                if let Some(event) = loop_complete.take() {
                    cx.rig.events.queue(event);
                }
            }
            if crossed == self.frame_index {
                break;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_reverse(
        &mut self,
        td: &TimelineData,
        mut crossed: i32,
        prev_time: f64,
        prev_play_times: i32,
        view: &PlayheadView,
        cx: &mut TimelineContext<'_>,
        loop_complete: &mut Option<EventObject>,
    ) {
        let last = self.frame_count as i32 - 1;
        if crossed < 0 {
            let bucket = (prev_time * self.frame_rate).floor() as i64;
            crossed = cx.clip.key_frame_at(td, bucket) as i32;
            if self.current_play_times == prev_play_times && crossed == self.frame_index {
                crossed = -1;
            }
        }

        while crossed >= 0 {
            let position = self.key_position(cx, crossed as usize);
            if self.in_window(position) {
                self.cross_frame(crossed as usize, view, cx);
            }
            if crossed == 0 {
                if let Some(event) = loop_complete.take() {
                    cx.rig.events.queue(event);
                }
            }
            crossed = if crossed > 0 { crossed - 1 } else { last };
            if crossed == self.frame_index {
                break;
            }
        }
    }

    /// Fires the actions attached to keyframe `index`.
    fn cross_frame(&mut self, index: usize, view: &PlayheadView, cx: &mut TimelineContext<'_>) {
        if !view.action_enabled {
            return;
        }
        let Some(td) = self.data else {
            return;
        };
        let offset = cx.clip.frame_position_of(&td, index);
        let time = cx.clip.frame(offset + offsets::FRAME_POSITION) as f64 * self.frame_rate_r;
        let count = cx.clip.frame(offset + 1).max(0) as usize;
        for i in 0..count {
            let action_index = cx.clip.frame(offset + 2 + i).max(0) as usize;
            let Some(action) = cx.clip.actions.get(action_index) else {
                log::warn!(
                    "clip '{}' references missing action {action_index}",
                    cx.clip.name
                );
                continue;
            };
            let kind = match action.kind {
                ActionKind::Play => None,
                ActionKind::Frame => Some(EventKind::FrameEvent),
                ActionKind::Sound => Some(EventKind::SoundEvent),
            };
            let event = EventObject {
                kind: kind.unwrap_or(EventKind::FrameEvent),
                time,
                state: Some(view.state),
                animation: Arc::clone(cx.state_name),
                action: Some(Arc::clone(action)),
            };
            match kind {
                None => cx.rig.actions.push(event),
                Some(EventKind::SoundEvent) => cx.rig.events.queue(event),
                Some(kind) => {
                    if cx.rig.events.has_listener(kind) {
                        cx.rig.events.queue(event);
                    }
                }
            }
        }
    }
}
