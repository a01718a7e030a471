use std::collections::VecDeque;

use anyhow::{bail, Result};

use crate::config::{PanelGeometry, SCROLL_SPEED_PX, STEP_DISPLAY_MS};
use crate::frame::{Frame, FrameId, FrameSlot};
use crate::message::ChatMessage;

/// How scrolling overrun is carried into the next message's gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebtPolicy {
    /// The full overrun chains across consecutive fast messages. Keeps the
    /// emitted timeline in lockstep with the source timestamps.
    #[default]
    Compound,
    /// Only the current burst's own overrun carries; inherited debt beyond
    /// the current gap is forgiven. Trades exact sync for steadier pacing
    /// under sustained message floods.
    ClampZero,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub scrolling: bool,
    pub debt_policy: DebtPolicy,
    /// Pixels per scroll step.
    pub scroll_speed: i64,
    /// Base display time of one scroll-step frame.
    pub step_ms: u64,
}

impl SchedulerConfig {
    pub fn new(scrolling: bool) -> Self {
        Self {
            scrolling,
            debt_policy: DebtPolicy::default(),
            scroll_speed: SCROLL_SPEED_PX,
            step_ms: STEP_DISPLAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub frame: FrameId,
    pub duration_ms: u64,
}

/// The scheduler's output: every composition that must exist as a bitmap,
/// plus the ordered display timeline referencing them.
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub frames: Vec<Frame>,
    pub timeline: Vec<TimelineEntry>,
}

impl FramePlan {
    pub fn total_duration_ms(&self) -> u64 {
        self.timeline.iter().map(|entry| entry.duration_ms).sum()
    }
}

/// Scroll simulation state: the FIFO queue of on-screen slots and the
/// accumulated scrolling-time debt. All offset mutation happens in
/// [`ScrollState::step`], keeping the transitions auditable.
#[derive(Debug, Clone)]
struct ScrollState {
    queue: VecDeque<FrameSlot>,
    debt_ms: i64,
}

impl ScrollState {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            debt_ms: 0,
        }
    }

    fn enter(&mut self, message: usize, panel: &PanelGeometry) {
        self.queue.push_back(FrameSlot {
            message,
            offset_y: panel.height as i64,
        });
    }

    /// One scroll step: shift every queued slot up by the scroll speed and
    /// return the resulting composition.
    fn step(&mut self, speed: i64) -> Vec<FrameSlot> {
        for slot in &mut self.queue {
            slot.offset_y -= speed;
        }
        self.snapshot()
    }

    fn snapshot(&self) -> Vec<FrameSlot> {
        self.queue.iter().copied().collect()
    }

    fn newest(&self) -> Option<FrameSlot> {
        self.queue.back().copied()
    }

    /// Drop slots that have scrolled entirely above the panel's top edge.
    fn evict(&mut self, messages: &[ChatMessage]) {
        self.queue
            .retain(|slot| slot.offset_y + messages[slot.message].footprint as i64 > 0);
    }
}

/// Scroll-step display time: the first two and last two steps of a burst
/// get double the base duration to ease perceived motion at the
/// boundaries.
fn step_duration_ms(step: u32, total_steps: u32, base_ms: u64) -> u64 {
    if step <= 1 || step + 2 >= total_steps {
        base_ms * 2
    } else {
        base_ms
    }
}

/// The frame scheduling and layout engine. Strictly sequential: each
/// message's burst depends on the queue state the previous one left
/// behind.
pub fn plan_frames(
    messages: &[ChatMessage],
    panel: &PanelGeometry,
    config: &SchedulerConfig,
) -> Result<FramePlan> {
    if messages.is_empty() {
        bail!("cannot plan frames for an empty message list");
    }

    let mut frames = Vec::new();
    let mut timeline = Vec::new();

    // The blank panel holds until the first message arrives, so the
    // timeline's total duration lines up with the source recording.
    frames.push(Frame {
        id: FrameId::BLANK,
        slots: Vec::new(),
    });
    timeline.push(TimelineEntry {
        frame: FrameId::BLANK,
        duration_ms: messages[0].time_ms,
    });

    let floor = panel.scroll_floor();
    let mut state = ScrollState::new();

    for (index, message) in messages.iter().enumerate() {
        let message_no = (index + 1) as u32;
        state.enter(index, panel);

        // Scroll until the newest message's bottom edge clears the floor.
        let mut steps = 0_u32;
        loop {
            let newest = match state.newest() {
                Some(slot) => slot,
                None => break,
            };
            if newest.offset_y + message.footprint as i64 <= floor {
                break;
            }
            let slots = state.step(config.scroll_speed);
            if config.scrolling {
                frames.push(Frame {
                    id: FrameId {
                        message_no,
                        scroll_step: steps,
                    },
                    slots,
                });
            }
            steps += 1;
        }

        let mut last_frame = FrameId {
            message_no,
            scroll_step: steps.saturating_sub(1),
        };
        if !config.scrolling || steps == 0 {
            // Only the settled composition exists for this message.
            last_frame = FrameId {
                message_no,
                scroll_step: 0,
            };
            frames.push(Frame {
                id: last_frame,
                slots: state.snapshot(),
            });
        }

        let mut burst_ms = 0_u64;
        if config.scrolling {
            for step in 0..steps {
                let duration_ms = step_duration_ms(step, steps, config.step_ms);
                timeline.push(TimelineEntry {
                    frame: FrameId {
                        message_no,
                        scroll_step: step,
                    },
                    duration_ms,
                });
                burst_ms += duration_ms;
            }
        }

        // Hold the settled composition until the next message is due, or
        // carry the overrun forward when scrolling already ate the gap.
        let gap_ms = message.time_to_next_ms as i64;
        let remaining_ms = gap_ms - state.debt_ms - burst_ms as i64;
        if remaining_ms > 0 {
            timeline.push(TimelineEntry {
                frame: last_frame,
                duration_ms: remaining_ms as u64,
            });
            state.debt_ms = 0;
        } else {
            state.debt_ms = match config.debt_policy {
                DebtPolicy::Compound => -remaining_ms,
                DebtPolicy::ClampZero => (burst_ms as i64 - gap_ms).max(0),
            };
        }

        state.evict(messages);
    }

    Ok(FramePlan { frames, timeline })
}

#[cfg(test)]
mod tests {
    use super::{plan_frames, step_duration_ms, DebtPolicy, SchedulerConfig, ScrollState};
    use crate::config::PanelGeometry;
    use crate::message::{compute_time_gaps, ChatMessage, Rgb};

    fn panel() -> PanelGeometry {
        PanelGeometry {
            width: 250,
            height: 720,
            border: 5,
            bottom_margin: 4,
            text_margin: 10,
            name_line: 20,
            font_px: 17.0,
        }
    }

    fn message(time_ms: u64, footprint: u32) -> ChatMessage {
        ChatMessage {
            time_ms,
            nick: "viewer".to_owned(),
            color: Rgb { r: 20, g: 0, b: 0 },
            raw_body: "hi".to_owned(),
            body: "hi".to_owned(),
            nick_width: 48,
            nick_height: 20,
            body_width: 16,
            body_height: footprint.saturating_sub(20),
            footprint,
            time_to_next_ms: 0,
        }
    }

    fn messages(times: &[u64], footprint: u32) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> =
            times.iter().map(|&t| message(t, footprint)).collect();
        compute_time_gaps(&mut messages);
        messages
    }

    /// One 40px message scrolling in from 720 to rest above the 716 floor:
    /// ceil((720 + 40 - 716) / 5) = 9 steps.
    #[test]
    fn scroll_step_count_matches_boundary_arithmetic() {
        let messages = messages(&[0], 40);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(true))
            .expect("plan should build");

        let burst_frames = plan
            .frames
            .iter()
            .filter(|frame| frame.id.message_no == 1)
            .count();
        assert_eq!(burst_frames, 9);
    }

    #[test]
    fn burst_boundaries_get_double_duration() {
        assert_eq!(step_duration_ms(0, 9, 32), 64);
        assert_eq!(step_duration_ms(1, 9, 32), 64);
        assert_eq!(step_duration_ms(2, 9, 32), 32);
        assert_eq!(step_duration_ms(6, 9, 32), 32);
        assert_eq!(step_duration_ms(7, 9, 32), 64);
        assert_eq!(step_duration_ms(8, 9, 32), 64);
        // Short bursts are all boundary.
        assert_eq!(step_duration_ms(2, 4, 32), 64);
    }

    #[test]
    fn leading_blank_frame_holds_until_first_message() {
        let messages = messages(&[500, 1500], 40);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(true))
            .expect("plan should build");

        assert!(plan.frames[0].slots.is_empty());
        assert_eq!(plan.timeline[0].frame.message_no, 0);
        assert_eq!(plan.timeline[0].duration_ms, 500);
    }

    #[test]
    fn noscroll_timeline_duration_equals_last_arrival() {
        let messages = messages(&[0, 1000, 2500], 40);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(false))
            .expect("plan should build");

        assert_eq!(plan.total_duration_ms(), 2500);
        // One settled composition per message plus the blank lead-in.
        assert_eq!(plan.frames.len(), 4);
    }

    #[test]
    fn scrolling_timeline_duration_equals_last_arrival_plus_final_burst() {
        let messages = messages(&[0, 1000, 2500], 40);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(true))
            .expect("plan should build");

        // 9 steps per burst: 4 boundary steps at 64ms + 5 at 32ms = 416ms.
        let final_burst_ms = 416;
        assert_eq!(plan.total_duration_ms(), 2500 + final_burst_ms);
    }

    #[test]
    fn compound_debt_chains_across_fast_messages() {
        let messages = messages(&[0, 100, 200, 10_000], 40);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(true))
            .expect("plan should build");

        // Bursts cost 416ms each against 100ms gaps; the third message's
        // hold absorbs the full accumulated debt: 9800 - (632 + 416).
        let hold = plan
            .timeline
            .iter()
            .find(|entry| entry.frame.message_no == 3 && entry.duration_ms > 64)
            .expect("third message should hold");
        assert_eq!(hold.duration_ms, 8752);

        // Total stays in lockstep: last arrival plus the final burst.
        assert_eq!(plan.total_duration_ms(), 10_000 + 416);
    }

    #[test]
    fn clamped_debt_forgives_inherited_overrun() {
        let mut config = SchedulerConfig::new(true);
        config.debt_policy = DebtPolicy::ClampZero;
        let messages = messages(&[0, 100, 200, 10_000], 40);
        let plan =
            plan_frames(&messages, &panel(), &config).expect("plan should build");

        // Debt entering the third message is only its predecessor's own
        // overrun (316ms), not the compounded chain: 9800 - (316 + 416).
        let hold = plan
            .timeline
            .iter()
            .find(|entry| entry.frame.message_no == 3 && entry.duration_ms > 64)
            .expect("third message should hold");
        assert_eq!(hold.duration_ms, 9068);
    }

    #[test]
    fn queue_stays_bounded_under_sustained_traffic() {
        let times: Vec<u64> = (0..50).map(|n| n * 10).collect();
        let messages = messages(&times, 100);
        let plan = plan_frames(&messages, &panel(), &SchedulerConfig::new(true))
            .expect("plan should build");

        // A 720px panel fits at most 8 slots of 100px; one more may be
        // mid-eviction during a burst.
        let widest = plan
            .frames
            .iter()
            .map(|frame| frame.slots.len())
            .max()
            .unwrap_or(0);
        assert!(widest <= 9, "queue grew to {widest} slots");
    }

    #[test]
    fn eviction_drops_fully_exited_slots() {
        let mut state = ScrollState::new();
        let messages = messages(&[0, 10], 40);
        state.enter(0, &panel());
        state.enter(1, &panel());

        // Scroll the first slot fully above the top edge.
        state.queue[0].offset_y = -40;
        state.queue[1].offset_y = 300;
        state.evict(&messages);

        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.snapshot()[0].message, 1);
    }

    #[test]
    fn boundary_slot_is_kept_until_fully_exited() {
        let mut state = ScrollState::new();
        let messages = messages(&[0], 40);
        state.enter(0, &panel());

        state.queue[0].offset_y = -39;
        state.evict(&messages);
        assert_eq!(state.queue.len(), 1);

        state.queue[0].offset_y = -40;
        state.evict(&messages);
        assert_eq!(state.queue.len(), 0);
    }

    #[test]
    fn empty_message_list_is_rejected() {
        assert!(plan_frames(&[], &panel(), &SchedulerConfig::new(true)).is_err());
    }
}
