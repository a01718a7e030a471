use vodchat::config::PanelGeometry;
use vodchat::frame::FrameCache;
use vodchat::manifest::write_manifest;
use vodchat::message::{compute_time_gaps, ChatMessage, Rgb};
use vodchat::render::pending_frames;
use vodchat::schedule::{plan_frames, FramePlan, SchedulerConfig};

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

fn chat_message(time_ms: u64, footprint: u32) -> ChatMessage {
    ChatMessage {
        time_ms,
        nick: "viewer".to_owned(),
        color: Rgb { r: 20, g: 0, b: 0 },
        raw_body: "hello there".to_owned(),
        body: "hello there".to_owned(),
        nick_width: 48,
        nick_height: 20,
        body_width: 88,
        body_height: footprint.saturating_sub(20),
        footprint,
        time_to_next_ms: 0,
    }
}

fn sample_plan() -> FramePlan {
    let mut messages: Vec<ChatMessage> = [0_u64, 400, 800, 5_000, 9_000]
        .iter()
        .map(|&time_ms| chat_message(time_ms, 60))
        .collect();
    compute_time_gaps(&mut messages);
    plan_frames(&messages, &panel(), &SchedulerConfig::new(true)).expect("plan should build")
}

#[test]
fn replanning_an_unchanged_transcript_is_deterministic() {
    let first = sample_plan();
    let second = sample_plan();

    assert_eq!(first.frames, second.frames);
    assert_eq!(first.timeline, second.timeline);
}

#[test]
fn populated_cache_schedules_zero_new_bitmaps() {
    let plan = sample_plan();
    let root = tempfile::tempdir().expect("tempdir should create");
    let cache = FrameCache::open(root.path(), true).expect("cache dir should create");

    // A prior run left every bitmap behind.
    for frame in &plan.frames {
        std::fs::write(cache.path_for(frame.id), b"png").expect("bitmap should write");
    }

    assert!(pending_frames(&plan.frames, &cache).is_empty());
}

#[test]
fn rerun_reproduces_an_identical_manifest() {
    let root = tempfile::tempdir().expect("tempdir should create");
    let first_path = root.path().join("first.concat");
    let second_path = root.path().join("second.concat");

    write_manifest(&first_path, &sample_plan(), "frames").expect("first manifest should write");
    write_manifest(&second_path, &sample_plan(), "frames").expect("second manifest should write");

    let first = std::fs::read(&first_path).expect("first manifest should read");
    let second = std::fs::read(&second_path).expect("second manifest should read");
    assert_eq!(first, second);
}

#[test]
fn partial_cache_only_schedules_the_missing_frames() {
    let plan = sample_plan();
    let root = tempfile::tempdir().expect("tempdir should create");
    let cache = FrameCache::open(root.path(), true).expect("cache dir should create");

    for frame in plan.frames.iter().step_by(2) {
        std::fs::write(cache.path_for(frame.id), b"png").expect("bitmap should write");
    }

    let pending = pending_frames(&plan.frames, &cache);
    assert_eq!(pending.len(), plan.frames.len() / 2);
    assert!(pending.iter().all(|frame| !cache.contains(frame.id)));
}
