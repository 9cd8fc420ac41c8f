//! Integration tests for the application and render threads.

use std::thread;
use std::time::Duration;

use courier::{
    AppHandle, DrawCall, EndFrame, FrameRecord, FrameSink, PipelineConfig, RecordingSink,
    SurfaceId,
};
use courier_core::ThreadState;
use crossbeam_channel::{bounded, Receiver};

fn unpaced_config() -> PipelineConfig {
    PipelineConfig {
        target_fps: 0,
        swap_interval: 2,
        ..PipelineConfig::default()
    }
}

fn wait_for_submits(records: &Receiver<FrameRecord>, count: usize) -> Vec<FrameRecord> {
    let mut seen = Vec::new();
    let mut submits = 0;
    while submits < count {
        let record = records
            .recv_timeout(Duration::from_secs(5))
            .expect("renderer stopped producing frames");
        if matches!(record, FrameRecord::Submit(_)) {
            submits += 1;
        }
        seen.push(record);
    }
    seen
}

#[test]
fn test_full_lifecycle() {
    let (sink, records) = RecordingSink::channel();
    let mut app = AppHandle::create(&unpaced_config(), sink).unwrap();
    assert_eq!(app.state(), ThreadState::Resumed);

    app.resume();
    assert_eq!(app.set_surface(Some(SurfaceId::new(1))), None);
    let mut seen = wait_for_submits(&records, 3);

    // Unchanged surface: nothing happens.
    assert_eq!(app.set_surface(Some(SurfaceId::new(1))), None);
    assert_eq!(app.set_surface(Some(SurfaceId::new(2))), Some(SurfaceId::new(1)));
    assert_eq!(app.set_surface(None), Some(SurfaceId::new(2)));
    assert_eq!(app.surface(), None);
    app.pause();

    let report = app.destroy().unwrap();
    seen.extend(records.try_iter());

    assert_eq!(seen.first(), Some(&FrameRecord::Attached));
    assert_eq!(seen.last(), Some(&FrameRecord::Detached));
    assert!(seen.contains(&FrameRecord::Flush));

    // Every frame is begun, then submitted with the same index, in order.
    let mut expected = 1;
    let mut open = None;
    for record in &seen {
        match record {
            FrameRecord::Begin(index) => {
                assert_eq!(*index, expected);
                assert_eq!(open, None);
                open = Some(*index);
            }
            FrameRecord::Submit(frame) => {
                assert_eq!(open, Some(frame.frame_index));
                assert_eq!(frame.swap_interval, 2);
                open = None;
                expected += 1;
            }
            _ => {}
        }
    }

    // Created, Resumed, SurfaceCreated(1), SurfaceDestroyed, SurfaceCreated(2),
    // SurfaceDestroyed, Paused, Destroyed.
    assert_eq!(report.events_handled, 8);
    assert!(report.frames_presented >= 3);
    assert_eq!(report.frames_presented, expected - 1);
    let render = report.render.unwrap();
    assert_eq!(render.frames_begun, report.frames_presented);
    assert_eq!(render.frames_submitted, report.frames_presented);
    assert_eq!(report.render_error, None);
}

#[test]
fn test_no_frames_without_resume() {
    let (sink, records) = RecordingSink::channel();
    let mut app = AppHandle::create(&unpaced_config(), sink).unwrap();
    app.set_surface(Some(SurfaceId::new(9)));

    thread::sleep(Duration::from_millis(30));
    assert_eq!(app.frames_presented(), 0);

    app.set_surface(None);
    let report = app.destroy().unwrap();
    assert_eq!(report.frames_presented, 0);
    assert_eq!(report.render.unwrap().frames_submitted, 0);

    let seen: Vec<_> = records.try_iter().collect();
    assert_eq!(seen, vec![FrameRecord::Attached, FrameRecord::Detached]);
}

#[test]
fn test_pause_stops_frames() {
    let (sink, records) = RecordingSink::channel();
    let mut app = AppHandle::create(&unpaced_config(), sink).unwrap();
    app.set_surface(Some(SurfaceId::new(4)));
    app.resume();
    wait_for_submits(&records, 2);

    app.pause();
    let paused_at = app.frames_presented();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(app.frames_presented(), paused_at);

    app.set_surface(None);
    let report = app.destroy().unwrap();
    assert_eq!(report.frames_presented, paused_at);
}

#[test]
fn test_paced_presentation() {
    let config = PipelineConfig::from_toml_str("target_fps = 200").unwrap();
    let (sink, records) = RecordingSink::channel();
    let mut app = AppHandle::create(&config, sink).unwrap();
    app.resume();
    app.set_surface(Some(SurfaceId::new(1)));
    wait_for_submits(&records, 4);
    app.set_surface(None);
    app.pause();

    let report = app.destroy().unwrap();
    assert!(report.frames_presented >= 4);
}

/// Loses the device on the first submitted frame.
struct LostDevice;

impl FrameSink for LostDevice {
    fn begin_frame(&mut self, _frame_index: u64) {}

    fn draw(&mut self, _call: &DrawCall) {}

    fn submit_frame(&mut self, _frame: &EndFrame) {
        panic!("device lost");
    }
}

#[test]
fn test_render_thread_panic_is_reported() {
    let (done, finished) = bounded(1);
    thread::spawn(move || {
        let mut app = AppHandle::create(&unpaced_config(), LostDevice).unwrap();
        app.resume();
        app.set_surface(Some(SurfaceId::new(1)));
        thread::sleep(Duration::from_millis(100));
        app.set_surface(None);
        app.pause();
        let _ = done.send(app.destroy());
    });

    let report = finished
        .recv_timeout(Duration::from_secs(5))
        .expect("pipeline hung after the render thread died")
        .unwrap();
    let error = report.render_error.expect("render thread death not reported");
    assert!(error.contains("device lost"), "unexpected error: {error}");
    assert_eq!(report.render, None);
    assert_eq!(report.events_handled, 6);
}
