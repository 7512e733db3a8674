// End-to-end runs of the tracking programs against recorded sessions.

use body_com_tracker::config::{AppConfig, ColorResolution, Program};
use body_com_tracker::data::read_displacements;
use body_com_tracker::input::ScriptedKeys;
use body_com_tracker::replay::{ReplayBackend, ReplayRecording};
use body_com_tracker::session::Session;
use body_com_tracker::skeleton::{Body, BodyFrame, ConfidenceLevel, Joint, JointId, Skeleton};
use body_com_tracker::tracking::FramePipeline;
use std::fs;
use std::path::PathBuf;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("com_tracker_replay_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A person standing 2 m in front of the camera, joints spread around the image center.
fn standing(id: u32, dx: f32) -> Body {
    let skeleton = Skeleton::from_fn(|joint| {
        let i = joint.index() as f32;
        Joint::new(dx + (i - 16.0) * 15.0, (i - 16.0) * 20.0, 2000.0, ConfidenceLevel::High)
    });
    Body { id, skeleton }
}

fn recording(frames: Vec<Vec<Body>>) -> ReplayRecording {
    ReplayRecording::from_frames(
        frames
            .into_iter()
            .enumerate()
            .map(|(i, bodies)| BodyFrame {
                timestamp_usec: i as u64 * 33_333,
                bodies,
            })
            .collect(),
    )
}

fn config_for(program: Program, dir: &PathBuf, recording_path: PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    program.apply(&mut config);
    config.device.color_resolution = ColorResolution::R720p;
    config.calibration.cx = 640.0;
    config.calibration.cy = 360.0;
    config.log.path = dir.join("com_data.csv");
    config.overlay.output_dir = dir.join("overlay");
    config.overlay.save_every = 1;
    config.replay.path = Some(recording_path);
    config
}

fn replay_backend(config: &AppConfig) -> ReplayBackend {
    ReplayBackend::from_path(config.replay.path.as_deref(), config.calibration.clone()).unwrap()
}

#[test]
fn test_recording_survives_save_and_load() {
    let dir = temp_dir();
    let path = dir.join("session.jsonl");
    let saved = recording(vec![
        vec![standing(1, 0.0)],
        vec![],
        vec![standing(1, 5.0), standing(2, -300.0)],
    ]);
    saved.save(&path).unwrap();

    let loaded = ReplayRecording::load(&path).unwrap();
    assert_eq!(loaded.frames(), saved.frames());
    assert_eq!(loaded.frames()[2].num_bodies(), 2);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_load_rejects_malformed_line() {
    let dir = temp_dir();
    let path = dir.join("broken.jsonl");
    fs::write(&path, "{\"timestamp_usec\": 0, \"bodies\": []}\nnot json\n").unwrap();

    assert!(ReplayRecording::load(&path).is_err());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_pipe_com_logs_after_reference() {
    let dir = temp_dir();
    let recording_path = dir.join("session.jsonl");
    recording(vec![
        vec![standing(1, 0.0)],
        vec![standing(1, 0.0)],
        vec![standing(1, 0.0)],
        vec![standing(1, 25.0)],
    ])
    .save(&recording_path)
    .unwrap();

    let config = config_for(Program::PipeCom, &dir, recording_path);
    let mut backend = replay_backend(&config);
    let mut session = Session::open(&mut backend, &config).unwrap();
    let mut pipeline = FramePipeline::from_config(&config, Program::PipeCom).unwrap();
    let mut keys = ScriptedKeys::reference_then_quit(1, 10);

    let summary = session.run(&mut pipeline, &mut keys).unwrap();
    session.release();

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.log_rows, 2);
    assert!(!dir.join("overlay").exists());

    let rows = read_displacements(&config.log.path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].x, rows[0].y, rows[0].z), (0.0, 0.0, 0.0));
    assert!((rows[1].x - 25.0).abs() < 1e-2, "x = {}", rows[1].x);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_stream_com_saves_snapshots() {
    let dir = temp_dir();
    let recording_path = dir.join("session.jsonl");
    let hidden_knee = standing(2, 400.0).skeleton.with_joint(
        JointId::KneeLeft,
        Joint::new(0.0, 0.0, 0.0, ConfidenceLevel::None),
    );
    recording(vec![
        vec![standing(1, 0.0), Body { id: 2, skeleton: hidden_knee }],
        vec![standing(1, 10.0)],
    ])
    .save(&recording_path)
    .unwrap();

    let config = config_for(Program::StreamCom, &dir, recording_path);
    let mut backend = replay_backend(&config);
    let mut session = Session::open(&mut backend, &config).unwrap();
    let mut pipeline = FramePipeline::from_config(&config, Program::StreamCom).unwrap();

    let summary = session.run(&mut pipeline, &mut ScriptedKeys::default()).unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.skeletons, 3);
    assert_eq!(summary.log_rows, 0);
    assert!(!config.log.path.exists());
    assert!(summary.last_displacement.is_some());
    let first = dir.join("overlay").join("overlay_000000.png");
    assert_eq!(image::image_dimensions(&first).unwrap(), (1280, 720));
    assert!(dir.join("overlay").join("overlay_000001.png").exists());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_missing_recording_is_no_device() {
    let config = AppConfig::default();
    let mut backend = ReplayBackend::from_path(None, config.calibration.clone()).unwrap();
    assert!(Session::open(&mut backend, &config).is_err());
}
