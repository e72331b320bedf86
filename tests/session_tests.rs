//! Integration Tests
//!
//! End-to-end playback properties driven through the click dispatcher,
//! with stems served from a local fixture directory and a manual clock.

use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use stemloop::engine::buffer::INTERNAL_SAMPLE_RATE;
use stemloop::engine::clock::ManualClock;
use stemloop::session::fetch::FileFetcher;
use stemloop::{
    AudioSession, ClickDispatcher, ClickOutcome, Scene, SceneModel, StemloopError, TrackManifest,
    SCHEDULE_LEAD_SECS,
};

/// Write a short mono sine stem into the fixture directory
fn write_stem(dir: &TempDir, file_name: &str, frequency: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: INTERNAL_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.path().join(file_name), spec)?;

    let frames = INTERNAL_SAMPLE_RATE as usize / 5; // 200ms loop
    for i in 0..frames {
        let t = i as f32 / INTERNAL_SAMPLE_RATE as f32;
        let sample = 0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin();
        writer.write_sample((sample * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn manifest() -> TrackManifest {
    TrackManifest::new()
        .with_track("mic", "https://cdn.test/stems/mic.wav")
        .with_track("guitar", "https://cdn.test/stems/guitar.wav")
        .with_track("drums", "https://cdn.test/stems/drums.wav")
}

fn scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_model(SceneModel::new("micModel", [-2.0, 0.0, -3.0]));
    scene.add_model(SceneModel::new("guitarModel", [0.0, 1.0, -4.0]));
    scene.add_model(SceneModel::new("drumsModel", [2.0, 0.0, -3.0]));
    scene.bind("micModel", "mic");
    scene.bind("guitarModel", "guitar");
    scene.bind("drumsModel", "drums");
    scene
}

/// Fixture directory, session, and dispatcher wired together
fn dispatcher(clock: Arc<ManualClock>) -> Result<(TempDir, ClickDispatcher)> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let dir = TempDir::new()?;
    write_stem(&dir, "mic.wav", 220.0)?;
    write_stem(&dir, "guitar.wav", 330.0)?;
    write_stem(&dir, "drums.wav", 440.0)?;

    let fetcher = Arc::new(FileFetcher::new(dir.path()));
    let session = AudioSession::new(manifest(), fetcher, clock);
    let dispatcher = ClickDispatcher::new(session, scene())?;
    Ok((dir, dispatcher))
}

#[tokio::test]
async fn first_click_starts_with_clicked_track_audible() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;

    let outcome = dispatcher.handle_click("drumsModel").await?;
    assert_eq!(
        outcome,
        ClickOutcome::Started {
            audible: "drums".to_string()
        }
    );

    let session = dispatcher.session();
    assert!(session.is_started());
    assert_eq!(session.track_gain("drums")?, 1.0);
    assert_eq!(session.track_gain("mic")?, 0.0);
    assert_eq!(session.track_gain("guitar")?, 0.0);
    Ok(())
}

#[tokio::test]
async fn all_tracks_share_one_scheduled_start() -> Result<()> {
    let clock = Arc::new(ManualClock::new());
    clock.set(3.0);
    let (_dir, mut dispatcher) = dispatcher(Arc::clone(&clock))?;

    dispatcher.handle_click("micModel").await?;

    let session = dispatcher.session();
    let expected = 3.0 + SCHEDULE_LEAD_SECS;
    for name in ["mic", "guitar", "drums"] {
        assert_eq!(session.track_start_time(name), Some(expected));
    }
    Ok(())
}

#[tokio::test]
async fn later_clicks_toggle_without_exclusive_solo() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;

    // First interaction: drums become audible.
    dispatcher.handle_click("drumsModel").await?;

    // Second interaction: mic toggles on; drums stay audible.
    let outcome = dispatcher.handle_click("micModel").await?;
    assert_eq!(
        outcome,
        ClickOutcome::Toggled {
            track: "mic".to_string(),
            gain: 1.0
        }
    );

    let session = dispatcher.session();
    assert_eq!(session.track_gain("mic")?, 1.0);
    assert_eq!(session.track_gain("drums")?, 1.0);
    assert_eq!(session.track_gain("guitar")?, 0.0);
    Ok(())
}

#[tokio::test]
async fn toggle_pair_is_idempotent() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;
    dispatcher.handle_click("micModel").await?;

    let before = dispatcher.session().track_gain("guitar")?;
    dispatcher.handle_click("guitarModel").await?;
    dispatcher.handle_click("guitarModel").await?;
    assert_eq!(dispatcher.session().track_gain("guitar")?, before);
    Ok(())
}

#[tokio::test]
async fn toggle_before_any_load_is_a_lookup_error() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;

    let err = dispatcher
        .session_mut()
        .toggle_track("drums")
        .unwrap_err();
    assert!(matches!(err, StemloopError::TrackNotLoaded { .. }));
    Ok(())
}

#[tokio::test]
async fn click_on_unbound_model_is_rejected() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;

    let err = dispatcher.handle_click("ghostModel").await.unwrap_err();
    assert!(matches!(err, StemloopError::ModelNotBound { .. }));
    // A rejected click must not count as the first interaction.
    assert!(!dispatcher.session().is_started());
    Ok(())
}

#[tokio::test]
async fn started_flag_transitions_exactly_once() -> Result<()> {
    let (_dir, mut dispatcher) = dispatcher(Arc::new(ManualClock::new()))?;

    dispatcher.handle_click("drumsModel").await?;
    let start_times: Vec<_> = ["mic", "guitar", "drums"]
        .iter()
        .map(|n| dispatcher.session().track_start_time(n))
        .collect();

    // Many further clicks: all toggles, never a second start.
    for _ in 0..5 {
        let outcome = dispatcher.handle_click("micModel").await?;
        assert!(matches!(outcome, ClickOutcome::Toggled { .. }));
    }

    let after: Vec<_> = ["mic", "guitar", "drums"]
        .iter()
        .map(|n| dispatcher.session().track_start_time(n))
        .collect();
    assert_eq!(start_times, after);
    Ok(())
}

#[tokio::test]
async fn missing_stem_aborts_start_but_keeps_flag() -> Result<()> {
    let dir = TempDir::new()?;
    write_stem(&dir, "mic.wav", 220.0)?;
    write_stem(&dir, "guitar.wav", 330.0)?;
    // drums.wav deliberately absent

    let fetcher = Arc::new(FileFetcher::new(dir.path()));
    let session = AudioSession::new(manifest(), fetcher, Arc::new(ManualClock::new()));
    let mut dispatcher = ClickDispatcher::new(session, scene())?;

    let err = dispatcher.handle_click("micModel").await.unwrap_err();
    assert!(matches!(err, StemloopError::FetchFailed { .. }));

    // One transition, irreversibly: the session is started but silent.
    assert!(dispatcher.session().is_started());
    assert!(dispatcher.session().track_start_time("mic").is_none());
    Ok(())
}

#[tokio::test]
async fn invalid_bindings_are_rejected_at_setup() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = Arc::new(FileFetcher::new(dir.path()));
    let session = AudioSession::new(manifest(), fetcher, Arc::new(ManualClock::new()));

    let mut incomplete = Scene::new();
    incomplete.add_model(SceneModel::new("micModel", [0.0, 0.0, 0.0]));
    incomplete.bind("micModel", "mic");
    // guitar and drums never bound

    let err = ClickDispatcher::new(session, incomplete).unwrap_err();
    assert!(matches!(err, StemloopError::BindingInvalid { .. }));
    Ok(())
}

#[tokio::test]
async fn rendered_mix_goes_live_at_the_shared_start() -> Result<()> {
    let clock = Arc::new(ManualClock::new());
    let (_dir, mut dispatcher) = dispatcher(Arc::clone(&clock))?;

    dispatcher.handle_click("guitarModel").await?;
    let start = dispatcher.session().track_start_time("guitar").unwrap();

    // Before the scheduled start: silence.
    let lead_frames = (SCHEDULE_LEAD_SECS * INTERNAL_SAMPLE_RATE as f64) as usize;
    let before = dispatcher
        .session()
        .render_block(0.0, lead_frames, INTERNAL_SAMPLE_RATE);
    assert!(before.iter().all(|&s| s == 0.0));

    // After it: the audible stem reaches the mix.
    let after = dispatcher
        .session()
        .render_block(start, 2048, INTERNAL_SAMPLE_RATE);
    assert!(after.iter().any(|&s| s != 0.0));
    Ok(())
}
