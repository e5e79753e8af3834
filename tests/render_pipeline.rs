use std::path::{Path, PathBuf};

use reelsmith::{
    checkpoint::{checkpoint_path, CheckpointStore, RenderStage},
    model::{AssetManifest, Caption, RenderJob, RenderOptions},
    orchestrate::RenderOrchestrator,
    ReelError,
};

fn write_fake_renderer(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn job(out_dir: &Path) -> RenderJob {
    RenderJob {
        images: vec![PathBuf::from("s1.png"), PathBuf::from("s2.png")],
        audio_file: Some(PathBuf::from("voice.wav")),
        narration_file: None,
        bgm_file: None,
        captions: vec![Caption {
            start: 0.5,
            end: 1.7,
            text: "Hello World".to_string(),
        }],
        output_dir: out_dir.to_path_buf(),
        duration: 10.0,
        timeline: None,
        assets: AssetManifest::new(),
    }
}

// Touches whatever output path it was handed last and reports progress the
// way the real renderer does.
const HAPPY_RENDERER: &str = r#"
for last; do :; done
printf 'frame=  30 fps= 30 time=00:00:01.00 bitrate=N/A speed=1.00x\n' >&2
: > "$last"
exit 0
"#;

#[tokio::test]
async fn happy_path_produces_outputs_and_clears_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let renderer = write_fake_renderer(dir.path(), HAPPY_RENDERER);

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    let mut progress_events = 0;
    let result = orchestrator
        .render(
            "job-ok",
            &job(&out_dir),
            &RenderOptions {
                export_srt: true,
                ..RenderOptions::default()
            },
            |_| progress_events += 1,
        )
        .await
        .unwrap();

    assert!(result.output_path.exists());
    assert!(result.thumbnail_path.exists());
    assert_eq!(
        result.caption_path.as_deref(),
        Some(out_dir.join("captions.srt").as_path())
    );
    assert!(result.caption_path.unwrap().exists());
    assert!(progress_events >= 1);
    assert!(!checkpoint_path("job-ok", &out_dir).exists());
}

#[tokio::test]
async fn renderer_failure_surfaces_exit_error_and_keeps_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let renderer = write_fake_renderer(dir.path(), "echo 'Invalid argument' >&2\nexit 1");

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    let err = orchestrator
        .render("job-fail", &job(&out_dir), &RenderOptions::default(), |_| {})
        .await
        .unwrap_err();

    match err {
        ReelError::Exit { code, detail } => {
            assert_eq!(code, Some(1));
            assert!(detail.contains("Invalid argument"));
        }
        other => panic!("expected Exit error, got {other}"),
    }
    // The job can be resumed later.
    assert!(checkpoint_path("job-fail", &out_dir).exists());
}

#[tokio::test]
async fn resume_skips_the_already_rendered_stage() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();

    // A previous run got through the render stage and left its video.
    std::fs::write(out_dir.join("video.mp4"), b"previous").unwrap();
    let mut store = CheckpointStore::new("job-resume", &out_dir);
    store.update_stage(RenderStage::Rendered, 85).unwrap();

    // Every invocation appends a line, so the count tells how many processes ran.
    let log = dir.path().join("calls.log");
    let renderer = write_fake_renderer(
        dir.path(),
        &format!(
            "echo run >> '{}'\nfor last; do :; done\n: > \"$last\"\nexit 0",
            log.display()
        ),
    );

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    let result = orchestrator
        .render("job-resume", &job(&out_dir), &RenderOptions::default(), |_| {})
        .await
        .unwrap();

    // Only the thumbnail process ran; the prior video is untouched.
    let calls = std::fs::read_to_string(&log).unwrap();
    assert_eq!(calls.lines().count(), 1);
    assert_eq!(std::fs::read(&result.output_path).unwrap(), b"previous");
}

#[tokio::test]
async fn rendered_artifact_is_recorded_with_a_content_hash() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    // Succeeds for the render, fails for the thumbnail, so the checkpoint
    // survives for inspection.
    let marker = dir.path().join("ran-once");
    let renderer = write_fake_renderer(
        dir.path(),
        &format!(
            "if [ -f '{m}' ]; then exit 1; fi\ntouch '{m}'\nfor last; do :; done\nprintf video > \"$last\"\nexit 0",
            m = marker.display()
        ),
    );

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    orchestrator
        .render("job-hash", &job(&out_dir), &RenderOptions::default(), |_| {})
        .await
        .unwrap_err();

    let mut store = CheckpointStore::new("job-hash", &out_dir);
    assert!(store.load().unwrap());
    let artifact = &store.state().artifacts["video"];
    assert_eq!(artifact.size, 5);
    let hash = artifact.hash.as_deref().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn wall_clock_timeout_reports_timed_out() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let renderer = write_fake_renderer(dir.path(), "sleep 30");

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    let err = orchestrator
        .render(
            "job-slow",
            &job(&out_dir),
            &RenderOptions {
                timeout_ms: 300,
                ..RenderOptions::default()
            },
            |_| {},
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::TimedOut { timeout_ms: 300 }));
}

#[tokio::test]
async fn preview_mode_names_the_output_preview() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let renderer = write_fake_renderer(dir.path(), HAPPY_RENDERER);

    let orchestrator = RenderOrchestrator::with_binary(renderer.to_string_lossy());
    let result = orchestrator
        .render(
            "job-preview",
            &job(&out_dir),
            &RenderOptions {
                preview_seconds: Some(3.0),
                ..RenderOptions::default()
            },
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(result.output_path.file_name().unwrap(), "preview.mp4");
    assert_eq!(result.metadata.duration, 3.0);
}
