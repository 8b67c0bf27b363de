use super::*;

use crate::foundation::core::{Azimuth, Matrix};
use crate::render::backend::Scene;

#[derive(Default)]
struct FileBackend {
    fail_at: Option<u16>,
}

impl FrameBackend for FileBackend {
    fn prepare(&self, points: &Matrix, labels: Arc<[f64]>, title: &str) -> SweepResult<Scene> {
        Scene::new(points, labels, title, 72.0)
    }

    fn render_frame(
        &self,
        _scene: &Scene,
        azimuth: Azimuth,
        out_path: &std::path::Path,
    ) -> Result<(), RenderError> {
        if self.fail_at == Some(azimuth.degrees()) {
            return Err(RenderError::new(azimuth, "injected failure"));
        }
        std::fs::write(out_path, b"png").map_err(|e| RenderError::new(azimuth, e.to_string()))
    }
}

fn first_three(samples: &Matrix, key: &EmbeddingKey) -> SweepResult<Matrix> {
    samples.leading_columns(key.target_dims as usize)
}

fn tmp_root(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "sweepviz_driver_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn dataset(name: &str) -> Dataset {
    let data = (0..30 * 6).map(|i| ((i * 7) % 13) as f64).collect();
    let samples = Matrix::from_row_major(30, 6, data).unwrap();
    let labels = (0..30).map(|i| if i % 10 == 0 { 1.0 } else { 0.0 }).collect();
    Dataset::new(name, samples, labels).unwrap()
}

#[cfg(unix)]
fn fake_encoder(root: &std::path::Path) -> String {
    use std::os::unix::fs::PermissionsExt as _;

    std::fs::create_dir_all(root).unwrap();
    let path = root.join("encoder.sh");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor last; do :; done\nprintf 'video' > \"$last\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn driver(root: &std::path::Path, encoder: String, backend: FileBackend) -> PipelineDriver {
    let cfg = PipelineConfig {
        data_root: root.to_path_buf(),
        encoder,
        threads: Some(4),
        ..PipelineConfig::default()
    };
    PipelineDriver::new(cfg, Arc::new(first_three), Arc::new(backend)).unwrap()
}

#[test]
fn transitions_only_move_forward() {
    use JobState::*;
    assert!(Pending.can_transition_to(EmbeddingReady));
    assert!(EmbeddingReady.can_transition_to(FramesReady));
    assert!(FramesReady.can_transition_to(Encoded));
    for live in [Pending, EmbeddingReady, FramesReady] {
        assert!(live.can_transition_to(Failed));
        assert!(!live.is_terminal());
    }
    assert!(!Pending.can_transition_to(FramesReady));
    assert!(!FramesReady.can_transition_to(EmbeddingReady));
    assert!(!Encoded.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Pending));
    assert!(Encoded.is_terminal() && Failed.is_terminal());
}

#[test]
fn render_failure_names_count_and_first_azimuth() {
    let errors = vec![
        RenderError::new(Azimuth::new(3).unwrap(), "a"),
        RenderError::new(Azimuth::new(9).unwrap(), "b"),
    ];
    let msg = JobFailure::Frames(errors).to_string();
    assert!(msg.contains("2 frame(s)"));
    assert!(msg.contains("azimuth 3"));
}

#[cfg(unix)]
#[test]
fn job_runs_to_encoded_and_reuses_the_cache() {
    let root = tmp_root("ok");
    let d = driver(&root, fake_encoder(&root), FileBackend::default());
    let ds = dataset("blobs");

    let first = d.run_job(&ds, "euclidean");
    assert!(first.is_success(), "{:?}", first.failure);
    assert_eq!(
        first.history,
        [
            JobState::Pending,
            JobState::EmbeddingReady,
            JobState::FramesReady,
            JobState::Encoded
        ]
    );
    assert_eq!(first.cache, Some(CacheOutcome::Miss));
    assert_eq!(first.frames_rendered, 360);
    let video = first.video.unwrap();
    assert_eq!(video.path, root.join("blobs").join("euclidean-30fps.mp4"));
    assert!(video.path.is_file());
    assert!(root.join("blobs/frames/euclidean-000.png").is_file());
    assert!(root.join("blobs/frames/euclidean-359.png").is_file());
    assert!(root.join("blobs/umap/32-3d-euclidean.json").is_file());

    let second = d.run_job(&ds, "euclidean");
    assert!(second.is_success());
    assert_eq!(second.cache, Some(CacheOutcome::Hit));
    let _ = std::fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn frame_failure_stops_before_encoding() {
    let root = tmp_root("frames");
    let d = driver(
        &root,
        fake_encoder(&root),
        FileBackend { fail_at: Some(90) },
    );
    let outcome = d.run_job(&dataset("blobs"), "cosine");
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(
        outcome.history,
        [JobState::Pending, JobState::EmbeddingReady, JobState::Failed]
    );
    assert_eq!(outcome.frames_rendered, 359);
    match &outcome.failure {
        Some(JobFailure::Frames(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].azimuth.degrees(), 90);
        }
        other => panic!("expected frame failure, got {other:?}"),
    }
    assert!(outcome.video.is_none());
    assert!(!root.join("blobs").join("cosine-30fps.mp4").exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn corrupt_cache_fails_the_job_without_recomputing() {
    let root = tmp_root("corrupt");
    let d = driver(&root, "ffmpeg".to_string(), FileBackend::default());
    let ds = dataset("blobs");
    let key = d.embedding_key("blobs", "euclidean").unwrap();
    let path = d.cache().path_for(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{\"format\": 1, \"key\"").unwrap();

    let outcome = d.run_job(&ds, "euclidean");
    assert_eq!(outcome.history, [JobState::Pending, JobState::Failed]);
    match &outcome.failure {
        Some(JobFailure::Embedding(e)) => assert!(e.is_cache_corruption(), "{e}"),
        other => panic!("expected embedding failure, got {other:?}"),
    }
    assert!(outcome.cache.is_none());
    // Left in place for the operator to inspect or purge.
    assert!(path.is_file());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unusable_metric_name_fails_before_anything_is_persisted() {
    let root = tmp_root("badname");
    let d = driver(&root, "ffmpeg".to_string(), FileBackend::default());
    let outcome = d.run_job(&dataset("blobs"), "euc%lidean");
    assert_eq!(outcome.history, [JobState::Pending, JobState::Failed]);
    assert!(outcome.cache.is_none());
    assert!(matches!(outcome.failure, Some(JobFailure::Embedding(_))));
    assert!(!root.join("blobs").join("umap").exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn failed_encode_is_reported_per_job() {
    let root = tmp_root("encode");
    let d = driver(
        &root,
        "sweepviz-no-such-encoder".to_string(),
        FileBackend::default(),
    );
    let outcome = d.run_job(&dataset("blobs"), "euclidean");
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.history.len(), 4);
    assert_eq!(outcome.frames_rendered, 360);
    assert!(matches!(outcome.failure, Some(JobFailure::Encode(_))));
    let _ = std::fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn one_failing_job_does_not_stop_the_batch() {
    let root = tmp_root("batch");
    let d = driver(&root, fake_encoder(&root), FileBackend::default());
    let datasets = [dataset("alpha"), dataset("beta")];

    let outcomes = d.run_batch(&datasets, &["euclidean", "bad/metric"]);
    assert_eq!(outcomes.len(), 4);
    let summary: Vec<(&str, &str, bool)> = outcomes
        .iter()
        .map(|o| (o.dataset.as_str(), o.metric.as_str(), o.is_success()))
        .collect();
    assert_eq!(
        summary,
        [
            ("alpha", "euclidean", true),
            ("alpha", "bad/metric", false),
            ("beta", "euclidean", true),
            ("beta", "bad/metric", false),
        ]
    );
    assert!(outcomes.iter().all(|o| o.state.is_terminal()));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let cfg = PipelineConfig {
        fps: 0,
        ..PipelineConfig::default()
    };
    let res = PipelineDriver::new(cfg, Arc::new(first_three), Arc::new(FileBackend::default()));
    assert!(matches!(res, Err(SweepError::Validation(_))));
}
