use super::*;

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::foundation::core::Matrix;
use crate::render::backend::Scene;

/// Writes a placeholder file per frame and records every azimuth it was asked for.
#[derive(Default)]
struct RecordingBackend {
    seen: Mutex<Vec<u16>>,
    fail_at: Option<u16>,
    fail_prepare: bool,
}

impl FrameBackend for RecordingBackend {
    fn prepare(&self, points: &Matrix, labels: Arc<[f64]>, title: &str) -> SweepResult<Scene> {
        if self.fail_prepare {
            return Err(SweepError::validation("no fonts"));
        }
        Scene::new(points, labels, title, 72.0)
    }

    fn render_frame(
        &self,
        _scene: &Scene,
        azimuth: Azimuth,
        out_path: &Path,
    ) -> Result<(), RenderError> {
        self.seen.lock().unwrap().push(azimuth.degrees());
        if self.fail_at == Some(azimuth.degrees()) {
            return Err(RenderError::new(azimuth, "injected failure"));
        }
        std::fs::write(out_path, azimuth.degrees().to_le_bytes())
            .map_err(|e| RenderError::new(azimuth, e.to_string()))
    }
}

fn tmp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sweepviz_sweep_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn embedding() -> Embedding {
    let coords = Matrix::from_rows(&[vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]]).unwrap();
    Embedding::new(coords, vec![0.0, 1.0].into()).unwrap()
}

#[test]
fn pattern_names_are_zero_padded() {
    let p = FramePattern::png("euclidean").unwrap();
    assert_eq!(p.file_name(Azimuth::new(0).unwrap()), "euclidean-000.png");
    assert_eq!(p.file_name(Azimuth::new(7).unwrap()), "euclidean-007.png");
    assert_eq!(p.file_name(Azimuth::new(359).unwrap()), "euclidean-359.png");
    assert_eq!(p.encoder_pattern(), "euclidean-%03d.png");

    let mut names: Vec<String> = Azimuth::sweep().map(|a| p.file_name(a)).collect();
    let numeric = names.clone();
    names.sort();
    assert_eq!(names, numeric, "lexicographic order matches azimuth order");
}

#[test]
fn pattern_rejects_printf_and_path_characters() {
    assert!(FramePattern::png("a%d").is_err());
    assert!(FramePattern::png("a/b").is_err());
    assert!(FramePattern::new("a", "tar.gz").is_err());
    assert!(FramePattern::png("").is_err());
}

#[test]
fn sweep_renders_each_azimuth_exactly_once() {
    let dir = tmp_dir("full");
    let backend = Arc::new(RecordingBackend::default());
    let coord = SweepCoordinator::new(backend.clone(), Some(4)).unwrap();
    let pattern = FramePattern::png("euclidean").unwrap();

    let seq = coord
        .render_sweep(&embedding(), "t", &dir, &pattern)
        .unwrap();
    assert_eq!(seq.len(), 360);
    assert_eq!(seq.folder(), dir.as_path());
    for (i, frame) in seq.frames().iter().enumerate() {
        assert_eq!(usize::from(frame.azimuth.degrees()), i);
        assert!(frame.path.is_file());
    }

    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen.len(), 360);
    let unique: BTreeSet<u16> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 360);

    let rescanned = FrameSequence::scan(&dir, &pattern).unwrap();
    assert_eq!(rescanned, seq);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn one_failure_does_not_cancel_siblings() {
    let dir = tmp_dir("fail");
    let backend = Arc::new(RecordingBackend {
        fail_at: Some(217),
        ..RecordingBackend::default()
    });
    let coord = SweepCoordinator::new(backend.clone(), Some(3)).unwrap();
    let pattern = FramePattern::png("cosine").unwrap();

    let errors = coord
        .render_sweep(&embedding(), "t", &dir, &pattern)
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].azimuth.degrees(), 217);
    assert_eq!(backend.seen.lock().unwrap().len(), 360);

    let written = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(written, 359);

    match FrameSequence::scan(&dir, &pattern) {
        Err(SweepError::IncompleteSequence {
            expected,
            found,
            first_missing,
            ..
        }) => {
            assert_eq!((expected, found, first_missing), (360, 359, 217));
        }
        other => panic!("expected incomplete sequence, got {other:?}"),
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn prepare_failure_fails_every_azimuth() {
    let dir = tmp_dir("prep");
    let backend = Arc::new(RecordingBackend {
        fail_prepare: true,
        ..RecordingBackend::default()
    });
    let coord = SweepCoordinator::new(backend.clone(), Some(2)).unwrap();
    let errors = coord
        .render_sweep(
            &embedding(),
            "t",
            &dir,
            &FramePattern::png("euclidean").unwrap(),
        )
        .unwrap_err();
    assert_eq!(errors.len(), 360);
    assert!(errors.windows(2).all(|w| w[0].azimuth < w[1].azimuth));
    assert!(backend.seen.lock().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn zero_threads_is_rejected() {
    let backend: Arc<dyn FrameBackend> = Arc::new(RecordingBackend::default());
    assert!(SweepCoordinator::new(backend, Some(0)).is_err());
}
