use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::data::dataset::validate_name;
use crate::embed::embedding::Embedding;
use crate::foundation::core::{Azimuth, SWEEP_FRAMES};
use crate::foundation::error::{RenderError, SweepError, SweepResult};
use crate::render::backend::FrameBackend;

/// Zero-padding width of the azimuth in frame file names (covers `000`..`359`).
pub const AZIMUTH_WIDTH: usize = 3;

/// Frame naming scheme `<prefix>-<azimuth:03>.<ext>`.
///
/// Zero padding makes lexicographic and numeric order coincide, so the encoder consumes frames in
/// ascending azimuth regardless of the order they were written in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FramePattern {
    prefix: String,
    ext: String,
}

impl FramePattern {
    pub fn new(prefix: impl Into<String>, ext: impl Into<String>) -> SweepResult<Self> {
        let prefix = prefix.into();
        let ext = ext.into();
        validate_name(&prefix)?;
        validate_name(&ext)?;
        if prefix.contains('%') || ext.contains('%') || ext.contains('.') {
            return Err(SweepError::validation(format!(
                "invalid frame pattern '{prefix}' / '{ext}'"
            )));
        }
        Ok(Self { prefix, ext })
    }

    /// PNG frames named after `prefix` (the metric name in the standard layout).
    pub fn png(prefix: impl Into<String>) -> SweepResult<Self> {
        Self::new(prefix, "png")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.ext
    }

    pub fn file_name(&self, azimuth: Azimuth) -> String {
        format!(
            "{}-{:0width$}.{}",
            self.prefix,
            azimuth.degrees(),
            self.ext,
            width = AZIMUTH_WIDTH
        )
    }

    /// printf-style input pattern for the encoder, e.g. `euclidean-%03d.png`.
    pub fn encoder_pattern(&self) -> String {
        format!("{}-%0{AZIMUTH_WIDTH}d.{}", self.prefix, self.ext)
    }
}

/// One rendered still.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub azimuth: Azimuth,
    pub path: PathBuf,
}

/// A complete rotation: exactly one frame per integer azimuth, in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    folder: PathBuf,
    pattern: FramePattern,
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Rebuild a sequence from files already on disk.
    ///
    /// Fails with [`SweepError::IncompleteSequence`] unless every azimuth has a file.
    pub fn scan(folder: impl Into<PathBuf>, pattern: &FramePattern) -> SweepResult<Self> {
        let folder = folder.into();
        let mut frames = Vec::with_capacity(usize::from(SWEEP_FRAMES));
        let mut first_missing = None;
        for azimuth in Azimuth::sweep() {
            let path = folder.join(pattern.file_name(azimuth));
            if path.is_file() {
                frames.push(Frame { azimuth, path });
            } else if first_missing.is_none() {
                first_missing = Some(azimuth.degrees());
            }
        }
        if let Some(first_missing) = first_missing {
            return Err(SweepError::IncompleteSequence {
                folder,
                expected: usize::from(SWEEP_FRAMES),
                found: frames.len(),
                first_missing,
            });
        }
        Ok(Self {
            folder,
            pattern: pattern.clone(),
            frames,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn pattern(&self) -> &FramePattern {
        &self.pattern
    }

    /// Frames in ascending azimuth order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Fans out one render task per azimuth onto a worker pool and joins them all.
pub struct SweepCoordinator {
    backend: Arc<dyn FrameBackend>,
    pool: rayon::ThreadPool,
}

impl SweepCoordinator {
    /// `threads` bounds the worker pool; `None` uses one worker per core.
    pub fn new(backend: Arc<dyn FrameBackend>, threads: Option<usize>) -> SweepResult<Self> {
        Ok(Self {
            backend,
            pool: build_thread_pool(threads)?,
        })
    }

    pub fn backend(&self) -> &Arc<dyn FrameBackend> {
        &self.backend
    }

    /// Render the full 360-degree sweep of `embedding` into `output_folder`.
    ///
    /// Returns only after every task has finished. Failures do not stop sibling frames; they are
    /// all collected and returned together, sorted by azimuth.
    #[tracing::instrument(skip(self, embedding), fields(points = embedding.len()))]
    pub fn render_sweep(
        &self,
        embedding: &Embedding,
        title: &str,
        output_folder: &Path,
        pattern: &FramePattern,
    ) -> Result<FrameSequence, Vec<RenderError>> {
        let started = Instant::now();
        let scene = match self
            .backend
            .prepare(embedding.coords(), embedding.labels_arc(), title)
        {
            Ok(scene) => scene,
            Err(e) => {
                let msg = format!("scene preparation failed: {e}");
                return Err(Azimuth::sweep()
                    .map(|az| RenderError::new(az, msg.clone()))
                    .collect());
            }
        };

        let backend = self.backend.as_ref();
        let results: Vec<Result<Frame, RenderError>> = self.pool.install(|| {
            Azimuth::sweep()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|azimuth| {
                    let path = output_folder.join(pattern.file_name(azimuth));
                    backend
                        .render_frame(&scene, azimuth, &path)
                        .map(|()| Frame { azimuth, path })
                })
                .collect()
        });

        let mut frames = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for r in results {
            match r {
                Ok(frame) => frames.push(frame),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            errors.sort_by_key(|e| e.azimuth);
            tracing::warn!(
                failed = errors.len(),
                rendered = frames.len(),
                "sweep finished with render failures"
            );
            return Err(errors);
        }

        frames.sort_by_key(|f| f.azimuth);
        tracing::info!(
            frames = frames.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep complete"
        );
        Ok(FrameSequence {
            folder: output_folder.to_path_buf(),
            pattern: pattern.clone(),
            frames,
        })
    }
}

fn build_thread_pool(threads: Option<usize>) -> SweepResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SweepError::validation(
            "sweep threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("sweep-render-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SweepError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/sweep.rs"]
mod tests;
