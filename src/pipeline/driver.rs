use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::dataset::Dataset;
use crate::data::layout::DataLayout;
use crate::embed::cache::{CacheOutcome, EmbeddingCache};
use crate::embed::key::EmbeddingKey;
use crate::embed::reduce::{RandomProjection, Reducer};
use crate::encode::ffmpeg::{EncoderOpts, VideoArtifact, VideoEncoder};
use crate::foundation::config::PipelineConfig;
use crate::foundation::core::SWEEP_FRAMES;
use crate::foundation::error::{RenderError, SweepError, SweepResult};
use crate::render::backend::FrameBackend;
use crate::render::cpu::{CpuFrameRenderer, CpuRenderOpts};
use crate::render::sweep::{FramePattern, SweepCoordinator};

/// Lifecycle of one (dataset, metric) job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Pending,
    EmbeddingReady,
    FramesReady,
    Encoded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Encoded | JobState::Failed)
    }

    /// Forward-only: each stage advances to the next, any live stage may fail.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, EmbeddingReady)
                | (EmbeddingReady, FramesReady)
                | (FramesReady, Encoded)
                | (Pending | EmbeddingReady | FramesReady, Failed)
        )
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(thiserror::Error, Debug)]
pub enum JobFailure {
    /// Embedding could not be produced (includes cache corruption, which is never retried).
    #[error("embedding stage failed: {0}")]
    Embedding(SweepError),
    /// One or more frames failed; nothing was encoded.
    #[error("{}", describe_render_failures(.0))]
    Frames(Vec<RenderError>),
    /// The encoder failed.
    #[error("encode stage failed: {0}")]
    Encode(SweepError),
}

fn describe_render_failures(errors: &[RenderError]) -> String {
    match errors.first() {
        Some(first) => format!(
            "frame stage failed: {} frame(s) did not render (first: {first})",
            errors.len()
        ),
        None => "frame stage failed".to_string(),
    }
}

/// Per-job report.
#[derive(Debug)]
pub struct JobOutcome {
    pub dataset: String,
    pub metric: String,
    /// Final state, always terminal.
    pub state: JobState,
    /// Every state visited, starting with `Pending`.
    pub history: Vec<JobState>,
    pub cache: Option<CacheOutcome>,
    pub frames_rendered: usize,
    pub video: Option<VideoArtifact>,
    pub failure: Option<JobFailure>,
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Encoded
    }
}

struct JobTracker {
    dataset: String,
    metric: String,
    history: Vec<JobState>,
    started: Instant,
}

impl JobTracker {
    fn new(dataset: &str, metric: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            metric: metric.to_string(),
            history: vec![JobState::Pending],
            started: Instant::now(),
        }
    }

    fn state(&self) -> JobState {
        *self.history.last().unwrap_or(&JobState::Pending)
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state().can_transition_to(next),
            "invalid job transition {:?} -> {next:?}",
            self.state()
        );
        tracing::debug!(from = ?self.state(), to = ?next, "job transition");
        self.history.push(next);
    }

    fn finish(
        mut self,
        cache: Option<CacheOutcome>,
        frames_rendered: usize,
        video: Option<VideoArtifact>,
        failure: Option<JobFailure>,
    ) -> JobOutcome {
        if let Some(f) = &failure {
            self.advance(JobState::Failed);
            tracing::warn!(dataset = %self.dataset, metric = %self.metric, error = %f, "job failed");
        }
        JobOutcome {
            state: self.state(),
            history: self.history,
            dataset: self.dataset,
            metric: self.metric,
            cache,
            frames_rendered,
            video,
            failure,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Runs cache -> sweep -> encode for each (dataset, metric) pair.
pub struct PipelineDriver {
    cfg: PipelineConfig,
    layout: DataLayout,
    cache: EmbeddingCache,
    reducer: Arc<dyn Reducer>,
    sweep: SweepCoordinator,
    encoder: VideoEncoder,
}

impl PipelineDriver {
    pub fn new(
        cfg: PipelineConfig,
        reducer: Arc<dyn Reducer>,
        backend: Arc<dyn FrameBackend>,
    ) -> SweepResult<Self> {
        cfg.validate()?;
        let layout = DataLayout::new(&cfg.data_root);
        Ok(Self {
            cache: EmbeddingCache::new(layout.clone()),
            sweep: SweepCoordinator::new(backend, cfg.threads)?,
            encoder: VideoEncoder::new(EncoderOpts::from(&cfg)),
            layout,
            reducer,
            cfg,
        })
    }

    /// Built-in reducer and the CPU renderer.
    pub fn with_defaults(cfg: PipelineConfig) -> SweepResult<Self> {
        let reducer = Arc::new(RandomProjection::new(cfg.seed));
        let backend = Arc::new(CpuFrameRenderer::new(CpuRenderOpts::from(&cfg))?);
        Self::new(cfg, reducer, backend)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Key used for `dataset` under `metric` with the configured parameters.
    pub fn embedding_key(&self, dataset: &str, metric: &str) -> SweepResult<EmbeddingKey> {
        EmbeddingKey::new(
            dataset,
            self.cfg.neighbor_count,
            self.cfg.target_dims,
            metric,
        )
    }

    /// Run one job to a terminal state. Never panics on stage errors; they land in the outcome.
    #[tracing::instrument(skip(self, dataset), fields(dataset = dataset.name()))]
    pub fn run_job(&self, dataset: &Dataset, metric: &str) -> JobOutcome {
        let mut job = JobTracker::new(dataset.name(), metric);
        tracing::info!(
            points = dataset.len(),
            dims = dataset.dims(),
            outliers = dataset.outlier_fraction(),
            "job started"
        );

        // Names are checked up front so a bad metric fails before anything is persisted.
        let (key, pattern) = match self
            .embedding_key(dataset.name(), metric)
            .and_then(|key| Ok((key, FramePattern::png(metric)?)))
        {
            Ok(named) => named,
            Err(e) => return job.finish(None, 0, None, Some(JobFailure::Embedding(e))),
        };

        let prepared = self
            .layout
            .ensure_dataset_dirs(dataset.name())
            .and_then(|()| {
                let reducer = &self.reducer;
                self.cache
                    .get_or_compute_with_outcome(&key, dataset, |samples| {
                        reducer.reduce(samples, &key)
                    })
            });
        let cached = match prepared {
            Ok(c) => c,
            Err(e) => {
                if e.is_cache_corruption() {
                    tracing::error!(error = %e, "embedding artifact is corrupt, purge it to recompute");
                }
                return job.finish(None, 0, None, Some(JobFailure::Embedding(e)));
            }
        };
        job.advance(JobState::EmbeddingReady);

        let title = format!("{}-{metric}-{}", dataset.name(), self.cfg.neighbor_count);
        let frames_dir = self.layout.frames_dir(dataset.name());
        let seq = match self
            .sweep
            .render_sweep(&cached.embedding, &title, &frames_dir, &pattern)
        {
            Ok(seq) => seq,
            Err(errors) => {
                let rendered = usize::from(SWEEP_FRAMES).saturating_sub(errors.len());
                return job.finish(
                    Some(cached.outcome),
                    rendered,
                    None,
                    Some(JobFailure::Frames(errors)),
                );
            }
        };
        job.advance(JobState::FramesReady);

        let video_path = self
            .layout
            .video_path(dataset.name(), metric, self.cfg.fps);
        match self.encoder.encode_sequence(&seq, self.cfg.fps, &video_path) {
            Ok(video) => {
                job.advance(JobState::Encoded);
                tracing::info!(path = %video.path.display(), "job encoded");
                job.finish(Some(cached.outcome), seq.len(), Some(video), None)
            }
            Err(e) => job.finish(
                Some(cached.outcome),
                seq.len(),
                None,
                Some(JobFailure::Encode(e)),
            ),
        }
    }

    /// Run every (dataset, metric) pair; one failure never stops the others.
    pub fn run_batch<S: AsRef<str>>(&self, datasets: &[Dataset], metrics: &[S]) -> Vec<JobOutcome> {
        let mut out = Vec::with_capacity(datasets.len() * metrics.len());
        for dataset in datasets {
            for metric in metrics {
                out.push(self.run_job(dataset, metric.as_ref()));
            }
        }
        let failed = out.iter().filter(|o| !o.is_success()).count();
        tracing::info!(jobs = out.len(), failed, "batch finished");
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/driver.rs"]
mod tests;
