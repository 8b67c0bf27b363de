//! sweepviz turns a labeled high-dimensional dataset into a rotating 3-D scatter video.
//!
//! Per (dataset, metric) job:
//!
//! - Reduce to three dimensions through a disk-backed [`EmbeddingCache`]
//! - Render all 360 azimuth frames in parallel with a [`SweepCoordinator`]
//! - Encode the zero-padded frame sequence to MP4 with a [`VideoEncoder`] (system `ffmpeg`)
//!
//! [`PipelineDriver`] runs the stages and reports a [`JobOutcome`] per pair.
#![forbid(unsafe_code)]

mod foundation;

/// Input datasets and the on-disk layout.
pub mod data;
/// Embedding keys, cache, and reducers.
pub mod embed;
/// Video encoding.
pub mod encode;
/// Job orchestration.
pub mod pipeline;
/// Frame rendering and the parallel sweep.
pub mod render;

pub use crate::foundation::config::{ENCODER_ENV, PipelineConfig};
pub use crate::foundation::core::{Azimuth, Canvas, Matrix, SWEEP_FRAMES};
pub use crate::foundation::error::{EncodeError, RenderError, SweepError, SweepResult};
pub use crate::foundation::fs::{ensure_parent_dir, temp_sibling};

pub use crate::data::dataset::{Dataset, OUTLIER_THRESHOLD};
pub use crate::data::layout::DataLayout;
pub use crate::embed::cache::{CacheOutcome, Cached, EmbeddingCache};
pub use crate::embed::embedding::Embedding;
pub use crate::embed::key::{EmbeddingKey, Metric};
pub use crate::embed::reduce::{RandomProjection, Reducer};
pub use crate::encode::ffmpeg::{EncoderOpts, VideoArtifact, VideoEncoder, is_encoder_available};
pub use crate::pipeline::driver::{JobFailure, JobOutcome, JobState, PipelineDriver};
pub use crate::render::backend::{FrameBackend, Scene};
pub use crate::render::cpu::{CpuFrameRenderer, CpuRenderOpts};
pub use crate::render::sweep::{Frame, FramePattern, FrameSequence, SweepCoordinator};
