use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use sweepviz::{
    Azimuth, CpuFrameRenderer, CpuRenderOpts, DataLayout, Dataset, EmbeddingCache, EmbeddingKey,
    EncoderOpts, FrameBackend as _, FramePattern, JobFailure, Metric, PipelineConfig,
    PipelineDriver, RandomProjection, Reducer as _, VideoEncoder,
};

#[derive(Parser, Debug)]
#[command(name = "sweepviz", version)]
struct Cli {
    /// JSON pipeline config; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data root holding one directory per dataset.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed, sweep and encode every dataset x metric pair.
    Run(RunArgs),
    /// Render a single azimuth of one dataset as a PNG.
    Frame(FrameArgs),
    /// Re-encode an existing frame folder (requires `ffmpeg` on PATH).
    Encode(EncodeArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Dataset JSON files (`{"X": [[...]], "y": [...]}`).
    #[arg(long = "dataset", required = true)]
    datasets: Vec<PathBuf>,

    /// Metrics to run; defaults to euclidean, manhattan and cosine.
    #[arg(long = "metric")]
    metrics: Vec<String>,

    /// Min-max normalize every column before embedding.
    #[arg(long, default_value_t = false)]
    normalize: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Delete a corrupt cached embedding and retry the job once.
    #[arg(long, default_value_t = false)]
    purge_corrupt: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Dataset JSON file.
    #[arg(long)]
    dataset: PathBuf,

    #[arg(long, default_value = "euclidean")]
    metric: String,

    /// Azimuth in degrees, 0..360.
    #[arg(long, default_value_t = 0)]
    azimuth: u16,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Dataset name under the data root.
    #[arg(long)]
    dataset: String,

    #[arg(long)]
    metric: String,

    /// Output MP4 path; defaults to `<root>/<dataset>/<metric>-<fps>fps.mp4`.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(root) = &cli.data_root {
        cfg.data_root = root.clone();
    }

    match cli.cmd {
        Command::Run(args) => cmd_run(cfg, args),
        Command::Frame(args) => cmd_frame(cfg, args),
        Command::Encode(args) => cmd_encode(cfg, args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dataset(path: &Path, normalize: bool) -> anyhow::Result<Dataset> {
    let ds = Dataset::from_json_path(path)
        .with_context(|| format!("load dataset '{}'", path.display()))?;
    Ok(if normalize { ds.min_max_normalized() } else { ds })
}

fn cmd_run(mut cfg: PipelineConfig, args: RunArgs) -> anyhow::Result<()> {
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }
    let metrics = if args.metrics.is_empty() {
        Metric::ALL.iter().map(|m| m.name().to_string()).collect()
    } else {
        args.metrics
    };
    let datasets = args
        .datasets
        .iter()
        .map(|p| load_dataset(p, args.normalize))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let driver = PipelineDriver::with_defaults(cfg)?;
    let mut failed = 0usize;
    for dataset in &datasets {
        for metric in &metrics {
            let mut outcome = driver.run_job(dataset, metric);
            let corrupt = matches!(
                &outcome.failure,
                Some(JobFailure::Embedding(e)) if e.is_cache_corruption()
            );
            if corrupt && args.purge_corrupt {
                let key = driver.embedding_key(dataset.name(), metric)?;
                driver.cache().purge(&key)?;
                outcome = driver.run_job(dataset, metric);
            }
            match (&outcome.video, &outcome.failure) {
                (Some(video), _) => eprintln!(
                    "{}/{}: wrote {} ({} frames, {:.1}s)",
                    outcome.dataset,
                    outcome.metric,
                    video.path.display(),
                    video.frame_count,
                    outcome.elapsed.as_secs_f64()
                ),
                (None, Some(err)) => {
                    failed += 1;
                    eprintln!("{}/{}: FAILED: {err}", outcome.dataset, outcome.metric);
                }
                (None, None) => {}
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn cmd_frame(cfg: PipelineConfig, args: FrameArgs) -> anyhow::Result<()> {
    cfg.validate()?;
    let azimuth = Azimuth::new(args.azimuth)?;
    let dataset = load_dataset(&args.dataset, false)?;
    let key = EmbeddingKey::new(
        dataset.name(),
        cfg.neighbor_count,
        cfg.target_dims,
        &args.metric,
    )?;
    let layout = DataLayout::new(&cfg.data_root);
    layout.ensure_dataset_dirs(dataset.name())?;
    let reducer = RandomProjection::new(cfg.seed);
    let embedding = EmbeddingCache::new(layout).get_or_compute(&key, &dataset, |samples| {
        reducer.reduce(samples, &key)
    })?;

    sweepviz::ensure_parent_dir(&args.out)?;
    let renderer = CpuFrameRenderer::new(CpuRenderOpts::from(&cfg))?;
    let title = format!("{}-{}-{}", dataset.name(), args.metric, cfg.neighbor_count);
    let scene = renderer.prepare(embedding.coords(), embedding.labels_arc(), &title)?;
    renderer.render_frame(&scene, azimuth, &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_encode(cfg: PipelineConfig, args: EncodeArgs) -> anyhow::Result<()> {
    cfg.validate()?;
    let layout = DataLayout::new(&cfg.data_root);
    let pattern = FramePattern::png(&args.metric)?;
    let out = args
        .out
        .unwrap_or_else(|| layout.video_path(&args.dataset, &args.metric, cfg.fps));

    let encoder = VideoEncoder::new(EncoderOpts::from(&cfg));
    let video = encoder.encode(&layout.frames_dir(&args.dataset), &pattern, cfg.fps, &out)?;
    eprintln!("wrote {} ({} bytes)", video.path.display(), video.bytes);
    Ok(())
}
