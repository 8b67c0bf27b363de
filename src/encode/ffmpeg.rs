use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::foundation::config::PipelineConfig;
use crate::foundation::error::{EncodeError, SweepError, SweepResult};
use crate::foundation::fs::{TempFileGuard, ensure_parent_dir, temp_sibling};
use crate::render::sweep::{FramePattern, FrameSequence};

const WAIT_POLL: Duration = Duration::from_millis(25);

/// Options for [`VideoEncoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderOpts {
    /// Encoder executable, `ffmpeg` by default.
    pub program: String,
    /// x264 constant rate factor; lower is better quality.
    pub crf: u8,
    /// Kill the encoder if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            crf: 20,
            timeout: None,
        }
    }
}

impl From<&PipelineConfig> for EncoderOpts {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            program: cfg.encoder.clone(),
            crf: cfg.crf,
            timeout: cfg.encode_timeout(),
        }
    }
}

/// The encoded output of a complete frame sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub frame_count: usize,
    pub fps: u32,
    /// Size of the output file.
    pub bytes: u64,
}

/// Turns a folder of zero-padded frames into an H.264 MP4 by running an external `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct VideoEncoder {
    opts: EncoderOpts,
}

impl VideoEncoder {
    pub fn new(opts: EncoderOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &EncoderOpts {
        &self.opts
    }

    /// Encode the frames in `frame_folder` named by `pattern` into `output_path`.
    ///
    /// Refuses to run unless the whole sweep is present. Blocks until the encoder exits. The
    /// output is written to a hidden sibling and renamed into place only on success, so a failed
    /// run never leaves a partial file at `output_path`.
    pub fn encode(
        &self,
        frame_folder: &Path,
        pattern: &FramePattern,
        frame_rate: u32,
        output_path: &Path,
    ) -> SweepResult<VideoArtifact> {
        let seq = FrameSequence::scan(frame_folder, pattern)?;
        self.encode_sequence(&seq, frame_rate, output_path)
    }

    /// Encode an already validated sequence.
    #[tracing::instrument(skip(self, seq), fields(folder = %seq.folder().display()))]
    pub fn encode_sequence(
        &self,
        seq: &FrameSequence,
        frame_rate: u32,
        output_path: &Path,
    ) -> SweepResult<VideoArtifact> {
        if frame_rate == 0 {
            return Err(SweepError::validation("frame rate must be non-zero"));
        }
        ensure_parent_dir(output_path)?;

        let tmp = temp_sibling(output_path);
        let mut guard = TempFileGuard::new(tmp.clone());
        let args = self.command_args(seq.folder(), seq.pattern(), frame_rate, &tmp);

        let started = Instant::now();
        run_encoder(&self.opts.program, &args, self.opts.timeout)?;

        let bytes = std::fs::metadata(&tmp)
            .map_err(|e| {
                EncodeError::Io(format!(
                    "encoder reported success but '{}' is missing: {e}",
                    tmp.display()
                ))
            })?
            .len();
        std::fs::rename(&tmp, output_path).map_err(|e| {
            EncodeError::Io(format!(
                "move '{}' -> '{}': {e}",
                tmp.display(),
                output_path.display()
            ))
        })?;
        guard.disarm();

        tracing::info!(
            path = %output_path.display(),
            bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "encoded video"
        );
        Ok(VideoArtifact {
            path: output_path.to_path_buf(),
            frame_count: seq.len(),
            fps: frame_rate,
            bytes,
        })
    }

    /// Full argument list passed to the encoder program.
    pub fn command_args(
        &self,
        frame_folder: &Path,
        pattern: &FramePattern,
        frame_rate: u32,
        output_path: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-framerate",
            frame_rate.to_string().as_str(),
            "-start_number",
            "0",
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(frame_folder.join(pattern.encoder_pattern()).into_os_string());
        // Output: h264 + yuv420p for broad compatibility; bitexact so reruns are byte-identical.
        args.extend(
            [
                "-an",
                "-c:v",
                "libx264",
                "-profile:v",
                "high",
                "-crf",
                self.opts.crf.to_string().as_str(),
                "-pix_fmt",
                "yuv420p",
                "-map_metadata",
                "-1",
                "-fflags",
                "+bitexact",
                "-flags:v",
                "+bitexact",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output_path.as_os_str().to_os_string());
        args
    }
}

fn run_encoder(
    program: &str,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<(), EncodeError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        // Own process group, so a timeout also reaches children of wrapper scripts.
        cmd.process_group(0);
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| EncodeError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| EncodeError::Io("failed to open encoder stderr (unexpected)".into()))?;
    let stderr_drain = std::thread::spawn(move || {
        let mut stderr_bytes = Vec::new();
        stderr.read_to_end(&mut stderr_bytes)?;
        Ok::<_, std::io::Error>(stderr_bytes)
    });

    let Some(status) = wait_with_timeout(&mut child, timeout)? else {
        // The drain thread is detached: a process that left the group may still hold the pipe.
        drop(stderr_drain);
        return Err(EncodeError::Timeout {
            secs: timeout.map_or(0, |t| t.as_secs()),
        });
    };
    let stderr_bytes = stderr_drain
        .join()
        .map_err(|_| EncodeError::Io("encoder stderr drain thread panicked".into()))?
        .map_err(|e| EncodeError::Io(format!("encoder stderr read failed: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(EncodeError::Exit {
            code: status.code(),
            stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
        })
    }
}

/// `Ok(None)` means the timeout fired and the child was killed.
fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Option<Duration>,
) -> Result<Option<ExitStatus>, EncodeError> {
    let Some(limit) = timeout else {
        return child
            .wait()
            .map(Some)
            .map_err(|e| EncodeError::Io(format!("failed to wait for encoder: {e}")));
    };

    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!(timeout_s = limit.as_secs(), "encoder timed out, killing");
                kill_encoder(child);
                return Ok(None);
            }
            Ok(None) => std::thread::sleep(WAIT_POLL),
            Err(e) => return Err(EncodeError::Io(format!("failed to wait for encoder: {e}"))),
        }
    }
}

/// Kill the encoder and everything it spawned, then reap it.
fn kill_encoder(child: &mut std::process::Child) {
    // The child leads its own process group, so `-pid` addresses the whole group. The group is
    // signalled before reaping while the leader's pid is still reserved.
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-KILL", "--", format!("-{}", child.id()).as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Return `true` when `program -version` runs successfully.
pub fn is_encoder_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
