//! ffmpeg process supervision and progress normalization (PRD-09).
//!
//! One render is one engine invocation: the graph and output options become
//! a single command line, `-progress pipe:1` key=value records on stdout are
//! normalized into `(percent, stage)` callbacks, and stderr is captured
//! (capped) so a nonzero exit can surface the engine's diagnostics verbatim.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::compose::OutputOptions;
use crate::error::RenderError;
use crate::graph::{FilterGraph, InputSource, AUDIO_OUT, VIDEO_OUT};

/// Maximum stderr size captured (diagnostics only).
const MAX_STDERR_BYTES: usize = 256 * 1024;

/// Stage names reported through the progress callback.
pub const STAGE_PREPARING: &str = "preparing";
pub const STAGE_ENCODING: &str = "encoding";
pub const STAGE_FINALIZING: &str = "finalizing";

/// Progress sink: `(percent 0..=100, stage)`.
pub type ProgressFn = Arc<dyn Fn(i32, &str) + Send + Sync>;

/// Supervises the external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    binary: String,
}

impl FfmpegRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Assemble the full argument list for one render invocation.
    pub fn command_args(
        graph: &FilterGraph,
        options: &OutputOptions,
        output_path: &str,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-nostats".into(),
            "-loglevel".into(),
            "error".into(),
            "-progress".into(),
            "pipe:1".into(),
        ];

        for input in &graph.inputs {
            args.extend(input.options.iter().cloned());
            match &input.source {
                InputSource::File(path) => {
                    args.push("-i".into());
                    args.push(path.clone());
                }
                InputSource::Lavfi(spec) => {
                    args.push("-f".into());
                    args.push("lavfi".into());
                    args.push("-i".into());
                    args.push(spec.clone());
                }
            }
        }

        args.push("-filter_complex".into());
        args.push(graph.filter_complex());
        args.push("-map".into());
        args.push(format!("[{VIDEO_OUT}]"));
        args.push("-map".into());
        args.push(format!("[{AUDIO_OUT}]"));

        args.push("-c:v".into());
        args.push(options.video_codec.clone());
        args.push("-preset".into());
        args.push(options.preset.clone());
        args.push("-b:v".into());
        args.push(options.video_bitrate.clone());
        args.push("-c:a".into());
        args.push(options.audio_codec.clone());
        args.push("-r".into());
        args.push(options.framerate.to_string());
        args.push("-t".into());
        args.push(options.duration_seconds.to_string());

        args.push(output_path.to_string());
        args
    }

    /// Run one render to completion.
    ///
    /// Resolves when the engine exits 0; rejects with the captured stderr
    /// otherwise. The callback receives monotone progress during encoding;
    /// the caller owns the final 100% on success.
    pub async fn render(
        &self,
        graph: &FilterGraph,
        options: &OutputOptions,
        output_path: &str,
        on_progress: &ProgressFn,
    ) -> Result<(), RenderError> {
        on_progress(0, STAGE_PREPARING);

        let args = Self::command_args(graph, options, output_path);
        tracing::debug!(binary = %self.binary, ?args, "Spawning render engine");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RenderError::Spawn)?;

        // Read stderr in a spawned task so the progress loop below can run
        // while `child.wait()` still has the child borrowed afterwards.
        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        if let Some(stdout) = child.stdout.take() {
            let total_us = (options.duration_seconds * 1_000_000.0).max(1.0);
            let mut last_percent = -1;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match line.split_once('=') {
                    // `out_time_ms` is microseconds too, despite the name.
                    Some(("out_time_us" | "out_time_ms", value)) => {
                        if let Ok(us) = value.trim().parse::<i64>() {
                            let percent = ((us as f64 / total_us) * 100.0) as i32;
                            let percent = percent.clamp(0, 99);
                            if percent != last_percent {
                                last_percent = percent;
                                on_progress(percent, STAGE_ENCODING);
                            }
                        }
                    }
                    Some(("progress", "end")) => {
                        on_progress(99, STAGE_FINALIZING);
                    }
                    _ => {}
                }
            }
        }

        let status = child.wait().await?;
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr_bytes).trim().to_string();

        if status.success() {
            Ok(())
        } else {
            Err(RenderError::EngineFailed {
                exit_code: status.code(),
                stderr,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_STDERR_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
