//! Transcoder (C3).
//!
//! `Run(outputDir, plan)` spawns and supervises a single encoder
//! subprocess, tees its stdio to both this process and to
//! `ffmpeg.out`/`ffmpeg.err`, and on exit verifies every sub-playlist the
//! plan named is complete. Grounded on the teacher's
//! `downloader::engine::ffmpeg::FfmpegEngine`, extended with process-group
//! control (the teacher kills only the direct child).

pub mod pool;
pub mod procgroup;
pub mod verify;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::planner::HLSPlan;
use crate::{Error, Result};

const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const SIGTERM_GRACE: Duration = Duration::from_secs(5);
const DONE_MARKER: &str = "done";

/// Run the encoder to completion for `plan`, writing `done` on success.
///
/// `cancel` resolves when the orchestrator wants this job torn down
/// (signal, idle expiry); on cancellation the whole process group is
/// killed rather than just the direct child (§4.3, §9).
pub async fn run(
    input: &str,
    output_dir: &Path,
    plan: &HLSPlan,
    cfg: &GatewayConfig,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<()> {
    let args = plan.ffmpeg_args(input, output_dir, cfg);

    info!(encoder = %cfg.encoder_exec, ?args, "starting transcoder subprocess");

    let mut command = process_utils::tokio_command(&cfg.encoder_exec);
    command
        .args(&args)
        .env("LC_ALL", "C")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    procgroup::set_new_group(&mut command);

    let mut child = command
        .spawn()
        .map_err(|e| Error::SubprocessStartFailed(format!("failed to spawn {}: {e}", cfg.encoder_exec)))?;

    let pgid = child.id().map(|pid| pid as i32);
    let stdin = child.stdin.take();
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let (out_path, err_path) = log_paths(output_dir);
    let mut out_log = std::fs::File::create(&out_path).map_err(|e| Error::io_path("creating ffmpeg.out", &out_path, e))?;
    let mut err_log = std::fs::File::create(&err_path).map_err(|e| Error::io_path("creating ffmpeg.err", &err_path, e))?;

    tokio::spawn(tee_lines(stdout, move |line| {
        let _ = writeln!(out_log, "{line}");
    }));
    tokio::spawn(tee_lines(stderr, move |line| {
        debug!(target: "transcoder::ffmpeg", "{line}");
        let _ = writeln!(err_log, "{line}");
    }));

    let exit_status = wait_with_cancellation(&mut child, stdin, pgid, cancel).await?;

    if !exit_status.success() {
        return Err(Error::SubprocessFailed(format!(
            "encoder exited with {exit_status} (see {} and {})",
            out_path.display(),
            err_path.display()
        )));
    }

    if !verify::all_finished(output_dir, plan) {
        return Err(Error::IncompleteOutput);
    }

    tokio::fs::write(output_dir.join(DONE_MARKER), b"")
        .await
        .map_err(|e| Error::io_path("writing done marker", &output_dir.join(DONE_MARKER), e))?;

    Ok(())
}

async fn wait_with_cancellation(
    child: &mut tokio::process::Child,
    mut stdin: Option<tokio::process::ChildStdin>,
    pgid: Option<i32>,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<std::process::ExitStatus> {
    tokio::select! {
        status = child.wait() => {
            status.map_err(|e| Error::SubprocessFailed(format!("error waiting on encoder: {e}")))
        }
        _ = cancel.cancelled() => {
            debug!("transcoder cancellation requested, attempting graceful stop");
            if let Some(mut stdin) = stdin.take() {
                let _ = stdin.write_all(b"q").await;
                let _ = stdin.flush().await;
                let _ = stdin.shutdown().await;
            }

            match tokio::time::timeout(GRACEFUL_STOP_TIMEOUT, child.wait()).await {
                Ok(status) => status.map_err(|e| Error::SubprocessFailed(format!("error waiting on encoder: {e}"))),
                Err(_) => {
                    warn!("encoder did not quit via stdin in time; sending SIGTERM to its process group");
                    if let Some(pgid) = pgid {
                        procgroup::terminate_group(pgid);
                    }

                    match tokio::time::timeout(SIGTERM_GRACE, child.wait()).await {
                        Ok(status) => status.map_err(|e| Error::SubprocessFailed(format!("error waiting on encoder: {e}"))),
                        Err(_) => {
                            warn!("encoder ignored SIGTERM; killing process group");
                            if let Some(pgid) = pgid {
                                procgroup::kill_group(pgid);
                            } else {
                                let _ = child.kill().await;
                            }
                            child.wait().await.map_err(|e| Error::SubprocessFailed(format!("error waiting on killed encoder: {e}")))
                        }
                    }
                }
            }
        }
    }
}

async fn tee_lines<R, F>(reader: R, mut sink: F)
where
    R: tokio::io::AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sink(&line);
    }
}

/// Return the output subdirectory's ffmpeg log paths, for diagnostics.
pub fn log_paths(output_dir: &Path) -> (PathBuf, PathBuf) {
    (output_dir.join("ffmpeg.out"), output_dir.join("ffmpeg.err"))
}
