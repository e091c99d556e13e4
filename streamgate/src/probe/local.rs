//! Local probe backend: shells out to an `ffprobe`-compatible executable.

use std::process::Stdio;
use std::time::Duration;

use crate::{Error, Result};

use super::ProbeResult;

/// Invoke `<probe_exec> -show_format -show_streams -print_format json <url>`
/// and parse its stdout as a [`ProbeResult`].
///
/// The child is placed in its own process group so that cancellation (via
/// the caller's timeout) can reliably reap it and any descendants.
pub async fn probe(probe_exec: &str, url: &str, timeout: Duration) -> Result<ProbeResult> {
    let mut command = process_utils::tokio_command(probe_exec);
    command
        .args([
            "-show_format",
            "-show_streams",
            "-print_format",
            "json",
            url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    crate::transcoder::procgroup::set_new_group(&mut command);

    let mut child = command
        .spawn()
        .map_err(|e| Error::ProbeUnavailable(format!("failed to spawn {probe_exec}: {e}")))?;

    let pgid = child.id().map(|pid| pid as i32);

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(Error::ProbeUnavailable(format!("probe exec failed: {e}"))),
        Err(_) => {
            if let Some(pgid) = pgid {
                crate::transcoder::procgroup::kill_group(pgid);
            }
            return Err(Error::ProbeTimeout(timeout));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ProbeUnavailable(format!(
            "{probe_exec} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::ProbeParse(format!("invalid probe JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_executable_is_unavailable() {
        let err = probe("definitely-not-a-real-probe-binary", "http://x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProbeUnavailable(_)));
    }
}
