use std::process::Stdio;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::sleep;

use super::profile::CaptureProfile;
use crate::configuration::types::StreamSettings;
use crate::error_handling::types::CaptureError;

/// Launches and terminates the external capture process.
///
/// The controller owns no session state of its own; the supervisor hands it
/// one profile per `start` and one child per `stop`. Both operations are
/// atomic from the caller's point of view: `start` either yields a running
/// child or a fatal error, and `stop` does not return until the child has
/// fully exited and the hardware settle delay has elapsed.
pub struct CaptureController {
    command: String,
    settle_delay: Duration,
}

impl CaptureController {
    pub fn new(stream: &StreamSettings) -> Self {
        Self {
            command: stream.capture_command.clone(),
            settle_delay: Duration::from_millis(stream.settle_delay_ms),
        }
    }

    /// Spawns the capture process for `profile`.
    ///
    /// The child writes its elementary stream to the local listener named in
    /// the profile, not to stdout; stdout is discarded and stderr is drained
    /// into debug logs so encoder diagnostics are not lost.
    ///
    /// # Errors
    ///
    /// [`CaptureError::LaunchFailed`] if the process cannot be spawned. This
    /// is fatal for the whole run; there is no degraded mode.
    pub fn start(&self, profile: &CaptureProfile) -> Result<Child, CaptureError> {
        let args = profile.args();
        debug!(
            "spawning {} for {} mode with args: {:?}",
            self.command, profile.mode, args
        );

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(CaptureError::LaunchFailed)?;

        if let Some(stderr) = child.stderr.take() {
            let command = self.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}][stderr] {}", command, line);
                }
            });
        }

        Ok(child)
    }

    /// Tears down a capture session's process and output connection.
    ///
    /// The ordering is mandatory: the connection is closed before the kill
    /// signal so the child never blocks writing to a half-closed socket,
    /// the wait reaps the child so no zombie contends for the encoder, and
    /// the settle delay gives the hardware time to release device handles
    /// before the next `start`.
    ///
    /// # Errors
    ///
    /// Kill and wait failures are propagated as fatal: a child that cannot
    /// be reaped would contend with the next session for the device.
    pub async fn stop(&self, mut process: Child, connection: TcpStream) -> Result<(), CaptureError> {
        drop(connection);

        process.start_kill().map_err(CaptureError::KillFailed)?;
        let status = process.wait().await.map_err(CaptureError::WaitFailed)?;
        info!("capture process exited with {}", status);

        sleep(self.settle_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::profile::SessionMode;
    use crate::configuration::types::CameraSettings;
    use serial_test::serial;
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn settings(settle_delay_ms: u64) -> StreamSettings {
        StreamSettings {
            settle_delay_ms,
            ..StreamSettings::default()
        }
    }

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn start_surfaces_launch_failure() {
        let stream = StreamSettings {
            capture_command: String::from("/nonexistent/capture-binary"),
            ..StreamSettings::default()
        };
        let controller = CaptureController::new(&stream);
        let profile = CaptureProfile::for_mode(
            &CameraSettings::default(),
            &stream,
            (1280, 720),
            SessionMode::Day,
        );

        match controller.start(&profile) {
            Err(CaptureError::LaunchFailed(_)) => (),
            other => panic!("expected LaunchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn stop_reaps_the_child_and_observes_the_settle_delay() {
        let controller = CaptureController::new(&settings(100));

        // Stand-in child that would outlive the test unless killed
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let (connection, _peer) = loopback_pair().await;

        let begin = Instant::now();
        controller.stop(child, connection).await.unwrap();
        let elapsed = begin.elapsed();

        // The child was killed rather than waited out, and the settle delay
        // was honoured after the exit.
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    #[serial]
    async fn stop_succeeds_for_an_already_exited_child() {
        let controller = CaptureController::new(&settings(10));

        let child = Command::new("true").stdin(Stdio::null()).spawn().unwrap();
        // Let the child exit on its own; stop still has to reap it cleanly
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (connection, _peer) = loopback_pair().await;
        controller.stop(child, connection).await.unwrap();
    }
}
