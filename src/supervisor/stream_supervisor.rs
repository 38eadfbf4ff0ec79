use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

use crate::broker::FramePublisher;
use crate::capture::process::CaptureController;
use crate::capture::profile::{CaptureProfile, SessionMode};
use crate::configuration::config::Config;
use crate::error_handling::types::{FramingError, NetworkError, SupervisorError};
use crate::framing::nal_splitter::{NalSplitter, NAL_DELIMITER};
use crate::network::stream_acceptor::StreamAcceptor;

/// One live capture process together with its attached output stream.
///
/// Owned exclusively by the supervisor; at most one exists at any instant.
/// The splitter owns the accepted connection until the stop sequence
/// reclaims it.
struct CaptureSession {
    id: Uuid,
    mode: SessionMode,
    started_at: DateTime<Utc>,
    process: Child,
    splitter: NalSplitter<TcpStream>,
}

/// Why the frame pump handed control back to the session loop.
enum PumpEvent {
    /// A mode signal arrived (`true` = night)
    SwitchRequested(bool),
    /// The stream ended without an explicit fatal condition
    Interrupted,
    /// A single unit outgrew the working buffer; the session is unusable
    Overrun(FramingError),
    /// Every mode-control handle was dropped
    ControlClosed,
}

/// Supervises the capture pipeline end to end.
///
/// Two-level loop: the outer level treats any stream interruption as
/// unrecoverable for the session and cold-restarts the whole pipeline in
/// day mode; the inner level multiplexes frame delivery with mode-switch
/// signals, which transition cleanly between sessions inside the same
/// outer iteration. Launch and process-teardown failures escape both
/// levels and end the run.
pub struct StreamSupervisor {
    config: Config,
    controller: CaptureController,
    publisher: Arc<dyn FramePublisher>,
    mode_rx: Receiver<bool>,
}

impl StreamSupervisor {
    /// Creates the supervisor and its mode-control handle.
    ///
    /// The control channel is a single-slot mailbox: at most one switch is
    /// in flight, and a signal sent while the supervisor is mid-restart
    /// stays queued instead of being lost. It is created once here and
    /// survives outer restarts.
    pub fn new(config: Config, publisher: Arc<dyn FramePublisher>) -> (Self, Sender<bool>) {
        let (mode_tx, mode_rx) = mpsc::channel(1);
        let controller = CaptureController::new(&config.stream);
        (
            Self {
                config,
                controller,
                publisher,
                mode_rx,
            },
            mode_tx,
        )
    }

    /// Runs the outer restart loop. Returns only on a fatal error.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        // Resolved exactly once: restarts and mode switches within the run
        // must never re-swap the dimensions.
        let dimensions = self.config.camera.oriented_dimensions();
        loop {
            self.run_streaming(dimensions).await?;
            info!("restarting capture pipeline in day mode");
        }
    }

    /// One outer iteration: day session up, then pump until the stream dies.
    async fn run_streaming(&mut self, dimensions: (u32, u32)) -> Result<(), SupervisorError> {
        let acceptor = StreamAcceptor::bind(self.config.stream.listen_port).await?;
        let mut session = self
            .start_session(&acceptor, SessionMode::Day, dimensions)
            .await?;
        info!("[{}] camera online in {} mode", session.id, session.mode);

        loop {
            let event = Self::pump(
                &mut session.splitter,
                self.publisher.as_ref(),
                &mut self.mode_rx,
            )
            .await;

            match event {
                PumpEvent::SwitchRequested(night) => {
                    let mode = SessionMode::from_signal(night);
                    info!("[{}] switching to {} mode", session.id, mode);
                    self.stop_session(session).await?;
                    session = self.start_session(&acceptor, mode, dimensions).await?;
                    info!("[{}] camera online in {} mode", session.id, session.mode);
                }
                PumpEvent::Interrupted => {
                    warn!("[{}] stream interrupted", session.id);
                    self.stop_session(session).await?;
                    return Ok(());
                }
                PumpEvent::Overrun(e) => {
                    error!("[{}] fatal framing error: {}", session.id, e);
                    self.stop_session(session).await?;
                    return Ok(());
                }
                PumpEvent::ControlClosed => {
                    self.stop_session(session).await?;
                    return Err(SupervisorError::ControlChannelClosed);
                }
            }
        }
    }

    /// Forwards units to the publisher until a signal or stream event.
    ///
    /// Check-then-block: a pending mode signal wins over the next read, and
    /// a signal arriving while a read is in flight is serviced right after
    /// that read completes. Non-empty units are re-prefixed with the start
    /// code before publication; empty units (adjacent start codes) are
    /// dropped silently.
    async fn pump<R: AsyncRead + Unpin>(
        splitter: &mut NalSplitter<R>,
        publisher: &dyn FramePublisher,
        mode_rx: &mut Receiver<bool>,
    ) -> PumpEvent {
        loop {
            match mode_rx.try_recv() {
                Ok(night) => return PumpEvent::SwitchRequested(night),
                Err(TryRecvError::Disconnected) => return PumpEvent::ControlClosed,
                Err(TryRecvError::Empty) => (),
            }

            match splitter.next_unit().await {
                Ok(Some(unit)) if unit.is_empty() => (),
                Ok(Some(unit)) => {
                    let mut frame = Vec::with_capacity(NAL_DELIMITER.len() + unit.len());
                    frame.extend_from_slice(&NAL_DELIMITER);
                    frame.extend_from_slice(&unit);
                    publisher.publish(frame);
                }
                Ok(None) => return PumpEvent::Interrupted,
                Err(FramingError::ReadError(e)) => {
                    warn!("stream read failed: {}", e);
                    return PumpEvent::Interrupted;
                }
                Err(e @ FramingError::BufferOverrun(_)) => return PumpEvent::Overrun(e),
            }
        }
    }

    /// Starts a capture session for `mode`.
    ///
    /// The accept handshake is spawned before the process launches so the
    /// child's first connection attempt cannot race the listener, then the
    /// supervisor blocks until the connection is handed over.
    async fn start_session(
        &self,
        acceptor: &StreamAcceptor,
        mode: SessionMode,
        dimensions: (u32, u32),
    ) -> Result<CaptureSession, SupervisorError> {
        let profile =
            CaptureProfile::for_mode(&self.config.camera, &self.config.stream, dimensions, mode);
        let handoff = acceptor.accept_one();
        let process = self.controller.start(&profile)?;
        let connection = handoff
            .await
            .map_err(|_| NetworkError::HandoffFailed)?;
        let splitter = NalSplitter::new(connection, (self.config.camera.bitrate / 4) as usize);
        Ok(CaptureSession {
            id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            process,
            splitter,
        })
    }

    /// Fully releases a session on every exit path: connection closed, then
    /// process killed, reaped and settled, in that order.
    async fn stop_session(&self, session: CaptureSession) -> Result<(), SupervisorError> {
        let CaptureSession {
            id,
            mode,
            started_at,
            process,
            splitter,
        } = session;
        let connection = splitter.into_inner();
        self.controller.stop(process, connection).await?;
        info!(
            "[{}] {} session stopped after {}s",
            id,
            mode,
            (Utc::now() - started_at).num_seconds()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio_test::io::Builder;

    const D: [u8; 4] = NAL_DELIMITER;

    #[derive(Default)]
    struct RecordingPublisher {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingPublisher {
        fn taken(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl FramePublisher for RecordingPublisher {
        fn publish(&self, frame: Vec<u8>) {
            self.frames.lock().unwrap().push(frame);
        }
    }

    fn prefixed(payload: &[u8]) -> Vec<u8> {
        let mut frame = D.to_vec();
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn pump_republishes_nonempty_units_with_start_code() {
        let bytes: Vec<u8> = [&D[..], b"AAA", &D[..], &D[..], b"BB"].concat();
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);
        let publisher = RecordingPublisher::default();
        let (_tx, mut rx) = mpsc::channel(1);

        let event = StreamSupervisor::pump(&mut splitter, &publisher, &mut rx).await;

        assert!(matches!(event, PumpEvent::Interrupted));
        // The empty unit between adjacent start codes was never published
        assert_eq!(publisher.taken(), vec![prefixed(b"AAA"), prefixed(b"BB")]);
    }

    #[tokio::test]
    async fn pump_emits_trailing_remnant_before_interruption() {
        let bytes: Vec<u8> = [&D[..], b"CCCC"].concat();
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);
        let publisher = RecordingPublisher::default();
        let (_tx, mut rx) = mpsc::channel(1);

        let event = StreamSupervisor::pump(&mut splitter, &publisher, &mut rx).await;

        assert!(matches!(event, PumpEvent::Interrupted));
        assert_eq!(publisher.taken(), vec![prefixed(b"CCCC")]);
    }

    #[tokio::test]
    async fn pending_mode_signal_wins_over_the_next_read() {
        let bytes: Vec<u8> = [&D[..], b"AAA", &D[..]].concat();
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);
        let publisher = RecordingPublisher::default();
        let (tx, mut rx) = mpsc::channel(1);

        tx.send(true).await.unwrap();
        let event = StreamSupervisor::pump(&mut splitter, &publisher, &mut rx).await;

        assert!(matches!(event, PumpEvent::SwitchRequested(true)));
        assert!(publisher.taken().is_empty());
        // The pending signal preempts the read; the mock panics on drop
        // with its bytes unread otherwise.
        std::mem::forget(splitter.into_inner());
    }

    #[tokio::test]
    async fn closed_control_channel_stops_the_pump() {
        let mock = Builder::new().build();
        let mut splitter = NalSplitter::new(mock, 1024);
        let publisher = RecordingPublisher::default();
        let (tx, mut rx) = mpsc::channel::<bool>(1);
        drop(tx);

        let event = StreamSupervisor::pump(&mut splitter, &publisher, &mut rx).await;
        assert!(matches!(event, PumpEvent::ControlClosed));
    }

    #[tokio::test]
    async fn oversized_unit_surfaces_as_overrun() {
        let bytes: Vec<u8> = [&D[..], &[0xAB; 64][..]].concat();
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 16);
        let publisher = RecordingPublisher::default();
        let (_tx, mut rx) = mpsc::channel(1);

        let event = StreamSupervisor::pump(&mut splitter, &publisher, &mut rx).await;
        assert!(matches!(
            event,
            PumpEvent::Overrun(FramingError::BufferOverrun(16))
        ));
        // The overrun leaves bytes unread; the mock panics on drop otherwise.
        std::mem::forget(splitter.into_inner());
    }

    #[test]
    fn mode_mailbox_holds_a_signal_sent_while_nobody_is_polling() {
        let (tx, mut rx) = mpsc::channel(1);
        // Queued during a restart window, delivered on the next poll
        tx.try_send(true).unwrap();
        assert!(matches!(rx.try_recv(), Ok(true)));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
