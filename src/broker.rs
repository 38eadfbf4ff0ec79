use log::trace;
use tokio::sync::broadcast;

/// Sink the supervisor hands completed frames to.
///
/// Fire-and-forget: the supervisor neither awaits acknowledgment nor reacts
/// to backpressure. What happens to a frame after `publish` returns is the
/// implementation's concern.
pub trait FramePublisher: Send + Sync + 'static {
    fn publish(&self, frame: Vec<u8>);
}

/// Broadcast-backed publisher for live subscribers.
///
/// Slow subscribers lag and miss frames rather than stalling the capture
/// loop; a stream with no subscribers is simply discarded.
pub struct Broker {
    sender: broadcast::Sender<Vec<u8>>,
}

impl Broker {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl FramePublisher for Broker {
    fn publish(&self, frame: Vec<u8>) {
        trace!("publishing frame of {} bytes", frame.len());
        // Err only means nobody is subscribed right now
        let _ = self.sender.send(frame);
    }
}
