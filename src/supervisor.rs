pub mod stream_supervisor;

pub use stream_supervisor::StreamSupervisor;
