pub mod broker;
pub mod capture;
pub mod configuration;
pub mod error_handling;
pub mod framing;
pub mod network;
pub mod supervisor;

pub use broker::{Broker, FramePublisher};
pub use configuration::config::Config;
pub use supervisor::stream_supervisor::StreamSupervisor;
