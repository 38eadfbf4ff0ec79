pub mod types;

pub use types::{CaptureError, ConfigError, FramingError, NetworkError, SupervisorError};
