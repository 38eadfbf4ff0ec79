use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    ZeroValue(String),
    BadRotation(i64),
    BadProtocol(String),
    PortConflict(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::ZeroValue(field) => write!(f, "{} must be non-zero", field),
            ConfigError::BadRotation(r) => {
                write!(f, "rotation must be one of 0/90/180/270, got {}", r)
            }
            ConfigError::BadProtocol(p) => write!(f, "unsupported stream protocol: {}", p),
            ConfigError::PortConflict(p) => {
                write!(f, "stream and motion ports must differ, both are {}", p)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Errors raised by the NAL splitter. `BufferOverrun` is kept distinct from
/// ordinary read errors so callers can log an oversized unit differently
/// from a dropped connection.
#[derive(Debug)]
pub enum FramingError {
    ReadError(std::io::Error),
    BufferOverrun(usize),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::ReadError(e) => write!(f, "stream read error: {}", e),
            FramingError::BufferOverrun(cap) => {
                write!(f, "frame exceeds working buffer of {} bytes", cap)
            }
        }
    }
}

impl std::error::Error for FramingError {}

impl From<std::io::Error> for FramingError {
    fn from(err: std::io::Error) -> Self {
        FramingError::ReadError(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    LaunchFailed(std::io::Error),
    KillFailed(std::io::Error),
    WaitFailed(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::LaunchFailed(e) => write!(f, "capture process launch failed: {}", e),
            CaptureError::KillFailed(e) => write!(f, "capture process kill failed: {}", e),
            CaptureError::WaitFailed(e) => write!(f, "capture process wait failed: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug)]
pub enum NetworkError {
    BindError(std::io::Error),
    HandoffFailed,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindError(e) => write!(f, "listener bind error: {}", e),
            NetworkError::HandoffFailed => write!(f, "stream connection handoff failed"),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum SupervisorError {
    CaptureError(CaptureError),
    NetworkError(NetworkError),
    ControlChannelClosed,
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::CaptureError(e) => write!(f, "capture error: {}", e),
            SupervisorError::NetworkError(e) => write!(f, "network error: {}", e),
            SupervisorError::ControlChannelClosed => {
                write!(f, "mode control channel closed")
            }
        }
    }
}

impl std::error::Error for SupervisorError {}

impl From<CaptureError> for SupervisorError {
    fn from(err: CaptureError) -> Self {
        SupervisorError::CaptureError(err)
    }
}

impl From<NetworkError> for SupervisorError {
    fn from(err: NetworkError) -> Self {
        SupervisorError::NetworkError(err)
    }
}
