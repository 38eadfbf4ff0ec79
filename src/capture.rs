pub mod process;
pub mod profile;

pub use process::CaptureController;
pub use profile::{CaptureProfile, SessionMode};
