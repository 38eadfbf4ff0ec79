use serde::Deserialize;

/// Encoder parameters shared by the day and night capture profiles.
///
/// All fields map one-to-one onto capture command arguments; see
/// [`crate::capture::profile::CaptureProfile`] for the exact argument list.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Horizontal resolution as configured, before any rotation adjustment
    pub width: u32,
    /// Vertical resolution as configured, before any rotation adjustment
    pub height: u32,
    /// Day-mode frame rate; night mode always runs the continuous-rate sentinel (0)
    pub fps: u32,
    /// Target encoder bitrate in bits per second. Also sizes the splitter's
    /// working buffer (one quarter of this value, in bytes)
    pub bitrate: u32,
    /// Sensor mode index passed through to the capture program
    pub sensor_mode: u32,
    /// Output rotation in degrees; 90 and 270 swap the logical width/height
    pub rotation: u32,
    /// Exposure compensation value
    pub exposure_value: i32,
    /// Metering mode name (e.g. "average", "spot")
    pub metering_mode: String,
    /// Dynamic range compression level (e.g. "off", "low", "high")
    pub dynamic_range_compression: String,
    /// Image effect name (e.g. "none", "denoise")
    pub image_effect: String,
    /// Day-mode exposure mode; night mode always uses "nightpreview"
    pub exposure_mode: String,
    /// When enabled, the capture program is told to emit motion vectors to a
    /// secondary local destination
    pub motion_detection: bool,
    /// Timestamp annotation overlay text
    pub annotation: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: 2_000_000,
            sensor_mode: 0,
            rotation: 0,
            exposure_value: 0,
            metering_mode: String::from("average"),
            dynamic_range_compression: String::from("off"),
            image_effect: String::from("none"),
            exposure_mode: String::from("auto"),
            motion_detection: true,
            annotation: String::from("%Y-%m-%d %l:%M:%S %P"),
        }
    }
}

impl CameraSettings {
    /// Resolves the logical output dimensions for this run.
    ///
    /// A rotation of 90 or 270 degrees swaps width and height. The swap is
    /// computed here, once, from the immutable configured values; callers
    /// carry the returned pair through the whole run instead of mutating
    /// shared settings, so repeated mode switches can never re-swap.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        if self.rotation == 90 || self.rotation == 270 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Local transport settings for the capture process and its control knobs.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Local transport scheme the capture program writes its stream over.
    /// Only "tcp" is supported
    pub protocol: String,
    /// Port the supervisor listens on for the elementary stream connection
    pub listen_port: u16,
    /// Port the capture program targets with the motion-triggered secondary
    /// stream when motion detection is enabled
    pub motion_port: u16,
    /// Name or path of the external capture program
    pub capture_command: String,
    /// Grace period after the capture process exits, letting the hardware
    /// encoder release its device handles before a relaunch. Empirically one
    /// second on Raspberry Pi hardware; no verified lower bound
    pub settle_delay_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            protocol: String::from("tcp"),
            listen_port: 8554,
            motion_port: 8555,
            capture_command: String::from("raspivid"),
            settle_delay_ms: 1000,
        }
    }
}

impl StreamSettings {
    /// Destination URL the capture program writes the elementary stream to.
    pub fn stream_target(&self) -> String {
        format!("{}://127.0.0.1:{}", self.protocol, self.listen_port)
    }

    /// Destination URL for the motion-triggered secondary stream.
    pub fn motion_target(&self) -> String {
        format!("{}://127.0.0.1:{}", self.protocol, self.motion_port)
    }
}
