use std::fmt;

use crate::configuration::types::{CameraSettings, StreamSettings};

/// Operating mode of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Day,
    Night,
}

impl SessionMode {
    /// Maps a mode-control signal (`true` = night) to a session mode.
    pub fn from_signal(night: bool) -> Self {
        if night {
            SessionMode::Night
        } else {
            SessionMode::Day
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Day => write!(f, "day"),
            SessionMode::Night => write!(f, "night"),
        }
    }
}

/// Immutable per-session encoder configuration.
///
/// A profile is constructed once per capture session from the validated
/// settings plus the rotation-adjusted dimensions resolved at the start of
/// the run; nothing here is mutated afterwards. The day and night variants
/// share every field except frame rate and exposure mode: night runs the
/// continuous-rate sentinel (`fps 0`) with the fixed `nightpreview`
/// exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureProfile {
    pub mode: SessionMode,
    width: u32,
    height: u32,
    fps: u32,
    bitrate: u32,
    sensor_mode: u32,
    rotation: u32,
    exposure_value: i32,
    metering_mode: String,
    dynamic_range_compression: String,
    image_effect: String,
    exposure_mode: String,
    /// Always twice the configured day frame rate, even for night profiles
    keyframe_interval: u32,
    annotation: String,
    stream_target: String,
    motion_target: Option<String>,
}

impl CaptureProfile {
    /// Builds the profile for `mode` from the shared base settings.
    ///
    /// `dimensions` is the rotation-adjusted `(width, height)` pair computed
    /// once per run by [`CameraSettings::oriented_dimensions`].
    pub fn for_mode(
        camera: &CameraSettings,
        stream: &StreamSettings,
        dimensions: (u32, u32),
        mode: SessionMode,
    ) -> Self {
        let (width, height) = dimensions;
        let (fps, exposure_mode) = match mode {
            SessionMode::Day => (camera.fps, camera.exposure_mode.clone()),
            SessionMode::Night => (0, String::from("nightpreview")),
        };
        Self {
            mode,
            width,
            height,
            fps,
            bitrate: camera.bitrate,
            sensor_mode: camera.sensor_mode,
            rotation: camera.rotation,
            exposure_value: camera.exposure_value,
            metering_mode: camera.metering_mode.clone(),
            dynamic_range_compression: camera.dynamic_range_compression.clone(),
            image_effect: camera.image_effect.clone(),
            exposure_mode,
            keyframe_interval: camera.fps * 2,
            annotation: camera.annotation.clone(),
            stream_target: stream.stream_target(),
            motion_target: camera
                .motion_detection
                .then(|| stream.motion_target()),
        }
    }

    /// Full capture command argument list.
    ///
    /// Order matters: the base arguments come first and the mode-specific
    /// frame rate and exposure overrides are appended last, so base defaults
    /// can never shadow them. The keyframe interval is pinned to twice the
    /// configured frame rate even in night mode, where the frame-rate
    /// argument itself is the continuous sentinel.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            String::from("-t"),
            String::from("0"),
            String::from("-o"),
            self.stream_target.clone(),
            String::from("-w"),
            self.width.to_string(),
            String::from("-h"),
            self.height.to_string(),
            String::from("-rot"),
            self.rotation.to_string(),
            String::from("-ev"),
            self.exposure_value.to_string(),
            String::from("-mm"),
            self.metering_mode.clone(),
            String::from("-drc"),
            self.dynamic_range_compression.clone(),
            String::from("-ifx"),
            self.image_effect.clone(),
            String::from("-b"),
            self.bitrate.to_string(),
            String::from("-md"),
            self.sensor_mode.to_string(),
            String::from("-pf"),
            String::from("baseline"),
            String::from("-g"),
            self.keyframe_interval.to_string(),
            String::from("-ih"),
            String::from("-a"),
            String::from("1028"),
            String::from("-a"),
            self.annotation.clone(),
        ];
        if let Some(target) = &self.motion_target {
            args.push(String::from("-x"));
            args.push(target.clone());
        }
        args.push(String::from("-fps"));
        args.push(self.fps.to_string());
        args.push(String::from("-ex"));
        args.push(self.exposure_mode.clone());
        args
    }
}
