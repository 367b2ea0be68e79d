//! Core value types shared by the device seam, the settings cache and the
//! session orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device shooting mode.
///
/// Each camera advertises a subset of these as supported; the active one is
/// tracked by the settings cache, not by the device's own report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    CaptureNormal,
    HdrCapture,
    NightScene,
    Burst,
    IntervalShooting,
    StarlapseShooting,
    RecordNormal,
    BulletTime,
    Timelapse,
    HdrRecord,
    TimeShift,
    LooperRecording,
    Live,
    LiveAnimation,
    SuperRecord,
    SlowMotion,
    SelfieRecord,
    PureRecord,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 18] = [
        CaptureMode::CaptureNormal,
        CaptureMode::HdrCapture,
        CaptureMode::NightScene,
        CaptureMode::Burst,
        CaptureMode::IntervalShooting,
        CaptureMode::StarlapseShooting,
        CaptureMode::RecordNormal,
        CaptureMode::BulletTime,
        CaptureMode::Timelapse,
        CaptureMode::HdrRecord,
        CaptureMode::TimeShift,
        CaptureMode::LooperRecording,
        CaptureMode::Live,
        CaptureMode::LiveAnimation,
        CaptureMode::SuperRecord,
        CaptureMode::SlowMotion,
        CaptureMode::SelfieRecord,
        CaptureMode::PureRecord,
    ];

    /// Still-image modes, including the interval and star-lapse sequences.
    pub fn is_photo_mode(self) -> bool {
        matches!(
            self,
            CaptureMode::CaptureNormal
                | CaptureMode::HdrCapture
                | CaptureMode::NightScene
                | CaptureMode::Burst
                | CaptureMode::IntervalShooting
                | CaptureMode::StarlapseShooting
        )
    }

    pub fn is_live_mode(self) -> bool {
        matches!(self, CaptureMode::Live | CaptureMode::LiveAnimation)
    }

    pub fn is_video_mode(self) -> bool {
        !self.is_photo_mode() && !self.is_live_mode()
    }

    /// A single shutter press produces the whole capture.
    ///
    /// Interval and star-lapse are photo modes but run until stopped.
    pub fn is_single_shot(self) -> bool {
        self.is_photo_mode()
            && !matches!(
                self,
                CaptureMode::IntervalShooting | CaptureMode::StarlapseShooting
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureMode::CaptureNormal => "capture_normal",
            CaptureMode::HdrCapture => "hdr_capture",
            CaptureMode::NightScene => "night_scene",
            CaptureMode::Burst => "burst",
            CaptureMode::IntervalShooting => "interval_shooting",
            CaptureMode::StarlapseShooting => "starlapse_shooting",
            CaptureMode::RecordNormal => "record_normal",
            CaptureMode::BulletTime => "bullet_time",
            CaptureMode::Timelapse => "timelapse",
            CaptureMode::HdrRecord => "hdr_record",
            CaptureMode::TimeShift => "time_shift",
            CaptureMode::LooperRecording => "looper_recording",
            CaptureMode::Live => "live",
            CaptureMode::LiveAnimation => "live_animation",
            CaptureMode::SuperRecord => "super_record",
            CaptureMode::SlowMotion => "slow_motion",
            CaptureMode::SelfieRecord => "selfie_record",
            CaptureMode::PureRecord => "pure_record",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaptureMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or(())
    }
}

/// Lens/sensor arrangement the camera is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorMode {
    Panorama,
    FrontLens,
    RearLens,
}

/// Preview stream flavour requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreviewType {
    #[default]
    Normal,
    Record,
    Live,
}

/// States reported on the preview stream's status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PreviewStatus {
    #[default]
    Idle,
    Opening,
    Opened,
    Error,
}

/// Identifies the camera's own Wi-Fi network so process sockets can be bound
/// to it for the companion web service calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub id: u64,
    pub interface: String,
}

impl NetworkHandle {
    pub fn new(id: u64, interface: impl Into<String>) -> Self {
        Self {
            id,
            interface: interface.into(),
        }
    }
}

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.interface, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classification_is_partition() {
        for mode in CaptureMode::ALL {
            let classes = [mode.is_photo_mode(), mode.is_video_mode(), mode.is_live_mode()];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{mode}");
        }
    }

    #[test]
    fn test_single_shot_excludes_sequences() {
        assert!(CaptureMode::CaptureNormal.is_single_shot());
        assert!(CaptureMode::Burst.is_single_shot());
        assert!(!CaptureMode::IntervalShooting.is_single_shot());
        assert!(!CaptureMode::StarlapseShooting.is_single_shot());
        assert!(!CaptureMode::RecordNormal.is_single_shot());
    }

    #[test]
    fn test_mode_name_round_trip() {
        for mode in CaptureMode::ALL {
            assert_eq!(mode.as_str().parse::<CaptureMode>(), Ok(mode));
        }
        assert!("video_none".parse::<CaptureMode>().is_err());
    }
}
