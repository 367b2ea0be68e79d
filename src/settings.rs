use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Configurable capture parameter.
///
/// Every variant has exactly one matching [`SettingValue`] variant; the
/// pairing is enforced by the exhaustive matches in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingKind {
    Exposure,
    Ev,
    EvInterval,
    Shutter,
    ShutterMode,
    Iso,
    IsoTopLimit,
    RecordResolution,
    PhotoResolution,
    WhiteBalance,
    Aeb,
    Interval,
    GammaMode,
    RawType,
    RecordDuration,
    DarkEis,
    PanoExposureMode,
    BurstCapture,
    InternalSplicing,
    HdrStatus,
    PhotoHdrType,
    LiveBitrate,
    ILog,
}

impl SettingKind {
    pub const ALL: [SettingKind; 23] = [
        SettingKind::Exposure,
        SettingKind::Ev,
        SettingKind::EvInterval,
        SettingKind::Shutter,
        SettingKind::ShutterMode,
        SettingKind::Iso,
        SettingKind::IsoTopLimit,
        SettingKind::RecordResolution,
        SettingKind::PhotoResolution,
        SettingKind::WhiteBalance,
        SettingKind::Aeb,
        SettingKind::Interval,
        SettingKind::GammaMode,
        SettingKind::RawType,
        SettingKind::RecordDuration,
        SettingKind::DarkEis,
        SettingKind::PanoExposureMode,
        SettingKind::BurstCapture,
        SettingKind::InternalSplicing,
        SettingKind::HdrStatus,
        SettingKind::PhotoHdrType,
        SettingKind::LiveBitrate,
        SettingKind::ILog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKind::Exposure => "Exposure",
            SettingKind::Ev => "Ev",
            SettingKind::EvInterval => "EvInterval",
            SettingKind::Shutter => "Shutter",
            SettingKind::ShutterMode => "ShutterMode",
            SettingKind::Iso => "Iso",
            SettingKind::IsoTopLimit => "IsoTopLimit",
            SettingKind::RecordResolution => "RecordResolution",
            SettingKind::PhotoResolution => "PhotoResolution",
            SettingKind::WhiteBalance => "WhiteBalance",
            SettingKind::Aeb => "Aeb",
            SettingKind::Interval => "Interval",
            SettingKind::GammaMode => "GammaMode",
            SettingKind::RawType => "RawType",
            SettingKind::RecordDuration => "RecordDuration",
            SettingKind::DarkEis => "DarkEis",
            SettingKind::PanoExposureMode => "PanoExposureMode",
            SettingKind::BurstCapture => "BurstCapture",
            SettingKind::InternalSplicing => "InternalSplicing",
            SettingKind::HdrStatus => "HdrStatus",
            SettingKind::PhotoHdrType => "PhotoHdrType",
            SettingKind::LiveBitrate => "LiveBitrate",
            SettingKind::ILog => "ILog",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exposure" => Ok(Self::Exposure),
            "Ev" => Ok(Self::Ev),
            "EvInterval" => Ok(Self::EvInterval),
            "Shutter" => Ok(Self::Shutter),
            "ShutterMode" => Ok(Self::ShutterMode),
            "Iso" => Ok(Self::Iso),
            "IsoTopLimit" => Ok(Self::IsoTopLimit),
            "RecordResolution" => Ok(Self::RecordResolution),
            "PhotoResolution" => Ok(Self::PhotoResolution),
            "WhiteBalance" => Ok(Self::WhiteBalance),
            "Aeb" => Ok(Self::Aeb),
            "Interval" => Ok(Self::Interval),
            "GammaMode" => Ok(Self::GammaMode),
            "RawType" => Ok(Self::RawType),
            "RecordDuration" => Ok(Self::RecordDuration),
            "DarkEis" => Ok(Self::DarkEis),
            "PanoExposureMode" => Ok(Self::PanoExposureMode),
            "BurstCapture" => Ok(Self::BurstCapture),
            "InternalSplicing" => Ok(Self::InternalSplicing),
            "HdrStatus" => Ok(Self::HdrStatus),
            "PhotoHdrType" => Ok(Self::PhotoHdrType),
            "LiveBitrate" => Ok(Self::LiveBitrate),
            "ILog" => Ok(Self::ILog),
            _ => Err(()),
        }
    }
}

/// Firmware enum value, carried as the device's stable native ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeCode(pub i32);

/// Record or photo resolution entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub native: i32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Resolution {
    pub fn new(native: i32, width: u32, height: u32, fps: u32) -> Self {
        Self {
            native,
            width,
            height,
            fps,
        }
    }
}

/// Burst configuration: number of frames over a capture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BurstCapture {
    pub count: u32,
    pub time_ms: u32,
}

/// A setting value whose payload shape depends on its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum SettingValue {
    Exposure(NativeCode),
    Ev(NativeCode),
    EvInterval(NativeCode),
    Shutter(NativeCode),
    ShutterMode(NativeCode),
    Iso(NativeCode),
    IsoTopLimit(NativeCode),
    RecordResolution(Resolution),
    PhotoResolution(Resolution),
    WhiteBalance(NativeCode),
    Aeb(NativeCode),
    Interval(NativeCode),
    GammaMode(NativeCode),
    RawType(NativeCode),
    RecordDuration(NativeCode),
    DarkEis(NativeCode),
    PanoExposureMode(NativeCode),
    BurstCapture(BurstCapture),
    InternalSplicing(NativeCode),
    HdrStatus(NativeCode),
    PhotoHdrType(NativeCode),
    LiveBitrate(NativeCode),
    ILog(NativeCode),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Exposure(_) => SettingKind::Exposure,
            SettingValue::Ev(_) => SettingKind::Ev,
            SettingValue::EvInterval(_) => SettingKind::EvInterval,
            SettingValue::Shutter(_) => SettingKind::Shutter,
            SettingValue::ShutterMode(_) => SettingKind::ShutterMode,
            SettingValue::Iso(_) => SettingKind::Iso,
            SettingValue::IsoTopLimit(_) => SettingKind::IsoTopLimit,
            SettingValue::RecordResolution(_) => SettingKind::RecordResolution,
            SettingValue::PhotoResolution(_) => SettingKind::PhotoResolution,
            SettingValue::WhiteBalance(_) => SettingKind::WhiteBalance,
            SettingValue::Aeb(_) => SettingKind::Aeb,
            SettingValue::Interval(_) => SettingKind::Interval,
            SettingValue::GammaMode(_) => SettingKind::GammaMode,
            SettingValue::RawType(_) => SettingKind::RawType,
            SettingValue::RecordDuration(_) => SettingKind::RecordDuration,
            SettingValue::DarkEis(_) => SettingKind::DarkEis,
            SettingValue::PanoExposureMode(_) => SettingKind::PanoExposureMode,
            SettingValue::BurstCapture(_) => SettingKind::BurstCapture,
            SettingValue::InternalSplicing(_) => SettingKind::InternalSplicing,
            SettingValue::HdrStatus(_) => SettingKind::HdrStatus,
            SettingValue::PhotoHdrType(_) => SettingKind::PhotoHdrType,
            SettingValue::LiveBitrate(_) => SettingKind::LiveBitrate,
            SettingValue::ILog(_) => SettingKind::ILog,
        }
    }

    /// Ordinal used to sort legal-value lists for display.
    ///
    /// Burst entries sort by capture window rather than by native code.
    pub fn native_value(&self) -> i64 {
        match self {
            SettingValue::Exposure(c)
            | SettingValue::Ev(c)
            | SettingValue::EvInterval(c)
            | SettingValue::Shutter(c)
            | SettingValue::ShutterMode(c)
            | SettingValue::Iso(c)
            | SettingValue::IsoTopLimit(c)
            | SettingValue::WhiteBalance(c)
            | SettingValue::Aeb(c)
            | SettingValue::Interval(c)
            | SettingValue::GammaMode(c)
            | SettingValue::RawType(c)
            | SettingValue::RecordDuration(c)
            | SettingValue::DarkEis(c)
            | SettingValue::PanoExposureMode(c)
            | SettingValue::InternalSplicing(c)
            | SettingValue::HdrStatus(c)
            | SettingValue::PhotoHdrType(c)
            | SettingValue::LiveBitrate(c)
            | SettingValue::ILog(c) => i64::from(c.0),
            SettingValue::RecordResolution(r) | SettingValue::PhotoResolution(r) => {
                i64::from(r.native)
            }
            SettingValue::BurstCapture(b) => i64::from(b.time_ms),
        }
    }

    /// Build a value of `kind` from a bare native code.
    ///
    /// Structured kinds get a payload with only the ordinal populated; used
    /// by adapters whose SDK reports everything as integers.
    pub fn from_native(kind: SettingKind, native: i32) -> Self {
        let code = NativeCode(native);
        match kind {
            SettingKind::Exposure => SettingValue::Exposure(code),
            SettingKind::Ev => SettingValue::Ev(code),
            SettingKind::EvInterval => SettingValue::EvInterval(code),
            SettingKind::Shutter => SettingValue::Shutter(code),
            SettingKind::ShutterMode => SettingValue::ShutterMode(code),
            SettingKind::Iso => SettingValue::Iso(code),
            SettingKind::IsoTopLimit => SettingValue::IsoTopLimit(code),
            SettingKind::RecordResolution => {
                SettingValue::RecordResolution(Resolution::new(native, 0, 0, 0))
            }
            SettingKind::PhotoResolution => {
                SettingValue::PhotoResolution(Resolution::new(native, 0, 0, 0))
            }
            SettingKind::WhiteBalance => SettingValue::WhiteBalance(code),
            SettingKind::Aeb => SettingValue::Aeb(code),
            SettingKind::Interval => SettingValue::Interval(code),
            SettingKind::GammaMode => SettingValue::GammaMode(code),
            SettingKind::RawType => SettingValue::RawType(code),
            SettingKind::RecordDuration => SettingValue::RecordDuration(code),
            SettingKind::DarkEis => SettingValue::DarkEis(code),
            SettingKind::PanoExposureMode => SettingValue::PanoExposureMode(code),
            SettingKind::BurstCapture => SettingValue::BurstCapture(BurstCapture {
                count: 0,
                time_ms: u32::try_from(native).unwrap_or(0),
            }),
            SettingKind::InternalSplicing => SettingValue::InternalSplicing(code),
            SettingKind::HdrStatus => SettingValue::HdrStatus(code),
            SettingKind::PhotoHdrType => SettingValue::PhotoHdrType(code),
            SettingKind::LiveBitrate => SettingValue::LiveBitrate(code),
            SettingKind::ILog => SettingValue::ILog(code),
        }
    }
}

/// Values of different kinds are unordered.
impl PartialOrd for SettingValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.kind() != other.kind() {
            return None;
        }
        Some(self.native_value().cmp(&other.native_value()))
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::RecordResolution(r) | SettingValue::PhotoResolution(r) => {
                write!(f, "{}={}x{}@{}", self.kind(), r.width, r.height, r.fps)
            }
            SettingValue::BurstCapture(b) => {
                write!(f, "{}={}x/{}ms", self.kind(), b.count, b.time_ms)
            }
            _ => write!(f, "{}={}", self.kind(), self.native_value()),
        }
    }
}

/// Sort a legal-value list by native ordinal, as presented to pickers.
pub fn sort_by_native(values: &mut [SettingValue]) {
    values.sort_by_key(SettingValue::native_value);
}
