use crate::types::CaptureMode;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Named initialization step, carried by progress and failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InitStep {
    CheckSensor,
    FetchCameraOptions,
    InitSupportConfig,
    OpenPreviewStream,
}

/// Initialization pipeline state. Linear; any state may fall to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    NotStarted,
    CheckingSensor,
    FetchingOptions,
    BindingNetwork,
    InitializingSupportConfig,
    BuildingCache,
    OpeningPreview,
    PushingCachedSettings,
    RefetchingOptions,
    Ready,
    Failed(InitStep),
}

impl PipelineState {
    /// `initialize` may only start from these states.
    pub fn can_start(self) -> bool {
        matches!(self, PipelineState::NotStarted | PipelineState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PipelineEvent {
    Started,
    Progress(InitStep),
    Succeeded {
        modes: Vec<CaptureMode>,
        current_mode: CaptureMode,
    },
    Failed(InitStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchEvent {
    Started,
    Succeeded,
    Failed,
}

/// What one shutter press did in the current capture mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureAction {
    PhotoTaken,
    RecordingStarted,
    RecordingStopped,
    LiveStarted,
    LiveStopped,
}

impl CaptureAction {
    /// The capture is complete and its files are on the camera.
    pub fn finishes_capture(self) -> bool {
        matches!(self, CaptureAction::PhotoTaken | CaptureAction::RecordingStopped)
    }
}

/// Out-of-band notifications that are not tied to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionSignal {
    /// The preview stream faulted after it had opened.
    RestartRequired,
    /// The preview stream was reopened; players must be rebuilt.
    RestartPreview,
    /// A device call reported the camera link as gone.
    ConnectionLost,
    /// A recording was refused because the camera has no usable SD card.
    SdCardDisabled,
}

pub type PipelineEvents = mpsc::UnboundedReceiver<PipelineEvent>;
pub type SwitchEvents = mpsc::UnboundedReceiver<SwitchEvent>;
