use crate::session::InitStep;
use crate::settings::SettingKind;
use crate::types::CaptureMode;
use thiserror::Error;

/// Outcome of a single device command that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device command failed: {0}")]
    Failed(String),
    #[error("device returned result code {0}")]
    Code(i32),
    /// The camera link itself is gone; the session is likely dead.
    #[error("camera connection lost")]
    ConnectionLost,
}

impl DeviceError {
    /// Map a firmware result code (`0` = success) onto a command outcome.
    pub fn from_code(code: i32) -> Result<(), DeviceError> {
        if code == 0 {
            Ok(())
        } else {
            Err(DeviceError::Code(code))
        }
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DeviceError::ConnectionLost)
    }
}

/// Errors returned by the session's upward API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("initialization failed at step {0:?}")]
    StepFailed(InitStep),
    #[error("camera connection lost")]
    ConnectionLost,
    #[error("capture session is not ready")]
    NotReady,
    #[error("capture session is already initialized")]
    AlreadyInitialized,
    #[error("capture mode index {index} out of range ({available} modes)")]
    InvalidModeIndex { index: usize, available: usize },
    #[error("value of kind {actual} cannot be written as {expected}")]
    KindMismatch {
        expected: SettingKind,
        actual: SettingKind,
    },
    #[error("recording refused: SD card unavailable")]
    SdCardDisabled,
    #[error("no live stream URL configured")]
    LiveUrlMissing,
    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for SessionError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::ConnectionLost => SessionError::ConnectionLost,
            other => SessionError::Device(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("failed to bind process to network {interface}: {reason}")]
    BindFailed { interface: String, reason: String },
}

/// A per-kind device read failed while refreshing entries after a write.
///
/// The cache keeps the stale pre-write value for `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency refresh of {kind} in {mode} failed: {source}")]
pub struct DependencyRefreshFailure {
    pub mode: CaptureMode,
    pub kind: SettingKind,
    pub source: DeviceError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert!(DeviceError::from_code(0).is_ok());
        assert_eq!(DeviceError::from_code(-3), Err(DeviceError::Code(-3)));
    }

    #[test]
    fn test_connection_lost_maps_to_session_variant() {
        let err: SessionError = DeviceError::ConnectionLost.into();
        assert_eq!(err, SessionError::ConnectionLost);

        let err: SessionError = DeviceError::Failed("busy".to_string()).into();
        assert!(matches!(err, SessionError::Device(DeviceError::Failed(_))));
    }
}
