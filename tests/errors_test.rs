#[cfg(test)]
mod error_tests {
    use crabcapture::errors::{DependencyRefreshFailure, DeviceError, NetworkError, SessionError};
    use crabcapture::{CaptureMode, InitStep, SettingKind};
    use std::error::Error;

    #[test]
    fn test_device_error_from_code() {
        assert_eq!(DeviceError::from_code(0), Ok(()));
        assert_eq!(DeviceError::from_code(-17), Err(DeviceError::Code(-17)));
    }

    #[test]
    fn test_device_error_display() {
        let error = DeviceError::Failed("busy".to_string());
        assert_eq!(error.to_string(), "device command failed: busy");
        assert_eq!(DeviceError::Code(3).to_string(), "device returned result code 3");
        assert!(DeviceError::ConnectionLost.is_connection_lost());
        assert!(!DeviceError::Code(3).is_connection_lost());
    }

    #[test]
    fn test_connection_loss_maps_to_session_variant() {
        let error: SessionError = DeviceError::ConnectionLost.into();
        assert_eq!(error, SessionError::ConnectionLost);

        let error: SessionError = DeviceError::Code(8).into();
        assert_eq!(error, SessionError::Device(DeviceError::Code(8)));
        // Transparent: the device message is shown as-is.
        assert_eq!(error.to_string(), "device returned result code 8");
    }

    #[test]
    fn test_session_error_messages() {
        let error = SessionError::InvalidModeIndex {
            index: 4,
            available: 2,
        };
        assert!(error.to_string().contains("index 4"));
        assert!(error.to_string().contains("2 modes"));

        let error = SessionError::KindMismatch {
            expected: SettingKind::Iso,
            actual: SettingKind::Shutter,
        };
        assert!(error.to_string().contains("Shutter"));
        assert!(error.to_string().contains("Iso"));

        let error = SessionError::StepFailed(InitStep::OpenPreviewStream);
        assert!(error.to_string().contains("OpenPreviewStream"));

        assert!(SessionError::SdCardDisabled.to_string().contains("SD card"));
        assert!(SessionError::LiveUrlMissing.to_string().contains("live stream URL"));
    }

    #[test]
    fn test_network_error_display() {
        let error = NetworkError::BindFailed {
            interface: "wlan0".to_string(),
            reason: "no route".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "failed to bind process to network wlan0: no route"
        );
    }

    #[test]
    fn test_dependency_refresh_failure_keeps_source() {
        let failure = DependencyRefreshFailure {
            mode: CaptureMode::RecordNormal,
            kind: SettingKind::Shutter,
            source: DeviceError::Code(2),
        };
        assert!(failure.to_string().contains("Shutter"));
        assert!(failure.to_string().contains("record_normal"));
        let source = failure.source().expect("refresh failure carries its cause");
        assert_eq!(source.to_string(), "device returned result code 2");
    }

    #[test]
    fn test_errors_implement_error_trait() {
        let _device: &dyn Error = &DeviceError::ConnectionLost;
        let session = SessionError::NotReady;
        let _session: &dyn Error = &session;
        assert!(session.source().is_none());
    }
}
