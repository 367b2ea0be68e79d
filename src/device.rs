//! The vendor SDK seam.
//!
//! The camera is a single serial command channel reached over USB or Wi-Fi.
//! Commands complete asynchronously with one of three outcomes: success,
//! failure, or connection error. Getters are synchronous and return the
//! last values fetched from the device.

use crate::callback::DeviceResult;
use crate::settings::{SettingKind, SettingValue};
use crate::types::{CaptureMode, NetworkHandle, PreviewStatus, PreviewType, SensorMode};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Persistent status channel of one preview stream.
///
/// Stays open for the stream's lifetime; a stream can report `Error` after
/// having reported `Opened`.
pub type PreviewStatusChannel = mpsc::UnboundedReceiver<PreviewStatus>;

#[async_trait]
pub trait DeviceFacade: Send + Sync {
    fn current_sensor_mode(&self) -> SensorMode;

    async fn switch_to_panoramic_sensor(&self) -> DeviceResult<()>;

    /// Bulk fetch of every current option value into the SDK's local state.
    async fn fetch_all_options(&self) -> DeviceResult<()>;

    /// Handle of the camera's own Wi-Fi network, if currently known.
    fn current_camera_network_handle(&self) -> Option<NetworkHandle>;

    /// Fetch the capability/behavior descriptor from the camera's companion
    /// web service. Requires the process to be bound to the camera network.
    async fn init_support_config(&self) -> DeviceResult<()>;

    /// Only meaningful after [`DeviceFacade::init_support_config`] succeeded.
    fn supports_new_capture_control_flow(&self) -> bool;

    fn supported_capture_modes(&self) -> Vec<CaptureMode>;

    /// Mode the device reports as active. Not trusted as-is.
    fn current_capture_mode(&self) -> CaptureMode;

    fn supported_settings(&self, mode: CaptureMode) -> Vec<SettingKind>;

    /// Legal values for `(mode, kind)` in device order.
    fn supported_values(&self, mode: CaptureMode, kind: SettingKind) -> Vec<SettingValue>;

    fn get_setting(&self, mode: CaptureMode, kind: SettingKind) -> DeviceResult<SettingValue>;

    /// Apply one value. Resolves with the kinds the device reports as
    /// affected by the change.
    async fn set_setting(
        &self,
        mode: CaptureMode,
        value: SettingValue,
    ) -> DeviceResult<Vec<SettingKind>>;

    fn begin_settings_batch(&self);

    /// Queue a write inside the open batch; no dependency report is produced.
    fn stage_setting(&self, mode: CaptureMode, value: SettingValue);

    async fn commit_settings_batch(&self) -> DeviceResult<()>;

    async fn set_capture_mode(&self, mode: CaptureMode) -> DeviceResult<()>;

    fn start_preview_stream(&self, preview: PreviewType) -> PreviewStatusChannel;

    fn close_preview_stream(&self);

    /// Align the decoder's expected encoding with the stream just opened.
    fn apply_stream_encode(&self);

    fn is_h265_stream_encode(&self) -> bool;

    /// Lock the camera's own screen so on-device changes cannot desync
    /// the cache.
    fn set_camera_lock_screen(&self, locked: bool);

    /// A recording or timed capture sequence is running on the device.
    fn is_camera_working(&self) -> bool;

    fn is_sd_card_enabled(&self) -> bool;

    /// Trigger the capture of a single-shot photo mode.
    async fn take_photo(&self, mode: CaptureMode) -> DeviceResult<()>;

    /// Start the recording or timed sequence `mode` runs.
    async fn start_record(&self, mode: CaptureMode) -> DeviceResult<()>;

    async fn stop_record(&self, mode: CaptureMode) -> DeviceResult<()>;

    /// Push the live stream to `url`. Resolves once the push has started.
    async fn start_live(&self, url: &str) -> DeviceResult<()>;

    fn stop_live(&self);
}
