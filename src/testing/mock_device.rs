//! Scripted in-memory camera
//!
//! Behaves like a connected device: async commands resolve through the same
//! callback bridge a vendor adapter uses, getters read local state, and every
//! interaction is recorded so tests can assert on ordering and traffic.

use crate::callback::{completion, DeviceResult};
use crate::device::{DeviceFacade, PreviewStatusChannel};
use crate::errors::DeviceError;
use crate::settings::{SettingKind, SettingValue};
use crate::types::{CaptureMode, NetworkHandle, PreviewStatus, PreviewType, SensorMode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

/// Async command families that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SwitchSensor,
    FetchAllOptions,
    InitSupportConfig,
    SetSetting,
    CommitBatch,
    SetCaptureMode,
    TakePhoto,
    StartRecord,
    StopRecord,
    StartLive,
}

/// One interaction with the device, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    SwitchSensor,
    FetchAllOptions,
    InitSupportConfig,
    SetSetting(CaptureMode, SettingKind),
    BeginBatch,
    Stage(CaptureMode, SettingKind),
    CommitBatch,
    SetCaptureMode(CaptureMode),
    StartPreview(PreviewType),
    ClosePreview,
    ApplyStreamEncode,
    LockScreen(bool),
    TakePhoto(CaptureMode),
    StartRecord(CaptureMode),
    StopRecord(CaptureMode),
    StartLive(String),
    StopLive,
}

/// How the next preview stream behaves after it is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewScript {
    Opens,
    Fails,
    /// The device drops the channel without reporting a status.
    Disconnects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Released,
    All,
    Only(Command),
}

impl Hold {
    fn holds(self, command: Command) -> bool {
        match self {
            Hold::Released => false,
            Hold::All => true,
            Hold::Only(held) => held == command,
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    from_call: usize,
    error: DeviceError,
}

struct MockState {
    sensor: SensorMode,
    modes: Vec<CaptureMode>,
    refetch_modes: Option<Vec<CaptureMode>>,
    reported_mode: CaptureMode,
    values: HashMap<CaptureMode, HashMap<SettingKind, SettingValue>>,
    legal_values: HashMap<(CaptureMode, SettingKind), Vec<SettingValue>>,
    affected: HashMap<SettingKind, Vec<(SettingKind, SettingValue)>>,
    network: Option<NetworkHandle>,
    new_control_flow: bool,
    h265: bool,
    flip_h265_on_fetch: bool,
    preview: PreviewScript,
    preview_status: Option<mpsc::UnboundedSender<PreviewStatus>>,
    sd_card: bool,
    working: bool,
    living: bool,
    failures: HashMap<Command, ScriptedFailure>,
    command_counts: HashMap<Command, usize>,
    read_failures: HashMap<(CaptureMode, SettingKind), DeviceError>,
    reads: HashMap<(CaptureMode, SettingKind), usize>,
    batch: Option<Vec<(CaptureMode, SettingValue)>>,
    calls: Vec<DeviceCall>,
}

pub struct MockDevice {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hold: watch::Sender<Hold>,
}

/// Decrements the in-flight count even when the awaiting future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// A modern panoramic camera in `RecordNormal`, supporting one photo and
    /// one video mode with exposure, ISO and shutter in each.
    pub fn new() -> Self {
        let modes = vec![CaptureMode::CaptureNormal, CaptureMode::RecordNormal];
        let kinds = [SettingKind::Exposure, SettingKind::Iso, SettingKind::Shutter];

        let mut values = HashMap::new();
        let mut legal_values = HashMap::new();
        for &mode in &modes {
            let row: HashMap<_, _> = kinds
                .iter()
                .map(|&kind| (kind, SettingValue::from_native(kind, 1)))
                .collect();
            values.insert(mode, row);
            for &kind in &kinds {
                legal_values.insert(
                    (mode, kind),
                    [3, 1, 2]
                        .into_iter()
                        .map(|native| SettingValue::from_native(kind, native))
                        .collect(),
                );
            }
        }

        let (hold, _) = watch::channel(Hold::Released);
        Self {
            state: Mutex::new(MockState {
                sensor: SensorMode::Panorama,
                modes,
                refetch_modes: None,
                reported_mode: CaptureMode::RecordNormal,
                values,
                legal_values,
                affected: HashMap::new(),
                network: Some(NetworkHandle::new(100, "wlan0")),
                new_control_flow: true,
                h265: false,
                flip_h265_on_fetch: false,
                preview: PreviewScript::Opens,
                preview_status: None,
                sd_card: true,
                working: false,
                living: false,
                failures: HashMap::new(),
                command_counts: HashMap::new(),
                read_failures: HashMap::new(),
                reads: HashMap::new(),
                batch: None,
                calls: Vec::new(),
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold,
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- scripting ---

    /// Replace the supported modes; every listed mode gets `kinds` at native 1.
    pub fn with_modes(self, modes: &[CaptureMode], kinds: &[SettingKind]) -> Self {
        {
            let mut state = self.state();
            state.modes = modes.to_vec();
            state.values.clear();
            state.legal_values.clear();
            for &mode in modes {
                let row = kinds
                    .iter()
                    .map(|&kind| (kind, SettingValue::from_native(kind, 1)))
                    .collect();
                state.values.insert(mode, row);
            }
        }
        self
    }

    pub fn with_reported_mode(self, mode: CaptureMode) -> Self {
        self.state().reported_mode = mode;
        self
    }

    pub fn with_sensor(self, sensor: SensorMode) -> Self {
        self.state().sensor = sensor;
        self
    }

    /// Firmware without the new capture control flow.
    pub fn legacy(self) -> Self {
        self.state().new_control_flow = false;
        self
    }

    pub fn without_network(self) -> Self {
        self.state().network = None;
        self
    }

    pub fn with_preview(self, script: PreviewScript) -> Self {
        self.state().preview = script;
        self
    }

    /// Writing `kind` also moves `other` to `value` and reports it as affected.
    pub fn with_dependency(self, kind: SettingKind, other: SettingKind, value: SettingValue) -> Self {
        self.state()
            .affected
            .entry(kind)
            .or_default()
            .push((other, value));
        self
    }

    pub fn with_legal_values(self, mode: CaptureMode, values: Vec<SettingValue>) -> Self {
        if let Some(kind) = values.first().map(SettingValue::kind) {
            self.state().legal_values.insert((mode, kind), values);
        }
        self
    }

    /// Each option fetch toggles the stream encoding, as some firmware does
    /// after a photo.
    pub fn with_h265_flip_on_fetch(self) -> Self {
        self.state().flip_h265_on_fetch = true;
        self
    }

    /// From the second option fetch on, the device advertises `modes`.
    pub fn with_modes_on_refetch(self, modes: &[CaptureMode]) -> Self {
        self.state().refetch_modes = Some(modes.to_vec());
        self
    }

    pub fn without_sd_card(self) -> Self {
        self.state().sd_card = false;
        self
    }

    /// Every `command` from now on fails with `error`.
    pub fn fail_command(&self, command: Command, error: DeviceError) {
        self.fail_command_from(command, 1, error);
    }

    /// The `nth` (1-based, counted over the device's lifetime) and later
    /// invocations of `command` fail with `error`.
    pub fn fail_command_from(&self, command: Command, nth: usize, error: DeviceError) {
        self.state()
            .failures
            .insert(command, ScriptedFailure { from_call: nth, error });
    }

    pub fn clear_failure(&self, command: Command) {
        self.state().failures.remove(&command);
    }

    pub fn fail_read(&self, mode: CaptureMode, kind: SettingKind, error: DeviceError) {
        self.state().read_failures.insert((mode, kind), error);
    }

    pub fn clear_read_failure(&self, mode: CaptureMode, kind: SettingKind) {
        self.state().read_failures.remove(&(mode, kind));
    }

    /// Change a value on the device side only, as if from the camera's screen.
    pub fn set_device_value(&self, mode: CaptureMode, value: SettingValue) {
        self.state()
            .values
            .entry(mode)
            .or_default()
            .insert(value.kind(), value);
    }

    /// Keep async commands pending until [`MockDevice::release_commands`].
    pub fn hold_commands(&self) {
        self.hold.send_replace(Hold::All);
    }

    /// Keep only `command` pending; everything else completes normally.
    pub fn hold_command(&self, command: Command) {
        self.hold.send_replace(Hold::Only(command));
    }

    pub fn release_commands(&self) {
        self.hold.send_replace(Hold::Released);
    }

    /// Push a status onto the open preview stream's channel.
    pub fn emit_preview_status(&self, status: PreviewStatus) -> bool {
        match &self.state().preview_status {
            Some(tx) => tx.send(status).is_ok(),
            None => false,
        }
    }

    // --- inspection ---

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, call: &DeviceCall) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    pub fn reads(&self, mode: CaptureMode, kind: SettingKind) -> usize {
        self.state().reads.get(&(mode, kind)).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.state().reads.values().sum()
    }

    pub fn reset_counters(&self) {
        let mut state = self.state();
        state.reads.clear();
        state.calls.clear();
    }

    pub fn device_value(&self, mode: CaptureMode, kind: SettingKind) -> Option<SettingValue> {
        self.state()
            .values
            .get(&mode)
            .and_then(|row| row.get(&kind))
            .copied()
    }

    pub fn device_mode(&self) -> CaptureMode {
        self.state().reported_mode
    }

    pub fn sensor(&self) -> SensorMode {
        self.state().sensor
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of async commands ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.state().working
    }

    pub fn is_live_pushing(&self) -> bool {
        self.state().living
    }

    pub fn preview_open(&self) -> bool {
        self.state().preview_status.is_some()
    }

    // --- command plumbing ---

    /// Run one async command: record it, wait while held, compute the outcome
    /// against device state and deliver it through a callback fired from
    /// another task.
    async fn command<T, F>(&self, command: Command, call: DeviceCall, apply: F) -> DeviceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MockState) -> T,
    {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        self.state().calls.push(call);

        let mut held = self.hold.subscribe();
        while held.borrow_and_update().holds(command) {
            if held.changed().await.is_err() {
                break;
            }
        }

        let outcome = {
            let mut state = self.state();
            let count = state.command_counts.entry(command).or_insert(0);
            *count += 1;
            let count = *count;
            match state.failures.get(&command) {
                Some(failure) if count >= failure.from_call => Err(failure.error.clone()),
                _ => Ok(apply(&mut state)),
            }
        };

        let (done, pending) = completion();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            done.complete(outcome);
        });
        pending.wait().await
    }
}

#[async_trait]
impl DeviceFacade for MockDevice {
    fn current_sensor_mode(&self) -> SensorMode {
        self.state().sensor
    }

    async fn switch_to_panoramic_sensor(&self) -> DeviceResult<()> {
        self.command(Command::SwitchSensor, DeviceCall::SwitchSensor, |state| {
            state.sensor = SensorMode::Panorama;
        })
        .await
    }

    async fn fetch_all_options(&self) -> DeviceResult<()> {
        self.command(Command::FetchAllOptions, DeviceCall::FetchAllOptions, |state| {
            if state.flip_h265_on_fetch {
                state.h265 = !state.h265;
            }
            let fetches = state
                .command_counts
                .get(&Command::FetchAllOptions)
                .copied()
                .unwrap_or(0);
            if fetches >= 2 {
                if let Some(modes) = state.refetch_modes.take() {
                    state.modes = modes;
                }
            }
        })
        .await
    }

    fn current_camera_network_handle(&self) -> Option<NetworkHandle> {
        self.state().network.clone()
    }

    async fn init_support_config(&self) -> DeviceResult<()> {
        self.command(Command::InitSupportConfig, DeviceCall::InitSupportConfig, |_| ())
            .await
    }

    fn supports_new_capture_control_flow(&self) -> bool {
        self.state().new_control_flow
    }

    fn supported_capture_modes(&self) -> Vec<CaptureMode> {
        self.state().modes.clone()
    }

    fn current_capture_mode(&self) -> CaptureMode {
        self.state().reported_mode
    }

    fn supported_settings(&self, mode: CaptureMode) -> Vec<SettingKind> {
        let state = self.state();
        let mut kinds: Vec<_> = state
            .values
            .get(&mode)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    fn supported_values(&self, mode: CaptureMode, kind: SettingKind) -> Vec<SettingValue> {
        self.state()
            .legal_values
            .get(&(mode, kind))
            .cloned()
            .unwrap_or_default()
    }

    fn get_setting(&self, mode: CaptureMode, kind: SettingKind) -> DeviceResult<SettingValue> {
        let mut state = self.state();
        *state.reads.entry((mode, kind)).or_insert(0) += 1;
        if let Some(error) = state.read_failures.get(&(mode, kind)) {
            return Err(error.clone());
        }
        state
            .values
            .get(&mode)
            .and_then(|row| row.get(&kind))
            .copied()
            .ok_or_else(|| DeviceError::Failed(format!("{} is not supported in {}", kind, mode)))
    }

    async fn set_setting(
        &self,
        mode: CaptureMode,
        value: SettingValue,
    ) -> DeviceResult<Vec<SettingKind>> {
        let kind = value.kind();
        self.command(
            Command::SetSetting,
            DeviceCall::SetSetting(mode, kind),
            move |state| {
                let dependencies = state.affected.get(&kind).cloned().unwrap_or_default();
                let row = state.values.entry(mode).or_default();
                row.insert(kind, value);
                let mut reported = vec![kind];
                for (other, moved_to) in dependencies {
                    row.insert(other, moved_to);
                    reported.push(other);
                }
                reported
            },
        )
        .await
    }

    fn begin_settings_batch(&self) {
        let mut state = self.state();
        state.calls.push(DeviceCall::BeginBatch);
        state.batch = Some(Vec::new());
    }

    fn stage_setting(&self, mode: CaptureMode, value: SettingValue) {
        let mut state = self.state();
        state.calls.push(DeviceCall::Stage(mode, value.kind()));
        if let Some(batch) = state.batch.as_mut() {
            batch.push((mode, value));
        }
    }

    async fn commit_settings_batch(&self) -> DeviceResult<()> {
        self.command(Command::CommitBatch, DeviceCall::CommitBatch, |state| {
            for (mode, value) in state.batch.take().unwrap_or_default() {
                state.values.entry(mode).or_default().insert(value.kind(), value);
            }
        })
        .await
    }

    async fn set_capture_mode(&self, mode: CaptureMode) -> DeviceResult<()> {
        self.command(
            Command::SetCaptureMode,
            DeviceCall::SetCaptureMode(mode),
            move |state| {
                state.reported_mode = mode;
            },
        )
        .await
    }

    fn start_preview_stream(&self, preview: PreviewType) -> PreviewStatusChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.calls.push(DeviceCall::StartPreview(preview));
        match state.preview {
            PreviewScript::Opens => {
                let _ = tx.send(PreviewStatus::Opening);
                let _ = tx.send(PreviewStatus::Opened);
                state.preview_status = Some(tx);
            }
            PreviewScript::Fails => {
                let _ = tx.send(PreviewStatus::Opening);
                let _ = tx.send(PreviewStatus::Error);
                state.preview_status = Some(tx);
            }
            PreviewScript::Disconnects => drop(tx),
        }
        rx
    }

    fn close_preview_stream(&self) {
        let mut state = self.state();
        state.calls.push(DeviceCall::ClosePreview);
        state.preview_status = None;
    }

    fn apply_stream_encode(&self) {
        self.state().calls.push(DeviceCall::ApplyStreamEncode);
    }

    fn is_h265_stream_encode(&self) -> bool {
        self.state().h265
    }

    fn set_camera_lock_screen(&self, locked: bool) {
        self.state().calls.push(DeviceCall::LockScreen(locked));
    }

    fn is_camera_working(&self) -> bool {
        self.state().working
    }

    fn is_sd_card_enabled(&self) -> bool {
        self.state().sd_card
    }

    async fn take_photo(&self, mode: CaptureMode) -> DeviceResult<()> {
        self.command(Command::TakePhoto, DeviceCall::TakePhoto(mode), |_| ())
            .await
    }

    async fn start_record(&self, mode: CaptureMode) -> DeviceResult<()> {
        self.command(Command::StartRecord, DeviceCall::StartRecord(mode), |state| {
            state.working = true;
        })
        .await
    }

    async fn stop_record(&self, mode: CaptureMode) -> DeviceResult<()> {
        self.command(Command::StopRecord, DeviceCall::StopRecord(mode), |state| {
            state.working = false;
        })
        .await
    }

    async fn start_live(&self, url: &str) -> DeviceResult<()> {
        self.command(
            Command::StartLive,
            DeviceCall::StartLive(url.to_string()),
            |state| {
                state.living = true;
            },
        )
        .await
    }

    fn stop_live(&self) {
        let mut state = self.state();
        state.calls.push(DeviceCall::StopLive);
        state.living = false;
    }
}

/// Shorthand for a bare native-coded value.
pub fn native(kind: SettingKind, code: i32) -> SettingValue {
    SettingValue::from_native(kind, code)
}
