use super::preview::{await_open, PreviewMonitor};
use super::types::{
    CaptureAction, InitStep, PipelineEvent, PipelineEvents, PipelineState, SessionSignal, SwitchEvent,
    SwitchEvents,
};
use crate::cache::{CheckedCallback, SettingsCache, WriteReport};
use crate::callback::DeviceResult;
use crate::config::CrabCaptureConfig;
use crate::device::DeviceFacade;
use crate::errors::{DeviceError, SessionError};
use crate::network::{NetworkBinder, NetworkBinding};
use crate::settings::{SettingKind, SettingValue};
use crate::types::{CaptureMode, PreviewStatus};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything that talks to the device lives behind one async mutex, which
/// makes it the camera's serial command channel.
#[derive(Default)]
struct Session {
    cache: Option<SettingsCache>,
    legacy: bool,
    screen_locked: bool,
    live_pushing: bool,
    preview: PreviewState,
}

#[derive(Default)]
struct PreviewState {
    started: bool,
    monitor: Option<PreviewMonitor>,
}

impl PreviewState {
    fn status(&self) -> PreviewStatus {
        self.monitor
            .as_ref()
            .map_or(PreviewStatus::Idle, PreviewMonitor::status)
    }
}

/// Why a pipeline run stopped early.
enum Abort {
    /// The session was torn down; nothing more may be applied or emitted.
    Cancelled,
    Failed,
}

/// One `initialize` run, tied to the generation it was started in.
struct PipelineRun<'a> {
    orchestrator: &'a SessionOrchestrator,
    generation: u64,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineRun<'_> {
    fn enter(&self, next: PipelineState, progress: Option<InitStep>) -> Result<(), Abort> {
        if !self.orchestrator.transition(self.generation, next) {
            return Err(Abort::Cancelled);
        }
        if let Some(step) = progress {
            let _ = self.events.send(PipelineEvent::Progress(step));
        }
        Ok(())
    }

    fn fail(&self, step: InitStep, reason: impl Display) -> Abort {
        if !self
            .orchestrator
            .transition(self.generation, PipelineState::Failed(step))
        {
            return Abort::Cancelled;
        }
        log::error!(
            "[{}] capture initialization failed at {:?}: {}",
            self.orchestrator.id,
            step,
            reason
        );
        let _ = self.events.send(PipelineEvent::Failed(step));
        Abort::Failed
    }

    fn fail_device(&self, step: InitStep, error: DeviceError) -> Abort {
        self.orchestrator.note_device_error(&error);
        self.fail(step, error)
    }
}

/// Drives a connected camera into a controllable capture state and owns the
/// session's settings cache.
pub struct SessionOrchestrator {
    id: Uuid,
    device: Arc<dyn DeviceFacade>,
    network: Arc<dyn NetworkBinder>,
    config: CrabCaptureConfig,
    session: tokio::sync::Mutex<Session>,
    state: Mutex<PipelineState>,
    generation: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    signals: broadcast::Sender<SessionSignal>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionOrchestrator {
    pub fn new(
        device: Arc<dyn DeviceFacade>,
        network: Arc<dyn NetworkBinder>,
        config: CrabCaptureConfig,
    ) -> Arc<Self> {
        let (signals, _) = broadcast::channel(16);
        let id = Uuid::new_v4();
        log::debug!("[{}] capture session created", id);
        Arc::new(Self {
            id,
            device,
            network,
            config,
            session: tokio::sync::Mutex::new(Session::default()),
            state: Mutex::new(PipelineState::NotStarted),
            generation: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
            signals,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    /// Start the initialization pipeline.
    ///
    /// Allowed from `NotStarted` or after a failure; a failed pipeline is
    /// never resumed, it always runs again from the first step.
    pub fn initialize(self: &Arc<Self>) -> Result<PipelineEvents, SessionError> {
        let generation = {
            let mut state = lock(&self.state);
            if !state.can_start() {
                return Err(SessionError::AlreadyInitialized);
            }
            *state = PipelineState::CheckingSensor;
            self.generation.load(Ordering::SeqCst)
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(PipelineEvent::Started);
        log::info!("[{}] starting capture initialization", self.id);

        let this = Arc::clone(self);
        self.track(tokio::spawn(async move {
            this.run_pipeline(generation, tx).await;
        }));
        Ok(rx)
    }

    /// Switch to the `index`-th supported capture mode.
    pub fn switch_mode(self: &Arc<Self>, index: usize) -> SwitchEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SwitchEvent::Started);

        if self.state() != PipelineState::Ready {
            log::warn!("[{}] mode switch requested before session is ready", self.id);
            let _ = tx.send(SwitchEvent::Failed);
            return rx;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let this = Arc::clone(self);
        self.track(tokio::spawn(async move {
            this.run_switch(generation, index, tx).await;
        }));
        rx
    }

    /// Current-mode value of `kind`, served from the cache.
    pub async fn get_setting(&self, kind: SettingKind) -> Result<SettingValue, SessionError> {
        let mut session = self.session.lock().await;
        let cache = session.cache.as_mut().ok_or(SessionError::NotReady)?;
        let mode = cache.current_mode();
        cache
            .get(&*self.device, mode, kind)
            .map_err(|e| self.session_error(e))
    }

    /// Write `value` in the current mode. Queued behind any command already
    /// in flight, including another write's dependency refresh.
    pub async fn set_setting(
        &self,
        kind: SettingKind,
        value: SettingValue,
        on_checked: Option<CheckedCallback>,
    ) -> Result<WriteReport, SessionError> {
        let mut session = self.session.lock().await;
        let cache = session.cache.as_mut().ok_or(SessionError::NotReady)?;
        let mode = cache.current_mode();
        let result = cache
            .set(&*self.device, mode, kind, value, on_checked)
            .await;
        if matches!(result, Err(SessionError::ConnectionLost)) {
            self.note_device_error(&DeviceError::ConnectionLost);
        }
        result
    }

    /// Legal values of `kind` in the current mode, sorted for display.
    pub async fn supported_values(
        &self,
        kind: SettingKind,
    ) -> Result<Vec<SettingValue>, SessionError> {
        let session = self.session.lock().await;
        let cache = session.cache.as_ref().ok_or(SessionError::NotReady)?;
        Ok(cache.supported_values(&*self.device, cache.current_mode(), kind))
    }

    pub async fn current_mode(&self) -> Option<CaptureMode> {
        let session = self.session.lock().await;
        session.cache.as_ref().map(SettingsCache::current_mode)
    }

    pub async fn supported_modes(&self) -> Vec<CaptureMode> {
        let session = self.session.lock().await;
        session
            .cache
            .as_ref()
            .map(|cache| cache.supported_modes().to_vec())
            .unwrap_or_default()
    }

    pub async fn preview_status(&self) -> PreviewStatus {
        self.session.lock().await.preview.status()
    }

    /// Act on one shutter press in the current capture mode.
    ///
    /// Single-shot photo modes take a photo. Live modes start or stop the
    /// live push. Every other mode starts or stops recording depending on
    /// whether the camera is already working.
    pub async fn start_capture(&self) -> Result<CaptureAction, SessionError> {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        let mode = session
            .cache
            .as_ref()
            .map(SettingsCache::current_mode)
            .ok_or(SessionError::NotReady)?;
        let device = &*self.device;

        let action = match mode {
            CaptureMode::CaptureNormal
            | CaptureMode::HdrCapture
            | CaptureMode::NightScene
            | CaptureMode::Burst => {
                device
                    .take_photo(mode)
                    .await
                    .map_err(|e| self.session_error(e))?;
                CaptureAction::PhotoTaken
            }
            CaptureMode::Live | CaptureMode::LiveAnimation => {
                if session.live_pushing {
                    device.stop_live();
                    session.live_pushing = false;
                    CaptureAction::LiveStopped
                } else {
                    let url = &self.config.live.rtmp_url;
                    if url.is_empty() {
                        log::warn!("[{}] live push requested without an RTMP url", self.id);
                        return Err(SessionError::LiveUrlMissing);
                    }
                    device
                        .start_live(url)
                        .await
                        .map_err(|e| self.session_error(e))?;
                    session.live_pushing = true;
                    CaptureAction::LiveStarted
                }
            }
            CaptureMode::IntervalShooting
            | CaptureMode::StarlapseShooting
            | CaptureMode::RecordNormal
            | CaptureMode::BulletTime
            | CaptureMode::Timelapse
            | CaptureMode::HdrRecord
            | CaptureMode::TimeShift
            | CaptureMode::LooperRecording
            | CaptureMode::SuperRecord
            | CaptureMode::SlowMotion
            | CaptureMode::SelfieRecord
            | CaptureMode::PureRecord => {
                if device.is_camera_working() {
                    device
                        .stop_record(mode)
                        .await
                        .map_err(|e| self.session_error(e))?;
                    CaptureAction::RecordingStopped
                } else {
                    if !device.is_sd_card_enabled() {
                        log::warn!("[{}] recording refused, SD card unavailable", self.id);
                        let _ = self.signals.send(SessionSignal::SdCardDisabled);
                        return Err(SessionError::SdCardDisabled);
                    }
                    device
                        .start_record(mode)
                        .await
                        .map_err(|e| self.session_error(e))?;
                    CaptureAction::RecordingStarted
                }
            }
        };

        log::info!("[{}] {:?} in {}", self.id, action, mode);
        Ok(action)
    }

    /// Legacy firmware resets stream and capture parameters once a capture
    /// finishes; bring the preview and the device back in line with the cache.
    pub async fn after_capture_finished(&self) -> Result<(), SessionError> {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        let cache = session.cache.as_mut().ok_or(SessionError::NotReady)?;
        if !session.legacy || !self.config.session.reassert_after_capture {
            return Ok(());
        }

        let device = &*self.device;
        let mode = cache.current_mode();
        // Recording and sequence modes restart the stream on this firmware.
        if !mode.is_live_mode() && !mode.is_single_shot() {
            self.reopen_preview(&mut session.preview)
                .await
                .map_err(|e| self.session_error(e))?;
            let _ = self.signals.send(SessionSignal::RestartPreview);
            return Ok(());
        }

        if mode.is_photo_mode() {
            // Some firmware flips the preview codec while taking a photo.
            let was_h265 = device.is_h265_stream_encode();
            if let Err(e) = device.fetch_all_options().await {
                if e.is_connection_lost() {
                    return Err(self.session_error(e));
                }
                log::warn!("[{}] option refresh after capture failed: {}", self.id, e);
            }
            if device.is_h265_stream_encode() != was_h265 {
                log::info!("[{}] preview encoding changed during capture", self.id);
                self.reopen_preview(&mut session.preview)
                    .await
                    .map_err(|e| self.session_error(e))?;
                let _ = self.signals.send(SessionSignal::RestartPreview);
            }
        }

        if session.preview.status() == PreviewStatus::Opened {
            cache
                .push_to_device(device, mode)
                .await
                .map_err(|e| self.session_error(e))?;
        }
        Ok(())
    }

    /// End the session: cancel pending work, release the device and drop the
    /// cache. Late completions of already-issued commands are discarded.
    pub async fn shutdown(&self) {
        {
            let mut state = lock(&self.state);
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = PipelineState::NotStarted;
        }
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }

        let mut session = self.session.lock().await;
        self.release(&mut session);
        log::info!("[{}] capture session shut down", self.id);
    }

    fn release(&self, session: &mut Session) {
        if session.live_pushing {
            self.device.stop_live();
            session.live_pushing = false;
        }
        if session.preview.started {
            session.preview.monitor = None;
            session.preview.started = false;
            self.device.close_preview_stream();
        }
        if session.screen_locked {
            self.device.set_camera_lock_screen(false);
            session.screen_locked = false;
        }
        session.cache = None;
        session.legacy = false;
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Apply `next` unless the session was torn down since `generation`.
    fn transition(&self, generation: u64, next: PipelineState) -> bool {
        let mut state = lock(&self.state);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        log::info!("[{}] pipeline {:?} -> {:?}", self.id, *state, next);
        *state = next;
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        let _state = lock(&self.state);
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn note_device_error(&self, error: &DeviceError) {
        if error.is_connection_lost() {
            log::error!("[{}] camera connection lost", self.id);
            let _ = self.signals.send(SessionSignal::ConnectionLost);
        }
    }

    fn session_error(&self, error: DeviceError) -> SessionError {
        self.note_device_error(&error);
        error.into()
    }

    async fn run_pipeline(
        self: Arc<Self>,
        generation: u64,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) {
        let mut session = self.session.lock().await;
        let run = PipelineRun {
            orchestrator: &self,
            generation,
            events,
        };
        if !self.is_current(generation) {
            return;
        }
        // A previous failed run may have left a stream or lock behind.
        self.release(&mut session);

        match self.drive_pipeline(&mut session, &run).await {
            Ok(()) => {}
            Err(Abort::Failed) => self.release(&mut session),
            Err(Abort::Cancelled) => {
                log::debug!("[{}] pipeline run cancelled", self.id);
            }
        }
    }

    async fn drive_pipeline(
        &self,
        session: &mut Session,
        run: &PipelineRun<'_>,
    ) -> Result<(), Abort> {
        let device = &*self.device;

        if self.config.session.lock_camera_screen {
            device.set_camera_lock_screen(true);
            session.screen_locked = true;
        }

        run.enter(PipelineState::CheckingSensor, Some(InitStep::CheckSensor))?;
        self.check_sensor()
            .await
            .map_err(|e| run.fail_device(InitStep::CheckSensor, e))?;

        run.enter(PipelineState::FetchingOptions, Some(InitStep::FetchCameraOptions))?;
        device
            .fetch_all_options()
            .await
            .map_err(|e| run.fail_device(InitStep::FetchCameraOptions, e))?;

        run.enter(PipelineState::BindingNetwork, None)?;
        let handle = device
            .current_camera_network_handle()
            .ok_or_else(|| run.fail(InitStep::InitSupportConfig, "camera network unavailable"))?;
        let binding = NetworkBinding::bind(&*self.network, handle)
            .map_err(|e| run.fail(InitStep::InitSupportConfig, e))?;

        run.enter(
            PipelineState::InitializingSupportConfig,
            Some(InitStep::InitSupportConfig),
        )?;
        let support_config = device.init_support_config().await;
        drop(binding);
        support_config.map_err(|e| run.fail_device(InitStep::InitSupportConfig, e))?;
        session.legacy = !device.supports_new_capture_control_flow();

        run.enter(PipelineState::BuildingCache, None)?;
        let mut cache = SettingsCache::build(device, self.config.session.default_capture_mode);

        run.enter(PipelineState::OpeningPreview, Some(InitStep::OpenPreviewStream))?;
        self.open_preview(&mut session.preview)
            .await
            .map_err(|e| run.fail_device(InitStep::OpenPreviewStream, e))?;

        if session.legacy {
            run.enter(PipelineState::PushingCachedSettings, None)?;
            let mode = cache.current_mode();
            if let Err(e) = cache.push_to_device(device, mode).await {
                self.note_device_error(&e);
                log::warn!("[{}] reasserting cached settings failed: {}", self.id, e);
            }
        }

        // Opening the stream can change device-side values such as the codec.
        run.enter(PipelineState::RefetchingOptions, None)?;
        if let Err(e) = device.fetch_all_options().await {
            self.note_device_error(&e);
            log::warn!("[{}] option refresh after preview open failed: {}", self.id, e);
        }
        cache.refresh_supported_modes(device);

        let modes = cache.supported_modes().to_vec();
        let current_mode = cache.current_mode();
        session.cache = Some(cache);
        run.enter(PipelineState::Ready, None)?;
        let _ = run.events.send(PipelineEvent::Succeeded {
            modes,
            current_mode,
        });
        Ok(())
    }

    async fn check_sensor(&self) -> DeviceResult<()> {
        if self.device.current_sensor_mode() == crate::types::SensorMode::Panorama {
            log::debug!("[{}] sensor already panoramic", self.id);
            return Ok(());
        }
        self.device.switch_to_panoramic_sensor().await
    }

    async fn open_preview(&self, preview: &mut PreviewState) -> DeviceResult<()> {
        preview.monitor = None;
        let mut channel = self
            .device
            .start_preview_stream(self.config.preview.preview_type);
        preview.started = true;
        await_open(&mut channel).await?;
        self.device.apply_stream_encode();
        preview.monitor = Some(PreviewMonitor::spawn(channel, self.signals.clone(), self.id));
        log::info!("[{}] preview stream opened", self.id);
        Ok(())
    }

    async fn reopen_preview(&self, preview: &mut PreviewState) -> DeviceResult<()> {
        preview.monitor = None;
        self.device.close_preview_stream();
        preview.started = false;
        self.open_preview(preview).await
    }

    async fn run_switch(
        self: Arc<Self>,
        generation: u64,
        index: usize,
        events: mpsc::UnboundedSender<SwitchEvent>,
    ) {
        let mut guard = self.session.lock().await;
        if !self.is_current(generation) {
            return;
        }
        let session = &mut *guard;
        let outcome = match session.cache.as_mut() {
            Some(cache) => self.switch_to_index(cache, session.legacy, index).await,
            None => Err(SessionError::NotReady),
        };

        if !self.is_current(generation) {
            return;
        }
        let event = match outcome {
            Ok(()) => SwitchEvent::Succeeded,
            Err(e) => {
                log::warn!("[{}] capture mode switch failed: {}", self.id, e);
                SwitchEvent::Failed
            }
        };
        let _ = events.send(event);
    }

    async fn switch_to_index(
        &self,
        cache: &mut SettingsCache,
        legacy: bool,
        index: usize,
    ) -> Result<(), SessionError> {
        let modes = cache.supported_modes();
        let mode = *modes.get(index).ok_or(SessionError::InvalidModeIndex {
            index,
            available: modes.len(),
        })?;

        let device = &*self.device;
        cache
            .set_capture_mode(device, mode)
            .await
            .map_err(|e| self.session_error(e))?;

        if legacy {
            if let Err(e) = cache.push_to_device(device, mode).await {
                self.note_device_error(&e);
                log::warn!("[{}] reasserting settings for {} failed: {}", self.id, mode, e);
            }
        }
        Ok(())
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        if let Ok(mut session) = self.session.try_lock() {
            self.release(&mut session);
        }
    }
}
