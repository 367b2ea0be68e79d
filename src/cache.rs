//! Offline settings cache.
//!
//! Local mirror of `(CaptureMode, SettingKind) -> SettingValue` built once
//! per capture session. Reads are served locally; writes go to the device and
//! every kind the device reports as affected is re-read, so a write that
//! silently perturbs other settings never leaves the mirror behind.

use crate::assert_invariant;
use crate::callback::DeviceResult;
use crate::device::DeviceFacade;
use crate::errors::{DependencyRefreshFailure, SessionError};
use crate::settings::{sort_by_native, SettingKind, SettingValue};
use crate::types::CaptureMode;
use std::collections::HashMap;

/// Invoked once per write with every kind that was refreshed.
pub type CheckedCallback = Box<dyn FnOnce(&[SettingKind]) + Send>;

/// Result of a single cache write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Requested kind followed by the device's affected kinds, de-duplicated.
    pub checked: Vec<SettingKind>,
    /// Kinds whose re-read failed; their entries keep the pre-write value.
    pub stale: Vec<DependencyRefreshFailure>,
}

#[derive(Debug)]
pub struct SettingsCache {
    entries: HashMap<CaptureMode, HashMap<SettingKind, SettingValue>>,
    supported_modes: Vec<CaptureMode>,
    current_mode: CaptureMode,
}

impl SettingsCache {
    /// Populate the cache from the device's already-fetched option state.
    ///
    /// The device's own current values are trusted. The reported capture mode
    /// is not: some firmware reports a default mode that cannot actually be
    /// switched to, so anything outside the supported list becomes
    /// `default_mode`.
    pub fn build(device: &dyn DeviceFacade, default_mode: CaptureMode) -> Self {
        let supported_modes = device.supported_capture_modes();
        let reported = device.current_capture_mode();
        let current_mode = if supported_modes.contains(&reported) {
            reported
        } else {
            log::warn!(
                "device reported unsupported capture mode {}, correcting to {}",
                reported,
                default_mode
            );
            default_mode
        };

        let mut cache = Self {
            entries: HashMap::new(),
            supported_modes,
            current_mode,
        };

        let mut modes = vec![current_mode];
        modes.extend(
            cache
                .supported_modes
                .iter()
                .copied()
                .filter(|mode| *mode != current_mode),
        );

        let mut unreadable = Vec::new();
        for &mode in &modes {
            let row = cache.entries.entry(mode).or_default();
            for kind in device.supported_settings(mode) {
                match device.get_setting(mode, kind) {
                    Ok(value) => {
                        row.insert(kind, value);
                    }
                    Err(e) => {
                        // Left empty; the first read goes to the device.
                        log::warn!("could not read {} for {} while building cache: {}", kind, mode, e);
                        unreadable.push((mode, kind));
                    }
                }
            }
        }
        assert_invariant!(
            modes.iter().all(|&mode| {
                device
                    .supported_settings(mode)
                    .into_iter()
                    .all(|kind| cache.peek(mode, kind).is_some() || unreadable.contains(&(mode, kind)))
            }),
            "Every supported setting is cached or reported unreadable",
            "SettingsCache::build"
        );

        log::info!(
            "settings cache built: {} modes, {} entries, current mode {}",
            cache.entries.len(),
            cache.len(),
            cache.current_mode
        );
        cache
    }

    pub fn current_mode(&self) -> CaptureMode {
        self.current_mode
    }

    pub fn supported_modes(&self) -> &[CaptureMode] {
        &self.supported_modes
    }

    /// Re-read the supported mode list after the device refreshed its
    /// options. The active mode only moves through `set_capture_mode`.
    pub fn refresh_supported_modes(&mut self, device: &dyn DeviceFacade) {
        let modes = device.supported_capture_modes();
        if modes != self.supported_modes {
            log::info!(
                "supported capture modes changed: {:?} -> {:?}",
                self.supported_modes,
                modes
            );
            self.supported_modes = modes;
        }
    }

    /// Total number of cached `(mode, kind)` entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value without falling back to the device.
    pub fn peek(&self, mode: CaptureMode, kind: SettingKind) -> Option<&SettingValue> {
        self.entries.get(&mode).and_then(|row| row.get(&kind))
    }

    /// Cache-aside read: a missing entry costs one device read and is stored.
    pub fn get(
        &mut self,
        device: &dyn DeviceFacade,
        mode: CaptureMode,
        kind: SettingKind,
    ) -> DeviceResult<SettingValue> {
        if let Some(value) = self.peek(mode, kind) {
            return Ok(*value);
        }

        log::debug!("cache miss for {} in {}, reading from device", kind, mode);
        let value = device.get_setting(mode, kind)?;
        self.entries.entry(mode).or_default().insert(kind, value);
        Ok(value)
    }

    /// Write one value and refresh every kind the device reports as affected.
    ///
    /// On a failed write nothing in the cache changes. A failed re-read
    /// leaves that entry at its previous value and is reported in
    /// [`WriteReport::stale`].
    pub async fn set(
        &mut self,
        device: &dyn DeviceFacade,
        mode: CaptureMode,
        kind: SettingKind,
        value: SettingValue,
        on_checked: Option<CheckedCallback>,
    ) -> Result<WriteReport, SessionError> {
        if value.kind() != kind {
            return Err(SessionError::KindMismatch {
                expected: kind,
                actual: value.kind(),
            });
        }

        log::debug!("writing {} in {}", value, mode);
        let affected = device.set_setting(mode, value).await?;

        let mut checked = Vec::with_capacity(affected.len() + 1);
        checked.push(kind);
        for other in affected {
            if !checked.contains(&other) {
                checked.push(other);
            }
        }

        let mut refreshed_count = 0;
        let mut stale = Vec::new();
        let row = self.entries.entry(mode).or_default();
        for &refreshed in &checked {
            match device.get_setting(mode, refreshed) {
                Ok(fresh) => {
                    log::debug!("refreshed {} in {}", fresh, mode);
                    row.insert(refreshed, fresh);
                    refreshed_count += 1;
                }
                Err(source) => {
                    let failure = DependencyRefreshFailure {
                        mode,
                        kind: refreshed,
                        source,
                    };
                    log::warn!("{}; keeping cached value", failure);
                    stale.push(failure);
                }
            }
        }

        assert_invariant!(
            refreshed_count + stale.len() == checked.len(),
            "Every checked kind is refreshed or reported stale",
            "SettingsCache::set"
        );

        if let Some(callback) = on_checked {
            callback(&checked);
        }

        Ok(WriteReport { checked, stale })
    }

    /// Switch the device's capture mode; the active row only moves once the
    /// device acknowledges.
    pub async fn set_capture_mode(
        &mut self,
        device: &dyn DeviceFacade,
        mode: CaptureMode,
    ) -> DeviceResult<()> {
        device.set_capture_mode(mode).await?;
        log::info!("capture mode switched {} -> {}", self.current_mode, mode);
        self.current_mode = mode;
        Ok(())
    }

    /// Reassert every cached value of `mode` in one batch transaction.
    ///
    /// Used for firmware that resets parameters when the preview opens.
    /// Returns the number of values staged.
    pub async fn push_to_device(
        &mut self,
        device: &dyn DeviceFacade,
        mode: CaptureMode,
    ) -> DeviceResult<usize> {
        let kinds = device.supported_settings(mode);
        device.begin_settings_batch();
        let mut staged = 0;
        for kind in kinds {
            match self.get(device, mode, kind) {
                Ok(value) => {
                    log::debug!("staging {} for {}", value, mode);
                    device.stage_setting(mode, value);
                    staged += 1;
                }
                Err(e) => log::warn!("skipping {} in batch for {}: {}", kind, mode, e),
            }
        }
        device.commit_settings_batch().await?;
        log::info!("pushed {} cached settings for {}", staged, mode);
        Ok(staged)
    }

    /// Legal values for `(mode, kind)` sorted by native ordinal.
    pub fn supported_values(
        &self,
        device: &dyn DeviceFacade,
        mode: CaptureMode,
        kind: SettingKind,
    ) -> Vec<SettingValue> {
        let mut values = device.supported_values(mode, kind);
        sort_by_native(&mut values);
        values
    }
}
