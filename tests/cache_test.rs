//! Settings cache behavior against the scripted camera

use crabcapture::cache::SettingsCache;
use crabcapture::invariants::{clear_invariant_log, contract_test};
use crabcapture::testing::{native, Command, DeviceCall, MockDevice};
use crabcapture::{CaptureMode, DeviceError, SessionError, SettingKind};
use std::sync::{Arc, Mutex};

const PHOTO: CaptureMode = CaptureMode::CaptureNormal;
const VIDEO: CaptureMode = CaptureMode::RecordNormal;

fn device() -> MockDevice {
    MockDevice::new().with_modes(
        &[PHOTO, VIDEO],
        &[SettingKind::Iso, SettingKind::Shutter, SettingKind::WhiteBalance],
    )
}

#[test]
fn test_build_covers_every_supported_entry() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    assert_eq!(cache.len(), 6);

    device.reset_counters();
    for mode in [PHOTO, VIDEO] {
        for kind in [SettingKind::Iso, SettingKind::Shutter, SettingKind::WhiteBalance] {
            assert_eq!(cache.get(&device, mode, kind).unwrap(), native(kind, 1));
        }
    }
    assert_eq!(device.total_reads(), 0);
}

#[test]
fn test_build_reads_current_mode_first() {
    let device = device().with_reported_mode(VIDEO);
    let _cache = SettingsCache::build(&device, VIDEO);
    // Each entry is read exactly once during construction.
    assert_eq!(device.reads(VIDEO, SettingKind::Iso), 1);
    assert_eq!(device.reads(PHOTO, SettingKind::Iso), 1);
}

#[test]
fn test_build_corrects_unsupported_mode() {
    let device = device().with_reported_mode(CaptureMode::Live);
    let cache = SettingsCache::build(&device, VIDEO);
    assert_eq!(cache.current_mode(), VIDEO);
    assert_eq!(cache.supported_modes(), &[PHOTO, VIDEO]);
}

#[test]
fn test_build_keeps_supported_reported_mode() {
    let device = device().with_reported_mode(PHOTO);
    let cache = SettingsCache::build(&device, VIDEO);
    assert_eq!(cache.current_mode(), PHOTO);
}

#[test]
fn test_unreadable_entry_falls_back_to_device() {
    let device = device();
    device.fail_read(VIDEO, SettingKind::WhiteBalance, DeviceError::Code(5));
    let mut cache = SettingsCache::build(&device, VIDEO);
    assert!(cache.peek(VIDEO, SettingKind::WhiteBalance).is_none());
    assert_eq!(cache.len(), 5);

    device.clear_read_failure(VIDEO, SettingKind::WhiteBalance);
    device.reset_counters();
    let value = cache.get(&device, VIDEO, SettingKind::WhiteBalance).unwrap();
    assert_eq!(value, native(SettingKind::WhiteBalance, 1));
    assert_eq!(device.reads(VIDEO, SettingKind::WhiteBalance), 1);

    // Stored after the first miss.
    cache.get(&device, VIDEO, SettingKind::WhiteBalance).unwrap();
    assert_eq!(device.reads(VIDEO, SettingKind::WhiteBalance), 1);
}

#[tokio::test]
async fn test_write_refreshes_reported_dependencies_only() {
    let device = device().with_dependency(
        SettingKind::Iso,
        SettingKind::Shutter,
        native(SettingKind::Shutter, 7),
    );
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.reset_counters();

    let report = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 100), None)
        .await
        .unwrap();

    assert_eq!(report.checked, vec![SettingKind::Iso, SettingKind::Shutter]);
    assert!(report.stale.is_empty());
    assert_eq!(device.reads(VIDEO, SettingKind::Iso), 1);
    assert_eq!(device.reads(VIDEO, SettingKind::Shutter), 1);
    assert_eq!(device.total_reads(), 2);

    assert_eq!(cache.peek(VIDEO, SettingKind::Iso), Some(&native(SettingKind::Iso, 100)));
    assert_eq!(cache.peek(VIDEO, SettingKind::Shutter), Some(&native(SettingKind::Shutter, 7)));
    assert_eq!(
        cache.peek(VIDEO, SettingKind::WhiteBalance),
        Some(&native(SettingKind::WhiteBalance, 1))
    );
    // The other mode's row is untouched.
    assert_eq!(cache.peek(PHOTO, SettingKind::Iso), Some(&native(SettingKind::Iso, 1)));
    assert_eq!(cache.peek(PHOTO, SettingKind::Shutter), Some(&native(SettingKind::Shutter, 1)));
}

#[tokio::test]
async fn test_duplicate_affected_kinds_are_read_once() {
    let device = device()
        .with_dependency(SettingKind::Iso, SettingKind::Shutter, native(SettingKind::Shutter, 2))
        .with_dependency(SettingKind::Iso, SettingKind::Iso, native(SettingKind::Iso, 100));
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.reset_counters();

    let report = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 100), None)
        .await
        .unwrap();
    assert_eq!(report.checked, vec![SettingKind::Iso, SettingKind::Shutter]);
    assert_eq!(device.reads(VIDEO, SettingKind::Iso), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_value() {
    let device = device().with_dependency(
        SettingKind::Iso,
        SettingKind::Shutter,
        native(SettingKind::Shutter, 7),
    );
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.fail_read(VIDEO, SettingKind::Shutter, DeviceError::Failed("busy".to_string()));

    let report = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 100), None)
        .await
        .unwrap();

    assert_eq!(report.stale.len(), 1);
    assert_eq!(report.stale[0].kind, SettingKind::Shutter);
    assert_eq!(report.stale[0].mode, VIDEO);
    assert_eq!(cache.peek(VIDEO, SettingKind::Shutter), Some(&native(SettingKind::Shutter, 1)));
    assert_eq!(cache.peek(VIDEO, SettingKind::Iso), Some(&native(SettingKind::Iso, 100)));
}

#[tokio::test]
async fn test_failed_write_leaves_cache_unchanged() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.fail_command(Command::SetSetting, DeviceError::Code(-3));
    device.reset_counters();

    let result = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 100), None)
        .await;
    assert_eq!(result, Err(SessionError::Device(DeviceError::Code(-3))));
    assert_eq!(cache.peek(VIDEO, SettingKind::Iso), Some(&native(SettingKind::Iso, 1)));
    assert_eq!(device.total_reads(), 0);
}

#[tokio::test]
async fn test_kind_mismatch_is_rejected_before_device() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.reset_counters();

    let result = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Shutter, 3), None)
        .await;
    assert_eq!(
        result,
        Err(SessionError::KindMismatch {
            expected: SettingKind::Iso,
            actual: SettingKind::Shutter,
        })
    );
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_checked_callback_receives_refreshed_kinds() {
    let device = device().with_dependency(
        SettingKind::Iso,
        SettingKind::Shutter,
        native(SettingKind::Shutter, 7),
    );
    let mut cache = SettingsCache::build(&device, VIDEO);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    cache
        .set(
            &device,
            VIDEO,
            SettingKind::Iso,
            native(SettingKind::Iso, 100),
            Some(Box::new(move |kinds: &[SettingKind]| sink.lock().unwrap().extend_from_slice(kinds))),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![SettingKind::Iso, SettingKind::Shutter]);
}

#[tokio::test]
async fn test_push_stages_every_supported_kind_in_one_batch() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.reset_counters();

    let staged = cache.push_to_device(&device, VIDEO).await.unwrap();
    assert_eq!(staged, 3);

    let calls = device.calls();
    assert_eq!(calls.first(), Some(&DeviceCall::BeginBatch));
    assert_eq!(calls.last(), Some(&DeviceCall::CommitBatch));
    assert_eq!(device.count_calls(&DeviceCall::CommitBatch), 1);
    for kind in [SettingKind::Iso, SettingKind::Shutter, SettingKind::WhiteBalance] {
        assert_eq!(device.count_calls(&DeviceCall::Stage(VIDEO, kind)), 1);
    }
    assert_eq!(device.total_reads(), 0);
}

#[tokio::test]
async fn test_push_reasserts_cached_values_over_device_reset() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    device.set_device_value(VIDEO, native(SettingKind::Iso, 9));

    cache.push_to_device(&device, VIDEO).await.unwrap();
    assert_eq!(device.device_value(VIDEO, SettingKind::Iso), Some(native(SettingKind::Iso, 1)));
}

#[tokio::test]
async fn test_capture_mode_moves_only_on_success() {
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);

    device.fail_command(Command::SetCaptureMode, DeviceError::Code(1));
    assert!(cache.set_capture_mode(&device, PHOTO).await.is_err());
    assert_eq!(cache.current_mode(), VIDEO);

    device.clear_failure(Command::SetCaptureMode);
    cache.set_capture_mode(&device, PHOTO).await.unwrap();
    assert_eq!(cache.current_mode(), PHOTO);
    assert_eq!(device.device_mode(), PHOTO);
}

#[test]
fn test_supported_values_are_sorted() {
    let device = MockDevice::new();
    let cache = SettingsCache::build(&device, VIDEO);
    let values = cache.supported_values(&device, VIDEO, SettingKind::Iso);
    let natives: Vec<i64> = values.iter().map(|v| v.native_value()).collect();
    assert_eq!(natives, vec![1, 2, 3]);
}

#[tokio::test]
async fn contract_settings_cache() {
    clear_invariant_log();
    let device = device();
    let mut cache = SettingsCache::build(&device, VIDEO);
    cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 2), None)
        .await
        .unwrap();

    contract_test(
        "settings cache",
        &[
            "Every supported setting is cached or reported unreadable",
            "Every checked kind is refreshed or reported stale",
        ],
    );
}

#[tokio::test]
async fn contract_settings_cache_with_unreadable_entries() {
    clear_invariant_log();
    let device = device().with_dependency(
        SettingKind::Iso,
        SettingKind::Shutter,
        native(SettingKind::Shutter, 4),
    );
    device.fail_read(PHOTO, SettingKind::WhiteBalance, DeviceError::Code(5));
    let mut cache = SettingsCache::build(&device, VIDEO);
    assert_eq!(cache.len(), 5);

    device.fail_read(VIDEO, SettingKind::Shutter, DeviceError::Code(6));
    let report = cache
        .set(&device, VIDEO, SettingKind::Iso, native(SettingKind::Iso, 3), None)
        .await
        .unwrap();
    assert_eq!(report.checked, vec![SettingKind::Iso, SettingKind::Shutter]);
    assert_eq!(report.stale.len(), 1);

    contract_test(
        "settings cache with unreadable entries",
        &[
            "Every supported setting is cached or reported unreadable",
            "Every checked kind is refreshed or reported stale",
        ],
    );
}
