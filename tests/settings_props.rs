//! Property-Based Tests for setting values and the settings cache
//!
//! These tests verify invariants of value ordering and of the cache's
//! dependency refresh using proptest for input generation and shrinking.

use crabcapture::cache::SettingsCache;
use crabcapture::settings::sort_by_native;
use crabcapture::testing::{native, MockDevice};
use crabcapture::{CaptureMode, SettingKind, SettingValue};
use proptest::prelude::*;

fn any_kind() -> impl Strategy<Value = SettingKind> {
    (0..SettingKind::ALL.len()).prop_map(|i| SettingKind::ALL[i])
}

fn any_mode() -> impl Strategy<Value = CaptureMode> {
    (0..CaptureMode::ALL.len()).prop_map(|i| CaptureMode::ALL[i])
}

const KINDS: [SettingKind; 5] = [
    SettingKind::Exposure,
    SettingKind::Iso,
    SettingKind::Shutter,
    SettingKind::WhiteBalance,
    SettingKind::Ev,
];

// ═══════════════════════════════════════════════════════════════════════════
// VALUE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: A value built for a kind reports that kind
    #[test]
    fn native_values_keep_their_kind(kind in any_kind(), code in 0i32..10_000) {
        let value = SettingValue::from_native(kind, code);
        prop_assert_eq!(value.kind(), kind);
        prop_assert_eq!(value.native_value(), i64::from(code));
    }

    /// INVARIANT: Sorting orders by native value and keeps every entry
    #[test]
    fn sorted_values_are_ordered(kind in any_kind(), codes in prop::collection::vec(0i32..500, 0..30)) {
        let mut values: Vec<SettingValue> =
            codes.iter().map(|&c| SettingValue::from_native(kind, c)).collect();
        sort_by_native(&mut values);

        prop_assert_eq!(values.len(), codes.len());
        for pair in values.windows(2) {
            prop_assert!(pair[0].native_value() <= pair[1].native_value());
        }
        let mut expected = codes.clone();
        expected.sort_unstable();
        let sorted: Vec<i64> = values.iter().map(SettingValue::native_value).collect();
        prop_assert_eq!(sorted, expected.into_iter().map(i64::from).collect::<Vec<_>>());
    }

    /// INVARIANT: Values of different kinds never compare
    #[test]
    fn cross_kind_values_are_unordered(a in any_kind(), b in any_kind(), x in 0i32..100, y in 0i32..100) {
        let left = SettingValue::from_native(a, x);
        let right = SettingValue::from_native(b, y);
        if a == b {
            prop_assert_eq!(left.partial_cmp(&right), Some(left.native_value().cmp(&right.native_value())));
        } else {
            prop_assert_eq!(left.partial_cmp(&right), None);
        }
    }

    /// INVARIANT: Every mode belongs to exactly one of photo, live and video
    #[test]
    fn modes_have_one_family(mode in any_mode()) {
        let families = [mode.is_photo_mode(), mode.is_live_mode(), mode.is_video_mode()];
        prop_assert_eq!(families.iter().filter(|f| **f).count(), 1);
        if mode.is_single_shot() {
            prop_assert!(mode.is_photo_mode());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// INVARIANT: A write refreshes the written kind and its reported
    /// dependencies, and nothing else in any mode
    #[test]
    fn write_touches_only_reported_kinds(
        written in 0..KINDS.len(),
        dependents in prop::collection::btree_set(0..KINDS.len(), 0..KINDS.len()),
        code in 2i32..50,
    ) {
        let photo = CaptureMode::CaptureNormal;
        let video = CaptureMode::RecordNormal;
        let kind = KINDS[written];

        let mut device = MockDevice::new().with_modes(&[photo, video], &KINDS);
        for &i in &dependents {
            device = device.with_dependency(kind, KINDS[i], native(KINDS[i], code + 1));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut cache = SettingsCache::build(&device, video);
        device.reset_counters();

        let report = runtime
            .block_on(cache.set(&device, video, kind, native(kind, code), None))
            .unwrap();

        prop_assert_eq!(report.checked[0], kind);
        let mut expected: Vec<SettingKind> = vec![kind];
        for &i in &dependents {
            if !expected.contains(&KINDS[i]) {
                expected.push(KINDS[i]);
            }
        }
        prop_assert_eq!(&report.checked, &expected);

        for other in KINDS {
            let reads = if expected.contains(&other) { 1 } else { 0 };
            prop_assert_eq!(device.reads(video, other), reads);
            prop_assert_eq!(device.reads(photo, other), 0);
            prop_assert_eq!(cache.peek(photo, other), Some(&native(other, 1)));
            prop_assert_eq!(
                cache.peek(video, other).copied(),
                device.device_value(video, other)
            );
        }
    }
}
