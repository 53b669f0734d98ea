// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use relaycam::constants::{BitratePreset, format_bitrate, virtual_camera};

#[test]
fn test_bitrate_preset_values() {
    // Test that all presets exist (Low, Medium, High)
    assert_eq!(BitratePreset::ALL.len(), 3);
}

#[test]
fn test_bitrate_preset_ordering() {
    // Test that presets are ordered from lowest to highest quality
    let mut prev_bitrate = 0u32;
    for preset in BitratePreset::ALL {
        let bitrate = preset.bitrate_kbps(1920);
        assert!(
            bitrate >= prev_bitrate,
            "Presets should be ordered from lowest to highest"
        );
        prev_bitrate = bitrate;
    }
}

#[test]
fn test_bitrate_scales_with_resolution() {
    // Higher resolution should have higher bitrate at same preset
    let sd_bitrate = BitratePreset::Medium.bitrate_kbps(virtual_camera::WIDTH);
    let hd_bitrate = BitratePreset::Medium.bitrate_kbps(1280);
    let fhd_bitrate = BitratePreset::Medium.bitrate_kbps(1920);
    let uhd_bitrate = BitratePreset::Medium.bitrate_kbps(3840);

    assert!(sd_bitrate < hd_bitrate);
    assert!(hd_bitrate < fhd_bitrate);
    assert!(fhd_bitrate < uhd_bitrate);
}

#[test]
fn test_bitrate_preset_display_names() {
    // Test that all presets have non-empty display names
    for preset in BitratePreset::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_bitrate_preset_parses_cli_names() {
    assert_eq!("low".parse::<BitratePreset>(), Ok(BitratePreset::Low));
    assert_eq!("HIGH".parse::<BitratePreset>(), Ok(BitratePreset::High));
    assert!("ultra".parse::<BitratePreset>().is_err());
}

#[test]
fn test_bitrate_preset_describe_uses_effective_rate() {
    assert_eq!(BitratePreset::Medium.describe(1280), "Medium (5 Mbps)");
    assert_eq!(BitratePreset::Low.describe(virtual_camera::WIDTH), "Low (1 Mbps)");
    assert_eq!(BitratePreset::High.describe(3840), "High (50 Mbps)");
}

#[test]
fn test_format_bitrate() {
    assert_eq!(format_bitrate(8_000), "8 Mbps");
    assert_eq!(format_bitrate(2_500), "2.5 Mbps");
}
