//! Type-level contracts of the platform abstractions.
//! The recorder relies on these shapes; a change here is an API break.

#[test]
fn edge_from_level_maps_active_high() {
    use platform::Edge;
    assert_eq!(Edge::from_level(true), Edge::Pressed);
    assert_eq!(Edge::from_level(false), Edge::Released);
}

#[test]
fn small_enums_stay_one_byte() {
    // These cross channels and ISR boundaries by value.
    assert_eq!(core::mem::size_of::<platform::Edge>(), 1);
    assert_eq!(core::mem::size_of::<platform::CaptureFault>(), 1);
    assert_eq!(core::mem::size_of::<platform::OpenMode>(), 1);
    assert_eq!(core::mem::size_of::<platform::NameStyle>(), 1);
}

#[test]
fn capture_fault_labels() {
    use platform::CaptureFault;
    assert_eq!(CaptureFault::Overrun.as_str(), "overrun");
    assert_eq!(CaptureFault::Dma.to_string(), "dma error");
}

#[test]
fn volume_kind_labels() {
    use platform::VolumeKind;
    assert_eq!(VolumeKind::Fat.as_str(), "FAT");
    assert_eq!(VolumeKind::Host.as_str(), "host");
}

#[test]
fn cd_stereo_is_default_format() {
    use platform::AudioConfig;
    assert_eq!(AudioConfig::default(), AudioConfig::CD_STEREO);
    assert_eq!(AudioConfig::CD_STEREO.sample_rate, 44_100);
}
