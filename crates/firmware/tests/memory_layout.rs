//! Linker script checks.
//!
//! `memory.x` is embedded at compile time so these run on the host. They
//! catch regions that drift away from the constants the firmware uses.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]

use firmware::storage::{COUNTER_FLASH_OFFSET, FLASH_SECTOR_BYTES};

const MEMORY_X: &str = include_str!("../../../memory.x");

/// `(origin, length_bytes)` of a MEMORY region, parsed from `memory.x`.
fn region(name: &str) -> Option<(u32, u32)> {
    let line = MEMORY_X.lines().find(|l| l.trim_start().starts_with(name) && l.contains("ORIGIN"))?;
    let origin = line.split("ORIGIN =").nth(1)?.split(',').next()?.trim();
    let origin = u32::from_str_radix(origin.trim_start_matches("0x"), 16).ok()?;
    let length = line.split("LENGTH =").nth(1)?.trim();
    let length = length.strip_suffix('K')?.parse::<u32>().ok()? * 1024;
    Some((origin, length))
}

const FLASH_BASE: u32 = 0x0800_0000;

#[test]
fn counter_region_matches_firmware_offset() {
    let (origin, length) = region("COUNTER").expect("COUNTER region missing");
    assert_eq!(origin, FLASH_BASE + COUNTER_FLASH_OFFSET);
    assert_eq!(length, FLASH_SECTOR_BYTES);
}

#[test]
fn program_flash_stops_before_the_counter_sector() {
    let (origin, length) = region("FLASH").expect("FLASH region missing");
    assert_eq!(origin, FLASH_BASE);
    assert_eq!(origin + length, FLASH_BASE + COUNTER_FLASH_OFFSET);
}

#[test]
fn dma_rings_live_in_axi_sram() {
    let (origin, length) = region("AXISRAM").expect("AXISRAM region missing");
    assert_eq!(origin, platform::dma_safety::AXI_SRAM_BASE);
    assert_eq!(length as usize, platform::dma_safety::AXI_SRAM_SIZE_BYTES);
    assert!(MEMORY_X.contains(".axisram (NOLOAD)"));
    assert!(MEMORY_X.contains("} > AXISRAM"));
}

#[test]
fn ram_is_dtcm() {
    let (origin, _) = region("RAM").expect("RAM region missing");
    assert_eq!(origin, 0x2000_0000);
}

#[test]
fn sai_rings_are_placed_in_axisram() {
    let sai = include_str!("../src/audio/sai.rs");
    assert_eq!(sai.matches("#[link_section = \".axisram\"]").count(), 2);
}

#[test]
fn hardfault_handler_is_defined() {
    assert!(firmware::exception_handlers::HARDFAULT_DEFINED);
}
