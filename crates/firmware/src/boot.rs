//! Hardware boot sequence for the field recorder.
//!
//! Initialization order (MUST be respected):
//!   1. RCC: PLL1 system clock, PLL1Q kernel clock for SPI2 and SAI
//!   2. IWDG armed before anything that can hang (SD init, SAI sync)
//!   3. `.axisram` DMA rings zeroed (NOLOAD section, undefined at reset)
//!   4. Rotation counter read back from its flash sector
//!   5. SD card wired on SPI2; the card itself is probed lazily by the owner
//!   6. SAI capture and monitor blocks started as clock slaves of the codec
//!   7. Tasks spawned; the main loop feeds the watchdog and logs diagnostics
//!
//! The codec drives bit clock and frame sync, so no audio PLL is configured.

/// Ordered list of boot sequence steps for documentation and testing.
///
/// Tests assert that the watchdog is armed before any peripheral that can
/// stall and that task spawning comes last.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. RCC: HSI -> PLL1 400 MHz sys, PLL1Q 200 MHz kernel clock (SPI2, SAI1, SAI2)",
    "2. IWDG: watchdog armed with WATCHDOG_TIMEOUT_MS",
    "3. AXI SRAM: zero the SAI DMA rings before handing them to DMA",
    "4. Flash: rotation counter sector at COUNTER_FLASH_OFFSET",
    "5. SPI2: SD card at SD_INIT_FREQ_HZ, raised to SD_RUN_FREQ_HZ after init",
    "6. SAI: block A capture + monitor transmitter, slave to codec clocks",
    "7. Spawn: capture, storage owner and button tasks",
];

/// Watchdog timeout. The heartbeat in `main` must feed it well inside this.
pub const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

/// Main-loop period: feeds the watchdog and logs the diagnostics counters.
pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Diagnostics are logged every this many heartbeats.
pub const DIAGNOSTICS_EVERY_BEATS: u32 = 10;

const _: () = assert!(HEARTBEAT_INTERVAL_MS * 4 <= WATCHDOG_TIMEOUT_MS as u64);

/// Watchdog timeout in the unit `IndependentWatchdog::new` takes.
#[allow(clippy::arithmetic_side_effects)] // 8_000 * 1_000 fits u32
pub const fn watchdog_timeout_us() -> u32 {
    WATCHDOG_TIMEOUT_MS * 1_000
}

// ── RCC clock configuration ───────────────────────────────────────────────────

/// Build the `embassy_stm32::Config` with the recorder's RCC settings.
///
/// # Clock Tree (HSI → 400 MHz core)
///
/// HSI (64 MHz) → PLL1 (prediv=4, mul=50) → PLL1_P = 400 MHz (sys)
/// AHB prescaler: DIV2 → 200 MHz
/// APB1/2/3/4:    DIV2 → 100 MHz
/// PLL1Q: DIV4 → 200 MHz  (SPI123 and SAI kernel clock, default muxes)
///
/// SAI runs in slave mode, so its kernel clock only has to exceed the bit
/// clock by the margin RM0433 §51.4 requires; no audio PLL is needed.
///
/// # DO NOT call `embassy_stm32::init(Default::default())`
///
/// `Default::default()` runs the core from HSI at 64 MHz with PLL1 off,
/// which leaves the SPI kernel clock undefined.
#[cfg(feature = "hardware")]
pub fn build_embassy_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;

    let mut config = embassy_stm32::Config::default();

    // ── Oscillators ─────────────────────────────────────────────────────────
    config.rcc.hsi = Some(HSIPrescaler::DIV1);
    config.rcc.csi = true;

    // ── PLL1: system clock + peripheral kernel clock ─────────────────────────
    // HSI (64 MHz) / prediv(4) = 16 MHz → × mul(50) = 800 MHz VCO
    config.rcc.pll1 = Some(Pll {
        source: PllSource::HSI,
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL50,
        divp: Some(PllDiv::DIV2), // 400 MHz: system clock
        divq: Some(PllDiv::DIV4), // 200 MHz: SPI2 / SAI kernel clock
        divr: None,
    });

    // ── System clock + bus prescalers ────────────────────────────────────────
    config.rcc.sys = Sysclk::PLL1_P; // 400 MHz
    config.rcc.ahb_pre = AHBPrescaler::DIV2; // 200 MHz
    config.rcc.apb1_pre = APBPrescaler::DIV2; // 100 MHz
    config.rcc.apb2_pre = APBPrescaler::DIV2; // 100 MHz
    config.rcc.apb3_pre = APBPrescaler::DIV2; // 100 MHz
    config.rcc.apb4_pre = APBPrescaler::DIV2; // 100 MHz
    config.rcc.voltage_scale = VoltageScale::Scale1;

    config
}

// ─── Tests ────────────────────────────────────────────────────────────────────
