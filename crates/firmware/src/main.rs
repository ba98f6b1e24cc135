//! Field recorder firmware - Main Entry Point
//!
//! Hardware-only entry point for STM32H743ZI. See
//! `firmware::boot::BOOT_SEQUENCE_STEPS` for the ordered sequence.

#![no_std]
#![no_main]

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::Channel as _;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Level, Output, Pin as _, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::{SdCard, VolumeManager};
use static_cell::{ConstStaticCell, StaticCell};

use platform::config::boot_banner;
use platform::storage_sdmmc::{ReprobingCard, SdmmcStorage};
use platform::FlashCounterStore;
use recorder::config::ACCUMULATOR_CAPACITY;
use recorder::{
    AudioBuffer, BufferStorage, ButtonMonitor, Diagnostics, FreeBufferChannel, RecorderConfig, RequestChannel,
    StorageOwner, TimestampChannel,
};

use firmware::boot::{self, build_embassy_config};
use firmware::fatal;
use firmware::input::hardware::button_task;
use firmware::input::BUTTON_POLARITY;
use firmware::storage::{
    FixedTimeSource, SdCardSlot, SdVolumeManager, COUNTER_FLASH_OFFSET, SD_INIT_FREQ_HZ, SD_RUN_FREQ_HZ,
};
use firmware::tasks::{capture_task, storage_task};

use {defmt_rtt as _, panic_probe as _};

// High-priority executor for capture and the button. Thread mode keeps the
// storage owner and the heartbeat.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
#[allow(unsafe_code, non_snake_case)]
unsafe fn UART4() {
    EXECUTOR_HIGH.on_interrupt();
}

static DIAG: Diagnostics = Diagnostics::new();
static BUTTON: ButtonMonitor = ButtonMonitor::new();
static TIMESTAMPS: TimestampChannel = TimestampChannel::new();
static REQUESTS: RequestChannel = RequestChannel::new();
static FREE_BUFFERS: FreeBufferChannel = FreeBufferChannel::new();

// Initialized in place, never copied through the stack.
static AUDIO_BUFFERS: ConstStaticCell<[BufferStorage; 2]> = ConstStaticCell::new([[0; ACCUMULATOR_CAPACITY]; 2]);
static SD_CARD: StaticCell<SdCardSlot> = StaticCell::new();
static VOLUME_MANAGER: StaticCell<SdVolumeManager> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("{=str}", boot_banner());

    // Step 1: clocks.
    let p = embassy_stm32::init(build_embassy_config());

    // Step 2: IWDG. Once unleashed it cannot be stopped; the heartbeat below
    // must pet it inside WATCHDOG_TIMEOUT_MS.
    let mut watchdog = IndependentWatchdog::new(p.IWDG1, boot::watchdog_timeout_us());
    watchdog.unleash();
    defmt::info!("IWDG armed: timeout={=u32}ms", boot::WATCHDOG_TIMEOUT_MS);

    let config = RecorderConfig::default();
    if let Err(e) = config.validate() {
        fatal(e.as_str());
    }

    // Step 3: the SAI rings are zeroed by the capture task when it builds
    // its drivers (firmware::audio::sai), before either block starts.

    // Step 4: rotation counter.
    let counter = match FlashCounterStore::new(Flash::new_blocking(p.FLASH), COUNTER_FLASH_OFFSET) {
        Ok(counter) => counter,
        Err(e) => fatal(e.as_str()),
    };

    // Step 5: SD card on SPI2. Identification runs at 400 kHz.
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = Hertz(SD_INIT_FREQ_HZ);
    let spi = Spi::new_blocking(p.SPI2, p.PB13, p.PB15, p.PB14, spi_config);
    let cs = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let Ok(spi_device) = ExclusiveDevice::new(spi, cs, Delay) else {
        fatal("SD chip select init failed");
    };
    let card = SdCard::new(spi_device, Delay);
    match card.num_bytes() {
        Ok(bytes) => defmt::info!("SD card: {=u64} MiB", bytes / (1024 * 1024)),
        Err(_) => defmt::warn!("no SD card at boot; the owner probes again on the next request"),
    }
    // Cards that miss the boot probe are identified at run speed; most accept it.
    let mut run_config = SpiConfig::default();
    run_config.frequency = Hertz(SD_RUN_FREQ_HZ);
    if card.spi(|dev| dev.bus_mut().set_config(&run_config)).is_err() {
        defmt::warn!("SPI2 stays at {=u32} Hz", SD_INIT_FREQ_HZ);
    }
    let card: &'static SdCardSlot = SD_CARD.init(ReprobingCard::new(card));
    let volume_manager = VOLUME_MANAGER.init(VolumeManager::new(card, FixedTimeSource));
    let owner = StorageOwner::new(SdmmcStorage::new(volume_manager, card), counter, config, &DIAG);

    // Double buffering: both accumulation buffers start out free.
    let (first, second) = AudioBuffer::pair(AUDIO_BUFFERS.take());
    for buffer in [first, second] {
        if FREE_BUFFERS.try_send(buffer).is_err() {
            fatal("free buffer channel smaller than the buffer pool");
        }
    }

    // Steps 6 and 7: SAI comes up inside the capture task.
    interrupt::UART4.set_priority(Priority::P6);
    let high = EXECUTOR_HIGH.start(interrupt::UART4);
    high.must_spawn(capture_task(config, REQUESTS.sender(), FREE_BUFFERS.receiver(), &DIAG));
    high.must_spawn(button_task(
        p.PC13.degrade(),
        p.EXTI13.degrade(),
        BUTTON_POLARITY,
        &BUTTON,
        TIMESTAMPS.sender(),
        &DIAG,
    ));
    spawner.must_spawn(storage_task(owner, REQUESTS.receiver(), TIMESTAMPS.receiver(), FREE_BUFFERS.sender()));
    defmt::info!("recorder running");

    let mut beats: u32 = 0;
    loop {
        Timer::after(Duration::from_millis(boot::HEARTBEAT_INTERVAL_MS)).await;
        watchdog.pet();
        beats = beats.wrapping_add(1);
        if beats % boot::DIAGNOSTICS_EVERY_BEATS == 0 {
            defmt::info!("diag: {}", DIAG.snapshot());
        }
    }
}
