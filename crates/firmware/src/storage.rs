//! SD card and counter flash wiring.
//!
//! # SD card on SPI2
//!
//! | Signal | MCU pin |
//! |--------|---------|
//! | SCK    | PB13    |
//! | MISO   | PB14    |
//! | MOSI   | PB15    |
//! | CS     | PB12    |
//!
//! The card is initialized lazily by `embedded-sdmmc` on the first access,
//! which the storage owner triggers with its first request. A missing card
//! therefore only shows up as `Unavailable` on that request. After a failed
//! transfer or an unmount the card is identified again on the next mount, so
//! a card swapped while recording is picked up without a reset.
//!
//! # Rotation counter
//!
//! The last 128 KB sector of bank 2 is reserved in `memory.x` and handed to
//! `platform::FlashCounterStore`.

/// Offset of the counter sector from the flash base (0x081E_0000).
pub const COUNTER_FLASH_OFFSET: u32 = 0x1E_0000;

/// H7 flash sector size.
pub const FLASH_SECTOR_BYTES: u32 = 128 * 1024;

/// SPI clock while the card is in identification mode.
pub const SD_INIT_FREQ_HZ: u32 = 400_000;

/// SPI clock once the card is initialized.
pub const SD_RUN_FREQ_HZ: u32 = 16_000_000;

const _: () = assert!(COUNTER_FLASH_OFFSET % FLASH_SECTOR_BYTES == 0);

#[cfg(feature = "hardware")]
pub use hw::*;

#[cfg(feature = "hardware")]
mod hw {
    use embassy_stm32::flash::{Blocking, Flash};
    use embassy_stm32::gpio::{AnyPin, Output};
    use embassy_stm32::peripherals::SPI2;
    use embassy_stm32::spi::Spi;
    use embassy_time::Delay;
    use embedded_hal_bus::spi::ExclusiveDevice;
    use embedded_sdmmc::{SdCard, TimeSource, Timestamp, VolumeManager};

    use platform::storage_sdmmc::{ReprobingCard, SdmmcStorage};
    use platform::FlashCounterStore;

    /// SPI bus without DMA: the owner task is the only user and writes are
    /// sector-sized, so blocking transfers are enough.
    pub type SdSpiBus = Spi<'static, SPI2, embassy_stm32::dma::NoDma, embassy_stm32::dma::NoDma>;
    /// Bus plus chip select.
    pub type SdSpiDevice = ExclusiveDevice<SdSpiBus, Output<'static, AnyPin>, Delay>;
    /// The card itself.
    pub type SdBlockDevice = SdCard<SdSpiDevice, Delay>;
    /// Card wrapper placed in a `StaticCell` by `main`, shared by the volume
    /// manager and the storage.
    pub type SdCardSlot = ReprobingCard<SdBlockDevice>;
    /// Volume manager placed in a `StaticCell` by `main`.
    pub type SdVolumeManager = VolumeManager<&'static SdCardSlot, FixedTimeSource>;
    /// Storage handed to the owner task.
    pub type SdStorage = SdmmcStorage<SdBlockDevice, FixedTimeSource>;
    /// Counter store on internal flash.
    pub type FlashCounter = FlashCounterStore<Flash<'static, Blocking>>;

    /// FAT timestamps for files the recorder creates.
    ///
    /// The board has no battery-backed RTC, so every file gets the same date.
    pub struct FixedTimeSource;

    impl TimeSource for FixedTimeSource {
        fn get_timestamp(&self) -> Timestamp {
            Timestamp { year_since_1970: 54, zero_indexed_month: 0, zero_indexed_day: 0, hours: 0, minutes: 0, seconds: 0 }
        }
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn counter_sector_is_the_last_one_in_flash() {
        // 2 MB part: the last sector starts 128 KB before the end.
        assert_eq!(COUNTER_FLASH_OFFSET + FLASH_SECTOR_BYTES, 2 * 1024 * 1024);
    }

    #[test]
    fn init_clock_is_within_identification_limit() {
        assert!(SD_INIT_FREQ_HZ <= 400_000);
        assert!(SD_RUN_FREQ_HZ > SD_INIT_FREQ_HZ);
    }
}
