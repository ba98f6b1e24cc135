//! Timestamp button input.
//!
//! | Feature    | Driver                 | Source          |
//! |------------|------------------------|-----------------|
//! | `hardware` | [`hardware::ExtiButton`] | EXTI line, PC13 |
//!
//! The driver implements [`platform::ButtonInput`]; debouncing happens in
//! `recorder::button`, so the driver only reports raw edges.

use platform::Edge;

/// Electrical level that means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pressed pulls the pin low (pull-up to idle high).
    ActiveLow,
    /// Pressed drives the pin high (pull-down to idle low).
    ActiveHigh,
}

impl Polarity {
    /// Edge implied by the pin level sampled after an interrupt.
    pub const fn edge_for(self, pin_high: bool) -> Edge {
        match self {
            Self::ActiveLow => Edge::from_level(!pin_high),
            Self::ActiveHigh => Edge::from_level(pin_high),
        }
    }
}

/// Polarity of the user button on the board (blue button, PC13).
pub const BUTTON_POLARITY: Polarity = Polarity::ActiveHigh;

/// Hardware EXTI driver.
#[cfg(feature = "hardware")]
pub mod hardware;
