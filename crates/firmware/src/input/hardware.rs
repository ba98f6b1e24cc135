//! EXTI-backed timestamp button.
//!
//! # Pin assignment
//!
//! | Signal | MCU pin | Notes                                   |
//! |--------|---------|-----------------------------------------|
//! | Button | PC13    | EXTI13, both edges                      |
//!
//! The EXTI interrupt only wakes the button task; the level is sampled in
//! task context right after the wake-up. A bounce that settles before the
//! sample yields two identical edges in a row, which the debouncer ignores.

use embassy_stm32::exti::{AnyChannel, ExtiInput};
use embassy_stm32::gpio::{AnyPin, Input, Pull};

use platform::{ButtonInput, Edge};
use recorder::button::run_button;
use recorder::channel::TimestampSender;
use recorder::{ButtonMonitor, Diagnostics};

use super::Polarity;

/// Button on an EXTI line.
pub struct ExtiButton {
    pin: ExtiInput<'static, AnyPin>,
    polarity: Polarity,
}

impl ExtiButton {
    /// Wrap a configured EXTI input.
    pub fn new(pin: ExtiInput<'static, AnyPin>, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }
}

impl ButtonInput for ExtiButton {
    async fn wait_for_edge(&mut self) -> Edge {
        self.pin.wait_for_any_edge().await;
        self.polarity.edge_for(self.pin.is_high())
    }
}

/// Button task: edges in, debounced timestamp events out.
///
/// Spawned on the interrupt executor so presses are stamped without waiting
/// for an SD write to finish. The EXTI input is built here from the raw pin
/// and line, which are `Send`.
#[embassy_executor::task]
pub async fn button_task(
    pin: AnyPin,
    line: AnyChannel,
    polarity: Polarity,
    monitor: &'static ButtonMonitor,
    tx: TimestampSender<'static>,
    diag: &'static Diagnostics,
) {
    let pull = match polarity {
        Polarity::ActiveLow => Pull::Up,
        Polarity::ActiveHigh => Pull::Down,
    };
    let mut button = ExtiButton::new(ExtiInput::new(Input::new(pin, pull), line), polarity);
    run_button(&mut button, monitor, tx, diag).await
}
