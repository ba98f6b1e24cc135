//! Button input abstraction

/// Level transition seen on the timestamp button pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Pin went to its active level.
    Pressed,
    /// Pin returned to its idle level.
    Released,
}

impl Edge {
    /// Edge implied by the pin level read right after the interrupt.
    pub const fn from_level(active: bool) -> Self {
        if active {
            Self::Pressed
        } else {
            Self::Released
        }
    }
}

/// Edge-triggered button source (EXTI line on hardware).
pub trait ButtonInput {
    /// Wait for the next transition (async, power-efficient).
    fn wait_for_edge(&mut self) -> impl core::future::Future<Output = Edge>;
}
