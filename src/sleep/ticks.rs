use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

/// Watchdog tick counter shared between the watchdog ISR and the sleep controller.
///
/// The ISR is the only writer that increments it ([`on_interrupt`](Self::on_interrupt));
/// the sleep controller is the only reader, and resets it at the start of each
/// sleep request. Access goes through `critical_section::with`, so the counter
/// is safe on targets without atomic read-modify-write (e.g. AVR).
///
/// # Example
/// ```rust
/// use lora_sensor_node::sleep::WatchdogTicks;
///
/// static WATCHDOG_TICKS: WatchdogTicks = WatchdogTicks::new();
///
/// // In the watchdog interrupt handler:
/// WATCHDOG_TICKS.on_interrupt();
/// assert_eq!(WATCHDOG_TICKS.count(), 1);
/// ```
pub struct WatchdogTicks {
    ticks: Mutex<Cell<u16>>,
}

impl WatchdogTicks {
    /// Creates a counter at zero, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// Records one watchdog timeout. Call this from the watchdog ISR only.
    ///
    /// Saturates instead of wrapping, so a sleep request can never be cut
    /// short by overflow.
    pub fn on_interrupt(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().saturating_add(1));
        });
    }

    /// Ticks seen since the last reset.
    pub fn count(&self) -> u16 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    pub(crate) fn reset(&self) {
        critical_section::with(|cs| self.ticks.borrow(cs).set(0));
    }
}

impl Default for WatchdogTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WatchdogTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogTicks")
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_resets() {
        let ticks = WatchdogTicks::new();
        assert_eq!(ticks.count(), 0);
        ticks.on_interrupt();
        ticks.on_interrupt();
        assert_eq!(ticks.count(), 2);
        ticks.reset();
        assert_eq!(ticks.count(), 0);
    }

    #[test]
    fn test_saturates() {
        let ticks = WatchdogTicks::new();
        critical_section::with(|cs| ticks.ticks.borrow(cs).set(u16::MAX));
        ticks.on_interrupt();
        assert_eq!(ticks.count(), u16::MAX);
    }
}
