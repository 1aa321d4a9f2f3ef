/// Declares the static `WATCHDOG_TICKS` counter shared with the watchdog ISR.
///
/// An optional identifier names the static instead.
///
/// # Example
/// ```rust
/// lora_sensor_node::declare_watchdog_ticks!();
///
/// fn main() {
///     assert_eq!(WATCHDOG_TICKS.count(), 0);
/// }
/// ```
#[macro_export]
macro_rules! declare_watchdog_ticks {
    () => {
        $crate::declare_watchdog_ticks!(WATCHDOG_TICKS);
    };
    ( $name:ident ) => {
        pub static $name: $crate::sleep::WatchdogTicks = $crate::sleep::WatchdogTicks::new();
    };
}

/// Records one watchdog timeout on the counter declared by
/// [`declare_watchdog_ticks!`].
///
/// This is the whole body of the watchdog interrupt handler:
///
/// ```rust,ignore
/// #[avr_device::interrupt(atmega328p)]
/// fn WDT() {
///     lora_sensor_node::watchdog_tick!();
/// }
/// ```
#[macro_export]
macro_rules! watchdog_tick {
    () => {
        $crate::watchdog_tick!(WATCHDOG_TICKS);
    };
    ( $name:ident ) => {
        $name.on_interrupt();
    };
}
