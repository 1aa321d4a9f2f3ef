//! Watchdog-driven low-power sleep controller.
//!
//! The node spends almost all of its life powered down. The watchdog timer is
//! configured in interrupt-only mode with its longest timeout, and every
//! timeout (a *tick*) wakes the CPU just long enough for the ISR to bump a
//! counter. A sleep request is therefore counted in ticks, not seconds.
//!
//! ## States
//!
//! | State         | Meaning |
//! |---------------|---------|
//! | `Awake`       | Running the duty cycle |
//! | `Armed`       | Watchdog reset and peripherals parked, about to power down |
//! | `Sleeping`    | Powered down, woken only by the watchdog |
//! | `ForcedSleep` | Powered down with interrupts off. Terminal until reset |
//!
//! ## Low-voltage failsafe
//!
//! With a guarded [`SleepProfile`], every request first samples the supply.
//! When it is critically low the controller disables interrupts and powers
//! down for good: a brown-out reset in the middle of a radio exchange is worse
//! than a node that stops reporting. Only a hardware reset brings it back.
//!
//! ## Integration
//!
//! - Hardware access goes through [`PowerControl`]; on AVR this maps onto the
//!   `WDTCSR`, `ADCSRA`, `MCUCR` and `SMCR` registers.
//! - The watchdog ISR must call [`WatchdogTicks::on_interrupt`] (see
//!   [`declare_watchdog_ticks!`](crate::declare_watchdog_ticks) and
//!   [`watchdog_tick!`](crate::watchdog_tick)).
//! - With the `std` feature, [`hosted`] provides a thread-backed watchdog for
//!   running the duty cycle off-target.

#[cfg(feature = "std")]
pub mod hosted;
mod macros;
mod ticks;

pub use ticks::WatchdogTicks;

use crate::config::SleepProfile;
use crate::consts::WATCHDOG_PERIOD_SECS;
use crate::supply::{SupplyClass, SupplyMonitor};

/// Errors raised by the sleep controller for out-of-order calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SleepError {
    /// `sleep` was called before `initialize`.
    #[error("sleep controller used before initialize()")]
    NotInitialized,
    /// `initialize` was called twice.
    #[error("sleep controller already initialized")]
    AlreadyInitialized,
}

/// Power state of the node, as tracked by the [`SleepController`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SleepState {
    /// Running the duty cycle.
    #[default]
    Awake,
    /// Watchdog reset and ADC parked; the next step is power-down.
    Armed,
    /// Powered down between watchdog ticks.
    Sleeping,
    /// Powered down with interrupts disabled. Never left without a reset.
    ForcedSleep,
}

/// MCU power management primitives used by the sleep controller.
pub trait PowerControl {
    /// Puts the watchdog in interrupt-only mode (no reset) with its longest
    /// timeout ([`WATCHDOG_PERIOD_SECS`]).
    fn configure_watchdog(&mut self);

    /// Restarts the watchdog timeout.
    fn reset_watchdog(&mut self);

    /// Selects power-down as the sleep mode and enables sleeping.
    fn enable_power_down(&mut self);

    /// Enables or disables the ADC.
    fn set_adc_enabled(&mut self, enabled: bool);

    /// Turns the analog input pin into a plain input with pull-up off, so it
    /// does not leak current while powered down.
    fn release_analog_pin(&mut self);

    /// Disables interrupts globally.
    fn disable_interrupts(&mut self);

    /// Disables the brown-out detector for the next sleep instruction.
    ///
    /// Must be immediately followed by [`power_down`](Self::power_down).
    fn disable_brown_out(&mut self);

    /// Executes the sleep instruction. Returns after an interrupt wakes the
    /// CPU; with interrupts disabled it does not return.
    fn power_down(&mut self);
}

/// Watchdog ticks needed to sleep for at least `secs` seconds.
pub const fn cycles_for_secs(secs: u32) -> u16 {
    let cycles = secs.div_ceil(WATCHDOG_PERIOD_SECS);
    if cycles > u16::MAX as u32 {
        u16::MAX
    } else {
        cycles as u16
    }
}

/// Duty-cycle sleep state machine.
///
/// ## Type Parameters
///
/// - `P`: the MCU's [`PowerControl`] implementation
/// - `V`: the [`SupplyMonitor`] consulted by the low-voltage failsafe
///
/// ## Example
///
/// ```rust,ignore
/// lora_sensor_node::declare_watchdog_ticks!();
///
/// let mut controller = SleepController::new(power, vcc, &WATCHDOG_TICKS, SleepProfile::default());
/// controller.initialize()?;
/// loop {
///     // read, encode, transmit...
///     controller.sleep(SLEEP_CYCLES)?;
/// }
/// ```
#[derive(Debug)]
pub struct SleepController<P, V>
where
    P: PowerControl,
    V: SupplyMonitor,
{
    power: P,
    monitor: V,
    ticks: &'static WatchdogTicks,
    profile: SleepProfile,
    state: SleepState,
    initialized: bool,
}

impl<P, V> SleepController<P, V>
where
    P: PowerControl,
    V: SupplyMonitor,
{
    /// Creates a controller. Nothing is touched until [`initialize`](Self::initialize).
    ///
    /// # Arguments
    /// - `power`: MCU power management
    /// - `monitor`: supply voltage source for the failsafe
    /// - `ticks`: the counter bumped by the watchdog ISR
    /// - `profile`: whether sleep requests check the supply first
    pub fn new(power: P, monitor: V, ticks: &'static WatchdogTicks, profile: SleepProfile) -> Self {
        Self {
            power,
            monitor,
            ticks,
            profile,
            state: SleepState::Awake,
            initialized: false,
        }
    }

    /// Configures the watchdog, parks the ADC and enables power-down sleep.
    ///
    /// Must run exactly once, before the first [`sleep`](Self::sleep).
    pub fn initialize(&mut self) -> Result<(), SleepError> {
        if self.initialized {
            return Err(SleepError::AlreadyInitialized);
        }
        self.power.configure_watchdog();
        self.power.reset_watchdog();
        self.power.set_adc_enabled(false);
        self.power.enable_power_down();
        self.initialized = true;
        debug!("sleep controller ready, {} s per tick", WATCHDOG_PERIOD_SECS);
        Ok(())
    }

    /// Current power state.
    pub fn state(&self) -> SleepState {
        self.state
    }

    /// Sleep profile in use.
    pub fn profile(&self) -> SleepProfile {
        self.profile
    }

    /// Ticks counted since the start of the last sleep request.
    pub fn ticks(&self) -> u16 {
        self.ticks.count()
    }

    /// Classifies the supply voltage under the controller's profile.
    ///
    /// An unguarded profile never samples and always reports `Normal`.
    pub fn supply_class(&mut self) -> SupplyClass {
        match self.profile {
            SleepProfile::VoltageGuarded {
                threshold_decivolts,
            } => {
                let decivolts = self.monitor.supply_decivolts();
                debug!("supply: {} dV", decivolts);
                SupplyClass::classify(decivolts, threshold_decivolts)
            }
            SleepProfile::Unguarded => SupplyClass::Normal,
        }
    }

    /// Powers down for `cycles` watchdog ticks.
    ///
    /// # Behavior
    /// - Critically low supply (guarded profile only): enters
    ///   [`forced_sleep`](Self::forced_sleep) and **does not return**
    /// - Otherwise: resets the tick counter and the watchdog, disables the ADC,
    ///   releases the analog pin, then powers down until the ISR has counted
    ///   `cycles` ticks and re-enables the ADC
    ///
    /// The CPU is powered down at least once, so `sleep(0)` lasts until the
    /// next tick.
    ///
    /// # Errors
    /// [`SleepError::NotInitialized`] if [`initialize`](Self::initialize) has not run.
    pub fn sleep(&mut self, cycles: u16) -> Result<(), SleepError> {
        if !self.initialized {
            return Err(SleepError::NotInitialized);
        }
        if self.supply_class() == SupplyClass::CriticallyLow {
            self.forced_sleep();
        }

        self.state = SleepState::Armed;
        self.ticks.reset();
        self.power.reset_watchdog();
        self.power.set_adc_enabled(false);
        self.power.release_analog_pin();

        trace!("sleeping for {} ticks", cycles);
        self.state = SleepState::Sleeping;
        loop {
            self.power.disable_brown_out();
            self.power.power_down();
            if self.ticks.count() >= cycles {
                break;
            }
        }

        self.power.set_adc_enabled(true);
        self.state = SleepState::Awake;
        trace!("awake after {} ticks", self.ticks.count());
        Ok(())
    }

    /// Powers down with interrupts disabled. Never returns.
    ///
    /// Nothing can wake the CPU from here except a hardware reset or a power
    /// cycle.
    pub fn forced_sleep(&mut self) -> ! {
        error!("supply critically low, halting until reset");
        self.state = SleepState::ForcedSleep;
        self.power.disable_interrupts();
        loop {
            self.power.disable_brown_out();
            self.power.power_down();
        }
    }

    /// Access to the power management implementation.
    pub fn power(&self) -> &P {
        &self.power
    }

    /// Releases the power management and supply monitor implementations.
    pub fn release(self) -> (P, V) {
        (self.power, self.monitor)
    }
}
