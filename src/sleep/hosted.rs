//! Thread-backed power management for running the duty cycle on a host.
//!
//! [`HostedPower`] stands in for the MCU: a timer thread plays the watchdog,
//! calling [`WatchdogTicks::on_interrupt`] once per period and then waking the
//! "CPU" through a channel. [`power_down`](PowerControl::power_down) blocks on
//! that channel. Once interrupts are disabled the timer stops delivering, so a
//! forced sleep blocks the calling thread forever, as it halts the real node.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use super::{PowerControl, WatchdogTicks};
use crate::supply::SupplyMonitor;

/// Host model of the MCU's watchdog and sleep hardware.
#[derive(Debug)]
pub struct HostedPower {
    ticks: &'static WatchdogTicks,
    period: Duration,
    interrupts: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    wake: Option<Receiver<()>>,
    adc_enabled: bool,
    power_downs: usize,
    watchdog_resets: usize,
}

impl HostedPower {
    /// Creates a model whose watchdog fires every `period`.
    ///
    /// The timer thread starts on [`configure_watchdog`](PowerControl::configure_watchdog).
    pub fn new(ticks: &'static WatchdogTicks, period: Duration) -> Self {
        Self {
            ticks,
            period,
            interrupts: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(false)),
            wake: None,
            adc_enabled: true,
            power_downs: 0,
            watchdog_resets: 0,
        }
    }

    /// Watchdog period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the modelled ADC is enabled.
    pub fn adc_enabled(&self) -> bool {
        self.adc_enabled
    }

    /// Number of power-downs entered so far.
    pub fn power_downs(&self) -> usize {
        self.power_downs
    }

    /// Number of watchdog restarts so far.
    pub fn watchdog_resets(&self) -> usize {
        self.watchdog_resets
    }

    /// Whether interrupts are still enabled.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts.load(Ordering::SeqCst)
    }

    fn halt() -> ! {
        loop {
            thread::park();
        }
    }
}

impl PowerControl for HostedPower {
    fn configure_watchdog(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = mpsc::channel();
        self.wake = Some(rx);

        let ticks = self.ticks;
        let period = self.period;
        let interrupts = self.interrupts.clone();
        let running = self.running.clone();
        let _ = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(period);
                if !interrupts.load(Ordering::SeqCst) {
                    continue;
                }
                ticks.on_interrupt();
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        trace!("hosted watchdog started, period {} ms", period.as_millis());
    }

    fn reset_watchdog(&mut self) {
        self.watchdog_resets += 1;
    }

    fn enable_power_down(&mut self) {}

    fn set_adc_enabled(&mut self, enabled: bool) {
        self.adc_enabled = enabled;
    }

    fn release_analog_pin(&mut self) {}

    fn disable_interrupts(&mut self) {
        self.interrupts.store(false, Ordering::SeqCst);
    }

    fn disable_brown_out(&mut self) {}

    fn power_down(&mut self) {
        self.power_downs += 1;
        if !self.interrupts_enabled() {
            Self::halt();
        }
        let Some(wake) = &self.wake else {
            // No watchdog, nothing to wake up for.
            Self::halt();
        };
        // Wakes that fired while awake are not for this power-down.
        while let Ok(()) = wake.try_recv() {}
        if wake.recv().is_err() {
            Self::halt();
        }
    }
}

impl Drop for HostedPower {
    fn drop(&mut self) {
        // The timer thread exits on its next wake-up.
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Supply monitor that always reports the same voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSupply(pub u8);

impl SupplyMonitor for FixedSupply {
    fn supply_decivolts(&mut self) -> u8 {
        self.0
    }
}
