//! Supply voltage measurement and classification.
//!
//! The node has no spare pin for a battery divider, so it measures its own
//! supply: the ADC converts the internal 1.1 V band-gap against AVcc, and Vcc
//! follows from `Vbg * 1024 / reading`. Voltages are kept in tenths of a volt
//! (`33` is 3.3 V) to stay in integer arithmetic.
//!
//! Note that on boards with a regulator in front of the MCU this measures the
//! regulated rail, not the battery.

use crate::consts::LOW_VOLTAGE_DECIVOLTS;

/// Coarse supply voltage classification used by the sleep controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SupplyClass {
    /// Safe to keep running the duty cycle.
    Normal,
    /// Too low to operate safely; the node must halt.
    CriticallyLow,
}

impl SupplyClass {
    /// Classifies `decivolts` against `threshold` (strictly below is low).
    pub fn classify(decivolts: u8, threshold: u8) -> Self {
        if decivolts < threshold {
            SupplyClass::CriticallyLow
        } else {
            SupplyClass::Normal
        }
    }

    /// Classifies `decivolts` against [`LOW_VOLTAGE_DECIVOLTS`].
    pub fn from_decivolts(decivolts: u8) -> Self {
        Self::classify(decivolts, LOW_VOLTAGE_DECIVOLTS)
    }
}

/// Source of supply voltage samples.
pub trait SupplyMonitor {
    /// Samples the supply voltage, in tenths of a volt.
    ///
    /// Implementations must leave the ADC in the state they found it in; the
    /// sleep controller keeps it disabled between duty cycles.
    fn supply_decivolts(&mut self) -> u8;
}

/// Converts a 10-bit ADC reading of the band-gap reference into Vcc.
///
/// # Arguments
/// - `reading`: raw conversion result of the band-gap channel against AVcc
/// - `reference_mv`: the board's band-gap voltage in millivolts (nominally 1100)
///
/// # Returns
/// Vcc in tenths of a volt, truncated. A zero reading cannot come from a real
/// conversion and saturates to `u8::MAX` rather than dividing by zero.
pub fn bandgap_decivolts(reading: u16, reference_mv: u32) -> u8 {
    if reading == 0 {
        return u8::MAX;
    }
    let millivolts = reference_mv * 1024 / u32::from(reading);
    u8::try_from(millivolts / 100).unwrap_or(u8::MAX)
}
