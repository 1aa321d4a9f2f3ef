//! Sensor collaborators consumed by the duty cycle.
//!
//! The one-wire bus and ADC drivers live outside this crate. The node only
//! needs "a calibrated reading per channel" and "one status byte", expressed
//! by [`TemperatureBus`] and [`AuxSensor`].
//!
//! A sensor that was enumerated but does not answer (a *ghost device*) and a
//! sensor that is not there at all are both reported as placeholders. Neither
//! stops the cycle.

use embedded_hal::digital::InputPin;
use heapless::Vec;

use crate::consts::{AUX_ANALOG_THRESHOLD, MAX_CHANNELS};
use crate::frame::ChannelReading;

/// A bus of temperature probes, e.g. DS18B20s on one-wire.
pub trait TemperatureBus {
    /// Number of devices found during enumeration.
    fn device_count(&mut self) -> usize;

    /// Reads device `index` in degrees Celsius.
    ///
    /// Returns `None` if the device no longer answers.
    fn read_celsius(&mut self, index: usize) -> Option<f32>;
}

/// Collects one reading per channel from `bus`.
///
/// At most `channels` devices are read (capped at [`MAX_CHANNELS`]). Channels
/// without a device, and devices that do not answer, get
/// [`ChannelReading::PLACEHOLDER`], so the result always holds exactly
/// `min(channels, MAX_CHANNELS)` entries.
pub fn collect_readings<B: TemperatureBus>(
    bus: &mut B,
    channels: usize,
) -> Vec<ChannelReading, MAX_CHANNELS> {
    let channels = channels.min(MAX_CHANNELS);
    let found = bus.device_count();
    if found > channels {
        debug!("{} devices on the bus, reporting the first {}", found, channels);
    }

    let mut readings = Vec::new();
    for index in 0..channels {
        let reading = if index < found {
            let value = bus.read_celsius(index);
            if value.is_none() {
                warn!("ghost device at index {}, check power and cabling", index);
            }
            value
        } else {
            None
        };
        let reading = ChannelReading::from_reading(reading);
        debug!("channel {}: {}.{}", index, reading.integer, reading.fraction);
        // Cannot overflow: `channels` is capped at the capacity.
        let _ = readings.push(reading);
    }
    readings
}

/// Source of the auxiliary status byte appended after the channels.
pub trait AuxSensor {
    /// Samples the input and returns the status byte.
    fn status(&mut self) -> u8;
}

/// Source of raw analog samples (an ADC channel).
pub trait AnalogSample {
    /// Takes one raw conversion.
    fn sample(&mut self) -> u16;
}

/// Analog status input: `1` when the sample exceeds a threshold, else `0`.
///
/// The reference deployment watches a high voltage line through a divider;
/// a raw reading above 250 (~0.8 V) means the line is live.
#[derive(Debug)]
pub struct AnalogThreshold<A: AnalogSample> {
    adc: A,
    threshold: u16,
}

impl<A: AnalogSample> AnalogThreshold<A> {
    /// Wraps `adc`, reporting `1` for samples strictly above `threshold`.
    pub fn new(adc: A, threshold: u16) -> Self {
        Self { adc, threshold }
    }

    /// Wraps `adc` with the reference deployment threshold,
    /// [`AUX_ANALOG_THRESHOLD`].
    pub fn with_default_threshold(adc: A) -> Self {
        Self::new(adc, AUX_ANALOG_THRESHOLD)
    }

    /// Releases the ADC channel.
    pub fn release(self) -> A {
        self.adc
    }
}

impl<A: AnalogSample> AuxSensor for AnalogThreshold<A> {
    fn status(&mut self) -> u8 {
        let raw = self.adc.sample();
        debug!("aux analog sample: {}", raw);
        u8::from(raw > self.threshold)
    }
}

/// Digital status input: `1` while the pin is high, e.g. a mesh link-up line.
#[derive(Debug)]
pub struct DigitalLink<P: InputPin> {
    pin: P,
}

impl<P: InputPin> DigitalLink<P> {
    /// Wraps `pin`.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Releases the pin.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: InputPin> AuxSensor for DigitalLink<P> {
    /// A pin read error is reported as link down.
    fn status(&mut self) -> u8 {
        match self.pin.is_high() {
            Ok(high) => u8::from(high),
            Err(_) => {
                warn!("aux link pin read failed, reporting link down");
                0
            }
        }
    }
}
