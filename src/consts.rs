//! Constants used across the telemetry node.
//!
//! This module defines the frame geometry limits, the reference deployment
//! values, the non-volatile identity map and the duty-cycle timing.
//!
//! ## Key Concepts
//!
//! - **Geometry limits**: upper bounds used to size the `heapless` buffers. A
//!   deployment picks its own node id length and channel count below these.
//! - **Transport limit**: the largest payload the radio accepts in one packet.
//!   A frame layout that does not fit is rejected when it is built.
//! - **Identity map**: byte offsets of the provisioned device id in NVM.
//! - **Timing**: sleep is counted in watchdog ticks, not seconds.

/// Maximum number of bytes the radio transport accepts in one packet.
///
/// This is the RF95 message limit (255 byte FIFO minus the 4 byte header).
pub const MAX_PAYLOAD_LEN: usize = 251;

/// Length (in bytes) of the CRC-16 trailer of a binary frame.
pub const CRC_LEN: usize = 2;

/// Upper bound on the node identifier length.
pub const MAX_NODE_ID_LEN: usize = 16;

/// Upper bound on the number of sensor channels in a frame.
pub const MAX_CHANNELS: usize = 8;

/// Length (in bytes) of the physical device identifier.
pub const DEVICE_ID_LEN: usize = 6;

/// Length (in bytes) of the auxiliary status field.
pub const AUX_STATUS_LEN: usize = 1;

/// Node identifier of the reference deployment.
pub const DEFAULT_NODE_ID: &[u8] = b"<1234>";

/// Channel count of the reference deployment (two temperature probes).
pub const DEFAULT_CHANNELS: usize = 2;

/// Compiled-in device identifier written on first boot.
///
/// Encodes the provisioning time: year, month, day, hour, minute, second.
pub const DEFAULT_DEVICE_ID: [u8; DEVICE_ID_LEN] = [19, 11, 3, 18, 12, 0];

/// NVM offset of the "initialized" marker byte.
pub const NVM_MARKER_ADDR: u16 = 0;

/// NVM offset of the first device identifier byte.
pub const NVM_DEVICE_ID_ADDR: u16 = 1;

/// Marker value of erased (never provisioned) EEPROM.
pub const NVM_MARKER_VIRGIN: u8 = 0xff;

/// Marker value written once the identity region is provisioned.
pub const NVM_MARKER_INITIALIZED: u8 = 1;

/// Watchdog timeout period in seconds (the largest the hardware timer supports).
///
/// One watchdog tick is the unit of every sleep request.
pub const WATCHDOG_PERIOD_SECS: u32 = 8;

/// Watchdog ticks slept between two transmissions.
pub const SLEEP_CYCLES: u16 = 1;

/// Watchdog ticks slept once at startup, before the first transmission.
pub const INIT_SLEEP_CYCLES: u16 = 1;

/// Supply voltage (tenths of a volt) below which the node halts for good.
pub const LOW_VOLTAGE_DECIVOLTS: u8 = 32;

/// Band-gap reference voltage of the MCU in millivolts.
///
/// Tune per board; nominally 1.1 V on the ATmega328P.
pub const BANDGAP_REFERENCE_MV: u32 = 1_100;

/// Raw ADC reading above which the analog status input reports "on" (~0.8 V).
pub const AUX_ANALOG_THRESHOLD: u16 = 250;

/// How long to wait for a gateway echo before resending, in milliseconds.
pub const REPLY_TIMEOUT_MS: u32 = 3_000;

/// Radio carrier frequency in MHz (EU ISM band).
pub const RADIO_FREQUENCY_MHZ: f32 = 868.0;

/// Radio transmit power in dBm.
pub const RADIO_TX_POWER_DBM: i8 = 13;

/// LoRa sync word shared with the gateway.
pub const RADIO_SYNC_WORD: u8 = 0x34;

/// Pause after a transmission before the radio is put to sleep, in milliseconds.
pub const SETTLE_MS: u32 = 2_000;

/// Pause at bring-up before the radio is first put to sleep, in milliseconds.
///
/// Without it the board can fall into a reset loop on power-up.
pub const STARTUP_SETTLE_MS: u32 = 1_000;
