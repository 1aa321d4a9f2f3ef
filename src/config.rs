//! Deployment configuration.
//!
//! The same firmware core serves two gateway generations: one that takes
//! binary frames with a CRC trailer (and may echo them back), and one that
//! takes a JSON-like text rendering. These are [`GatewayProfile`]s, chosen at
//! build time together with a [`SleepProfile`].

use crate::consts::{
    DEFAULT_CHANNELS, DEFAULT_NODE_ID, INIT_SLEEP_CYCLES, LOW_VOLTAGE_DECIVOLTS,
    RADIO_FREQUENCY_MHZ, RADIO_SYNC_WORD, RADIO_TX_POWER_DBM, REPLY_TIMEOUT_MS, SETTLE_MS,
    SLEEP_CYCLES,
};
use crate::frame::{FrameError, FrameLayout};

/// How frames are put on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum GatewayProfile {
    /// Binary payload followed by the CRC-16 trailer.
    Binary {
        /// Wait for the gateway to echo the node id back, resending once if it
        /// does not.
        await_echo: bool,
    },
    /// Text rendering of the frame. No checksum is transmitted.
    Text,
}

impl Default for GatewayProfile {
    fn default() -> Self {
        GatewayProfile::Binary { await_echo: true }
    }
}

/// Whether sleep requests check the supply voltage first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SleepProfile {
    /// Halt for good when the supply drops below the threshold.
    VoltageGuarded {
        /// Lowest acceptable supply, in tenths of a volt.
        threshold_decivolts: u8,
    },
    /// Never sample the supply.
    Unguarded,
}

impl Default for SleepProfile {
    fn default() -> Self {
        SleepProfile::VoltageGuarded {
            threshold_decivolts: LOW_VOLTAGE_DECIVOLTS,
        }
    }
}

/// Parameters handed to the radio driver at bring-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioConfig {
    /// Carrier frequency in MHz.
    pub frequency_mhz: f32,
    /// Transmit power in dBm.
    pub tx_power_dbm: i8,
    /// LoRa sync word; must match the gateway's.
    pub sync_word: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: RADIO_FREQUENCY_MHZ,
            tx_power_dbm: RADIO_TX_POWER_DBM,
            sync_word: RADIO_SYNC_WORD,
        }
    }
}

/// Errors found while validating a [`NodeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The frame geometry does not fit.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Echo checking is on but there is no time to wait for the echo.
    #[error("reply timeout must be non-zero when awaiting an echo")]
    ZeroReplyTimeout,
}

/// Everything a [`SensorNode`](crate::node::SensorNode) needs to know about
/// its deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeConfig {
    /// Logical endpoint identifier, sent first in every frame.
    pub node_id: &'static [u8],
    /// Number of temperature channels per frame.
    pub channels: usize,
    /// Wire format and acknowledgment policy.
    pub gateway: GatewayProfile,
    /// Low-voltage failsafe policy.
    pub sleep: SleepProfile,
    /// Watchdog ticks slept after each transmission.
    pub sleep_cycles: u16,
    /// Watchdog ticks slept at startup.
    pub init_sleep_cycles: u16,
    /// Echo wait in milliseconds (binary profile with `await_echo` only).
    pub reply_timeout_ms: u32,
    /// Pause between the last transmission and radio sleep, in milliseconds.
    pub settle_ms: u32,
    /// Radio bring-up parameters.
    pub radio: RadioConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::binary_gateway()
    }
}

impl NodeConfig {
    /// Reference deployment for the binary gateway: `<1234>`, two channels,
    /// echo check, voltage guarded sleep.
    pub fn binary_gateway() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID,
            channels: DEFAULT_CHANNELS,
            gateway: GatewayProfile::default(),
            sleep: SleepProfile::default(),
            sleep_cycles: SLEEP_CYCLES,
            init_sleep_cycles: INIT_SLEEP_CYCLES,
            reply_timeout_ms: REPLY_TIMEOUT_MS,
            settle_ms: SETTLE_MS,
            radio: RadioConfig::default(),
        }
    }

    /// Reference deployment for the text gateway: same geometry, text
    /// rendering, no supply check.
    pub fn text_gateway() -> Self {
        Self {
            gateway: GatewayProfile::Text,
            sleep: SleepProfile::Unguarded,
            ..Self::binary_gateway()
        }
    }

    /// Frame geometry implied by this configuration.
    pub fn layout(&self) -> Result<FrameLayout, FrameError> {
        FrameLayout::new(self.node_id.len(), self.channels)
    }

    /// Checks the configuration and returns the frame layout it implies.
    ///
    /// # Errors
    /// - [`FrameError`] if the geometry exceeds the buffer or transport limits
    /// - [`FrameError::TextNeedsTwoChannels`] for a text profile with fewer
    ///   than two channels
    /// - [`ConfigError::ZeroReplyTimeout`] if an echo is awaited with no timeout
    pub fn validate(&self) -> Result<FrameLayout, ConfigError> {
        let layout = self.layout()?;
        match self.gateway {
            GatewayProfile::Text if self.channels < 2 => {
                Err(FrameError::TextNeedsTwoChannels(self.channels).into())
            }
            GatewayProfile::Binary { await_echo: true } if self.reply_timeout_ms == 0 => {
                Err(ConfigError::ZeroReplyTimeout)
            }
            _ => Ok(layout),
        }
    }
}
