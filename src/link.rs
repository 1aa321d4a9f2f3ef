//! Radio transport seam and gateway acknowledgment.
//!
//! The node talks to an RF95-class LoRa transceiver through [`Radio`]. The
//! driver behind it owns modulation and framing; this crate only hands it
//! finished packets.
//!
//! A binary gateway can echo a packet back, starting with the sender's node
//! id. [`send_with_echo_check`] waits a bounded time for that echo, polling
//! every millisecond, and resends once if it does not come. There is no
//! second retry: the next duty cycle carries fresher data anyway.

use embedded_hal::delay::DelayNs;

use crate::config::RadioConfig;
use crate::consts::MAX_PAYLOAD_LEN;

/// Packet radio used to reach the gateway.
pub trait Radio {
    /// Driver error.
    type Error: core::fmt::Debug;

    /// Applies carrier frequency, transmit power and sync word.
    fn configure(&mut self, config: &RadioConfig) -> Result<(), Self::Error>;

    /// Transmits one packet, blocking until it has left the radio.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Copies a received packet into `buf` and returns its length.
    ///
    /// Returns `nb::Error::WouldBlock` while nothing has arrived.
    fn try_receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Puts the transceiver in its lowest power mode.
    fn sleep(&mut self) -> Result<(), Self::Error>;

    /// Signal strength of the last received packet in dBm, if known.
    fn last_rssi(&mut self) -> Option<i16> {
        None
    }
}

/// How a frame left the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Delivery {
    /// Sent once, no acknowledgment requested.
    Sent,
    /// Sent once and echoed back by the gateway.
    Acknowledged,
    /// No valid echo within the timeout; sent a second time.
    Resent,
}

/// Errors raised by the radio link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError<E: core::fmt::Debug> {
    /// The radio driver rejected the bring-up parameters.
    #[error("radio configuration failed: {0:?}")]
    Configure(E),
    /// The radio driver failed to transmit.
    #[error("radio transmit failed: {0:?}")]
    Send(E),
    /// The radio driver failed to enter sleep.
    #[error("radio sleep failed: {0:?}")]
    Sleep(E),
}

/// Transmits `bytes` once.
pub fn send_frame<R: Radio>(radio: &mut R, bytes: &[u8]) -> Result<Delivery, LinkError<R::Error>> {
    radio.send(bytes).map_err(LinkError::Send)?;
    debug!("sent {} bytes", bytes.len());
    Ok(Delivery::Sent)
}

/// Transmits `bytes` and waits for the gateway echo.
///
/// # Behavior
/// - Polls for a reply every millisecond for up to `timeout_ms`
/// - A reply starting with `node_id` acknowledges the frame
/// - A timeout, a receive error or a reply for another node triggers exactly
///   one unconditional resend
///
/// # Errors
/// [`LinkError::Send`] if either transmission fails.
pub fn send_with_echo_check<R, D>(
    radio: &mut R,
    delay: &mut D,
    bytes: &[u8],
    node_id: &[u8],
    timeout_ms: u32,
) -> Result<Delivery, LinkError<R::Error>>
where
    R: Radio,
    D: DelayNs,
{
    radio.send(bytes).map_err(LinkError::Send)?;
    debug!("sent {} bytes", bytes.len());

    let mut reply = [0u8; MAX_PAYLOAD_LEN];
    match await_reply(radio, delay, &mut reply, timeout_ms) {
        Some(len) if reply[..len].starts_with(node_id) => {
            match radio.last_rssi() {
                Some(rssi) => info!("gateway echoed {} bytes, rssi {} dBm", len, rssi),
                None => info!("gateway echoed {} bytes", len),
            }
            return Ok(Delivery::Acknowledged);
        }
        Some(len) => warn!("{} byte reply is not addressed to this node", len),
        None => warn!("no reply, is the gateway running?"),
    }

    radio.send(bytes).map_err(LinkError::Send)?;
    debug!("resent {} bytes", bytes.len());
    Ok(Delivery::Resent)
}

/// Polls `radio` until a packet arrives, a receive fails or `timeout_ms`
/// milliseconds have been waited.
fn await_reply<R, D>(radio: &mut R, delay: &mut D, buf: &mut [u8], timeout_ms: u32) -> Option<usize>
where
    R: Radio,
    D: DelayNs,
{
    let mut waited_ms = 0;
    loop {
        match radio.try_receive(buf) {
            Ok(len) => return Some(len.min(buf.len())),
            Err(nb::Error::Other(_)) => {
                warn!("reply receive failed");
                return None;
            }
            Err(nb::Error::WouldBlock) => {}
        }
        if waited_ms >= timeout_ms {
            return None;
        }
        delay.delay_ms(1);
        waited_ms += 1;
    }
}
