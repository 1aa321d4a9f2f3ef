//! CRC-16 integrity check of binary telemetry frames.
//!
//! The gateway expects CRC-16/XMODEM: polynomial `0x1021`, initial value
//! `0x0000`, no input or output reflection and no final XOR. The checksum is
//! sent low byte first.

use ::crc::{CRC_16_XMODEM, Crc};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Computes the CRC-16/XMODEM of `data`.
///
/// An empty buffer yields `0x0000`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Returns `true` if `checksum` is the CRC-16 of `payload`.
pub fn verify(payload: &[u8], checksum: u16) -> bool {
    crc16(payload) == checksum
}

/// Splits a checksum into its wire representation (low byte, high byte).
pub fn to_wire(checksum: u16) -> [u8; 2] {
    checksum.to_le_bytes()
}

/// Reassembles a checksum from its wire representation.
pub fn from_wire(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}
