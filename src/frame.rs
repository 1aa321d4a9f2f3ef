//! Telemetry frame layout and binary encoding.
//!
//! A frame is the fixed-order concatenation of:
//!
//! ```text
//! [0 .. node_id_len)                  node identifier
//! [node_id_len .. +6)                 device identifier
//! [.. +2*channels)                    (integer, fraction) byte pair per channel
//! [.. +1)                             auxiliary status byte
//! [.. +2)                             CRC-16, low byte then high byte
//! ```
//!
//! The geometry (node id length and channel count) is fixed per deployment and
//! captured once in a [`FrameLayout`]. Missing sensors never change the frame
//! length; their channels carry [`ChannelReading::PLACEHOLDER`].

use heapless::Vec;

use crate::consts::{
    AUX_STATUS_LEN, CRC_LEN, DEVICE_ID_LEN, MAX_CHANNELS, MAX_NODE_ID_LEN, MAX_PAYLOAD_LEN,
};
use crate::crc;
use crate::identity::DeviceId;

/// Errors raised while building, decoding or transcoding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The node identifier is longer than [`MAX_NODE_ID_LEN`].
    #[error("node id of {len} bytes exceeds the {max} byte limit")]
    NodeIdTooLong {
        /// Requested node id length.
        len: usize,
        /// Largest supported node id length.
        max: usize,
    },
    /// More channels than [`MAX_CHANNELS`].
    #[error("{channels} channels exceed the {max} channel limit")]
    TooManyChannels {
        /// Requested channel count.
        channels: usize,
        /// Largest supported channel count.
        max: usize,
    },
    /// The encoded frame would not fit in one radio packet.
    #[error("frame of {len} bytes exceeds the {max} byte transport limit")]
    PayloadTooLarge {
        /// Encoded length.
        len: usize,
        /// Transport limit.
        max: usize,
    },
    /// The node id does not have the length of the layout.
    #[error("node id is {actual} bytes, layout expects {expected}")]
    NodeIdLength {
        /// Length fixed by the layout.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },
    /// More readings were supplied than the layout has channels.
    #[error("{actual} readings supplied for {expected} channels")]
    ExtraReadings {
        /// Channel count of the layout.
        expected: usize,
        /// Readings supplied.
        actual: usize,
    },
    /// A received frame is too short to hold a checksum.
    #[error("frame of {0} bytes is too short to carry a checksum")]
    Truncated(usize),
    /// A received payload does not have the length of the layout.
    #[error("payload is {actual} bytes, layout expects {expected}")]
    LengthMismatch {
        /// Payload length fixed by the layout.
        expected: usize,
        /// Payload length received.
        actual: usize,
    },
    /// A received frame failed the CRC check.
    #[error("checksum mismatch: computed {computed:#06x}, received {received:#06x}")]
    ChecksumMismatch {
        /// CRC-16 computed over the received payload.
        computed: u16,
        /// CRC-16 carried by the frame.
        received: u16,
    },
    /// The gateway text format carries two channels; the frame has fewer.
    #[error("text transcoding needs 2 channels, frame has {0}")]
    TextNeedsTwoChannels(usize),
    /// The rendered text did not fit in one radio packet.
    #[error("rendered text exceeds the transport limit")]
    TextOverflow,
}

/// One channel reading in wire form: integer part and hundredths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChannelReading {
    /// Integer part, truncated toward zero, as a two's complement byte.
    pub integer: u8,
    /// `round(fraction * 100)`, as a two's complement byte.
    pub fraction: u8,
}

impl ChannelReading {
    /// Reading reported for a sensor that did not respond.
    pub const PLACEHOLDER: ChannelReading = ChannelReading {
        integer: 0,
        fraction: 0,
    };

    /// Decomposes a calibrated value into its wire bytes.
    ///
    /// The integer part is the value truncated toward zero and the fraction is
    /// the remainder scaled to hundredths and rounded. Both are narrowed to a
    /// byte by two's complement wrapping, so negative values keep their sign
    /// bits: `-1.5` becomes `(0xFF, 0xCE)`, i.e. `(-1, -50)`. Values outside
    /// `-128.0..256.0` are a caller contract violation and wrap silently.
    pub fn from_value(value: f32) -> Self {
        let integer = libm::truncf(value);
        let fraction = libm::roundf((value - integer) * 100.0);
        Self {
            integer: integer as i32 as u8,
            fraction: fraction as i32 as u8,
        }
    }

    /// Decomposes `reading`, or yields the placeholder for an absent sensor.
    pub fn from_reading(reading: Option<f32>) -> Self {
        reading.map_or(Self::PLACEHOLDER, Self::from_value)
    }

    /// Wire bytes in frame order.
    pub fn to_bytes(self) -> [u8; 2] {
        [self.integer, self.fraction]
    }
}

/// Per-deployment frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    node_id_len: usize,
    channels: usize,
}

impl FrameLayout {
    /// Validates a frame geometry against the buffer and transport limits.
    ///
    /// # Errors
    /// - [`FrameError::NodeIdTooLong`] if `node_id_len > MAX_NODE_ID_LEN`
    /// - [`FrameError::TooManyChannels`] if `channels > MAX_CHANNELS`
    /// - [`FrameError::PayloadTooLarge`] if the binary frame, checksum
    ///   included, exceeds [`MAX_PAYLOAD_LEN`]
    pub fn new(node_id_len: usize, channels: usize) -> Result<Self, FrameError> {
        if node_id_len > MAX_NODE_ID_LEN {
            return Err(FrameError::NodeIdTooLong {
                len: node_id_len,
                max: MAX_NODE_ID_LEN,
            });
        }
        if channels > MAX_CHANNELS {
            return Err(FrameError::TooManyChannels {
                channels,
                max: MAX_CHANNELS,
            });
        }
        let layout = Self {
            node_id_len,
            channels,
        };
        if layout.wire_len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge {
                len: layout.wire_len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(layout)
    }

    /// Node identifier length.
    pub const fn node_id_len(&self) -> usize {
        self.node_id_len
    }

    /// Number of channel pairs.
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Payload length, checksum excluded.
    pub const fn payload_len(&self) -> usize {
        self.node_id_len + DEVICE_ID_LEN + 2 * self.channels + AUX_STATUS_LEN
    }

    /// Binary frame length, checksum included.
    pub const fn wire_len(&self) -> usize {
        self.payload_len() + CRC_LEN
    }

    const fn device_id_offset(&self) -> usize {
        self.node_id_len
    }

    const fn readings_offset(&self) -> usize {
        self.device_id_offset() + DEVICE_ID_LEN
    }

    const fn aux_offset(&self) -> usize {
        self.readings_offset() + 2 * self.channels
    }
}

/// Canonical in-memory record of one duty cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame {
    layout: FrameLayout,
    node_id: Vec<u8, MAX_NODE_ID_LEN>,
    device_id: DeviceId,
    readings: Vec<ChannelReading, MAX_CHANNELS>,
    aux_status: u8,
}

impl TelemetryFrame {
    /// Assembles a frame for `layout`.
    ///
    /// Fewer `readings` than channels are padded with placeholders.
    ///
    /// # Errors
    /// - [`FrameError::NodeIdLength`] if `node_id` does not match the layout
    /// - [`FrameError::ExtraReadings`] if there are more readings than channels
    pub fn new(
        layout: FrameLayout,
        node_id: &[u8],
        device_id: DeviceId,
        readings: &[ChannelReading],
        aux_status: u8,
    ) -> Result<Self, FrameError> {
        if node_id.len() != layout.node_id_len {
            return Err(FrameError::NodeIdLength {
                expected: layout.node_id_len,
                actual: node_id.len(),
            });
        }
        if readings.len() > layout.channels {
            return Err(FrameError::ExtraReadings {
                expected: layout.channels,
                actual: readings.len(),
            });
        }
        let node_id = Vec::from_slice(node_id).map_err(|_| FrameError::NodeIdTooLong {
            len: node_id.len(),
            max: MAX_NODE_ID_LEN,
        })?;
        let mut padded: Vec<ChannelReading, MAX_CHANNELS> =
            Vec::from_slice(readings).map_err(|_| FrameError::TooManyChannels {
                channels: readings.len(),
                max: MAX_CHANNELS,
            })?;
        padded
            .resize(layout.channels, ChannelReading::PLACEHOLDER)
            .map_err(|_| FrameError::TooManyChannels {
                channels: layout.channels,
                max: MAX_CHANNELS,
            })?;
        Ok(Self {
            layout,
            node_id,
            device_id,
            readings: padded,
            aux_status,
        })
    }

    /// Frame geometry.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Logical end-node identifier.
    pub fn node_id(&self) -> &[u8] {
        &self.node_id
    }

    /// Physical unit identifier.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// One reading per channel, placeholders included.
    pub fn readings(&self) -> &[ChannelReading] {
        &self.readings
    }

    /// Auxiliary status byte.
    pub fn aux_status(&self) -> u8 {
        self.aux_status
    }

    /// Serializes the frame and computes its checksum.
    pub fn encode(&self) -> WireFrame {
        let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
        // Cannot overflow: the layout was checked against MAX_PAYLOAD_LEN.
        let _ = payload.extend_from_slice(&self.node_id);
        let _ = payload.extend_from_slice(self.device_id.as_bytes());
        for reading in &self.readings {
            let _ = payload.extend_from_slice(&reading.to_bytes());
        }
        let _ = payload.push(self.aux_status);

        let checksum = crc::crc16(&payload);
        trace!("encoded {} byte payload, crc {}", payload.len(), checksum);
        WireFrame { payload, checksum }
    }

    /// Parses a received binary frame back into its fields.
    ///
    /// # Errors
    /// - [`FrameError::ChecksumMismatch`] if the frame fails its CRC check
    /// - [`FrameError::LengthMismatch`] if the payload length differs from `layout`
    pub fn decode(layout: FrameLayout, wire: &WireFrame) -> Result<Self, FrameError> {
        let computed = crc::crc16(wire.payload());
        if computed != wire.checksum() {
            return Err(FrameError::ChecksumMismatch {
                computed,
                received: wire.checksum(),
            });
        }
        let payload = wire.payload();
        if payload.len() != layout.payload_len() {
            return Err(FrameError::LengthMismatch {
                expected: layout.payload_len(),
                actual: payload.len(),
            });
        }

        let mut device_id = [0u8; DEVICE_ID_LEN];
        device_id.copy_from_slice(&payload[layout.device_id_offset()..layout.readings_offset()]);
        let mut readings: Vec<ChannelReading, MAX_CHANNELS> = Vec::new();
        for pair in payload[layout.readings_offset()..layout.aux_offset()].chunks_exact(2) {
            let _ = readings.push(ChannelReading {
                integer: pair[0],
                fraction: pair[1],
            });
        }
        Self::new(
            layout,
            &payload[..layout.device_id_offset()],
            DeviceId(device_id),
            &readings,
            payload[layout.aux_offset()],
        )
    }
}

/// Encodes one frame: the whole encoder contract in a single call.
///
/// # Errors
/// See [`FrameLayout::new`] and [`TelemetryFrame::new`]. Data never fails:
/// absent sensors are passed as `None` and encoded as placeholders.
pub fn encode(
    node_id: &[u8],
    device_id: DeviceId,
    channel_readings: &[Option<f32>],
    aux_status: u8,
) -> Result<WireFrame, FrameError> {
    let layout = FrameLayout::new(node_id.len(), channel_readings.len())?;
    let mut readings: Vec<ChannelReading, MAX_CHANNELS> = Vec::new();
    for &reading in channel_readings {
        let _ = readings.push(ChannelReading::from_reading(reading));
    }
    Ok(TelemetryFrame::new(layout, node_id, device_id, &readings, aux_status)?.encode())
}

/// Byte-exact transmission unit: payload plus CRC-16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    payload: Vec<u8, MAX_PAYLOAD_LEN>,
    checksum: u16,
}

impl WireFrame {
    /// Splits a received binary frame into payload and trailing checksum.
    ///
    /// The checksum is not checked here; see [`WireFrame::verify`].
    ///
    /// # Errors
    /// - [`FrameError::Truncated`] if `bytes` cannot hold a checksum
    /// - [`FrameError::PayloadTooLarge`] if `bytes` exceeds the transport limit
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < CRC_LEN {
            return Err(FrameError::Truncated(bytes.len()));
        }
        let (payload, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge {
            len: bytes.len(),
            max: MAX_PAYLOAD_LEN,
        })?;
        Ok(Self {
            payload,
            checksum: crc::from_wire([trailer[0], trailer[1]]),
        })
    }

    /// Frame payload, checksum excluded.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// CRC-16 carried by the frame.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Returns `true` if the checksum matches the payload.
    pub fn verify(&self) -> bool {
        crc::verify(&self.payload, self.checksum)
    }

    /// Binary transmission bytes: payload, then CRC low byte, then high byte.
    pub fn to_bytes(&self) -> Vec<u8, MAX_PAYLOAD_LEN> {
        let mut bytes = self.payload.clone();
        // A payload from a FrameLayout always leaves room for the trailer.
        let _ = bytes.extend_from_slice(&crc::to_wire(self.checksum));
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_layout() -> FrameLayout {
        FrameLayout::new(6, 2).unwrap()
    }

    #[test]
    fn test_decompose_positive_value() {
        let r = ChannelReading::from_value(23.47);
        assert_eq!(r.integer, 23);
        assert_eq!(r.fraction, 47);

        let r = ChannelReading::from_value(21.5);
        assert_eq!(r.to_bytes(), [21, 50]);
    }

    #[test]
    fn test_decompose_truncates_toward_zero() {
        let r = ChannelReading::from_value(-1.5);
        assert_eq!(r.integer as i8, -1);
        assert_eq!(r.fraction as i8, -50);
        assert_eq!(r.to_bytes(), [0xff, 0xce]);

        let r = ChannelReading::from_value(-0.25);
        assert_eq!(r.to_bytes(), [0, (-25i8) as u8]);
    }

    #[test]
    fn test_absent_sensor_is_placeholder() {
        assert_eq!(ChannelReading::from_reading(None), ChannelReading::PLACEHOLDER);
        assert_eq!(ChannelReading::PLACEHOLDER.to_bytes(), [0, 0]);
    }

    #[test]
    fn test_layout_lengths() {
        let layout = reference_layout();
        assert_eq!(layout.payload_len(), 6 + 6 + 4 + 1);
        assert_eq!(layout.wire_len(), 19);

        let empty = FrameLayout::new(0, 0).unwrap();
        assert_eq!(empty.payload_len(), DEVICE_ID_LEN + AUX_STATUS_LEN);
    }

    #[test]
    fn test_layout_rejects_oversized_geometry() {
        assert_eq!(
            FrameLayout::new(MAX_NODE_ID_LEN + 1, 2),
            Err(FrameError::NodeIdTooLong {
                len: MAX_NODE_ID_LEN + 1,
                max: MAX_NODE_ID_LEN
            })
        );
        assert_eq!(
            FrameLayout::new(6, MAX_CHANNELS + 1),
            Err(FrameError::TooManyChannels {
                channels: MAX_CHANNELS + 1,
                max: MAX_CHANNELS
            })
        );
        assert!(FrameLayout::new(MAX_NODE_ID_LEN, MAX_CHANNELS).is_ok());
    }

    #[test]
    fn test_reference_frame_bytes() {
        let frame = TelemetryFrame::new(
            reference_layout(),
            b"<1234>",
            DeviceId::DEFAULT,
            &[
                ChannelReading::from_value(23.47),
                ChannelReading::from_value(19.06),
            ],
            1,
        )
        .unwrap();
        let wire = frame.encode();

        assert_eq!(
            wire.payload(),
            &[
                b'<', b'1', b'2', b'3', b'4', b'>', 19, 11, 3, 18, 12, 0, 23, 47, 19, 6, 1
            ]
        );
        assert_eq!(wire.checksum(), crc::crc16(wire.payload()));
        assert!(wire.verify());

        let bytes = wire.to_bytes();
        assert_eq!(bytes.len(), 19);
        assert_eq!(bytes[17], (wire.checksum() & 0xff) as u8);
        assert_eq!(bytes[18], (wire.checksum() >> 8) as u8);
    }

    #[test]
    fn test_length_is_fixed_regardless_of_responding_sensors() {
        for channels in 0..=MAX_CHANNELS {
            let layout = FrameLayout::new(6, channels).unwrap();
            for responding in 0..=channels {
                let readings = [ChannelReading::from_value(20.25); MAX_CHANNELS];
                let frame = TelemetryFrame::new(
                    layout,
                    b"<1234>",
                    DeviceId::DEFAULT,
                    &readings[..responding],
                    0,
                )
                .unwrap();
                assert_eq!(frame.readings().len(), channels);
                assert_eq!(frame.encode().payload().len(), 6 + 6 + 2 * channels + 1);
            }
        }
    }

    #[test]
    fn test_missing_channels_are_zero_filled() {
        let frame =
            TelemetryFrame::new(reference_layout(), b"<1234>", DeviceId::DEFAULT, &[], 0).unwrap();
        let wire = frame.encode();
        assert_eq!(&wire.payload()[12..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_frame_rejects_mismatched_inputs() {
        assert_eq!(
            TelemetryFrame::new(reference_layout(), b"<12>", DeviceId::DEFAULT, &[], 0),
            Err(FrameError::NodeIdLength {
                expected: 6,
                actual: 4
            })
        );
        let three = [ChannelReading::PLACEHOLDER; 3];
        assert_eq!(
            TelemetryFrame::new(reference_layout(), b"<1234>", DeviceId::DEFAULT, &three, 0),
            Err(FrameError::ExtraReadings {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_encode_contract_with_ghost_devices() {
        let wire = encode(b"<1234>", DeviceId::DEFAULT, &[Some(23.47), None], 0).unwrap();
        assert_eq!(&wire.payload()[12..], &[23, 47, 0, 0, 0]);
        assert!(wire.verify());
    }

    #[test]
    fn test_encode_with_no_sensors_and_empty_node_id() {
        let wire = encode(&[], DeviceId([0; 6]), &[], 0).unwrap();
        assert_eq!(wire.payload(), &[0; 7]);
        assert_eq!(wire.checksum(), 0);
    }

    #[test]
    fn test_decode_received_frame() {
        let frame = TelemetryFrame::new(
            reference_layout(),
            b"<1234>",
            DeviceId([1, 2, 3, 4, 5, 6]),
            &[ChannelReading::from_value(4.5)],
            1,
        )
        .unwrap();
        let received = WireFrame::from_bytes(&frame.encode().to_bytes()).unwrap();

        let decoded = TelemetryFrame::decode(reference_layout(), &received).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.readings()[1], ChannelReading::PLACEHOLDER);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let wire = encode(b"<1234>", DeviceId::DEFAULT, &[Some(1.0), Some(2.0)], 0).unwrap();
        let mut bytes = wire.to_bytes();
        bytes[3] ^= 0x10;

        let received = WireFrame::from_bytes(&bytes).unwrap();
        assert!(!received.verify());
        assert!(matches!(
            TelemetryFrame::decode(reference_layout(), &received),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_geometry() {
        let wire = encode(b"<1234>", DeviceId::DEFAULT, &[Some(1.0)], 0).unwrap();
        assert_eq!(
            TelemetryFrame::decode(reference_layout(), &wire),
            Err(FrameError::LengthMismatch {
                expected: 17,
                actual: 15
            })
        );
    }

    #[test]
    fn test_from_bytes_needs_a_trailer() {
        assert_eq!(WireFrame::from_bytes(&[0x42]), Err(FrameError::Truncated(1)));
        let empty = WireFrame::from_bytes(&[0, 0]).unwrap();
        assert!(empty.payload().is_empty());
        assert!(empty.verify());
    }
}
