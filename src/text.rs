//! Gateway text transcoding.
//!
//! One gateway variant does not parse the binary frame. It expects the raw
//! node id followed by a small JSON-like document:
//!
//! ```text
//! <1234>{"number":"191103181200","data":{"t0":"23.47","t1":"19.6","h":"1","l":"0"}}
//! ```
//!
//! - `number`: each device id byte as a zero padded two digit decimal
//! - `t0`, `t1`: the first two channels as `<integer>.<fraction>`, both bytes
//!   printed as plain unsigned decimals (so `19.06` renders as `19.6`, which
//!   is what the gateway has always received)
//! - `h`: the auxiliary status byte in decimal
//! - `l`: always `0`
//!
//! ## Limitations
//!
//! - Channels past the second are not represented.
//! - No checksum is appended. The CRC is still computed by the encoder, so a
//!   receiver that understands the binary trailer gets nothing to check; this
//!   looks like an integration gap in the gateway protocol rather than a
//!   design choice, and is kept only for compatibility.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::consts::MAX_PAYLOAD_LEN;
use crate::frame::{FrameError, TelemetryFrame};

struct TextSink(Vec<u8, MAX_PAYLOAD_LEN>);

impl Write for TextSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// Renders `frame` in the gateway text format, ready to transmit.
///
/// # Errors
/// - [`FrameError::TextNeedsTwoChannels`] if the frame has fewer than two channels
/// - [`FrameError::TextOverflow`] if the result exceeds the transport limit
pub fn render(frame: &TelemetryFrame) -> Result<Vec<u8, MAX_PAYLOAD_LEN>, FrameError> {
    let (t0, t1) = match frame.readings() {
        [t0, t1, ..] => (*t0, *t1),
        readings => return Err(FrameError::TextNeedsTwoChannels(readings.len())),
    };

    let mut sink = TextSink(Vec::new());
    sink.0
        .extend_from_slice(frame.node_id())
        .map_err(|_| FrameError::TextOverflow)?;
    write_body(&mut sink, frame, t0.to_bytes(), t1.to_bytes())
        .map_err(|_| FrameError::TextOverflow)?;

    debug!("gateway text frame: {} bytes", sink.0.len());
    Ok(sink.0)
}

fn write_body(
    out: &mut TextSink,
    frame: &TelemetryFrame,
    [t0_int, t0_frac]: [u8; 2],
    [t1_int, t1_frac]: [u8; 2],
) -> fmt::Result {
    out.write_str("{\"number\":\"")?;
    for b in frame.device_id().as_bytes() {
        write!(out, "{:02}", b)?;
    }
    write!(
        out,
        "\",\"data\":{{\"t0\":\"{}.{}\",\"t1\":\"{}.{}\",\"h\":\"{}\",\"l\":\"0\"}}}}",
        t0_int,
        t0_frac,
        t1_int,
        t1_frac,
        frame.aux_status()
    )
}
