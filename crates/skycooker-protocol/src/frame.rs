use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use skycooker_core::{Error, Result, constants::*};

/// Frame represents one complete wire message of the SkyCooker protocol.
///
/// # Wire Format
/// Frames are bounded by fixed start/end markers and carry no length field:
/// - Start marker: `0x55`
/// - Sequence: one byte, echoed back by the device
/// - Command: one byte, echoed back by the device
/// - Payload: zero or more bytes
/// - End marker: `0xAA`
///
/// # Protocol Flow Example
///
/// **1. Client requests status (sequence 7)**
/// ```text
/// 55 07 06 AA
/// ^^ ^^ ^^ ^^
/// |  |  |  End
/// |  |  Command: get-status
/// |  Sequence
/// Start
/// ```
///
/// **2. Cooker answers with the same sequence and command**
/// ```text
/// 55 07 06 00 00 00 05 00 64 01 1E 01 1E 01 05 AA
///          ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
///          12-byte status payload
/// ```
///
/// # Basic Usage
/// ```
/// use skycooker_protocol::Frame;
///
/// let wire = Frame::encode(7, 0x06, &[]);
/// assert_eq!(&wire[..], &[0x55, 0x07, 0x06, 0xAA]);
///
/// let frame = Frame::decode(&wire).unwrap();
/// assert_eq!(frame.sequence(), 7);
/// assert_eq!(frame.command(), 0x06);
/// assert!(frame.payload().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number used for request/response correlation
    sequence: u8,

    /// Command id
    command: u8,

    /// Bytes between the command id and the end marker
    payload: Bytes,
}

impl Frame {
    /// Create a new frame from its parts.
    pub fn new(sequence: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Frame {
            sequence,
            command,
            payload: payload.into(),
        }
    }

    /// Encode a frame directly to its wire bytes.
    ///
    /// No length limit is enforced here; the transport and the device do that.
    pub fn encode(sequence: u8, command: u8, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
        buf.put_u8(START_BYTE);
        buf.put_u8(sequence);
        buf.put_u8(command);
        buf.put_slice(payload);
        buf.put_u8(END_BYTE);
        buf.freeze()
    }

    /// Decode wire bytes into a frame.
    ///
    /// # Errors
    /// - `Error::InvalidMagic` if the buffer does not start with `0x55` or
    ///   does not end with `0xAA`
    /// - `Error::FrameTooShort` if the markers are valid but there is no
    ///   room for the sequence and command bytes
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (first, last) = match (raw.first(), raw.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(Error::FrameTooShort {
                    len: 0,
                    min: FRAME_OVERHEAD,
                });
            }
        };

        if first != START_BYTE || last != END_BYTE || raw.len() < 2 {
            return Err(Error::InvalidMagic { first, last });
        }

        if raw.len() < FRAME_OVERHEAD {
            return Err(Error::FrameTooShort {
                len: raw.len(),
                min: FRAME_OVERHEAD,
            });
        }

        Ok(Frame {
            sequence: raw[1],
            command: raw[2],
            payload: Bytes::copy_from_slice(&raw[3..raw.len() - 1]),
        })
    }

    /// Encode this frame to wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        Self::encode(self.sequence, self.command, &self.payload)
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Size of the frame on the wire.
    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }
}

/// Hex dump used in trace logs, e.g. `55 07 06 aa`.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq={} cmd=0x{:02X} payload=[{}]",
            self.sequence,
            self.command,
            HexDump(&self.payload)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_encode_layout() {
        let wire = Frame::encode(0x10, 0x05, &[0x05, 0x00, 0x64, 0x01, 0x1E, 0x00]);
        assert_eq!(
            &wire[..],
            &[0x55, 0x10, 0x05, 0x05, 0x00, 0x64, 0x01, 0x1E, 0x00, 0xAA]
        );
    }

    #[test]
    fn test_decode_extracts_fields() {
        let frame = Frame::decode(&[0x55, 0x01, 0xFF, 0x01, 0xAA]).unwrap();
        assert_eq!(frame.sequence(), 0x01);
        assert_eq!(frame.command(), 0xFF);
        assert_eq!(&frame.payload()[..], &[0x01]);
        assert_eq!(frame.wire_len(), 5);
    }

    #[test]
    fn test_decode_empty_payload() {
        let frame = Frame::decode(&[0x55, 0x02, 0x06, 0xAA]).unwrap();
        assert!(frame.payload().is_empty());
    }

    #[rstest]
    #[case(&[0x54, 0x01, 0x06, 0xAA])] // bad start
    #[case(&[0x55, 0x01, 0x06, 0xAB])] // bad end
    #[case(&[0x00, 0x01, 0x06, 0x00])] // both bad
    #[case(&[0x55])] // single byte
    fn test_decode_invalid_magic(#[case] raw: &[u8]) {
        let result = Frame::decode(raw);
        assert!(matches!(result, Err(Error::InvalidMagic { .. })));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x55, 0xAA])]
    #[case(&[0x55, 0x01, 0xAA])]
    fn test_decode_too_short(#[case] raw: &[u8]) {
        let result = Frame::decode(raw);
        assert!(matches!(result, Err(Error::FrameTooShort { .. })));
    }

    #[test]
    fn test_payload_may_contain_markers() {
        let payload = [0xAA, 0x55, 0xAA];
        let wire = Frame::encode(3, 0x0B, &payload);
        let frame = Frame::decode(&wire).unwrap();
        assert_eq!(&frame.payload()[..], &payload);
    }

    #[test]
    fn test_to_bytes_matches_encode() {
        let frame = Frame::new(9, 0x0C, vec![1, 30]);
        assert_eq!(frame.to_bytes(), Frame::encode(9, 0x0C, &[1, 30]));
    }

    #[test]
    fn test_display() {
        let frame = Frame::new(7, 0x06, vec![0x01, 0xab]);
        assert_eq!(frame.to_string(), "seq=7 cmd=0x06 payload=[01 ab]");
    }
}
