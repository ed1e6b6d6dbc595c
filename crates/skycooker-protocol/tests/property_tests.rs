//! Property-based tests for the frame codec and status decoder.

use proptest::prelude::*;
use skycooker_core::{CookTime, Error};
use skycooker_protocol::{Frame, decode_status, request::delay_wire_fields};

/// Strategy for arbitrary payloads up to a generous BLE MTU.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

fn cook_time() -> impl Strategy<Value = CookTime> {
    (0u8..=24, 0u8..=59).prop_map(|(hours, minutes)| CookTime { hours, minutes })
}

proptest! {
    /// Property: decoding an encoded frame returns its parts unchanged.
    #[test]
    fn prop_frame_roundtrip(sequence in any::<u8>(), command in any::<u8>(), payload in payload()) {
        let wire = Frame::encode(sequence, command, &payload);
        prop_assert_eq!(wire.len(), payload.len() + 4);

        let frame = Frame::decode(&wire).unwrap();
        prop_assert_eq!(frame.sequence(), sequence);
        prop_assert_eq!(frame.command(), command);
        prop_assert_eq!(&frame.payload()[..], &payload[..]);
    }

    /// Property: a buffer with a wrong start marker never decodes.
    #[test]
    fn prop_bad_start_rejected(
        first in any::<u8>().prop_filter("not start", |b| *b != 0x55),
        body in payload(),
    ) {
        let mut raw = vec![first];
        raw.extend_from_slice(&body);
        raw.push(0xAA);
        let is_invalid_magic = matches!(Frame::decode(&raw), Err(Error::InvalidMagic { .. }));
        prop_assert!(is_invalid_magic);
    }

    /// Property: a buffer with a wrong end marker never decodes.
    #[test]
    fn prop_bad_end_rejected(
        last in any::<u8>().prop_filter("not end", |b| *b != 0xAA),
        body in payload(),
    ) {
        let mut raw = vec![0x55];
        raw.extend_from_slice(&body);
        raw.push(last);
        let is_invalid_magic = matches!(Frame::decode(&raw), Err(Error::InvalidMagic { .. }));
        prop_assert!(is_invalid_magic);
    }

    /// Property: a delay written with the minute carry decodes back exactly.
    #[test]
    fn prop_delay_carry_is_inverted(delay in cook_time(), cooking in cook_time()) {
        let (wait_hours, wait_minutes) = delay_wire_fields(delay, cooking);
        let payload = [
            0, 0, 0, 0x05, 0, 100,
            cooking.hours, cooking.minutes,
            wait_hours, wait_minutes,
            0, 0x02,
        ];
        let state = decode_status(&payload).unwrap();
        prop_assert_eq!(state.delay, Some(delay));
        prop_assert_eq!(state.cooking_time, cooking);
    }

    /// Property: the decoder never panics, whatever the payload.
    #[test]
    fn prop_status_decode_total(raw in prop::collection::vec(any::<u8>(), 0..32)) {
        let result = decode_status(&raw);
        prop_assert_eq!(result.is_ok(), raw.len() >= 12);
    }
}
