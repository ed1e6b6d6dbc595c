//! Status response decoding.
//!
//! The get-status response carries a fixed 12-byte layout:
//!
//! ```text
//! offset  0  1  2 | 3    | 4       | 5    | 6  7      | 8  9      | 10   | 11
//!         reserved| mode | submode | temp | cook h:m  | wait h:m  | heat | status
//! ```
//!
//! - `mode` is zero-based on the wire (`0xFF` = off) and exposed one-based
//! - `temp` is reported both as current and as target temperature
//! - `wait h:m` is the cooking time plus the delayed-start offset; the delay
//!   is recovered by subtracting the cooking time
//!
//! Decoding is pure and never defaults a missing field.

use skycooker_core::{
    CookTime, CookingMode, DeviceState, Error, OperatingStatus, Result,
    constants::{MAX_HOURS, MAX_MINUTES, STATUS_PAYLOAD_LEN},
};

const MODE: usize = 3;
const SUBMODE: usize = 4;
const TEMPERATURE: usize = 5;
const COOK_HOURS: usize = 6;
const COOK_MINUTES: usize = 7;
const WAIT_HOURS: usize = 8;
const WAIT_MINUTES: usize = 9;
const HEAT: usize = 10;
const STATUS: usize = 11;

/// Wait byte the device writes when a field underflows.
const UNSET: u8 = 0xFF;

/// Decode a status payload into a [`DeviceState`].
///
/// Extra trailing bytes are ignored.
///
/// # Errors
/// Returns `Error::PayloadTooShort` if fewer than 12 bytes are supplied.
///
/// # Example
/// ```
/// use skycooker_core::{CookingMode, OperatingStatus};
/// use skycooker_protocol::decode_status;
///
/// let payload = [0, 0, 0, 0x05, 0, 100, 1, 30, 1, 30, 1, 0x05];
/// let state = decode_status(&payload).unwrap();
/// assert_eq!(state.mode, CookingMode::Multicook);
/// assert_eq!(state.status, OperatingStatus::Cooking);
/// assert_eq!(state.temperature, 100);
/// assert_eq!(state.delay.unwrap().total_minutes(), 0);
/// assert!(state.post_heat);
/// ```
pub fn decode_status(payload: &[u8]) -> Result<DeviceState> {
    if payload.len() < STATUS_PAYLOAD_LEN {
        return Err(Error::PayloadTooShort {
            expected: STATUS_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let status = OperatingStatus::from_u8(payload[STATUS]);
    let cooking_time = CookTime {
        hours: payload[COOK_HOURS],
        minutes: payload[COOK_MINUTES],
    };
    let delay = decode_delay(payload[WAIT_HOURS], payload[WAIT_MINUTES], cooking_time);
    let heat = payload[HEAT];

    Ok(DeviceState {
        status,
        mode: CookingMode::from_wire(payload[MODE]),
        submode: payload[SUBMODE],
        temperature: payload[TEMPERATURE],
        target_temperature: payload[TEMPERATURE],
        cooking_time,
        delay,
        post_heat: heat == 1,
        power: status != OperatingStatus::Idle,
        timer_mode: status == OperatingStatus::Waiting,
    })
}

/// Recover the delayed-start offset from the raw wait fields.
///
/// Each wait field is compared with its cooking field. A wait hour below the
/// cooking hour, or a `0xFF` byte in either field, is the device's "no delay"
/// sentinel. The minutes borrow one hour only when the encoder carried them,
/// which requires a spare wait hour.
fn decode_delay(wait_hours: u8, wait_minutes: u8, cooking: CookTime) -> Option<CookTime> {
    if wait_hours == UNSET || wait_minutes == UNSET || wait_hours < cooking.hours {
        return None;
    }

    let mut hours = wait_hours - cooking.hours;
    let minutes = if wait_minutes >= cooking.minutes {
        wait_minutes - cooking.minutes
    } else {
        hours = hours.checked_sub(1)?;
        u8::try_from(u16::from(wait_minutes) + 60 - u16::from(cooking.minutes)).ok()?
    };

    if hours > MAX_HOURS || minutes > MAX_MINUTES {
        return None;
    }
    Some(CookTime { hours, minutes })
}

/// Encode a [`DeviceState`] into the 12-byte status layout.
///
/// Used by the simulated cooker. `target_temperature` has no slot of its own
/// and is not encoded. A `None` delay is written as the cooking time minus
/// one in each field, wrapping to `0xFF` the way the device does.
pub fn encode_status(state: &DeviceState) -> Vec<u8> {
    let cooking = state.cooking_time;
    let (wait_hours, wait_minutes) = match state.delay {
        Some(delay) => crate::request::delay_wire_fields(delay, cooking),
        None => (
            cooking.hours.wrapping_sub(1),
            cooking.minutes.wrapping_sub(1),
        ),
    };

    let mut payload = vec![0u8; STATUS_PAYLOAD_LEN];
    payload[MODE] = state.mode.to_wire();
    payload[SUBMODE] = state.submode;
    payload[TEMPERATURE] = state.temperature;
    payload[COOK_HOURS] = cooking.hours;
    payload[COOK_MINUTES] = cooking.minutes;
    payload[WAIT_HOURS] = wait_hours;
    payload[WAIT_MINUTES] = wait_minutes;
    payload[HEAT] = u8::from(state.post_heat);
    payload[STATUS] = state.status.to_u8();
    payload
}
