//! Typed requests and their payload layouts.
//!
//! [`Request`] pairs a [`CommandCode`] with the payload bytes the cooker
//! expects for it. The helpers at the bottom of the module interpret the
//! short responses to session and control commands.

use crate::commands::CommandCode;
use bytes::Bytes;
use skycooker_core::{AuthKey, CookTime, CookingMode, Error, FirmwareVersion, Result};

/// A single command ready to be framed and sent.
///
/// # Examples
///
/// ```
/// use skycooker_core::{CookTime, CookingMode};
/// use skycooker_protocol::{CommandCode, Request};
///
/// let request = Request::SetMainMode {
///     mode: CookingMode::Multicook,
///     temperature: 100,
///     time: CookTime::new(1, 30).unwrap(),
/// };
/// assert_eq!(request.command(), CommandCode::SetMainMode);
/// assert_eq!(&request.payload()[..], &[0x05, 0x00, 100, 1, 30, 0x00]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Auth(AuthKey),
    GetVersion,
    GetStatus,
    TurnOn,
    TurnOff,
    /// Program, temperature and duration in one frame.
    SetMainMode {
        mode: CookingMode,
        temperature: u8,
        time: CookTime,
    },
    SetTemperature(u8),
    SetCookingTime(CookTime),
    /// Delayed start. The device expects the cooking time added to the
    /// delay, so both are carried here.
    SetDelayTime { delay: CookTime, cooking: CookTime },
    SetPostHeat(bool),
}

impl Request {
    pub fn command(&self) -> CommandCode {
        match self {
            Request::Auth(_) => CommandCode::Auth,
            Request::GetVersion => CommandCode::GetVersion,
            Request::GetStatus => CommandCode::GetStatus,
            Request::TurnOn => CommandCode::TurnOn,
            Request::TurnOff => CommandCode::TurnOff,
            Request::SetMainMode { .. } => CommandCode::SetMainMode,
            Request::SetTemperature(_) => CommandCode::SetTemperature,
            Request::SetCookingTime(_) => CommandCode::SetCookingTime,
            Request::SetDelayTime { .. } => CommandCode::SetDelayTime,
            Request::SetPostHeat(_) => CommandCode::SetPostHeat,
        }
    }

    /// Payload bytes for this request.
    pub fn payload(&self) -> Bytes {
        match self {
            Request::Auth(key) => Bytes::copy_from_slice(key.as_bytes()),
            Request::GetVersion | Request::GetStatus | Request::TurnOn | Request::TurnOff => {
                Bytes::new()
            }
            Request::SetMainMode {
                mode,
                temperature,
                time,
            } => Bytes::from(vec![
                mode.to_wire(),
                0,
                *temperature,
                time.hours,
                time.minutes,
                0,
            ]),
            Request::SetTemperature(temperature) => Bytes::from(vec![*temperature]),
            Request::SetCookingTime(time) => Bytes::from(vec![time.hours, time.minutes]),
            Request::SetDelayTime { delay, cooking } => {
                let (hours, minutes) = delay_wire_fields(*delay, *cooking);
                Bytes::from(vec![hours, minutes])
            }
            Request::SetPostHeat(enabled) => Bytes::from(vec![u8::from(*enabled)]),
        }
    }
}

/// Sum of delay and cooking time, minutes carried into hours.
///
/// This is the inverse of the delta the status decoder applies to the raw
/// wait fields.
pub fn delay_wire_fields(delay: CookTime, cooking: CookTime) -> (u8, u8) {
    let total = delay.total_minutes() + cooking.total_minutes();
    let hours = u8::try_from(total / 60).unwrap_or(u8::MAX);
    // total % 60 < 60
    (hours, (total % 60) as u8)
}

/// Check the success byte of a control command response.
///
/// # Errors
/// - `Error::PayloadTooShort` if the response is empty
/// - `Error::CommandRejected` if the first byte is not `1`
pub fn check_ack(command: CommandCode, payload: &[u8]) -> Result<()> {
    match payload.first() {
        Some(1) => Ok(()),
        Some(_) => Err(Error::CommandRejected {
            command: command.as_u8(),
        }),
        None => Err(Error::PayloadTooShort {
            expected: 1,
            actual: 0,
        }),
    }
}

/// Interpret the response to an authentication request.
///
/// Any non-zero first byte is acceptance.
///
/// # Errors
/// Returns `Error::Auth` when the device rejects the key or answers with an
/// empty payload.
pub fn check_auth(payload: &[u8]) -> Result<()> {
    match payload.first() {
        Some(byte) if *byte != 0 => Ok(()),
        _ => Err(Error::Auth),
    }
}

/// Decode a get-version response (`[major, minor]`).
pub fn parse_version(payload: &[u8]) -> Result<FirmwareVersion> {
    match payload {
        [major, minor, ..] => Ok(FirmwareVersion::new(*major, *minor)),
        _ => Err(Error::PayloadTooShort {
            expected: 2,
            actual: payload.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn time(hours: u8, minutes: u8) -> CookTime {
        CookTime::new(hours, minutes).unwrap()
    }

    #[test]
    fn test_auth_payload_is_key() {
        let key = AuthKey::new([0xB5, 0x4C, 0x75, 0xB1, 0xB4, 0x0C, 0x88, 0xEF]);
        let request = Request::Auth(key);
        assert_eq!(request.command(), CommandCode::Auth);
        assert_eq!(request.payload().len(), 8);
        assert_eq!(&request.payload()[..], key.as_bytes());
    }

    #[rstest]
    #[case(Request::GetVersion)]
    #[case(Request::GetStatus)]
    #[case(Request::TurnOn)]
    #[case(Request::TurnOff)]
    fn test_empty_payloads(#[case] request: Request) {
        assert!(request.payload().is_empty());
    }

    #[test]
    fn test_set_main_mode_uses_wire_mode() {
        let request = Request::SetMainMode {
            mode: CookingMode::Stew,
            temperature: 90,
            time: time(2, 0),
        };
        assert_eq!(&request.payload()[..], &[0x00, 0x00, 90, 2, 0, 0x00]);
    }

    #[test]
    fn test_set_temperature_and_time() {
        assert_eq!(&Request::SetTemperature(85).payload()[..], &[85]);
        assert_eq!(
            &Request::SetCookingTime(time(0, 45)).payload()[..],
            &[0, 45]
        );
    }

    #[rstest]
    #[case(time(1, 0), time(0, 30), (1, 30))]
    #[case(time(0, 40), time(0, 30), (1, 10))]
    #[case(time(2, 59), time(1, 59), (4, 58))]
    #[case(time(0, 0), time(0, 0), (0, 0))]
    fn test_delay_carries_minutes(
        #[case] delay: CookTime,
        #[case] cooking: CookTime,
        #[case] expected: (u8, u8),
    ) {
        assert_eq!(delay_wire_fields(delay, cooking), expected);
        let payload = Request::SetDelayTime { delay, cooking }.payload();
        assert_eq!(&payload[..], &[expected.0, expected.1]);
    }

    #[rstest]
    #[case(true, 1)]
    #[case(false, 0)]
    fn test_post_heat(#[case] enabled: bool, #[case] byte: u8) {
        assert_eq!(&Request::SetPostHeat(enabled).payload()[..], &[byte]);
    }

    #[test]
    fn test_check_ack() {
        assert!(check_ack(CommandCode::TurnOn, &[1]).is_ok());
        assert!(matches!(
            check_ack(CommandCode::TurnOn, &[0]),
            Err(Error::CommandRejected { command: 0x03 })
        ));
        assert!(matches!(
            check_ack(CommandCode::TurnOn, &[2]),
            Err(Error::CommandRejected { .. })
        ));
        assert!(matches!(
            check_ack(CommandCode::TurnOn, &[]),
            Err(Error::PayloadTooShort { .. })
        ));
    }

    #[rstest]
    #[case(&[1], true)]
    #[case(&[2], true)]
    #[case(&[0], false)]
    #[case(&[], false)]
    fn test_check_auth(#[case] payload: &[u8], #[case] accepted: bool) {
        assert_eq!(check_auth(payload).is_ok(), accepted);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version(&[3, 14]).unwrap(), FirmwareVersion::new(3, 14));
        assert!(matches!(
            parse_version(&[3]),
            Err(Error::PayloadTooShort {
                expected: 2,
                actual: 1
            })
        ));
    }
}
