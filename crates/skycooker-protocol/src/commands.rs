//! Command ids understood by RMC-M40S family cookers.
//!
//! Every request carries a one-byte command id right after the sequence
//! byte, and the device echoes the same id in its response:
//!
//! ```text
//! 55 <SEQ> <COMMAND> <PAYLOAD...> AA
//!          ^^^^^^^^^
//!          Command id position
//! ```
//!
//! # Command Categories
//!
//! ## Session
//! - `Auth` (0xFF): present the pre-shared key, must succeed before anything else
//! - `GetVersion` (0x01): firmware major/minor
//!
//! ## Query
//! - `GetStatus` (0x06): 12-byte status snapshot
//!
//! ## Control
//! - `TurnOn` (0x03), `TurnOff` (0x04)
//! - `SetMainMode` (0x05): program, temperature and duration in one frame
//! - `SetTemperature` (0x0B), `SetCookingTime` (0x0C), `SetDelayTime` (0x14)
//! - `SetPostHeat` (0x16)
//!
//! Control commands answer with a success byte as the first payload byte.
//!
//! # Usage
//!
//! ```
//! use skycooker_protocol::CommandCode;
//! use std::time::Duration;
//!
//! let cmd = CommandCode::from_u8(0x06).unwrap();
//! assert_eq!(cmd, CommandCode::GetStatus);
//! assert_eq!(cmd.as_u8(), 0x06);
//! assert_eq!(cmd.default_timeout(), Duration::from_millis(1500));
//! assert!(!cmd.is_mutating());
//! ```

use serde::{Deserialize, Serialize};
use skycooker_core::constants::*;
use std::fmt;
use std::time::Duration;

/// Command ids of the cooker protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCode {
    // Session
    GetVersion, // 0x01
    Auth,       // 0xFF

    // Query
    GetStatus, // 0x06

    // Control
    TurnOn,         // 0x03
    TurnOff,        // 0x04
    SetMainMode,    // 0x05
    SetTemperature, // 0x0B
    SetCookingTime, // 0x0C
    SetDelayTime,   // 0x14
    SetPostHeat,    // 0x16
}

impl CommandCode {
    pub const ALL: [CommandCode; 10] = [
        CommandCode::GetVersion,
        CommandCode::Auth,
        CommandCode::GetStatus,
        CommandCode::TurnOn,
        CommandCode::TurnOff,
        CommandCode::SetMainMode,
        CommandCode::SetTemperature,
        CommandCode::SetCookingTime,
        CommandCode::SetDelayTime,
        CommandCode::SetPostHeat,
    ];

    /// Map a wire byte to a known command, `None` for anything else.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            COMMAND_GET_VERSION => Some(CommandCode::GetVersion),
            COMMAND_AUTH => Some(CommandCode::Auth),
            COMMAND_GET_STATUS => Some(CommandCode::GetStatus),
            COMMAND_TURN_ON => Some(CommandCode::TurnOn),
            COMMAND_TURN_OFF => Some(CommandCode::TurnOff),
            COMMAND_SET_MAIN_MODE => Some(CommandCode::SetMainMode),
            COMMAND_SET_TEMPERATURE => Some(CommandCode::SetTemperature),
            COMMAND_SET_COOKING_TIME => Some(CommandCode::SetCookingTime),
            COMMAND_SET_DELAY_TIME => Some(CommandCode::SetDelayTime),
            COMMAND_SET_POST_HEAT => Some(CommandCode::SetPostHeat),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CommandCode::GetVersion => COMMAND_GET_VERSION,
            CommandCode::Auth => COMMAND_AUTH,
            CommandCode::GetStatus => COMMAND_GET_STATUS,
            CommandCode::TurnOn => COMMAND_TURN_ON,
            CommandCode::TurnOff => COMMAND_TURN_OFF,
            CommandCode::SetMainMode => COMMAND_SET_MAIN_MODE,
            CommandCode::SetTemperature => COMMAND_SET_TEMPERATURE,
            CommandCode::SetCookingTime => COMMAND_SET_COOKING_TIME,
            CommandCode::SetDelayTime => COMMAND_SET_DELAY_TIME,
            CommandCode::SetPostHeat => COMMAND_SET_POST_HEAT,
        }
    }

    /// Receive timeout used when the caller does not supply one.
    ///
    /// # Example
    /// ```
    /// use skycooker_protocol::CommandCode;
    /// use std::time::Duration;
    ///
    /// assert_eq!(CommandCode::GetVersion.default_timeout(), Duration::from_secs(5));
    /// assert_eq!(CommandCode::Auth.default_timeout(), Duration::from_secs(3));
    /// ```
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(Self::timeout_ms_for(self.as_u8()))
    }

    /// Timeout table keyed by raw command id, with a default fallback.
    pub fn timeout_ms_for(command: u8) -> u64 {
        match command {
            COMMAND_GET_VERSION => VERSION_TIMEOUT_MS,
            COMMAND_AUTH => AUTH_TIMEOUT_MS,
            _ => DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }

    /// Returns `true` for commands that change device state and answer with
    /// a success byte.
    #[inline]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::TurnOn
                | Self::TurnOff
                | Self::SetMainMode
                | Self::SetTemperature
                | Self::SetCookingTime
                | Self::SetDelayTime
                | Self::SetPostHeat
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandCode::GetVersion => "get-version",
            CommandCode::Auth => "auth",
            CommandCode::GetStatus => "get-status",
            CommandCode::TurnOn => "turn-on",
            CommandCode::TurnOff => "turn-off",
            CommandCode::SetMainMode => "set-main-mode",
            CommandCode::SetTemperature => "set-temperature",
            CommandCode::SetCookingTime => "set-cooking-time",
            CommandCode::SetDelayTime => "set-delay-time",
            CommandCode::SetPostHeat => "set-post-heat",
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.as_u8())
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> u8 {
        code.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_round_trip_all() {
        for cmd in CommandCode::ALL {
            assert_eq!(CommandCode::from_u8(cmd.as_u8()), Some(cmd));
        }
    }

    #[rstest]
    #[case(0x00)]
    #[case(0x02)]
    #[case(0x07)]
    #[case(0xFE)]
    fn test_unknown_ids(#[case] raw: u8) {
        assert_eq!(CommandCode::from_u8(raw), None);
    }

    #[rstest]
    #[case(CommandCode::GetVersion, 5000)]
    #[case(CommandCode::Auth, 3000)]
    #[case(CommandCode::GetStatus, 1500)]
    #[case(CommandCode::SetMainMode, 1500)]
    fn test_timeout_table(#[case] cmd: CommandCode, #[case] expected_ms: u64) {
        assert_eq!(cmd.default_timeout(), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_timeout_fallback_for_unknown_id() {
        assert_eq!(CommandCode::timeout_ms_for(0x42), DEFAULT_COMMAND_TIMEOUT_MS);
    }

    #[test]
    fn test_mutating_partition() {
        let mutating: Vec<_> = CommandCode::ALL
            .iter()
            .filter(|cmd| cmd.is_mutating())
            .collect();
        assert_eq!(mutating.len(), 7);
        assert!(!CommandCode::Auth.is_mutating());
        assert!(!CommandCode::GetStatus.is_mutating());
        assert!(!CommandCode::GetVersion.is_mutating());
    }

    #[test]
    fn test_display() {
        assert_eq!(CommandCode::SetDelayTime.to_string(), "set-delay-time(0x14)");
    }
}
