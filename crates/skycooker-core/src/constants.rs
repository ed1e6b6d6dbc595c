//! Core constants for the SkyCooker protocol implementation.
//!
//! This module defines the protocol-level constants shared by the codec,
//! the dispatcher and the simulated device.
//!
//! # Frame Structure
//!
//! ```text
//! 0x55 | SEQ | COMMAND | PAYLOAD... | 0xAA
//! ```
//!
//! - `0x55` - Start marker
//! - `SEQ` - Rolling sequence number echoed by the device
//! - `COMMAND` - Command id, echoed by the device in the response
//! - `PAYLOAD` - Zero or more bytes
//! - `0xAA` - End marker
//!
//! # Usage
//!
//! ```
//! use skycooker_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(START_BYTE, 0x55);
//! let timeout = Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS);
//! assert_eq!(timeout.as_millis(), 1500);
//! ```

// ============================================================================
// Frame markers
// ============================================================================

/// First byte of every frame.
pub const START_BYTE: u8 = 0x55;

/// Last byte of every frame.
pub const END_BYTE: u8 = 0xAA;

/// Marker, sequence, command and end marker.
pub const FRAME_OVERHEAD: usize = 4;

// ============================================================================
// Command ids
// ============================================================================

pub const COMMAND_GET_VERSION: u8 = 0x01;
pub const COMMAND_TURN_ON: u8 = 0x03;
pub const COMMAND_TURN_OFF: u8 = 0x04;
pub const COMMAND_SET_MAIN_MODE: u8 = 0x05;
pub const COMMAND_GET_STATUS: u8 = 0x06;
pub const COMMAND_SET_TEMPERATURE: u8 = 0x0B;
pub const COMMAND_SET_COOKING_TIME: u8 = 0x0C;
pub const COMMAND_SET_DELAY_TIME: u8 = 0x14;
pub const COMMAND_SET_POST_HEAT: u8 = 0x16;
pub const COMMAND_AUTH: u8 = 0xFF;

// ============================================================================
// Timeouts and retry tuning
// ============================================================================

/// Receive timeout for commands without a dedicated entry (milliseconds).
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 1500;

/// Firmware version requests are slow on some units (milliseconds).
pub const VERSION_TIMEOUT_MS: u64 = 5000;

/// Authentication receive timeout (milliseconds).
pub const AUTH_TIMEOUT_MS: u64 = 3000;

/// Extra dispatcher attempts after the first one.
pub const DEFAULT_COMMAND_RETRIES: u32 = 2;

/// Base unit of the dispatcher's linear backoff (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 100;

/// Backoff multiplier applied after a receive timeout.
pub const TIMEOUT_BACKOFF_MULTIPLIER: u32 = 2;

/// Backoff multiplier applied after any other retryable error.
pub const ERROR_BACKOFF_MULTIPLIER: u32 = 1;

/// Initial mailbox poll interval (milliseconds).
pub const POLL_INTERVAL_MS: u64 = 50;

/// Ceiling for the adaptive poll interval (milliseconds).
pub const MAX_POLL_INTERVAL_MS: u64 = 200;

/// Whole-cycle attempts made by an update.
pub const DEFAULT_UPDATE_TRIES: u32 = 3;

/// Pause between whole-cycle update attempts (milliseconds).
pub const UPDATE_RETRY_INTERVAL_MS: u64 = 500;

/// Flush/teardown bound for disconnects (milliseconds).
pub const DISCONNECT_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Device limits
// ============================================================================

/// Length of the pre-shared authentication key.
pub const AUTH_KEY_LEN: usize = 8;

/// Minimum length of a status response payload.
pub const STATUS_PAYLOAD_LEN: usize = 12;

/// Number of outcomes kept by the success tracker.
pub const STATS_WINDOW: usize = 100;

pub const MIN_TEMPERATURE: u8 = 30;
pub const MAX_TEMPERATURE: u8 = 120;

pub const MAX_HOURS: u8 = 24;
pub const MAX_MINUTES: u8 = 59;

/// Wire byte for the "off" program.
pub const MODE_OFF_RAW: u8 = 0xFF;

// ============================================================================
// BLE GATT identifiers
// ============================================================================

/// Nordic UART style service exposed by the cooker.
pub const UUID_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic commands are written to.
pub const UUID_TX: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic notifications arrive on.
pub const UUID_RX: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";
