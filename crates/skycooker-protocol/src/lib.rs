//! Wire protocol of Redmond RMC-M40S family multicookers.
//!
//! - [`frame`]: start/end marked frames with sequence and command bytes
//! - [`commands`]: command ids and their receive timeouts
//! - [`request`]: typed requests and short response checks
//! - [`status`]: the 12-byte status layout

pub mod commands;
pub mod frame;
pub mod request;
pub mod status;

pub use commands::CommandCode;
pub use frame::{Frame, HexDump};
pub use request::{Request, check_ack, check_auth, parse_version};
pub use status::{decode_status, encode_status};
