//! Simulated Redmond multicooker.
//!
//! [`SimulatedCooker`] speaks the device side of the framed protocol: it
//! checks the pre-shared key, keeps a [`DeviceState`](skycooker_core::DeviceState)
//! and answers status queries from it. Attached to a
//! [`MockTransport`](skycooker_transport::MockTransport) it stands in for
//! the real device in tests and in the CLI.
//!
//! Faults are scripted per command through the [`EmulatorHandle`].

pub mod device;

pub use device::{EmulatorHandle, SimulatedCooker};
