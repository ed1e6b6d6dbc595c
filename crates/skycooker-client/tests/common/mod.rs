//! Shared fixtures: a cooker wired to a simulated device over a mock link.

#![allow(dead_code)]

use skycooker_client::{Cooker, CookerConfig};
use skycooker_core::AuthKey;
use skycooker_emulator::{EmulatorHandle, SimulatedCooker};
use skycooker_transport::{MockTransport, MockTransportHandle};

pub const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
pub const KEY: [u8; 8] = [0xB5, 0x4C, 0x75, 0xB1, 0xB4, 0x0C, 0x88, 0xEF];

pub struct Fixture {
    pub cooker: Cooker<MockTransport>,
    pub link: MockTransportHandle,
    pub device: EmulatorHandle,
}

pub fn config(persistent: bool) -> CookerConfig {
    let mut config = CookerConfig::new(ADDRESS, AuthKey::new(KEY));
    config.device.persistent = persistent;
    config
}

pub fn fixture_with(config: &CookerConfig, device: SimulatedCooker) -> Fixture {
    let (transport, link) = MockTransport::new(ADDRESS);
    let device = device.attach(&link);
    let cooker = Cooker::new(transport, config).expect("valid config");
    Fixture {
        cooker,
        link,
        device,
    }
}

pub fn fixture(persistent: bool) -> Fixture {
    fixture_with(&config(persistent), SimulatedCooker::new(AuthKey::new(KEY)))
}

/// Command ids written on the link, oldest first.
pub fn commands(link: &MockTransportHandle) -> Vec<u8> {
    link.written_frames().iter().map(|frame| frame[2]).collect()
}
