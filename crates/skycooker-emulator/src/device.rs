use bytes::Bytes;
use skycooker_core::{
    AuthKey, CookTime, CookingMode, DeviceState, FirmwareVersion, OperatingStatus,
    constants::{MAX_TEMPERATURE, MIN_TEMPERATURE},
};
use skycooker_protocol::{CommandCode, Frame, encode_status};
use skycooker_transport::MockTransportHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use subtle::ConstantTimeEq;
use tracing::{debug, trace};

const ACK: u8 = 1;
const NAK: u8 = 0;

/// Device-side protocol state.
#[derive(Debug, Clone)]
pub struct SimulatedCooker {
    key: AuthKey,
    pairing: bool,
    state: DeviceState,
    firmware: FirmwareVersion,
    /// Transport session that presented a valid key.
    authenticated_session: Option<u32>,
    dropped: HashMap<u8, u32>,
    rejected: HashMap<u8, u32>,
    corrupt: u32,
    stale: u32,
    received: Vec<u8>,
}

impl SimulatedCooker {
    /// An idle cooker that accepts `key`.
    pub fn new(key: AuthKey) -> Self {
        Self {
            key,
            pairing: false,
            state: idle_state(),
            firmware: FirmwareVersion::new(1, 0),
            authenticated_session: None,
            dropped: HashMap::new(),
            rejected: HashMap::new(),
            corrupt: 0,
            stale: 0,
            received: Vec::new(),
        }
    }

    pub fn with_firmware(mut self, firmware: FirmwareVersion) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    /// Install this cooker as the peer of a mock transport.
    ///
    /// Authentication lasts for one transport session; a reconnect has to
    /// present the key again.
    pub fn attach(self, transport: &MockTransportHandle) -> EmulatorHandle {
        let handle = EmulatorHandle {
            device: Arc::new(Mutex::new(self)),
        };
        let device = handle.clone();
        let session = transport.clone();
        transport.set_responder(move |frame: &[u8]| {
            device.lock().respond(frame, session.connect_count())
        });
        handle
    }

    /// Answer one written frame; an empty result means no notification.
    pub fn respond(&mut self, raw: &[u8], session: u32) -> Vec<Vec<u8>> {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(error = %error, "Ignoring malformed frame");
                return Vec::new();
            }
        };
        let sequence = frame.sequence();
        let command = frame.command();
        self.received.push(command);
        trace!(%frame, session, "Device received frame");

        if take(&mut self.dropped, command) {
            debug!(command, "Dropping response");
            return Vec::new();
        }

        let payload = if command == CommandCode::Auth.as_u8() {
            vec![self.authenticate(frame.payload(), session)]
        } else if self.authenticated_session != Some(session) {
            debug!(command, "Ignoring command from unauthenticated session");
            return Vec::new();
        } else if take(&mut self.rejected, command) {
            vec![NAK]
        } else {
            self.execute(command, frame.payload())
        };

        let mut responses = Vec::with_capacity(2);
        if self.stale > 0 {
            self.stale -= 1;
            responses.push(Frame::encode(sequence.wrapping_sub(1), command, &payload).to_vec());
        }
        let mut response = Frame::encode(sequence, command, &payload).to_vec();
        if self.corrupt > 0 {
            self.corrupt -= 1;
            response[0] = 0x00;
        }
        responses.push(response);
        responses
    }

    fn authenticate(&mut self, key: &Bytes, session: u32) -> u8 {
        let matches = bool::from(key.as_ref().ct_eq(self.key.as_bytes()));
        if matches || self.pairing {
            if !matches
                && let Ok(bytes) = <[u8; 8]>::try_from(key.as_ref())
            {
                debug!("Pairing new key");
                self.key = AuthKey::new(bytes);
            }
            self.authenticated_session = Some(session);
            ACK
        } else {
            debug!("Rejecting key");
            self.authenticated_session = None;
            NAK
        }
    }

    fn execute(&mut self, command: u8, payload: &[u8]) -> Vec<u8> {
        let Some(command) = CommandCode::from_u8(command) else {
            return vec![NAK];
        };

        match command {
            CommandCode::GetVersion => vec![self.firmware.major, self.firmware.minor],
            CommandCode::GetStatus => encode_status(&self.state),
            other => vec![u8::from(self.apply(other, payload))],
        }
    }

    /// Apply a mutating command, returning whether it was accepted.
    fn apply(&mut self, command: CommandCode, payload: &[u8]) -> bool {
        let state = &mut self.state;
        match (command, payload) {
            (CommandCode::TurnOn, _) => {
                if state.mode.is_off() {
                    return false;
                }
                let status = if state.delay.is_some() {
                    OperatingStatus::Waiting
                } else {
                    OperatingStatus::Cooking
                };
                self.set_status(status);
            }
            (CommandCode::TurnOff, _) => {
                state.delay = None;
                self.set_status(OperatingStatus::Idle);
            }
            (CommandCode::SetMainMode, [mode, _, temperature, hours, minutes, ..]) => {
                let Ok(time) = CookTime::new(*hours, *minutes) else {
                    return false;
                };
                let mode = CookingMode::from_wire(*mode);
                if mode.is_off() {
                    return false;
                }
                state.mode = mode;
                state.temperature = *temperature;
                state.target_temperature = *temperature;
                state.cooking_time = time;
                state.delay = None;
                self.set_status(OperatingStatus::Configuring);
            }
            (CommandCode::SetTemperature, [temperature, ..]) => {
                if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(temperature) {
                    return false;
                }
                state.temperature = *temperature;
                state.target_temperature = *temperature;
            }
            (CommandCode::SetCookingTime, [hours, minutes, ..]) => {
                let Ok(time) = CookTime::new(*hours, *minutes) else {
                    return false;
                };
                state.cooking_time = time;
            }
            (CommandCode::SetDelayTime, [hours, minutes, ..]) => {
                let total = u32::from(*hours) * 60 + u32::from(*minutes);
                let Some(delta) = total.checked_sub(state.cooking_time.total_minutes()) else {
                    return false;
                };
                let (Ok(hours), Ok(minutes)) = (u8::try_from(delta / 60), u8::try_from(delta % 60))
                else {
                    return false;
                };
                let Ok(delay) = CookTime::new(hours, minutes) else {
                    return false;
                };
                state.delay = Some(delay);
            }
            (CommandCode::SetPostHeat, [enabled, ..]) => {
                state.post_heat = *enabled == 1;
            }
            _ => return false,
        }
        true
    }

    fn set_status(&mut self, status: OperatingStatus) {
        self.state.status = status;
        self.state.power = status != OperatingStatus::Idle;
        self.state.timer_mode = status == OperatingStatus::Waiting;
    }
}

fn idle_state() -> DeviceState {
    DeviceState {
        status: OperatingStatus::Idle,
        mode: CookingMode::Off,
        submode: 0,
        temperature: 25,
        target_temperature: 25,
        cooking_time: CookTime::default(),
        delay: None,
        post_heat: false,
        power: false,
        timer_mode: false,
    }
}

/// Decrement a per-command fault counter, reporting whether it fired.
fn take(counters: &mut HashMap<u8, u32>, command: u8) -> bool {
    match counters.get_mut(&command) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    }
}

/// Shared handle to an attached [`SimulatedCooker`].
#[derive(Debug, Clone)]
pub struct EmulatorHandle {
    device: Arc<Mutex<SimulatedCooker>>,
}

impl EmulatorHandle {
    fn lock(&self) -> MutexGuard<'_, SimulatedCooker> {
        self.device
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept any key on the next authentication, as the pairing button does.
    pub fn set_pairing(&self, pairing: bool) {
        self.lock().pairing = pairing;
    }

    pub fn key(&self) -> AuthKey {
        self.lock().key
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state.clone()
    }

    /// Mutate the device state directly, e.g. to move the sensor reading.
    pub fn update_state(&self, update: impl FnOnce(&mut DeviceState)) {
        update(&mut self.lock().state);
    }

    pub fn set_firmware(&self, firmware: FirmwareVersion) {
        self.lock().firmware = firmware;
    }

    /// Swallow the next `count` frames carrying `command`.
    pub fn drop_next(&self, command: CommandCode, count: u32) {
        self.lock().dropped.insert(command.as_u8(), count);
    }

    /// Answer the next `count` frames carrying `command` with a NAK.
    pub fn reject_next(&self, command: CommandCode, count: u32) {
        self.lock().rejected.insert(command.as_u8(), count);
    }

    /// Send the next `count` responses with a broken start marker.
    pub fn corrupt_next(&self, count: u32) {
        self.lock().corrupt = count;
    }

    /// Precede the next `count` responses with a copy echoing the previous
    /// sequence number.
    pub fn stale_before_next(&self, count: u32) {
        self.lock().stale = count;
    }

    /// Command ids received so far, oldest first.
    pub fn received_commands(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated_session.is_some()
    }
}
