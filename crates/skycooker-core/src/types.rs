use crate::{
    Result,
    constants::{AUTH_KEY_LEN, MAX_HOURS, MAX_MINUTES, MODE_OFF_RAW},
    error::Error,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use subtle::ConstantTimeEq;

/// Operating status reported by the cooker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingStatus {
    /// Hibernating, nothing running.
    Idle,
    /// A program is being configured on the panel.
    Configuring,
    /// Delayed start counting down.
    Waiting,
    /// Heating up to the program temperature.
    Heating,
    /// Assisted cooking step.
    Assist,
    /// Program running.
    Cooking,
    /// Keeping food warm after the program.
    KeepWarm,
    /// Status byte not known to this driver.
    Unknown(u8),
}

impl OperatingStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => OperatingStatus::Idle,
            0x01 => OperatingStatus::Configuring,
            0x02 => OperatingStatus::Waiting,
            0x03 => OperatingStatus::Heating,
            0x04 => OperatingStatus::Assist,
            0x05 => OperatingStatus::Cooking,
            0x06 => OperatingStatus::KeepWarm,
            other => OperatingStatus::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            OperatingStatus::Idle => 0x00,
            OperatingStatus::Configuring => 0x01,
            OperatingStatus::Waiting => 0x02,
            OperatingStatus::Heating => 0x03,
            OperatingStatus::Assist => 0x04,
            OperatingStatus::Cooking => 0x05,
            OperatingStatus::KeepWarm => 0x06,
            OperatingStatus::Unknown(value) => value,
        }
    }
}

impl fmt::Display for OperatingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperatingStatus::Idle => write!(f, "idle"),
            OperatingStatus::Configuring => write!(f, "configuring"),
            OperatingStatus::Waiting => write!(f, "waiting"),
            OperatingStatus::Heating => write!(f, "heating"),
            OperatingStatus::Assist => write!(f, "assist"),
            OperatingStatus::Cooking => write!(f, "cooking"),
            OperatingStatus::KeepWarm => write!(f, "keep-warm"),
            OperatingStatus::Unknown(value) => write!(f, "unknown(0x{value:02X})"),
        }
    }
}

/// Cooking program.
///
/// Program ids are one-based so that 0 stays free for "unset"; the device
/// stores them zero-based on the wire. `Off` travels as 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookingMode {
    Stew,
    Boil,
    Bake,
    Steam,
    Yogurt,
    Multicook,
    Soup,
    Pasta,
    Rice,
    Bread,
    Dessert,
    KeepWarm,
    Off,
    /// Program id (one-based) not known to this driver.
    Other(u8),
}

impl CookingMode {
    /// Every known program, in id order.
    pub const PROGRAMS: [CookingMode; 12] = [
        CookingMode::Stew,
        CookingMode::Boil,
        CookingMode::Bake,
        CookingMode::Steam,
        CookingMode::Yogurt,
        CookingMode::Multicook,
        CookingMode::Soup,
        CookingMode::Pasta,
        CookingMode::Rice,
        CookingMode::Bread,
        CookingMode::Dessert,
        CookingMode::KeepWarm,
    ];

    /// Build a mode from its one-based program id.
    pub fn from_id(id: u8) -> Self {
        match id {
            1..=12 => Self::PROGRAMS[usize::from(id - 1)],
            0xFF => CookingMode::Off,
            other => CookingMode::Other(other),
        }
    }

    /// One-based program id (0xFF for `Off`).
    pub fn id(self) -> u8 {
        match self {
            CookingMode::Off => MODE_OFF_RAW,
            CookingMode::Other(id) => id,
            known => {
                let index = Self::PROGRAMS
                    .iter()
                    .position(|mode| *mode == known)
                    .unwrap_or_default();
                index as u8 + 1
            }
        }
    }

    /// Decode the zero-based wire byte.
    pub fn from_wire(raw: u8) -> Self {
        match raw {
            MODE_OFF_RAW => CookingMode::Off,
            // id 0xFF is taken by off in `from_id`
            0xFE => CookingMode::Other(0xFF),
            _ => Self::from_id(raw + 1),
        }
    }

    /// Zero-based wire byte.
    pub fn to_wire(self) -> u8 {
        match self {
            CookingMode::Off => MODE_OFF_RAW,
            other => other.id().wrapping_sub(1),
        }
    }

    pub fn is_off(self) -> bool {
        self == CookingMode::Off
    }

    pub fn name(self) -> &'static str {
        match self {
            CookingMode::Stew => "stew",
            CookingMode::Boil => "boil",
            CookingMode::Bake => "bake",
            CookingMode::Steam => "steam",
            CookingMode::Yogurt => "yogurt",
            CookingMode::Multicook => "multicook",
            CookingMode::Soup => "soup",
            CookingMode::Pasta => "pasta",
            CookingMode::Rice => "rice",
            CookingMode::Bread => "bread",
            CookingMode::Dessert => "dessert",
            CookingMode::KeepWarm => "keep-warm",
            CookingMode::Off => "off",
            CookingMode::Other(_) => "other",
        }
    }
}

impl fmt::Display for CookingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CookingMode::Other(id) => write!(f, "program {id}"),
            known => f.write_str(known.name()),
        }
    }
}

impl std::str::FromStr for CookingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        if name == "off" {
            return Ok(CookingMode::Off);
        }
        if let Some(mode) = Self::PROGRAMS.iter().find(|mode| mode.name() == name) {
            return Ok(*mode);
        }
        name.parse::<u8>()
            .map(CookingMode::from_id)
            .map_err(|_| Error::invalid_argument(format!("Unknown cooking mode: {s}")))
    }
}

/// Hours and minutes as shown on the cooker panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CookTime {
    pub hours: u8,
    pub minutes: u8,
}

impl CookTime {
    /// Create a new duration with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if hours exceed 24 or minutes exceed 59.
    pub fn new(hours: u8, minutes: u8) -> Result<Self> {
        if hours > MAX_HOURS {
            return Err(Error::invalid_argument(format!(
                "Hours must be 0-{MAX_HOURS}, got {hours}"
            )));
        }
        if minutes > MAX_MINUTES {
            return Err(Error::invalid_argument(format!(
                "Minutes must be 0-{MAX_MINUTES}, got {minutes}"
            )));
        }
        Ok(CookTime { hours, minutes })
    }

    pub fn total_minutes(&self) -> u32 {
        u32::from(self.hours) * 60 + u32::from(self.minutes)
    }

    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0
    }
}

impl fmt::Display for CookTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{:02}", self.hours, self.minutes)
    }
}

/// Snapshot of the cooker produced by decoding a status response.
///
/// Replaced wholesale on every successful status fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub status: OperatingStatus,
    pub mode: CookingMode,
    pub submode: u8,
    pub temperature: u8,
    pub target_temperature: u8,
    pub cooking_time: CookTime,
    /// `None` when no delayed start is configured.
    pub delay: Option<CookTime>,
    pub post_heat: bool,
    pub power: bool,
    pub timer_mode: bool,
}

/// Firmware version reported by the get-version command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Stand-in used when the device does not answer the version request.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Pre-shared 8-byte authentication key.
///
/// # Security
/// Comparison is constant time and the key never appears in `Debug` output.
#[derive(Clone, Copy, Eq)]
pub struct AuthKey([u8; AUTH_KEY_LEN]);

impl AuthKey {
    pub fn new(bytes: [u8; AUTH_KEY_LEN]) -> Self {
        AuthKey(bytes)
    }

    /// Parse a key from 16 hex digits.
    ///
    /// # Errors
    /// Returns `Error::Config` if the string is not exactly 8 hex-encoded bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != AUTH_KEY_LEN * 2 || !s.is_ascii() {
            return Err(Error::config(format!(
                "Auth key must be {} hex digits, got {}",
                AUTH_KEY_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; AUTH_KEY_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::config("Auth key contains non-hex characters"))?;
        }
        Ok(AuthKey(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AuthKey(********)")
    }
}

impl std::str::FromStr for AuthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AuthKey::from_hex(s)
    }
}

impl Serialize for AuthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AuthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AuthKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Protocol family a cooker model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    /// RMC-M40S and siblings, spoken by this driver.
    M40S,
    /// Kettle-derived protocol, recognized but not supported.
    M216S,
}

impl ModelFamily {
    /// Resolve a marketing model name.
    pub fn from_model(model: &str) -> Option<Self> {
        match model.trim() {
            "RMC-M40S" | "RMC-M41S" | "RMC-M42S" | "RMC-M43S" | "RMC-M44S" | "RMC-M45S"
            | "RMC-M46S" | "RMC-M47S" | "RMC-M48S" | "RMC-M49S" => Some(ModelFamily::M40S),
            "RK-M216S" | "RK-M215S" | "RK-M223S" | "RK-G200S" | "RK-G211S" => {
                Some(ModelFamily::M216S)
            }
            _ => None,
        }
    }

    /// Resolve a model and require that this driver speaks its protocol.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedModel` for unknown models and kettle-family models.
    pub fn supported(model: &str) -> Result<Self> {
        match Self::from_model(model) {
            Some(ModelFamily::M40S) => Ok(ModelFamily::M40S),
            _ => Err(Error::UnsupportedModel(model.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x00, OperatingStatus::Idle)]
    #[case(0x02, OperatingStatus::Waiting)]
    #[case(0x05, OperatingStatus::Cooking)]
    #[case(0x06, OperatingStatus::KeepWarm)]
    #[case(0x42, OperatingStatus::Unknown(0x42))]
    fn test_operating_status(#[case] raw: u8, #[case] expected: OperatingStatus) {
        let status = OperatingStatus::from_u8(raw);
        assert_eq!(status, expected);
        assert_eq!(status.to_u8(), raw);
    }

    #[rstest]
    #[case(0x00, CookingMode::Stew)]
    #[case(0x05, CookingMode::Multicook)]
    #[case(0x0B, CookingMode::KeepWarm)]
    #[case(0xFF, CookingMode::Off)]
    #[case(0x20, CookingMode::Other(0x21))]
    #[case(0xFE, CookingMode::Other(0xFF))]
    fn test_mode_wire_is_zero_based(#[case] raw: u8, #[case] expected: CookingMode) {
        let mode = CookingMode::from_wire(raw);
        assert_eq!(mode, expected);
        assert_eq!(mode.to_wire(), raw);
    }

    #[test]
    fn test_every_mode_byte_survives_the_wire() {
        for raw in 0..=u8::MAX {
            assert_eq!(CookingMode::from_wire(raw).to_wire(), raw, "byte {raw:#04x}");
        }
    }

    #[test]
    fn test_mode_ids_are_one_based() {
        assert_eq!(CookingMode::Stew.id(), 1);
        assert_eq!(CookingMode::Multicook.id(), 6);
        assert_eq!(CookingMode::KeepWarm.id(), 12);
        assert_eq!(CookingMode::from_id(6), CookingMode::Multicook);
    }

    #[rstest]
    #[case("multicook", CookingMode::Multicook)]
    #[case("Keep-Warm", CookingMode::KeepWarm)]
    #[case("off", CookingMode::Off)]
    #[case("3", CookingMode::Bake)]
    fn test_mode_from_str(#[case] input: &str, #[case] expected: CookingMode) {
        assert_eq!(input.parse::<CookingMode>().unwrap(), expected);
    }

    #[test]
    fn test_mode_from_str_invalid() {
        assert!("grill".parse::<CookingMode>().is_err());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(24, 59)]
    fn test_cook_time_valid(#[case] hours: u8, #[case] minutes: u8) {
        let time = CookTime::new(hours, minutes).unwrap();
        assert_eq!(time.hours, hours);
        assert_eq!(time.minutes, minutes);
    }

    #[rstest]
    #[case(25, 0)]
    #[case(1, 60)]
    fn test_cook_time_invalid(#[case] hours: u8, #[case] minutes: u8) {
        assert!(CookTime::new(hours, minutes).is_err());
    }

    #[test]
    fn test_cook_time_display() {
        let time = CookTime::new(1, 5).unwrap();
        assert_eq!(time.to_string(), "1:05");
        assert_eq!(time.total_minutes(), 65);
    }

    #[test]
    fn test_auth_key_hex_roundtrip() {
        let key = AuthKey::from_hex("0102030405060708").unwrap();
        assert_eq!(key.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(key.to_hex(), "0102030405060708");
    }

    #[rstest]
    #[case("01020304")]
    #[case("0102030405060708aa")]
    #[case("zz02030405060708")]
    fn test_auth_key_invalid(#[case] input: &str) {
        assert!(AuthKey::from_hex(input).is_err());
    }

    #[test]
    fn test_auth_key_debug_is_redacted() {
        let key = AuthKey::new([0xAB; 8]);
        assert!(!format!("{key:?}").contains("ab"));
    }

    #[test]
    fn test_auth_key_serde() {
        let key = AuthKey::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"0102030405060708\"");
        let parsed: AuthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
    }

    #[rstest]
    #[case("RMC-M40S", Some(ModelFamily::M40S))]
    #[case("RMC-M49S", Some(ModelFamily::M40S))]
    #[case("RK-M216S", Some(ModelFamily::M216S))]
    #[case("Unknown-Model", None)]
    fn test_model_family(#[case] model: &str, #[case] expected: Option<ModelFamily>) {
        assert_eq!(ModelFamily::from_model(model), expected);
    }

    #[test]
    fn test_kettle_models_not_supported() {
        assert!(ModelFamily::supported("RMC-M41S").is_ok());
        assert!(matches!(
            ModelFamily::supported("RK-G200S"),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_firmware_placeholder() {
        assert!(FirmwareVersion::placeholder().is_placeholder());
        assert_eq!(FirmwareVersion::new(3, 14).to_string(), "3.14");
    }
}
