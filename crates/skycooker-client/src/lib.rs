//! Client driver for Redmond RMC-M40S family multicookers.
//!
//! The driver is layered leaf-first:
//!
//! - [`stats`]: rolling success rate of update cycles
//! - [`dispatcher`]: one command, one correlated response, bounded retries
//! - [`connection`]: link lifecycle and authentication state machine
//! - [`cooker`]: the host-facing handle; update cycles, control operations
//!   and a watch-channel snapshot
//! - [`diagnostics`]: step-by-step self-test
//!
//! # Example
//!
//! ```no_run
//! use skycooker_client::{Cooker, CookerConfig};
//! use skycooker_transport::MockTransport;
//!
//! # async fn example() -> skycooker_core::Result<()> {
//! let config = CookerConfig::from_toml_str(r#"
//!     [device]
//!     address = "AA:BB:CC:DD:EE:FF"
//!     key = "b54c75b1b40c88ef"
//! "#)?;
//! let (transport, _handle) = MockTransport::new(config.device.address.clone());
//! let cooker = Cooker::new(transport, &config)?;
//!
//! if cooker.update(config.timing.update_tries).await {
//!     println!("{:?}", cooker.status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod cooker;
pub mod diagnostics;
pub mod dispatcher;
pub mod stats;

pub use config::{CookerConfig, DeviceConfig, TimingConfig};
pub use connection::{Connection, LinkState};
pub use cooker::{Cooker, CookerSnapshot};
pub use diagnostics::{SelfTestReport, SelfTestStep, StepReport, StepStatus};
pub use dispatcher::{Dispatcher, RetryPolicy, SendOptions};
pub use stats::StatsTracker;
