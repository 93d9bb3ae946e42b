//! Rust driver for the Thorlabs FW103H motorized filter wheel, controlled
//! through the Kinesis benchtop stepper library.
//!
//! The wheel has six slots, 60° apart. After homing it can be moved to any slot
//! by index and its speed can be changed.
//!
//! # Usage
//! A [`Session`] is the connection to one device: it finds the device by
//! serial number, opens and homes it, and afterwards moves it. Every command
//! blocks until the device reports completion or the configured timeout runs
//! out. A timeout faults the session until it is closed.
//!
//! A [`FilterWheel`] wraps a session in the shape a host application expects:
//! named [properties](Device::get_property), a busy flag and
//! initialize/shutdown. [`create_device`] builds one by its registered name.
//!
//! Both take anything implementing [`Kinesis`]. With the `kinesis-ffi` feature
//! that is `kinesis::ffi::KinesisLibrary`, otherwise
//! [`SimulatedBench`][kinesis::sim::SimulatedBench] stands in for the hardware.
//!
//! # Examples
//! ```
//! use fw103h_filter_wheel::{
//!     kinesis::sim::SimulatedBench, Device, FilterWheel, PropertyValue, WheelConfig,
//! };
//!
//! let mut config = WheelConfig::default();
//! config.serial_number = "40154488".to_string();
//! config.session.enable_settle_ms = 0;
//! config.session.poll_interval_ms = 1;
//!
//! let bench = SimulatedBench::with_device("40154488");
//! let mut wheel = FilterWheel::new(bench, config);
//! wheel.initialize().unwrap();
//!
//! wheel
//!     .set_property("Set filter wheel position (0-5)", PropertyValue::Integer(3))
//!     .unwrap();
//! assert_eq!(wheel.position(), 3);
//! wheel.shutdown().unwrap();
//! ```

pub mod config;
pub mod device;
mod error;
pub mod kinesis;
pub mod session;
pub(crate) mod util;
pub mod wheel;

pub use config::{ConfigError, SessionConfig, WheelConfig};
pub use device::{ActionType, Device, Property, PropertyValue};
pub use error::{error_text, status_code, ErrorCode, WheelError};
pub use kinesis::Kinesis;
pub use session::{DeviceIdentity, Session, SessionState};
pub use wheel::{create_device, FilterWheel, REGISTERED_DEVICES};
