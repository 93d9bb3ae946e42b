//! The call surface of the Kinesis benchtop stepper library.
//!
//! The vendor library is a blocking C API keyed by the serial number of the
//! device and a channel. [`Kinesis`] mirrors that surface one call per method,
//! so the session can be driven by the real library (see `ffi`, behind the
//! `kinesis-ffi` feature) or by [`sim::SimulatedBench`].

#[cfg(feature = "kinesis-ffi")]
pub mod ffi;
mod parse;
pub mod sim;

pub use parse::parse_serial_list;

use crate::error::WheelError;
use thiserror::Error;

/// The FW103H has a single motor channel
pub const CHANNEL: i16 = 1;

/// Kinesis type id of benchtop stepper motor controllers
pub const BENCHTOP_STEPPER_TYPE_ID: i32 = 40;

/// Returned for calls on a serial number that isn't connected
pub const FT_DEVICE_NOT_FOUND: i16 = 2;
/// Returned for calls on a device that wasn't opened
pub const FT_DEVICE_NOT_OPENED: i16 = 3;

/// Nonzero return code of a Kinesis call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("kinesis error code {0}")]
pub struct KinesisError(pub i16);

impl KinesisError {
    /// Turns a raw return code into a result, 0 meaning success
    pub fn check(code: i16) -> Result<(), KinesisError> {
        if code == 0 {
            Ok(())
        } else {
            Err(KinesisError(code))
        }
    }
}

impl From<KinesisError> for WheelError {
    fn from(e: KinesisError) -> Self {
        WheelError::Hardware(e.0)
    }
}

/// Entry of the Kinesis message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Message {
    pub message_type: u16,
    pub message_id: u16,
    pub data: u32,
}

impl Message {
    /// Message type of generic motor messages
    pub const GENERIC_MOTOR: u16 = 2;
    pub const MOVED: u16 = 1;

    pub fn new(message_type: u16, message_id: u16) -> Self {
        Message {
            message_type,
            message_id,
            data: 0,
        }
    }

    /// Returns `true` if the message signals that a home or move finished.
    ///
    /// Either of the two fields matching counts, the hardware doesn't always
    /// set both.
    pub fn is_completion(&self) -> bool {
        self.message_type == Self::GENERIC_MOTOR || self.message_id == Self::MOVED
    }
}

/// What `TLI_GetDeviceInfo` reports about a connected device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub type_id: u32,
    pub description: String,
    pub serial_no: String,
}

/// Velocity parameters in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VelParams {
    pub acceleration: i32,
    pub max_velocity: i32,
}

/// Blocking call surface of the Kinesis library
///
/// Every call that can fail returns the raw Kinesis code as [`KinesisError`].
/// Calls the library declares as `void` or `bool` are infallible here as well.
pub trait Kinesis {
    fn build_device_list(&mut self) -> Result<(), KinesisError>;
    fn device_list_size(&mut self) -> usize;
    /// Comma separated serial numbers of all devices of the given type
    fn device_list_by_type(&mut self, type_id: i32) -> Result<String, KinesisError>;
    fn device_info(&mut self, serial: &str) -> Result<DeviceInfo, KinesisError>;

    fn open(&mut self, serial: &str) -> Result<(), KinesisError>;
    fn close(&mut self, serial: &str);
    /// Starts the background polling of the library, returns `false` if it
    /// couldn't be started
    fn start_polling(&mut self, serial: &str, channel: i16, interval_ms: u32) -> bool;
    fn stop_polling(&mut self, serial: &str, channel: i16);
    fn enable_channel(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError>;

    fn home(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError>;
    /// Absolute move, `position` in device units
    fn move_to_position(
        &mut self,
        serial: &str,
        channel: i16,
        position: i32,
    ) -> Result<(), KinesisError>;
    fn request_position(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError>;
    /// Last position the polling saw, in device units
    fn position(&mut self, serial: &str, channel: i16) -> i32;

    fn vel_params(&mut self, serial: &str, channel: i16) -> Result<VelParams, KinesisError>;
    fn set_vel_params(
        &mut self,
        serial: &str,
        channel: i16,
        params: VelParams,
    ) -> Result<(), KinesisError>;

    fn message_queue_size(&mut self, serial: &str, channel: i16) -> usize;
    fn next_message(&mut self, serial: &str, channel: i16) -> Option<Message>;
    fn clear_message_queue(&mut self, serial: &str, channel: i16);
}
