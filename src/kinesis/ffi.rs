//! Bindings to `Thorlabs.MotionControl.Benchtop.StepperMotor`.
//!
//! Only the calls the filter wheel needs are declared. The library has to be
//! installed with Kinesis and be on the linker search path.

use super::{DeviceInfo, Kinesis, KinesisError, Message, VelParams, FT_DEVICE_NOT_FOUND};
use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_int, c_short, c_uint, c_ushort},
};

/// Size of the buffer the serial number list is read into
const LIST_BUFFER_LEN: usize = 1024;

#[repr(C)]
#[allow(non_snake_case)]
struct TLI_DeviceInfo {
    typeID: c_uint,
    description: [c_char; 65],
    serialNo: [c_char; 16],
    PID: c_uint,
    isKnownType: bool,
    motorType: c_int,
    isPiezoDevice: bool,
    isLaser: bool,
    isCustomType: bool,
    isRack: bool,
    maxChannels: c_short,
}

#[link(name = "Thorlabs.MotionControl.Benchtop.StepperMotor")]
extern "C" {
    fn TLI_BuildDeviceList() -> c_short;
    fn TLI_GetDeviceListSize() -> c_short;
    fn TLI_GetDeviceListByTypeExt(buffer: *mut c_char, size: c_uint, type_id: c_int) -> c_short;
    fn TLI_GetDeviceInfo(serial: *const c_char, info: *mut TLI_DeviceInfo) -> c_short;

    fn SBC_Open(serial: *const c_char) -> c_short;
    fn SBC_Close(serial: *const c_char);
    fn SBC_StartPolling(serial: *const c_char, channel: c_short, ms: c_int) -> bool;
    fn SBC_StopPolling(serial: *const c_char, channel: c_short);
    fn SBC_EnableChannel(serial: *const c_char, channel: c_short) -> c_short;

    fn SBC_Home(serial: *const c_char, channel: c_short) -> c_short;
    fn SBC_MoveToPosition(serial: *const c_char, channel: c_short, index: c_int) -> c_short;
    fn SBC_RequestPosition(serial: *const c_char, channel: c_short) -> c_short;
    fn SBC_GetPosition(serial: *const c_char, channel: c_short) -> c_int;

    fn SBC_GetVelParams(
        serial: *const c_char,
        channel: c_short,
        acceleration: *mut c_int,
        max_velocity: *mut c_int,
    ) -> c_short;
    fn SBC_SetVelParams(
        serial: *const c_char,
        channel: c_short,
        acceleration: c_int,
        max_velocity: c_int,
    ) -> c_short;

    fn SBC_MessageQueueSize(serial: *const c_char, channel: c_short) -> c_int;
    fn SBC_GetNextMessage(
        serial: *const c_char,
        channel: c_short,
        message_type: *mut c_ushort,
        message_id: *mut c_ushort,
        message_data: *mut c_uint,
    ) -> bool;
    fn SBC_ClearMessageQueue(serial: *const c_char, channel: c_short);
}

// a serial containing NUL can't name any device
fn c_serial(serial: &str) -> Result<CString, KinesisError> {
    CString::new(serial).map_err(|_| KinesisError(FT_DEVICE_NOT_FOUND))
}

fn from_c_chars(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// The installed Kinesis library
#[derive(Debug, Default)]
pub struct KinesisLibrary;

impl KinesisLibrary {
    pub fn new() -> Self {
        KinesisLibrary
    }
}

impl Kinesis for KinesisLibrary {
    fn build_device_list(&mut self) -> Result<(), KinesisError> {
        KinesisError::check(unsafe { TLI_BuildDeviceList() })
    }

    fn device_list_size(&mut self) -> usize {
        usize::try_from(unsafe { TLI_GetDeviceListSize() }).unwrap_or(0)
    }

    fn device_list_by_type(&mut self, type_id: i32) -> Result<String, KinesisError> {
        let mut buffer = [0 as c_char; LIST_BUFFER_LEN];
        KinesisError::check(unsafe {
            TLI_GetDeviceListByTypeExt(buffer.as_mut_ptr(), LIST_BUFFER_LEN as c_uint, type_id)
        })?;
        Ok(from_c_chars(&buffer))
    }

    fn device_info(&mut self, serial: &str) -> Result<DeviceInfo, KinesisError> {
        let serial = c_serial(serial)?;
        let mut info = std::mem::MaybeUninit::<TLI_DeviceInfo>::zeroed();
        // returns 1 on success
        if unsafe { TLI_GetDeviceInfo(serial.as_ptr(), info.as_mut_ptr()) } == 0 {
            return Err(KinesisError(FT_DEVICE_NOT_FOUND));
        }
        let info = unsafe { info.assume_init() };
        Ok(DeviceInfo {
            type_id: info.typeID,
            description: from_c_chars(&info.description),
            serial_no: from_c_chars(&info.serialNo),
        })
    }

    fn open(&mut self, serial: &str) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe { SBC_Open(serial.as_ptr()) })
    }

    fn close(&mut self, serial: &str) {
        if let Ok(serial) = c_serial(serial) {
            unsafe { SBC_Close(serial.as_ptr()) }
        }
    }

    fn start_polling(&mut self, serial: &str, channel: i16, interval_ms: u32) -> bool {
        let ms = c_int::try_from(interval_ms).unwrap_or(c_int::MAX);
        match c_serial(serial) {
            Ok(serial) => unsafe { SBC_StartPolling(serial.as_ptr(), channel, ms) },
            Err(_) => false,
        }
    }

    fn stop_polling(&mut self, serial: &str, channel: i16) {
        if let Ok(serial) = c_serial(serial) {
            unsafe { SBC_StopPolling(serial.as_ptr(), channel) }
        }
    }

    fn enable_channel(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe { SBC_EnableChannel(serial.as_ptr(), channel) })
    }

    fn home(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe { SBC_Home(serial.as_ptr(), channel) })
    }

    fn move_to_position(
        &mut self,
        serial: &str,
        channel: i16,
        position: i32,
    ) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe { SBC_MoveToPosition(serial.as_ptr(), channel, position) })
    }

    fn request_position(&mut self, serial: &str, channel: i16) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe { SBC_RequestPosition(serial.as_ptr(), channel) })
    }

    fn position(&mut self, serial: &str, channel: i16) -> i32 {
        match c_serial(serial) {
            Ok(serial) => unsafe { SBC_GetPosition(serial.as_ptr(), channel) },
            Err(_) => 0,
        }
    }

    fn vel_params(&mut self, serial: &str, channel: i16) -> Result<VelParams, KinesisError> {
        let serial = c_serial(serial)?;
        let mut params = VelParams::default();
        KinesisError::check(unsafe {
            SBC_GetVelParams(
                serial.as_ptr(),
                channel,
                &mut params.acceleration,
                &mut params.max_velocity,
            )
        })?;
        Ok(params)
    }

    fn set_vel_params(
        &mut self,
        serial: &str,
        channel: i16,
        params: VelParams,
    ) -> Result<(), KinesisError> {
        let serial = c_serial(serial)?;
        KinesisError::check(unsafe {
            SBC_SetVelParams(
                serial.as_ptr(),
                channel,
                params.acceleration,
                params.max_velocity,
            )
        })
    }

    fn message_queue_size(&mut self, serial: &str, channel: i16) -> usize {
        match c_serial(serial) {
            Ok(serial) => {
                usize::try_from(unsafe { SBC_MessageQueueSize(serial.as_ptr(), channel) })
                    .unwrap_or(0)
            }
            Err(_) => 0,
        }
    }

    fn next_message(&mut self, serial: &str, channel: i16) -> Option<Message> {
        let serial = c_serial(serial).ok()?;
        let mut message = Message::default();
        let got = unsafe {
            SBC_GetNextMessage(
                serial.as_ptr(),
                channel,
                &mut message.message_type,
                &mut message.message_id,
                &mut message.data,
            )
        };
        got.then_some(message)
    }

    fn clear_message_queue(&mut self, serial: &str, channel: i16) {
        if let Ok(serial) = c_serial(serial) {
            unsafe { SBC_ClearMessageQueue(serial.as_ptr(), channel) }
        }
    }
}
