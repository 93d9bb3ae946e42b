//! Simulated Kinesis library.
//!
//! [`SimulatedBench`] behaves like a bench with a number of connected benchtop
//! steppers. Homes and moves finish instantly by queueing a completion message
//! (or nothing, to provoke timeouts), failures can be injected per call and
//! every call is recorded so tests can check exactly what was sent to the
//! hardware.
//!
//! Cloning the bench yields another handle to the same simulated hardware, so a
//! test can hand one clone to a session and inspect the other.

use super::{
    DeviceInfo, Kinesis, KinesisError, Message, VelParams, BENCHTOP_STEPPER_TYPE_ID,
    FT_DEVICE_NOT_FOUND, FT_DEVICE_NOT_OPENED,
};
use crate::config::{DEFAULT_MAX_SPEED, SPEED_TO_DEVICE_UNITS};
use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

/// A recorded call into the simulated library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BuildDeviceList,
    DeviceListSize,
    DeviceListByType(i32),
    DeviceInfo(String),
    Open(String),
    Close(String),
    StartPolling(u32),
    StopPolling,
    EnableChannel,
    Home,
    MoveToPosition(i32),
    RequestPosition,
    Position,
    VelParams,
    SetVelParams(VelParams),
    MessageQueueSize,
    NextMessage,
    ClearMessageQueue,
}

/// Calls a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fallible {
    BuildDeviceList,
    DeviceListByType,
    DeviceInfo,
    Open,
    EnableChannel,
    Home,
    MoveToPosition,
    RequestPosition,
    VelParams,
    SetVelParams,
}

#[derive(Debug)]
struct SimDevice {
    info: DeviceInfo,
    open: bool,
    polling: Option<u32>,
    enabled: bool,
    position: i32,
    vel: VelParams,
    queue: VecDeque<Message>,
}

#[derive(Debug)]
struct Inner {
    devices: Vec<SimDevice>,
    list_built: bool,
    home_response: Option<Message>,
    move_response: Option<Message>,
    move_offset: i32,
    dequeue_fails: bool,
    failures: HashMap<Fallible, i16>,
    calls: Vec<Call>,
}

impl Inner {
    fn fail(&mut self, call: Fallible) -> Result<(), KinesisError> {
        match self.failures.remove(&call) {
            Some(code) => Err(KinesisError(code)),
            None => Ok(()),
        }
    }

    fn device(&mut self, serial: &str) -> Result<&mut SimDevice, KinesisError> {
        self.devices
            .iter_mut()
            .find(|d| d.info.serial_no == serial)
            .ok_or(KinesisError(FT_DEVICE_NOT_FOUND))
    }

    fn open_device(&mut self, serial: &str) -> Result<&mut SimDevice, KinesisError> {
        let device = self.device(serial)?;
        if device.open {
            Ok(device)
        } else {
            Err(KinesisError(FT_DEVICE_NOT_OPENED))
        }
    }
}

/// Handle to a simulated bench, see the [module documentation](self)
#[derive(Debug, Clone)]
pub struct SimulatedBench {
    inner: Rc<RefCell<Inner>>,
}

impl Default for SimulatedBench {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBench {
    /// A bench without any devices. Homes complete with a homed message, moves
    /// with a moved message.
    pub fn new() -> Self {
        SimulatedBench {
            inner: Rc::new(RefCell::new(Inner {
                devices: Vec::new(),
                list_built: false,
                // id 0 is what a finished home reports
                home_response: Some(Message::new(Message::GENERIC_MOTOR, 0)),
                move_response: Some(Message::new(Message::GENERIC_MOTOR, Message::MOVED)),
                move_offset: 0,
                dequeue_fails: false,
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// A bench with a single FW103H connected
    pub fn with_device(serial: &str) -> Self {
        let bench = Self::new();
        bench.add_device(serial, "FW103H filter wheel", BENCHTOP_STEPPER_TYPE_ID as u32);
        bench
    }

    pub fn add_device(&self, serial: &str, description: &str, type_id: u32) {
        self.inner.borrow_mut().devices.push(SimDevice {
            info: DeviceInfo {
                type_id,
                description: description.to_string(),
                serial_no: serial.to_string(),
            },
            open: false,
            polling: None,
            enabled: false,
            position: 0,
            vel: VelParams {
                acceleration: 1000,
                max_velocity: (f64::from(DEFAULT_MAX_SPEED) * SPEED_TO_DEVICE_UNITS).round() as i32,
            },
            queue: VecDeque::new(),
        });
    }

    /// Message queued once a home was issued, `None` to never finish homing
    pub fn set_home_response(&self, response: Option<Message>) {
        self.inner.borrow_mut().home_response = response;
    }

    /// Message queued once a move was issued, `None` to never finish moving.
    /// A move without a response leaves the position unchanged.
    pub fn set_move_response(&self, response: Option<Message>) {
        self.inner.borrow_mut().move_response = response;
    }

    /// Every finished move ends up `offset` device units away from its target
    pub fn set_move_offset(&self, offset: i32) {
        self.inner.borrow_mut().move_offset = offset;
    }

    /// Makes every dequeue come back empty while the queue still reports its
    /// messages
    pub fn set_dequeue_fails(&self, fails: bool) {
        self.inner.borrow_mut().dequeue_fails = fails;
    }

    /// Queues a message for the given device, regardless of whether it's open
    ///
    /// # Panics
    /// If no device with that serial number exists
    pub fn push_message(&self, serial: &str, message: Message) {
        self.inner
            .borrow_mut()
            .device(serial)
            .expect("no such device")
            .queue
            .push_back(message);
    }

    /// Makes the next call of the given kind return `code`
    pub fn fail_next(&self, call: Fallible, code: i16) {
        self.inner.borrow_mut().failures.insert(call, code);
    }

    /// All calls made so far, oldest first
    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    pub fn count_calls<F: Fn(&Call) -> bool>(&self, f: F) -> usize {
        self.inner.borrow().calls.iter().filter(|c| f(c)).count()
    }

    fn with_device_state<T, F: FnOnce(&mut SimDevice) -> T>(&self, serial: &str, f: F) -> T {
        f(self
            .inner
            .borrow_mut()
            .device(serial)
            .expect("no such device"))
    }

    pub fn is_open(&self, serial: &str) -> bool {
        self.with_device_state(serial, |d| d.open)
    }

    pub fn is_enabled(&self, serial: &str) -> bool {
        self.with_device_state(serial, |d| d.enabled)
    }

    /// Polling interval if the background polling is running
    pub fn polling(&self, serial: &str) -> Option<u32> {
        self.with_device_state(serial, |d| d.polling)
    }

    pub fn device_position(&self, serial: &str) -> i32 {
        self.with_device_state(serial, |d| d.position)
    }

    /// Moves the wheel behind the back of the session
    pub fn set_device_position(&self, serial: &str, position: i32) {
        self.with_device_state(serial, |d| d.position = position)
    }

    pub fn device_vel_params(&self, serial: &str) -> VelParams {
        self.with_device_state(serial, |d| d.vel)
    }

    pub fn queued_messages(&self, serial: &str) -> usize {
        self.with_device_state(serial, |d| d.queue.len())
    }

    fn record(&self, call: Call) -> std::cell::RefMut<'_, Inner> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(call);
        inner
    }
}

impl Kinesis for SimulatedBench {
    fn build_device_list(&mut self) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::BuildDeviceList);
        inner.fail(Fallible::BuildDeviceList)?;
        inner.list_built = true;
        Ok(())
    }

    fn device_list_size(&mut self) -> usize {
        let inner = self.record(Call::DeviceListSize);
        if inner.list_built {
            inner.devices.len()
        } else {
            0
        }
    }

    fn device_list_by_type(&mut self, type_id: i32) -> Result<String, KinesisError> {
        let mut inner = self.record(Call::DeviceListByType(type_id));
        inner.fail(Fallible::DeviceListByType)?;
        if !inner.list_built {
            return Ok(String::new());
        }
        Ok(inner
            .devices
            .iter()
            .filter(|d| i64::from(d.info.type_id) == i64::from(type_id))
            .map(|d| format!("{},", d.info.serial_no))
            .collect())
    }

    fn device_info(&mut self, serial: &str) -> Result<DeviceInfo, KinesisError> {
        let mut inner = self.record(Call::DeviceInfo(serial.to_string()));
        inner.fail(Fallible::DeviceInfo)?;
        Ok(inner.device(serial)?.info.clone())
    }

    fn open(&mut self, serial: &str) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::Open(serial.to_string()));
        inner.fail(Fallible::Open)?;
        inner.device(serial)?.open = true;
        Ok(())
    }

    fn close(&mut self, serial: &str) {
        let mut inner = self.record(Call::Close(serial.to_string()));
        if let Ok(device) = inner.device(serial) {
            device.open = false;
            device.enabled = false;
        }
    }

    fn start_polling(&mut self, serial: &str, _channel: i16, interval_ms: u32) -> bool {
        let mut inner = self.record(Call::StartPolling(interval_ms));
        match inner.open_device(serial) {
            Ok(device) => {
                device.polling = Some(interval_ms);
                true
            }
            Err(_) => false,
        }
    }

    fn stop_polling(&mut self, serial: &str, _channel: i16) {
        let mut inner = self.record(Call::StopPolling);
        if let Ok(device) = inner.device(serial) {
            device.polling = None;
        }
    }

    fn enable_channel(&mut self, serial: &str, _channel: i16) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::EnableChannel);
        inner.fail(Fallible::EnableChannel)?;
        inner.open_device(serial)?.enabled = true;
        Ok(())
    }

    fn home(&mut self, serial: &str, _channel: i16) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::Home);
        inner.fail(Fallible::Home)?;
        let response = inner.home_response;
        let device = inner.open_device(serial)?;
        device.position = 0;
        device.queue.extend(response);
        Ok(())
    }

    fn move_to_position(
        &mut self,
        serial: &str,
        _channel: i16,
        position: i32,
    ) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::MoveToPosition(position));
        inner.fail(Fallible::MoveToPosition)?;
        let (response, offset) = (inner.move_response, inner.move_offset);
        let device = inner.open_device(serial)?;
        if let Some(message) = response {
            device.position = position + offset;
            device.queue.push_back(message);
        }
        Ok(())
    }

    fn request_position(&mut self, serial: &str, _channel: i16) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::RequestPosition);
        inner.fail(Fallible::RequestPosition)?;
        inner.open_device(serial)?;
        Ok(())
    }

    fn position(&mut self, serial: &str, _channel: i16) -> i32 {
        let mut inner = self.record(Call::Position);
        inner.device(serial).map_or(0, |d| d.position)
    }

    fn vel_params(&mut self, serial: &str, _channel: i16) -> Result<VelParams, KinesisError> {
        let mut inner = self.record(Call::VelParams);
        inner.fail(Fallible::VelParams)?;
        Ok(inner.open_device(serial)?.vel)
    }

    fn set_vel_params(
        &mut self,
        serial: &str,
        _channel: i16,
        params: VelParams,
    ) -> Result<(), KinesisError> {
        let mut inner = self.record(Call::SetVelParams(params));
        inner.fail(Fallible::SetVelParams)?;
        inner.open_device(serial)?.vel = params;
        Ok(())
    }

    fn message_queue_size(&mut self, serial: &str, _channel: i16) -> usize {
        let mut inner = self.record(Call::MessageQueueSize);
        inner.device(serial).map_or(0, |d| d.queue.len())
    }

    fn next_message(&mut self, serial: &str, _channel: i16) -> Option<Message> {
        let mut inner = self.record(Call::NextMessage);
        if inner.dequeue_fails {
            return None;
        }
        inner.device(serial).ok()?.queue.pop_front()
    }

    fn clear_message_queue(&mut self, serial: &str, _channel: i16) {
        let mut inner = self.record(Call::ClearMessageQueue);
        if let Ok(device) = inner.device(serial) {
            device.queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SN: &str = "40154488";

    #[test]
    fn list_needs_build() {
        let mut bench = SimulatedBench::with_device(SN);
        assert_eq!(bench.device_list_by_type(BENCHTOP_STEPPER_TYPE_ID).unwrap(), "");
        bench.build_device_list().unwrap();
        assert_eq!(bench.device_list_size(), 1);
        assert_eq!(
            bench.device_list_by_type(BENCHTOP_STEPPER_TYPE_ID).unwrap(),
            "40154488,"
        );
        assert_eq!(bench.device_list_by_type(73).unwrap(), "");
    }

    #[test]
    fn commands_need_open_device() {
        let mut bench = SimulatedBench::with_device(SN);
        assert_eq!(
            bench.home(SN, 1),
            Err(KinesisError(FT_DEVICE_NOT_OPENED))
        );
        assert_eq!(
            bench.open("00000000"),
            Err(KinesisError(FT_DEVICE_NOT_FOUND))
        );
        bench.open(SN).unwrap();
        bench.home(SN, 1).unwrap();
        assert_eq!(bench.queued_messages(SN), 1);
        assert_eq!(bench.next_message(SN, 1), Some(Message::new(2, 0)));
    }

    #[test]
    fn default_responses_complete() {
        let mut bench = SimulatedBench::with_device(SN);
        bench.open(SN).unwrap();
        bench.home(SN, 1).unwrap();
        bench.move_to_position(SN, 1, 100).unwrap();
        for _ in 0..2 {
            assert!(bench.next_message(SN, 1).unwrap().is_completion());
        }
    }

    #[test]
    fn silent_move_keeps_position() {
        let mut bench = SimulatedBench::with_device(SN);
        bench.open(SN).unwrap();
        bench.set_move_response(None);
        bench.move_to_position(SN, 1, 500).unwrap();
        assert_eq!(bench.device_position(SN), 0);
        assert_eq!(bench.message_queue_size(SN, 1), 0);
        bench.set_move_response(Some(Message::new(2, 1)));
        bench.move_to_position(SN, 1, 500).unwrap();
        assert_eq!(bench.device_position(SN), 500);
        assert_eq!(bench.next_message(SN, 1), Some(Message::new(2, 1)));
    }

    #[test]
    fn injected_failure_is_one_shot() {
        let mut bench = SimulatedBench::with_device(SN);
        bench.fail_next(Fallible::Open, 37);
        assert_eq!(bench.open(SN), Err(KinesisError(37)));
        assert_eq!(bench.open(SN), Ok(()));
        assert_eq!(
            bench.calls(),
            vec![Call::Open(SN.to_string()), Call::Open(SN.to_string())]
        );
    }
}
