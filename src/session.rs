
mod registry;
pub mod units;
mod wait;

use self::{registry::LiveSlot, wait::wait_for_completion};
use crate::{
    config::{SessionConfig, NUM_POSITIONS},
    error::WheelError,
    kinesis::{parse_serial_list, Kinesis, VelParams, BENCHTOP_STEPPER_TYPE_ID, CHANNEL},
    util::ensure,
};
use std::{fmt::Display, thread};
use tracing::{debug, info, warn};

/// Number of characters of a serial number Kinesis looks at
const SIGNIFICANT_SERIAL_LEN: usize = 8;

//

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum SessionState {
    Closed,
    Opening,
    Homing,
    Ready,
    Moving,
    Closing,
    /// A home or move timed out. Only [`Session::close`] gets out of here.
    Faulted,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Which physical device a session talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    serial_number: String,
    description: String,
}

impl DeviceIdentity {
    pub fn new(serial_number: impl Into<String>) -> Self {
        DeviceIdentity {
            serial_number: serial_number.into(),
            description: String::new(),
        }
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Description reported by the device, empty until it was discovered
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The first 8 characters of the serial number, the rest is ignored by
    /// Kinesis
    pub fn significant(&self) -> &str {
        significant(&self.serial_number)
    }

    pub fn matches(&self, serial: &str) -> bool {
        self.significant() == significant(serial)
    }
}

fn significant(serial: &str) -> &str {
    match serial.char_indices().nth(SIGNIFICANT_SERIAL_LEN) {
        Some((i, _)) => &serial[..i],
        None => serial,
    }
}

//

/// A connection to a single FW103H
///
/// The session goes through discovery, opening and homing in [`open`][Session::open]
/// and afterwards accepts moves and speed changes until it is
/// [`close`][Session::close]d. All commands block until the hardware confirmed
/// them or the configured timeout ran out. A timeout faults the session, after
/// which it has to be closed and opened again.
///
/// Only one session per serial number can be open in a process at a time.
/// A session should be closed before it's dropped, otherwise the connection
/// stays open in the Kinesis library.
#[derive(Debug)]
pub struct Session<K: Kinesis> {
    hardware: K,
    identity: DeviceIdentity,
    config: SessionConfig,
    state: SessionState,
    position: u32,
    slot: Option<LiveSlot>,
}

impl<K: Kinesis> Session<K> {
    pub fn new(hardware: K, identity: DeviceIdentity, config: SessionConfig) -> Self {
        Session {
            hardware,
            identity,
            config,
            state: SessionState::Closed,
            position: 0,
            slot: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Last position index the hardware confirmed
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn hardware(&self) -> &K {
        &self.hardware
    }

    /// Gives back the hardware handle. The session should be closed by then.
    pub fn into_hardware(self) -> K {
        self.hardware
    }

    /// Replaces the identity. Only possible while the session is closed.
    pub fn set_identity(&mut self, identity: DeviceIdentity) -> Result<(), WheelError> {
        ensure!(
            self.state == SessionState::Closed,
            WheelError::SerialNumberChangeForbidden
        );
        self.identity = identity;
        Ok(())
    }

    /// Changes the interval of the background polling. Only possible while the
    /// session is closed.
    pub fn set_poll_interval(&mut self, ms: i64) -> Result<(), WheelError> {
        ensure!(
            self.state == SessionState::Closed,
            WheelError::PollChangeForbidden
        );
        self.config.poll_interval_ms = u32::try_from(ms)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(WheelError::InvalidPollInterval(ms))?;
        Ok(())
    }

    fn fault(&mut self, error: WheelError) -> WheelError {
        warn!(serial = self.identity.significant(), %error, "session faulted");
        self.state = SessionState::Faulted;
        error
    }

    fn ensure_ready(&self) -> Result<(), WheelError> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Faulted => Err(WheelError::SessionFaulted),
            _ => Err(WheelError::SessionClosed),
        }
    }

    /// Finds the device, opens it and homes it.
    ///
    /// Does nothing if the session is already open.
    ///
    /// # Errors
    /// - [`WheelError::SessionFaulted`] if a previous open timed out and the
    ///   session wasn't closed since
    /// - [`WheelError::SessionAlreadyOpen`] if another session holds the serial
    ///   number
    /// - [`WheelError::DeviceNotFound`] if no connected device matches
    /// - [`WheelError::HomeTimeout`] if homing didn't finish in time, which
    ///   faults the session
    /// - [`WheelError::Hardware`] with the raw code if a Kinesis call failed. Once
    ///   the connection was opened this faults the session as well.
    pub fn open(&mut self) -> Result<(), WheelError> {
        match self.state {
            SessionState::Closed => {}
            SessionState::Faulted => return Err(WheelError::SessionFaulted),
            _ => return Ok(()),
        }
        ensure!(
            self.config.poll_interval_ms > 0,
            WheelError::InvalidPollInterval(0)
        );
        let slot = LiveSlot::claim(self.identity.significant())?;
        self.state = SessionState::Opening;
        if let Err(e) = self.discover().and_then(|_| {
            self.hardware
                .open(self.identity.significant())
                .map_err(WheelError::from)
        }) {
            self.state = SessionState::Closed;
            return Err(e);
        }
        // from here on the connection is held and only close releases it
        self.slot = Some(slot);
        info!(serial = self.identity.significant(), "device opened");
        if let Err(e) = self.start_and_home() {
            return Err(self.fault(e));
        }
        self.position = 0;
        self.state = SessionState::Ready;
        info!(serial = self.identity.significant(), "device homed");
        Ok(())
    }

    fn discover(&mut self) -> Result<(), WheelError> {
        self.hardware.build_device_list()?;
        let count = self.hardware.device_list_size();
        let list = self.hardware.device_list_by_type(BENCHTOP_STEPPER_TYPE_ID)?;
        debug!(count, list = %list, "device list built");
        let serials = parse_serial_list(&list);
        for serial in serials {
            let info = match self.hardware.device_info(serial) {
                Ok(info) => info,
                Err(e) => {
                    warn!(serial, %e, "couldn't get device info");
                    continue;
                }
            };
            if self.identity.matches(&info.serial_no) {
                debug!(serial, description = %info.description, "found device");
                self.identity.description = info.description;
                return Ok(());
            }
        }
        Err(WheelError::DeviceNotFound(
            self.identity.serial_number().to_string(),
        ))
    }

    fn start_and_home(&mut self) -> Result<(), WheelError> {
        let serial = self.identity.significant();
        if !self
            .hardware
            .start_polling(serial, CHANNEL, self.config.poll_interval_ms)
        {
            warn!(serial, "couldn't start polling");
        }
        self.hardware.enable_channel(serial, CHANNEL)?;
        thread::sleep(self.config.enable_settle());
        self.state = SessionState::Homing;
        self.hardware.clear_message_queue(serial, CHANNEL);
        self.hardware.home(serial, CHANNEL)?;
        debug!(serial, "homing");
        wait_for_completion(
            &mut self.hardware,
            serial,
            self.config.queue_poll(),
            self.config.home_timeout_ms,
        )
        .map_err(|_| WheelError::HomeTimeout(self.config.home_timeout_ms))?;
        Ok(())
    }

    /// Moves to the slot with the given index and waits for the move to finish.
    ///
    /// Afterwards the position is read back from the device, that is what
    /// [`position`][Session::position] returns from then on.
    ///
    /// # Errors
    /// - [`WheelError::InvalidPosition`] if `index` isn't in `0..6`, nothing is
    ///   sent in that case
    /// - [`WheelError::SessionFaulted`] / [`WheelError::SessionClosed`] if the
    ///   session isn't ready
    /// - [`WheelError::MoveTimeout`] if the move didn't finish in time, which
    ///   faults the session
    /// - [`WheelError::Hardware`] if a Kinesis call failed
    pub fn set_position(&mut self, index: i64) -> Result<(), WheelError> {
        let index = u32::try_from(index)
            .ok()
            .filter(|i| *i < NUM_POSITIONS)
            .ok_or(WheelError::InvalidPosition(index))?;
        self.ensure_ready()?;
        let target = units::index_to_device_units(index);
        let serial = self.identity.significant();
        // a leftover completion would end the wait right away
        self.hardware.clear_message_queue(serial, CHANNEL);
        if let Err(e) = self.hardware.move_to_position(serial, CHANNEL, target) {
            warn!(serial, code = e.0, "move failed");
            return Err(e.into());
        }
        self.state = SessionState::Moving;
        debug!(serial, index, target, "moving");
        if wait_for_completion(
            &mut self.hardware,
            serial,
            self.config.queue_poll(),
            self.config.move_timeout_ms,
        )
        .is_err()
        {
            return Err(self.fault(WheelError::MoveTimeout(self.config.move_timeout_ms)));
        }
        self.state = SessionState::Ready;
        let actual = self.read_position()?;
        let reached = units::device_units_to_index(actual);
        if reached != index {
            warn!(
                serial = self.identity.significant(),
                index,
                reached,
                actual,
                "wheel didn't reach target"
            );
        }
        self.position = reached;
        Ok(())
    }

    // asks the device for its position, the cached one might be stale
    fn read_position(&mut self) -> Result<i32, WheelError> {
        let serial = self.identity.significant();
        self.hardware.request_position(serial, CHANNEL)?;
        thread::sleep(self.config.poll_interval());
        Ok(self.hardware.position(serial, CHANNEL))
    }

    /// Current angle of the wheel in degrees
    pub fn angle(&mut self) -> Result<f64, WheelError> {
        self.ensure_ready()?;
        Ok(units::device_units_to_degrees(self.read_position()?))
    }

    /// Current maximum velocity
    pub fn speed(&mut self) -> Result<f64, WheelError> {
        self.ensure_ready()?;
        let params = self
            .hardware
            .vel_params(self.identity.significant(), CHANNEL)?;
        Ok(units::device_units_to_speed(params.max_velocity))
    }

    /// Sets the maximum velocity, the acceleration is kept as it is.
    ///
    /// A speed of 0 is accepted but doesn't change anything.
    ///
    /// # Errors
    /// - [`WheelError::InvalidSpeed`] if `speed` isn't in `0..=max_speed`
    /// - [`WheelError::SessionFaulted`] / [`WheelError::SessionClosed`] if the
    ///   session isn't ready
    /// - [`WheelError::Hardware`] if a Kinesis call failed
    pub fn set_speed(&mut self, speed: i64) -> Result<(), WheelError> {
        let speed = u32::try_from(speed)
            .ok()
            .filter(|s| *s <= self.config.max_speed)
            .ok_or(WheelError::InvalidSpeed(speed))?;
        self.ensure_ready()?;
        let serial = self.identity.significant();
        if speed == 0 {
            debug!(serial, "speed 0 requested, velocity left as is");
            return Ok(());
        }
        let current = self.hardware.vel_params(serial, CHANNEL)?;
        self.hardware.set_vel_params(
            serial,
            CHANNEL,
            VelParams {
                acceleration: current.acceleration,
                max_velocity: units::speed_to_device_units(speed),
            },
        )?;
        debug!(serial, speed, "speed set");
        Ok(())
    }

    /// Resets the speed to the maximum, stops polling and closes the connection.
    ///
    /// Closing a closed session does nothing. Failing to reset the speed is only
    /// logged, the connection is closed regardless.
    pub fn close(&mut self) -> Result<(), WheelError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closing;
        let serial = self.identity.significant();
        let max_velocity = units::speed_to_device_units(self.config.max_speed);
        let reset = self.hardware.vel_params(serial, CHANNEL).and_then(|p| {
            self.hardware.set_vel_params(
                serial,
                CHANNEL,
                VelParams {
                    acceleration: p.acceleration,
                    max_velocity,
                },
            )
        });
        if let Err(e) = reset {
            warn!(serial, %e, "couldn't reset speed before closing");
        }
        self.hardware.stop_polling(serial, CHANNEL);
        self.hardware.close(serial);
        self.slot = None;
        self.state = SessionState::Closed;
        info!(serial, "device closed");
        Ok(())
    }
}
